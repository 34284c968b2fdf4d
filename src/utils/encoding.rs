use std::io::{self, Read, Write};

/// Write a u8
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Read a u8
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Write an i32 in little-endian format
pub fn write_i32_le<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read an i32 in little-endian format
pub fn read_i32_le<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Write a u64 in little-endian format
pub fn write_u64_le<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u64 in little-endian format
pub fn read_u64_le<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write an i64 in little-endian format
pub fn write_i64_le<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read an i64 in little-endian format
pub fn read_i64_le<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes)
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    write_u32_le(writer, bytes.len() as u32)?;
    writer.write_all(bytes)
}

/// Read a length-prefixed UTF-8 string.
/// `max_len` bounds the allocation so a corrupt length field cannot OOM us.
pub fn read_string<R: Read>(reader: &mut R, max_len: usize) -> io::Result<String> {
    let len = read_u32_le(reader)? as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("string length {} exceeds limit {}", len, max_len),
        ));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scalar_roundtrip() {
        let mut buf = Vec::new();
        write_u8(&mut buf, 3).unwrap();
        write_u32_le(&mut buf, 0xDEAD_BEEF).unwrap();
        write_i32_le(&mut buf, -42).unwrap();
        write_u64_le(&mut buf, u64::MAX).unwrap();
        write_i64_le(&mut buf, i64::MIN).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u8(&mut cursor).unwrap(), 3);
        assert_eq!(read_u32_le(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_i32_le(&mut cursor).unwrap(), -42);
        assert_eq!(read_u64_le(&mut cursor).unwrap(), u64::MAX);
        assert_eq!(read_i64_le(&mut cursor).unwrap(), i64::MIN);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "héllo/wörld.png").unwrap();
        write_string(&mut buf, "").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor, 1024).unwrap(), "héllo/wörld.png");
        assert_eq!(read_string(&mut cursor, 1024).unwrap(), "");
    }

    #[test]
    fn test_string_length_bound() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, u32::MAX).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(read_string(&mut cursor, 1024).is_err());
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut cursor = Cursor::new(vec![0u8; 3]);
        assert!(read_u32_le(&mut cursor).is_err());
    }
}
