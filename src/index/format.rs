//! Versioned binary serialization of a finalized index.
//!
//! Layout (all little-endian): version tag, generation timestamp, string
//! table, document table (holes preserved so slot numbers survive), source
//! content hashes, metadata pairs, sorted entry array, keyword registry.
//! All string references after the table are u32 indices into it; index 0 is
//! the empty string and stands for "absent".
//!
//! A version mismatch or a truncated/corrupt stream is recoverable: the
//! caller discards the file and rebuilds. Reads materialize into a scratch
//! structure and only become a live index after the whole stream parsed.

use crate::error::IndexError;
use crate::index::document::{Document, DocumentTable, StringTable};
use crate::index::entry::{EntryKind, IndexEntry};
use crate::index::indexer::SearchIndexer;
use crate::utils::{
    read_i32_le, read_i64_le, read_string, read_u8, read_u32_le, read_u64_le, write_i32_le,
    write_i64_le, write_string, write_u8, write_u32_le, write_u64_le,
};
use roaring::RoaringBitmap;
use std::io::{self, Read, Write};

/// Format tag: 'S' 'I' 'D' in the high bytes, format revision in the low one.
pub const FORMAT_VERSION: u32 = 0x5349_4401;

/// Upper bound for any serialized string, counts included. A corrupt length
/// field must not drive allocation.
const MAX_STRING_LEN: usize = 4 * 1024 * 1024;
const MAX_COUNT: u32 = 64 * 1024 * 1024;

impl SearchIndexer {
    /// Serialize the finalized index. Pending (uncommitted) entries are not
    /// part of the on-disk representation.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        let mut strings = StringTable::new();

        // Intern everything up front so the table is complete before any
        // section referencing it is emitted.
        for doc in self.documents.iter_slots().flatten() {
            strings.intern(&doc.id);
            strings.intern_opt(doc.name.as_deref());
            strings.intern_opt(doc.source.as_deref());
        }
        let mut hashes: Vec<(&String, u64)> =
            self.source_hashes.iter().map(|(k, &v)| (k, v)).collect();
        hashes.sort_unstable_by_key(|(path, _)| path.as_str());
        for (path, _) in &hashes {
            strings.intern(path);
        }
        let mut metadata: Vec<(&String, &String)> = self.metadata.iter().collect();
        metadata.sort_unstable_by_key(|(key, _)| key.as_str());
        for (key, value) in &metadata {
            strings.intern(key);
            strings.intern(value);
        }
        let mut keywords: Vec<&String> = self.keywords.iter().collect();
        keywords.sort_unstable();
        for keyword in &keywords {
            strings.intern(keyword);
        }

        write_u32_le(writer, FORMAT_VERSION)?;
        write_i64_le(writer, self.timestamp)?;

        write_u32_le(writer, strings.len() as u32)?;
        for value in strings.strings() {
            write_string(writer, value)?;
        }

        write_u32_le(writer, self.documents.slot_count() as u32)?;
        for doc in self.documents.iter_slots() {
            match doc {
                Some(doc) => {
                    write_u8(writer, 1)?;
                    write_u32_le(writer, strings.intern(&doc.id))?;
                    write_u32_le(writer, strings.intern_opt(doc.name.as_deref()))?;
                    write_u32_le(writer, strings.intern_opt(doc.source.as_deref()))?;
                }
                None => write_u8(writer, 0)?,
            }
        }

        write_u32_le(writer, hashes.len() as u32)?;
        for (path, hash) in &hashes {
            write_u32_le(writer, strings.intern(path))?;
            write_u64_le(writer, *hash)?;
        }

        write_u32_le(writer, metadata.len() as u32)?;
        for (key, value) in &metadata {
            write_u32_le(writer, strings.intern(key))?;
            write_u32_le(writer, strings.intern(value))?;
        }

        write_u32_le(writer, self.entries.len() as u32)?;
        for entry in &self.entries {
            write_i64_le(writer, entry.key)?;
            write_i32_le(writer, entry.crc)?;
            write_u8(writer, entry.kind as u8)?;
            write_i32_le(writer, entry.score)?;
            write_u32_le(writer, entry.docs.len() as u32)?;
            for slot in &entry.docs {
                write_u32_le(writer, slot)?;
            }
        }

        write_u32_le(writer, keywords.len() as u32)?;
        for keyword in &keywords {
            write_u32_le(writer, strings.intern(keyword))?;
        }

        Ok(())
    }

    /// Deserialize an index. The returned index is ready for search.
    pub fn read<R: Read>(name: &str, reader: &mut R) -> Result<SearchIndexer, IndexError> {
        SearchIndexer::read_version(reader)?;
        let timestamp = read_i64_le(reader).map_err(corrupt)?;

        let string_count = read_count(reader)?;
        let mut strings = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            strings.push(read_string(reader, MAX_STRING_LEN).map_err(corrupt)?);
        }
        let strings = StringTable::from_strings(strings);

        let slot_count = read_count(reader)?;
        let mut slots: Vec<Option<Document>> = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let valid = read_u8(reader).map_err(corrupt)?;
            if valid == 0 {
                slots.push(None);
                continue;
            }
            let id = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            let doc_name = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            let source = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            slots.push(Some(Document {
                id: id.to_string(),
                name: non_empty(doc_name),
                source: non_empty(source),
            }));
        }

        let hash_count = read_count(reader)?;
        let mut source_hashes = rustc_hash::FxHashMap::default();
        for _ in 0..hash_count {
            let path = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            let hash = read_u64_le(reader).map_err(corrupt)?;
            source_hashes.insert(path.to_string(), hash);
        }

        let meta_count = read_count(reader)?;
        let mut metadata = rustc_hash::FxHashMap::default();
        for _ in 0..meta_count {
            let key = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            let value = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            metadata.insert(key.to_string(), value.to_string());
        }

        let entry_count = read_count(reader)?;
        let mut entries = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            let key = read_i64_le(reader).map_err(corrupt)?;
            let crc = read_i32_le(reader).map_err(corrupt)?;
            let kind_raw = read_u8(reader).map_err(corrupt)?;
            let kind = EntryKind::from_u8(kind_raw)
                .ok_or_else(|| IndexError::Corrupt(format!("invalid entry kind {kind_raw}")))?;
            let score = read_i32_le(reader).map_err(corrupt)?;
            let doc_count = read_count(reader)?;
            let mut docs = RoaringBitmap::new();
            for _ in 0..doc_count {
                let slot = read_u32_le(reader).map_err(corrupt)?;
                if slot as usize >= slot_count {
                    return Err(IndexError::Corrupt(format!(
                        "entry references slot {slot} beyond document table ({slot_count})"
                    )));
                }
                docs.insert(slot);
            }
            let mut entry = IndexEntry::new(key, crc, kind, score);
            entry.docs = docs;
            entries.push(entry);
        }

        let keyword_count = read_count(reader)?;
        let mut keywords = ahash::AHashSet::with_capacity(keyword_count);
        for _ in 0..keyword_count {
            let keyword = lookup(&strings, read_u32_le(reader).map_err(corrupt)?)?;
            keywords.insert(keyword.to_string());
        }

        // Everything parsed; assemble the live index.
        let mut index = SearchIndexer::new(name);
        index.entries = entries;
        index.documents = DocumentTable::from_slots(slots);
        index.source_hashes = source_hashes;
        index.metadata = metadata;
        index.keywords = keywords;
        index.timestamp = timestamp;
        if !index.check_sort_invariant() {
            return Err(IndexError::Corrupt("entry array out of order".to_string()));
        }
        index.mark_ready();
        Ok(index)
    }

    /// Validate the version tag only, without materializing any content.
    /// Used to cheaply reject a stale cache file.
    pub fn read_version<R: Read>(reader: &mut R) -> Result<(), IndexError> {
        let found = read_u32_le(reader).map_err(corrupt)?;
        if found != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found,
                expected: FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

fn corrupt(err: io::Error) -> IndexError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            IndexError::Corrupt(err.to_string())
        }
        _ => IndexError::Io(err),
    }
}

fn read_count<R: Read>(reader: &mut R) -> Result<usize, IndexError> {
    let count = read_u32_le(reader).map_err(corrupt)?;
    if count > MAX_COUNT {
        return Err(IndexError::Corrupt(format!("implausible count {count}")));
    }
    Ok(count as usize)
}

fn lookup(strings: &StringTable, idx: u32) -> Result<&str, IndexError> {
    strings
        .get(idx)
        .ok_or_else(|| IndexError::Corrupt(format!("string index {idx} out of range")))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_index() -> SearchIndexer {
        let mut index = SearchIndexer::new("sample");
        index.start(true);
        for (id, word, size) in [
            ("assets/rock.png", "rock", 1024.0),
            ("assets/stone.mat", "stone", 64.0),
        ] {
            let slot = index.add_document(id, Some(word), Some(id), true).unwrap();
            index.add_word(word, 2, 8, 10, slot);
            index.add_number("size", size, 0, slot);
            index.add_property("ext", id.rsplit('.').next().unwrap(), 1, 4, 0, slot, true, true);
            index.set_source_hash(id, size as u64);
        }
        index.set_metadata("root", "/project/assets");
        index.finish(&[]);
        // A hole in the slot table must survive the round-trip.
        index.add_document("assets/tmp.png", None, None, true).unwrap();
        index.remove_document("assets/tmp.png");
        index
    }

    #[test]
    fn test_roundtrip_preserves_search_results() {
        let index = sample_index();
        let mut buf = Vec::new();
        index.write(&mut buf).unwrap();

        let restored = SearchIndexer::read("sample", &mut Cursor::new(&buf)).unwrap();
        assert!(restored.is_ready());
        assert_eq!(restored.document_count(), index.document_count());
        assert_eq!(restored.entry_count(), index.entry_count());
        assert!(restored.check_sort_invariant());

        for query in ["rock", "sto", "size>100", "ext:png", "rock size<=2048"] {
            let before = index.search(query, i32::MAX, 100).unwrap();
            let after = restored.search(query, i32::MAX, 100).unwrap();
            assert_eq!(before, after, "query {query:?} must survive a round-trip");
        }
    }

    #[test]
    fn test_roundtrip_preserves_tables() {
        let index = sample_index();
        let mut buf = Vec::new();
        index.write(&mut buf).unwrap();
        let restored = SearchIndexer::read("sample", &mut Cursor::new(&buf)).unwrap();

        assert_eq!(restored.source_hash("assets/rock.png"), Some(1024));
        assert_eq!(restored.metadata("root"), Some("/project/assets"));
        let mut keywords: Vec<&str> = restored.keywords().collect();
        keywords.sort_unstable();
        assert!(keywords.contains(&"size:"));
        assert!(keywords.contains(&"ext:png"));
        // The freed slot is still reusable after reload.
        let mut restored = restored;
        let slot = restored
            .add_document("assets/new.png", None, None, true)
            .unwrap();
        assert_eq!(slot, 2);
    }

    #[test]
    fn test_version_mismatch_is_recoverable() {
        let mut buf = Vec::new();
        sample_index().write(&mut buf).unwrap();
        buf[3] = 0xFF;

        match SearchIndexer::read("sample", &mut Cursor::new(&buf)) {
            Err(err @ IndexError::UnsupportedVersion { .. }) => {
                assert!(err.is_rebuild_needed());
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_check_version_only() {
        let mut buf = Vec::new();
        sample_index().write(&mut buf).unwrap();
        // Only the 4-byte tag is consumed.
        assert!(SearchIndexer::read_version(&mut Cursor::new(&buf[..4])).is_ok());
        assert!(SearchIndexer::read_version(&mut Cursor::new(&[0u8; 4])).is_err());
    }

    #[test]
    fn test_truncated_stream_is_corrupt() {
        let mut buf = Vec::new();
        sample_index().write(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);

        match SearchIndexer::read("sample", &mut Cursor::new(&buf)) {
            Err(err @ IndexError::Corrupt(_)) => assert!(err.is_rebuild_needed()),
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_counts_are_corrupt() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, FORMAT_VERSION).unwrap();
        write_i64_le(&mut buf, 0).unwrap();
        write_u32_le(&mut buf, u32::MAX).unwrap();
        assert!(matches!(
            SearchIndexer::read("sample", &mut Cursor::new(&buf)),
            Err(IndexError::Corrupt(_))
        ));
    }
}
