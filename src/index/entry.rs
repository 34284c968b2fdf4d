use roaring::RoaringBitmap;
use std::cmp::Ordering;

/// Slot index of a document in the document table.
pub type DocSlot = u32;

/// Sentinel crc marking an exact-length entry (no prefix variation).
pub const EXACT_CRC: i32 = i32::MAX;

/// Kind of posting stored in an [`IndexEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum EntryKind {
    #[default]
    Undefined = 0,
    Word = 1,
    Number = 2,
    Property = 3,
}

impl EntryKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EntryKind::Undefined),
            1 => Some(EntryKind::Word),
            2 => Some(EntryKind::Number),
            3 => Some(EntryKind::Property),
            _ => None,
        }
    }
}

/// A posting-list bucket: all documents containing one term/value, keyed by
/// `(crc, kind, key)`.
///
/// The entry array is kept sorted primarily by `crc`, then `kind`, then `key`
/// (then `score`), so that same-property entries are contiguous and can be
/// range-scanned. The doc set is mutable only while a build cycle is open.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: i64,
    pub crc: i32,
    pub kind: EntryKind,
    pub score: i32,
    pub docs: RoaringBitmap,
}

impl IndexEntry {
    pub fn new(key: i64, crc: i32, kind: EntryKind, score: i32) -> Self {
        Self {
            key,
            crc,
            kind,
            score,
            docs: RoaringBitmap::new(),
        }
    }

    pub fn with_doc(key: i64, crc: i32, kind: EntryKind, score: i32, doc: DocSlot) -> Self {
        let mut entry = Self::new(key, crc, kind, score);
        entry.docs.insert(doc);
        entry
    }

    /// Full ordering: (crc, kind, key, score).
    pub fn cmp_full(&self, other: &Self) -> Ordering {
        self.cmp_bucket(other)
            .then_with(|| self.score.cmp(&other.score))
    }

    /// Bucket ordering, ignoring score: (crc, kind, key). Two entries that
    /// compare equal here belong to the same posting bucket.
    pub fn cmp_bucket(&self, other: &Self) -> Ordering {
        self.crc
            .cmp(&other.crc)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.key.cmp(&other.key))
    }

    pub fn same_bucket(&self, other: &Self) -> bool {
        self.crc == other.crc && self.kind == other.kind && self.key == other.key
    }
}

/// Sort pending entries and merge duplicate buckets.
///
/// Runs with equal `(crc, kind, key)` are collapsed by unioning their doc
/// sets; the surviving score is the minimum (lower score value is more
/// relevant). Entries whose doc set is empty are dropped.
pub fn compress_entries(mut entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    entries.sort_unstable_by(IndexEntry::cmp_full);

    let mut compressed: Vec<IndexEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.docs.is_empty() {
            continue;
        }
        match compressed.last_mut() {
            Some(last) if last.same_bucket(&entry) => {
                last.docs |= entry.docs;
                last.score = last.score.min(entry.score);
            }
            _ => compressed.push(entry),
        }
    }
    compressed
}

/// Merge two arrays already sorted by [`IndexEntry::cmp_full`], unioning
/// buckets that appear in both. Used by `finish()` to fold freshly compressed
/// pending entries into the previous finalized array.
pub fn merge_sorted(a: Vec<IndexEntry>, b: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let mut merged: Vec<IndexEntry> = Vec::with_capacity(a.len() + b.len());
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();

    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let taken = match l.cmp_bucket(r) {
            Ordering::Less => left.next(),
            Ordering::Greater => right.next(),
            Ordering::Equal => {
                let merged_entry = left.next().map(|mut l| {
                    if let Some(r) = right.next() {
                        l.docs |= r.docs;
                        l.score = l.score.min(r.score);
                    }
                    l
                });
                merged_entry
            }
        };
        if let Some(entry) = taken {
            if !entry.docs.is_empty() {
                merged.push(entry);
            }
        }
    }
    for entry in left.chain(right) {
        if !entry.docs.is_empty() {
            merged.push(entry);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: i64, crc: i32, kind: EntryKind, score: i32, doc: DocSlot) -> IndexEntry {
        IndexEntry::with_doc(key, crc, kind, score, doc)
    }

    #[test]
    fn test_ordering_crc_first() {
        let a = entry(100, 1, EntryKind::Word, 0, 0);
        let b = entry(1, 2, EntryKind::Word, 0, 0);
        assert_eq!(a.cmp_full(&b), Ordering::Less);
    }

    #[test]
    fn test_ordering_kind_before_key() {
        let a = entry(500, 3, EntryKind::Number, 0, 0);
        let b = entry(1, 3, EntryKind::Property, 0, 0);
        assert_eq!(a.cmp_full(&b), Ordering::Less);
    }

    #[test]
    fn test_compress_merges_buckets() {
        let entries = vec![
            entry(7, 3, EntryKind::Word, 5, 1),
            entry(7, 3, EntryKind::Word, 2, 2),
            entry(8, 3, EntryKind::Word, 1, 3),
        ];
        let compressed = compress_entries(entries);
        assert_eq!(compressed.len(), 2);
        assert_eq!(compressed[0].key, 7);
        assert_eq!(compressed[0].score, 2);
        assert_eq!(compressed[0].docs.len(), 2);
    }

    #[test]
    fn test_compress_drops_empty() {
        let entries = vec![
            IndexEntry::new(7, 3, EntryKind::Word, 5),
            entry(8, 3, EntryKind::Word, 1, 3),
        ];
        assert_eq!(compress_entries(entries).len(), 1);
    }

    #[test]
    fn test_compress_sort_invariant() {
        let entries = vec![
            entry(9, 4, EntryKind::Property, 0, 0),
            entry(2, 1, EntryKind::Word, 0, 1),
            entry(5, 4, EntryKind::Number, 0, 2),
            entry(2, 1, EntryKind::Word, 3, 3),
        ];
        let compressed = compress_entries(entries);
        for pair in compressed.windows(2) {
            assert_eq!(pair[0].cmp_bucket(&pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_merge_sorted_unions_common_buckets() {
        let a = compress_entries(vec![
            entry(1, 1, EntryKind::Word, 4, 0),
            entry(2, 1, EntryKind::Word, 4, 0),
        ]);
        let b = compress_entries(vec![
            entry(2, 1, EntryKind::Word, 1, 5),
            entry(3, 1, EntryKind::Word, 4, 5),
        ]);
        let merged = merge_sorted(a, b);
        assert_eq!(merged.len(), 3);
        let middle = &merged[1];
        assert_eq!(middle.key, 2);
        assert_eq!(middle.score, 1);
        assert!(middle.docs.contains(0) && middle.docs.contains(5));
    }
}
