use crate::index::entry::DocSlot;
use rustc_hash::FxHashMap;

/// An indexed entity with a stable string id (asset path, object guid).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub name: Option<String>,
    pub source: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            source: None,
        }
    }
}

/// Growable document table with slot reclamation.
///
/// A document's slot is stable until the document is removed; removed slots
/// go to a freelist and may be handed out again. An id maps to at most one
/// live slot at a time.
#[derive(Debug, Clone, Default)]
pub struct DocumentTable {
    slots: Vec<Option<Document>>,
    free: Vec<DocSlot>,
    by_id: FxHashMap<String, DocSlot>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. With `check_if_exists`, an already-known id
    /// returns its existing slot, refreshing the display name and source
    /// instead of creating a duplicate (last-writer-wins on the record).
    pub fn insert(&mut self, doc: Document, check_if_exists: bool) -> DocSlot {
        if check_if_exists {
            if let Some(&slot) = self.by_id.get(&doc.id) {
                if let Some(existing) = self.slots.get_mut(slot as usize).and_then(Option::as_mut)
                {
                    if doc.name.is_some() {
                        existing.name = doc.name;
                    }
                    if doc.source.is_some() {
                        existing.source = doc.source;
                    }
                }
                return slot;
            }
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(doc.clone());
                slot
            }
            None => {
                self.slots.push(Some(doc.clone()));
                (self.slots.len() - 1) as DocSlot
            }
        };
        self.by_id.insert(doc.id, slot);
        slot
    }

    /// Remove a document by id, clearing the slot and queuing it for reuse.
    pub fn remove(&mut self, id: &str) -> Option<DocSlot> {
        let slot = self.by_id.remove(id)?;
        if let Some(cell) = self.slots.get_mut(slot as usize) {
            *cell = None;
        }
        self.free.push(slot);
        Some(slot)
    }

    pub fn get(&self, slot: DocSlot) -> Option<&Document> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    pub fn slot_of(&self, id: &str) -> Option<DocSlot> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Total number of slots, including reclaimed ones. This is the bound
    /// serialized to disk so slot numbers survive a round-trip.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate live documents with their slots.
    pub fn iter(&self) -> impl Iterator<Item = (DocSlot, &Document)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, doc)| doc.as_ref().map(|d| (slot as DocSlot, d)))
    }

    /// Iterate all slots in order, dead ones included. Serialization needs
    /// the holes to preserve slot numbering.
    pub fn iter_slots(&self) -> impl Iterator<Item = Option<&Document>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Rebuild from a slot vector (deserialization path).
    pub fn from_slots(slots: Vec<Option<Document>>) -> Self {
        let mut by_id = FxHashMap::default();
        let mut free = Vec::new();
        for (slot, doc) in slots.iter().enumerate() {
            match doc {
                Some(doc) => {
                    by_id.insert(doc.id.clone(), slot as DocSlot);
                }
                None => free.push(slot as DocSlot),
            }
        }
        Self { slots, free, by_id }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_id.clear();
    }
}

/// Deduplicated string pool used by the binary format. Index 0 is always the
/// empty string so optional fields serialize without a presence flag.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<String>,
    lookup: FxHashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        table.intern("");
        table
    }

    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.lookup.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.lookup.insert(value.to_string(), idx);
        idx
    }

    pub fn intern_opt(&mut self, value: Option<&str>) -> u32 {
        self.intern(value.unwrap_or(""))
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Rebuild from a raw string list (deserialization path).
    pub fn from_strings(strings: Vec<String>) -> Self {
        let lookup = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
        Self { strings, lookup }
    }
}
