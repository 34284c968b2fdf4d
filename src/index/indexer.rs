use crate::error::IndexError;
use crate::index::document::{Document, DocumentTable};
use crate::index::entry::{
    DocSlot, EntryKind, EXACT_CRC, IndexEntry, compress_entries, merge_sorted,
};
use crate::query::evaluator::{HitMap, evaluate};
use crate::query::parser::{CompareOp, QueryNode, parse_query};
use crate::utils::{hash32, hash64, number_from_key, number_key};
use ahash::AHashSet;
use lru::LruCache;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Parsed queries are cached by literal string since the same query is
/// re-issued on every keystroke during incremental typing.
const QUERY_CACHE_CAPACITY: usize = 50;

/// Predicate deciding whether a document id should be excluded from indexing.
pub type SkipPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Optional callback resolving a document id to its full content, used for
/// exact substring search against content that was never tokenized.
pub type ContentResolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A scored search hit. Lower score value means more relevant; results are
/// returned ordered by (score, id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: String,
    pub slot: DocSlot,
    pub score: i32,
}

/// Caches invalidated at the start of every build cycle.
#[derive(Default)]
struct SearchCaches {
    /// Contiguous entry-array range per (kind, crc), so repeated terms with
    /// the same property name skip the rewind/advance walk.
    ranges: FxHashMap<(EntryKind, i32), (usize, usize)>,
    all_docs: Option<RoaringBitmap>,
}

/// In-memory inverted index over documents.
///
/// Entries accumulate in a pending buffer between [`start`](Self::start) and
/// [`finish`](Self::finish) and are invisible to [`search`](Self::search)
/// until `finish` commits them; searching before the first `finish` fails
/// with [`IndexError::NotReady`].
pub struct SearchIndexer {
    name: String,
    pub(crate) entries: Vec<IndexEntry>,
    pending: Vec<IndexEntry>,
    pub(crate) documents: DocumentTable,
    pub(crate) source_hashes: FxHashMap<String, u64>,
    pub(crate) metadata: FxHashMap<String, String>,
    pub(crate) keywords: AHashSet<String>,
    pub(crate) timestamp: i64,
    ready: bool,
    skip: Option<SkipPredicate>,
    resolver: Option<ContentResolver>,
    caches: Mutex<SearchCaches>,
    query_cache: Mutex<LruCache<String, Arc<QueryNode>>>,
}

impl SearchIndexer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            pending: Vec::new(),
            documents: DocumentTable::new(),
            source_hashes: FxHashMap::default(),
            metadata: FxHashMap::default(),
            keywords: AHashSet::new(),
            timestamp: 0,
            ready: false,
            skip: None,
            resolver: None,
            caches: Mutex::new(SearchCaches::default()),
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("non-zero capacity"),
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn set_skip_predicate(&mut self, skip: SkipPredicate) {
        self.skip = Some(skip);
    }

    pub fn set_content_resolver(&mut self, resolver: ContentResolver) {
        self.resolver = Some(resolver);
    }

    pub fn document(&self, slot: DocSlot) -> Option<&Document> {
        self.documents.get(slot)
    }

    pub fn document_slot(&self, id: &str) -> Option<DocSlot> {
        self.documents.slot_of(id)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        self.keywords.insert(keyword.into());
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_source_hash(&mut self, id: impl Into<String>, hash: u64) {
        self.source_hashes.insert(id.into(), hash);
    }

    pub fn source_hash(&self, id: &str) -> Option<u64> {
        self.source_hashes.get(id).copied()
    }

    // -- document registration -------------------------------------------

    /// Register a document, returning its slot, or `None` when the skip
    /// predicate rejects the id. With `check_if_exists`, a known id returns
    /// its existing slot instead of a duplicate.
    pub fn add_document(
        &mut self,
        id: &str,
        name: Option<&str>,
        source: Option<&str>,
        check_if_exists: bool,
    ) -> Option<DocSlot> {
        if let Some(skip) = &self.skip {
            if skip(id) {
                return None;
            }
        }
        let doc = Document {
            id: id.to_string(),
            name: name.map(str::to_string),
            source: source.map(str::to_string),
        };
        let slot = self.documents.insert(doc, check_if_exists);
        self.invalidate_caches();
        Some(slot)
    }

    /// Remove a document by id. Frees its slot for reuse and drops index
    /// entries whose document set becomes empty.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let Some(slot) = self.documents.remove(id) else {
            return false;
        };
        self.source_hashes.remove(id);
        for entry in self.entries.iter_mut().chain(self.pending.iter_mut()) {
            entry.docs.remove(slot);
        }
        self.entries.retain(|e| !e.docs.is_empty());
        self.pending.retain(|e| !e.docs.is_empty());
        self.invalidate_caches();
        true
    }

    // -- posting producers -----------------------------------------------

    /// Index a word with prefix variations.
    ///
    /// One pending entry per prefix length in `min_variations..=max_variations`
    /// (clamped to the word length), keyed by the prefix hash with crc equal
    /// to the prefix length. Shorter prefixes get a score penalty so the
    /// full word surfaces first. A word longer than `max_variations` gets an
    /// extra exact-length entry at `score - 1` so an exact hit beats its
    /// longest prefix.
    pub fn add_word(
        &mut self,
        word: &str,
        min_variations: usize,
        max_variations: usize,
        score: i32,
        doc: DocSlot,
    ) {
        let chars: Vec<char> = word.chars().collect();
        if chars.is_empty() {
            return;
        }
        let max = max_variations.min(chars.len());
        let min = min_variations.max(1);
        for c in min..=max {
            let prefix: String = chars[..c].iter().collect();
            let penalty = (max - c) as i32;
            self.pending.push(IndexEntry::with_doc(
                hash64(&prefix),
                c as i32,
                EntryKind::Word,
                score.saturating_add(penalty),
                doc,
            ));
        }
        if chars.len() > max_variations {
            self.pending.push(IndexEntry::with_doc(
                hash64(word),
                EXACT_CRC,
                EntryKind::Word,
                score - 1,
                doc,
            ));
        }
    }

    /// Index a word as a single exact-match entry with no variations. Cheap
    /// exact lookups (boolean literals, enum names) go through here.
    pub fn add_exact_word(&mut self, word: &str, score: i32, doc: DocSlot) {
        if word.is_empty() {
            return;
        }
        self.pending.push(IndexEntry::with_doc(
            hash64(word),
            EXACT_CRC,
            EntryKind::Word,
            score,
            doc,
        ));
    }

    /// Index a numeric property. The key is an order-preserving integer
    /// encoding of the double so range scans compare correctly; the crc is
    /// the hash of the property name.
    pub fn add_number(&mut self, name: &str, value: f64, score: i32, doc: DocSlot) {
        self.pending.push(IndexEntry::with_doc(
            number_key(value),
            hash32(name),
            EntryKind::Number,
            score,
            doc,
        ));
        self.keywords.insert(format!("{name}:"));
    }

    /// Index a string property with prefix variations over the value, all
    /// sharing the name-hash crc. The exact variant XORs the value length
    /// into the key to disambiguate exact from prefix matches.
    #[allow(clippy::too_many_arguments)]
    pub fn add_property(
        &mut self,
        name: &str,
        value: &str,
        min_variations: usize,
        max_variations: usize,
        score: i32,
        doc: DocSlot,
        exact: bool,
        save_keyword: bool,
    ) {
        let chars: Vec<char> = value.chars().collect();
        if chars.is_empty() {
            return;
        }
        let name_hash = hash32(name);
        let max = max_variations.min(chars.len());
        let min = min_variations.max(1);
        for c in min..=max {
            let prefix: String = chars[..c].iter().collect();
            let penalty = (max - c) as i32;
            self.pending.push(IndexEntry::with_doc(
                hash64(&prefix),
                name_hash,
                EntryKind::Property,
                score.saturating_add(penalty),
                doc,
            ));
        }
        if exact {
            self.pending.push(IndexEntry::with_doc(
                hash64(value) ^ chars.len() as i64,
                name_hash,
                EntryKind::Property,
                score - 1,
                doc,
            ));
        }
        if save_keyword {
            self.keywords.insert(format!("{name}:{value}"));
        } else {
            self.keywords.insert(format!("{name}:"));
        }
    }

    // -- build cycle ------------------------------------------------------

    /// Begin a build cycle. The index is not searchable until the matching
    /// [`finish`](Self::finish) completes. With `clear`, all documents and
    /// entries are wiped first.
    pub fn start(&mut self, clear: bool) {
        self.ready = false;
        self.pending.clear();
        if clear {
            self.entries.clear();
            self.documents.clear();
            self.source_hashes.clear();
            self.metadata.clear();
            self.keywords.clear();
        }
        self.invalidate_caches();
    }

    /// Commit the build cycle: purge postings for `removed_ids`, sort and
    /// compress pending entries, fold them into the finalized array, and
    /// mark the index searchable.
    pub fn finish(&mut self, removed_ids: &[String]) {
        for id in removed_ids {
            self.remove_document(id);
        }
        let pending = std::mem::take(&mut self.pending);
        let compressed = compress_entries(pending);
        let previous = std::mem::take(&mut self.entries);
        self.entries = merge_sorted(previous, compressed);
        self.timestamp = now_secs();
        self.ready = true;
        self.invalidate_caches();
        debug!(
            index = %self.name,
            entries = self.entries.len(),
            documents = self.documents.len(),
            "finished build cycle"
        );
    }

    // -- search -----------------------------------------------------------

    /// Parse and evaluate a query. Results are deduplicated per document
    /// (best score wins), filtered to `max_score`, ordered by (score, id)
    /// and truncated to `max_results`.
    pub fn search(
        &self,
        query: &str,
        max_score: i32,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if !self.ready {
            return Err(IndexError::NotReady);
        }
        let node = self.cached_parse(query);
        let hits = evaluate(self, &node, None);

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|&(_, score)| score <= max_score)
            .filter_map(|(slot, score)| {
                self.documents.get(slot).map(|doc| SearchResult {
                    id: doc.id.clone(),
                    slot,
                    score,
                })
            })
            .collect();
        results.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(max_results);
        Ok(results)
    }

    fn cached_parse(&self, query: &str) -> Arc<QueryNode> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(node) = cache.get(query) {
                return Arc::clone(node);
            }
            let node = Arc::new(parse_query(query));
            cache.put(query.to_string(), Arc::clone(&node));
            return node;
        }
        Arc::new(parse_query(query))
    }

    /// All live document slots, cached until the next mutation.
    pub fn all_documents(&self) -> RoaringBitmap {
        if let Ok(mut caches) = self.caches.lock() {
            if let Some(all) = &caches.all_docs {
                return all.clone();
            }
            let all: RoaringBitmap = self.documents.iter().map(|(slot, _)| slot).collect();
            caches.all_docs = Some(all.clone());
            return all;
        }
        self.documents.iter().map(|(slot, _)| slot).collect()
    }

    /// Search a word term. `Contains` matches indexed prefixes; `Equal`
    /// matches the exact-length entry. Both probe the exact-crc sentinel as
    /// well so words longer than the indexed variation bound still match in
    /// full.
    pub fn search_word(&self, word: &str, op: CompareOp, subset: Option<&RoaringBitmap>) -> HitMap {
        let mut hits = HitMap::default();
        match op {
            CompareOp::NotEqual => {
                let equal = self.search_word(word, CompareOp::Equal, None);
                self.complement(&equal, subset, &mut hits);
            }
            _ => {
                let len = word.chars().count();
                self.collect_equal_run(
                    EntryKind::Word,
                    len as i32,
                    hash64(word),
                    subset,
                    &mut hits,
                );
                self.collect_equal_run(EntryKind::Word, EXACT_CRC, hash64(word), subset, &mut hits);
            }
        }
        hits
    }

    /// Search a string property term. `Contains` probes the prefix-hash key,
    /// `Equal` the length-XORed exact key. Ordered comparisons are not
    /// defined for strings and yield no hits.
    pub fn search_property(
        &self,
        name: &str,
        value: &str,
        op: CompareOp,
        subset: Option<&RoaringBitmap>,
    ) -> HitMap {
        let crc = hash32(name);
        let mut hits = HitMap::default();
        match op {
            CompareOp::Contains => {
                self.collect_equal_run(EntryKind::Property, crc, hash64(value), subset, &mut hits);
            }
            CompareOp::Equal => {
                let exact_key = hash64(value) ^ value.chars().count() as i64;
                self.collect_equal_run(EntryKind::Property, crc, exact_key, subset, &mut hits);
            }
            CompareOp::NotEqual => {
                let equal = self.search_property(name, value, CompareOp::Equal, None);
                self.complement(&equal, subset, &mut hits);
            }
            _ => {}
        }
        hits
    }

    /// Search a numeric term with comparison operators. Matches carry a
    /// score penalty proportional to the relative distance from the probe so
    /// closer values surface first.
    pub fn search_number(
        &self,
        name: &str,
        value: f64,
        op: CompareOp,
        subset: Option<&RoaringBitmap>,
    ) -> HitMap {
        let crc = hash32(name);
        let mut hits = HitMap::default();
        if matches!(op, CompareOp::NotEqual) {
            let equal = self.search_number(name, value, CompareOp::Equal, None);
            self.complement(&equal, subset, &mut hits);
            return hits;
        }

        let (start, end) = self.bucket_range(EntryKind::Number, crc);
        if start == end {
            return hits;
        }
        let probe = number_key(value);
        let bucket = &self.entries[start..end];
        let (lo, hi) = match op {
            CompareOp::Equal | CompareOp::Contains => (
                bucket.partition_point(|e| e.key < probe),
                bucket.partition_point(|e| e.key <= probe),
            ),
            CompareOp::Less => (0, bucket.partition_point(|e| e.key < probe)),
            CompareOp::LessOrEqual => (0, bucket.partition_point(|e| e.key <= probe)),
            CompareOp::Greater => (bucket.partition_point(|e| e.key <= probe), bucket.len()),
            CompareOp::GreaterOrEqual => (bucket.partition_point(|e| e.key < probe), bucket.len()),
            CompareOp::NotEqual => unreachable!("handled above"),
        };
        for entry in &bucket[lo..hi] {
            let actual = number_from_key(entry.key);
            let penalty = number_penalty(value, actual);
            self.collect_entry(entry, entry.score.saturating_add(penalty), subset, &mut hits);
        }
        hits
    }

    /// Exact substring filter through the resolve-content callback. Used by
    /// the evaluator for quoted terms; documents whose resolved content
    /// contains `needle` are added at the given score.
    pub fn resolve_content_hits(
        &self,
        needle: &str,
        score: i32,
        subset: Option<&RoaringBitmap>,
        hits: &mut HitMap,
    ) {
        let Some(resolver) = &self.resolver else {
            return;
        };
        let finder = memchr::memmem::Finder::new(needle.as_bytes());
        let candidates = match subset {
            Some(subset) => subset.clone(),
            None => self.all_documents(),
        };
        for slot in candidates {
            let Some(doc) = self.documents.get(slot) else {
                continue;
            };
            if let Some(content) = resolver(&doc.id) {
                if finder.find(content.as_bytes()).is_some() {
                    merge_hit(hits, slot, score);
                }
            }
        }
    }

    // -- merge / combine --------------------------------------------------

    /// Incorporate all documents and entries of `other`, offsetting scores
    /// by `base_score`. Ids listed in `removed_ids` that `other` does not
    /// re-introduce are purged first. A document id present in both indexes
    /// is replaced: its old postings are dropped before the new ones come
    /// in. Equal-key entries union their document sets.
    ///
    /// Searchability is unchanged: merging into an index that never finished
    /// a build cycle does not make it searchable.
    pub fn merge(
        &mut self,
        removed_ids: &[String],
        other: &SearchIndexer,
        base_score: i32,
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
    ) {
        for id in removed_ids {
            if !other.documents.contains(id) {
                self.remove_document(id);
            }
        }
        let replaced: Vec<String> = other
            .documents
            .iter()
            .filter(|(_, doc)| self.documents.contains(&doc.id))
            .map(|(_, doc)| doc.id.clone())
            .collect();
        for id in &replaced {
            self.remove_document(id);
        }

        let slot_map = self.absorb_tables(other);

        let total = other.entries.len();
        for (i, entry) in other.entries.iter().enumerate() {
            let mut remapped = IndexEntry::new(
                entry.key,
                entry.crc,
                entry.kind,
                entry.score.saturating_add(base_score),
            );
            for doc in &entry.docs {
                if let Some(&slot) = slot_map.get(&doc) {
                    remapped.docs.insert(slot);
                }
            }
            if remapped.docs.is_empty() {
                continue;
            }
            match self
                .entries
                .binary_search_by(|e| e.cmp_bucket(&remapped))
            {
                Ok(pos) => {
                    let existing = &mut self.entries[pos];
                    existing.docs |= remapped.docs;
                    existing.score = existing.score.min(remapped.score);
                }
                Err(pos) => self.entries.insert(pos, remapped),
            }
            if let Some(progress) = progress.as_deref_mut() {
                progress(i + 1, total);
            }
        }

        self.timestamp = now_secs();
        self.invalidate_caches();
    }

    /// Fold many per-document partial indexes into this one during a
    /// from-scratch build. Entries land in the pending buffer; the caller
    /// commits with [`finish`](Self::finish).
    pub fn combine(
        &mut self,
        others: impl IntoIterator<Item = SearchIndexer>,
        base_score: i32,
        mut progress: Option<&mut dyn FnMut(usize)>,
    ) {
        for (i, other) in others.into_iter().enumerate() {
            let slot_map = self.absorb_tables(&other);
            for entry in other.entries.iter().chain(other.pending.iter()) {
                let mut remapped = IndexEntry::new(
                    entry.key,
                    entry.crc,
                    entry.kind,
                    entry.score.saturating_add(base_score),
                );
                for doc in &entry.docs {
                    if let Some(&slot) = slot_map.get(&doc) {
                        remapped.docs.insert(slot);
                    }
                }
                if !remapped.docs.is_empty() {
                    self.pending.push(remapped);
                }
            }
            if let Some(progress) = progress.as_deref_mut() {
                progress(i + 1);
            }
        }
    }

    /// Copy documents, hashes, metadata and keywords from `other`, returning
    /// the slot remap for its entries.
    fn absorb_tables(&mut self, other: &SearchIndexer) -> FxHashMap<DocSlot, DocSlot> {
        let mut slot_map = FxHashMap::default();
        for (slot, doc) in other.documents.iter() {
            let new_slot = self.documents.insert(doc.clone(), true);
            slot_map.insert(slot, new_slot);
        }
        for (path, hash) in &other.source_hashes {
            self.source_hashes.insert(path.clone(), *hash);
        }
        for (key, value) in &other.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
        for keyword in &other.keywords {
            self.keywords.insert(keyword.clone());
        }
        slot_map
    }

    // -- internals --------------------------------------------------------

    /// Contiguous range of the entry array holding all `(kind, crc)` entries,
    /// resolved by binary search and cached until the next mutation.
    fn bucket_range(&self, kind: EntryKind, crc: i32) -> (usize, usize) {
        if let Ok(caches) = self.caches.lock() {
            if let Some(&range) = caches.ranges.get(&(kind, crc)) {
                return range;
            }
        }
        let start = self
            .entries
            .partition_point(|e| (e.crc, e.kind) < (crc, kind));
        let end = self
            .entries
            .partition_point(|e| (e.crc, e.kind) <= (crc, kind));
        if let Ok(mut caches) = self.caches.lock() {
            caches.ranges.insert((kind, crc), (start, end));
        }
        (start, end)
    }

    /// Collect the contiguous run of entries matching `(kind, crc, key)`.
    fn collect_equal_run(
        &self,
        kind: EntryKind,
        crc: i32,
        key: i64,
        subset: Option<&RoaringBitmap>,
        hits: &mut HitMap,
    ) {
        let (start, end) = self.bucket_range(kind, crc);
        if start == end {
            return;
        }
        let bucket = &self.entries[start..end];
        let lo = bucket.partition_point(|e| e.key < key);
        let hi = bucket.partition_point(|e| e.key <= key);
        for entry in &bucket[lo..hi] {
            self.collect_entry(entry, entry.score, subset, hits);
        }
    }

    fn collect_entry(
        &self,
        entry: &IndexEntry,
        score: i32,
        subset: Option<&RoaringBitmap>,
        hits: &mut HitMap,
    ) {
        for slot in &entry.docs {
            if let Some(subset) = subset {
                if !subset.contains(slot) {
                    continue;
                }
            }
            merge_hit(hits, slot, score);
        }
    }

    /// All documents not present in `excluded`, intersected with `subset`.
    fn complement(
        &self,
        excluded: &HitMap,
        subset: Option<&RoaringBitmap>,
        hits: &mut HitMap,
    ) {
        let candidates = match subset {
            Some(subset) => subset.clone(),
            None => self.all_documents(),
        };
        for slot in candidates {
            if !excluded.contains_key(&slot) {
                merge_hit(hits, slot, 0);
            }
        }
    }

    /// Deserialization commits a fully parsed index as searchable.
    pub(crate) fn mark_ready(&mut self) {
        self.ready = true;
        self.invalidate_caches();
    }

    pub(crate) fn invalidate_caches(&self) {
        if let Ok(mut caches) = self.caches.lock() {
            caches.ranges.clear();
            caches.all_docs = None;
        }
    }

    /// Verify the finalized array is strictly ordered with unique buckets.
    /// Exposed for tests and debug assertions.
    pub fn check_sort_invariant(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| pair[0].cmp_bucket(&pair[1]) == std::cmp::Ordering::Less)
    }
}

impl Clone for SearchIndexer {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entries: self.entries.clone(),
            pending: self.pending.clone(),
            documents: self.documents.clone(),
            source_hashes: self.source_hashes.clone(),
            metadata: self.metadata.clone(),
            keywords: self.keywords.clone(),
            timestamp: self.timestamp,
            ready: self.ready,
            skip: self.skip.clone(),
            resolver: self.resolver.clone(),
            caches: Mutex::new(SearchCaches::default()),
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("non-zero capacity"),
            )),
        }
    }
}

impl std::fmt::Debug for SearchIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndexer")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("documents", &self.documents.len())
            .field("ready", &self.ready)
            .finish()
    }
}

pub(crate) fn merge_hit(hits: &mut HitMap, slot: DocSlot, score: i32) {
    hits.entry(slot)
        .and_modify(|existing| *existing = (*existing).min(score))
        .or_insert(score);
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Score penalty for a numeric match, proportional to the relative distance
/// between the probe and the stored value, capped at 100.
fn number_penalty(probe: f64, actual: f64) -> i32 {
    let scale = probe.abs().max(actual.abs()).max(1.0);
    let relative = ((probe - actual).abs() / scale).min(1.0);
    (relative * 100.0) as i32
}
