//! Artifact production: resolving documents into partial per-document
//! indexes through a pluggable, possibly asynchronous producer.
//!
//! Producers model hosts where indexing a document means waiting on an
//! import pipeline, so resolution is a poll loop over a bounded in-flight
//! window rather than a blocking map. The window adapts: it grows while
//! producers keep up and shrinks when artifacts time out.

use crate::error::IndexError;
use crate::index::indexer::SearchIndexer;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A requeued artifact is retried with a fresh timeout this many times
/// before it is dropped as failed.
const MAX_ATTEMPTS: u32 = 4;

/// A document the build wants an artifact for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSpec {
    pub id: String,
    pub name: Option<String>,
    pub source: Option<String>,
}

impl DocumentSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            source: None,
        }
    }
}

/// A resolved partial index covering exactly one document, plus the content
/// hash used to short-circuit unchanged documents on incremental updates.
pub struct IndexArtifact {
    pub doc: DocumentSpec,
    pub index: SearchIndexer,
    pub content_hash: u64,
}

/// Result of polling one in-flight document.
pub enum ArtifactStatus {
    Ready(Box<IndexArtifact>),
    Pending,
    Failed(String),
}

/// Source of per-document partial indexes.
///
/// `start` kicks off resolution for a document; `poll` reports progress.
/// Both may be called from worker threads, and a timed-out document gets
/// `start` again when it re-enters the window.
pub trait ArtifactProducer: Send + Sync {
    fn start(&self, doc: &DocumentSpec);
    fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus;
}

/// Poll-loop tunables, derived from [`IndexConfig`](super::IndexConfig).
#[derive(Debug, Clone)]
pub struct ProduceOptions {
    pub initial_in_flight: usize,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ProduceOptions {
    fn default() -> Self {
        Self {
            initial_in_flight: 64,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Resolve all documents into artifacts.
///
/// Failed documents are logged and skipped; a document that exhausts its
/// retry budget counts as failed. `progress` receives (resolved, total)
/// where resolved includes failures. Returns [`IndexError::Cancelled`] as
/// soon as the flag is observed set.
pub fn produce_all(
    producer: &dyn ArtifactProducer,
    docs: Vec<DocumentSpec>,
    options: &ProduceOptions,
    cancel: &AtomicBool,
    mut progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Result<Vec<IndexArtifact>, IndexError> {
    let total = docs.len();
    let mut queue: VecDeque<(DocumentSpec, u32)> =
        docs.into_iter().map(|doc| (doc, 0)).collect();
    let mut in_flight: Vec<(DocumentSpec, u32, Instant)> = Vec::new();
    let mut artifacts = Vec::with_capacity(total);
    let mut resolved = 0usize;
    let mut max_in_flight = options.initial_in_flight.max(1);

    while !queue.is_empty() || !in_flight.is_empty() {
        if cancel.load(Ordering::Relaxed) {
            return Err(IndexError::Cancelled);
        }

        while in_flight.len() < max_in_flight {
            let Some((doc, attempts)) = queue.pop_front() else {
                break;
            };
            producer.start(&doc);
            in_flight.push((doc, attempts, Instant::now()));
        }

        let statuses: Vec<ArtifactStatus> = in_flight
            .par_iter()
            .map(|(doc, _, _)| producer.poll(doc))
            .collect();

        let mut still_pending = Vec::new();
        let mut timed_out = false;
        for ((doc, attempts, since), status) in in_flight.into_iter().zip(statuses) {
            match status {
                ArtifactStatus::Ready(artifact) => {
                    artifacts.push(*artifact);
                    resolved += 1;
                }
                ArtifactStatus::Failed(reason) => {
                    warn!(doc = %doc.id, %reason, "artifact failed, skipping");
                    resolved += 1;
                }
                ArtifactStatus::Pending => {
                    if since.elapsed() >= options.timeout {
                        timed_out = true;
                        if attempts + 1 >= MAX_ATTEMPTS {
                            warn!(doc = %doc.id, "artifact timed out, giving up");
                            resolved += 1;
                        } else {
                            queue.push_back((doc, attempts + 1));
                        }
                    } else {
                        still_pending.push((doc, attempts, since));
                    }
                }
            }
        }
        let any_pending = !still_pending.is_empty();
        in_flight = still_pending;

        if let Some(progress) = progress.as_deref_mut() {
            progress(resolved, total);
        }

        // Adaptive window: back off on timeouts, ramp up when everything in
        // the sweep resolved.
        if timed_out {
            max_in_flight = (max_in_flight / 2).max(1);
            debug!(window = max_in_flight, "artifact window shrunk");
        } else if !any_pending {
            max_in_flight = (max_in_flight * 3 / 2).max(max_in_flight + 1);
        }

        if any_pending {
            std::thread::sleep(options.poll_interval);
        }
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn quick_options() -> ProduceOptions {
        ProduceOptions {
            initial_in_flight: 2,
            timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn word_artifact(doc: &DocumentSpec, word: &str) -> IndexArtifact {
        let mut index = SearchIndexer::new(&doc.id);
        index.start(true);
        let slot = index
            .add_document(&doc.id, doc.name.as_deref(), doc.source.as_deref(), true)
            .unwrap();
        index.add_word(word, 2, 8, 0, slot);
        index.finish(&[]);
        IndexArtifact {
            doc: doc.clone(),
            index,
            content_hash: 1,
        }
    }

    struct ImmediateProducer;

    impl ArtifactProducer for ImmediateProducer {
        fn start(&self, _doc: &DocumentSpec) {}
        fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus {
            ArtifactStatus::Ready(Box::new(word_artifact(doc, "word")))
        }
    }

    /// Returns `Pending` a fixed number of times per document before
    /// resolving.
    struct SlowProducer {
        polls_needed: usize,
        polls: Mutex<HashMap<String, usize>>,
    }

    impl ArtifactProducer for SlowProducer {
        fn start(&self, _doc: &DocumentSpec) {}
        fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(doc.id.clone()).or_insert(0);
            *count += 1;
            if *count < self.polls_needed {
                ArtifactStatus::Pending
            } else {
                ArtifactStatus::Ready(Box::new(word_artifact(doc, "word")))
            }
        }
    }

    struct FailingProducer;

    impl ArtifactProducer for FailingProducer {
        fn start(&self, _doc: &DocumentSpec) {}
        fn poll(&self, doc: &DocumentSpec) -> ArtifactStatus {
            if doc.id.ends_with(".bad") {
                ArtifactStatus::Failed("import error".into())
            } else {
                ArtifactStatus::Ready(Box::new(word_artifact(doc, "word")))
            }
        }
    }

    struct StuckProducer;

    impl ArtifactProducer for StuckProducer {
        fn start(&self, _doc: &DocumentSpec) {}
        fn poll(&self, _doc: &DocumentSpec) -> ArtifactStatus {
            ArtifactStatus::Pending
        }
    }

    fn specs(ids: &[&str]) -> Vec<DocumentSpec> {
        ids.iter().copied().map(DocumentSpec::new).collect()
    }

    #[test]
    fn test_produce_all_immediate() {
        let cancel = AtomicBool::new(false);
        let artifacts = produce_all(
            &ImmediateProducer,
            specs(&["a", "b", "c", "d", "e"]),
            &quick_options(),
            &cancel,
            None,
        )
        .unwrap();
        assert_eq!(artifacts.len(), 5);
        let mut ids: Vec<_> = artifacts.iter().map(|a| a.doc.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_produce_all_waits_for_pending() {
        let producer = SlowProducer {
            polls_needed: 3,
            polls: Mutex::new(HashMap::new()),
        };
        let cancel = AtomicBool::new(false);
        let artifacts =
            produce_all(&producer, specs(&["a", "b"]), &quick_options(), &cancel, None).unwrap();
        assert_eq!(artifacts.len(), 2);
    }

    #[test]
    fn test_produce_all_skips_failed() {
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let artifacts = produce_all(
            &FailingProducer,
            specs(&["a.ok", "b.bad", "c.ok"]),
            &quick_options(),
            &cancel,
            Some(&mut |resolved, total| seen.push((resolved, total))),
        )
        .unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| !a.doc.id.ends_with(".bad")));
        assert_eq!(seen.last(), Some(&(3, 3)), "failures still count as resolved");
    }

    #[test]
    fn test_produce_all_gives_up_on_stuck_documents() {
        let cancel = AtomicBool::new(false);
        let artifacts = produce_all(
            &StuckProducer,
            specs(&["stuck"]),
            &quick_options(),
            &cancel,
            None,
        )
        .unwrap();
        assert!(artifacts.is_empty(), "exhausted retries drop the document");
    }

    #[test]
    fn test_produce_all_cancelled() {
        let cancel = AtomicBool::new(true);
        let result = produce_all(
            &ImmediateProducer,
            specs(&["a"]),
            &quick_options(),
            &cancel,
            None,
        );
        assert!(matches!(result, Err(IndexError::Cancelled)));
    }
}
