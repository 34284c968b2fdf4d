//! Build orchestration over a live, searchable index.
//!
//! The orchestrator owns the index behind an `RwLock` and never mutates it
//! in place: full builds assemble a fresh index, incremental updates merge
//! into a clone, and either result is swapped in under a brief write lock.
//! Searches keep running against the previous generation for the entire
//! build.

use crate::build::artifact::{ArtifactProducer, DocumentSpec, ProduceOptions, produce_all};
use crate::build::IndexConfig;
use crate::error::IndexError;
use crate::feed::ChangeSet;
use crate::index::indexer::{ContentResolver, SearchIndexer, SearchResult, SkipPredicate};
use std::collections::VecDeque;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of the managed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// No build has completed and nothing was loaded from disk.
    Unbuilt,
    /// Resolving documents into artifacts.
    Resolving,
    /// Folding artifacts into the combined index.
    Combining,
    /// Searchable.
    Ready,
    /// Searchable; an incremental update is merging in the background.
    Updating,
}

/// Notifications multicast to subscribers during builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Progress {
        state: IndexState,
        resolved: usize,
        total: usize,
    },
    Ready {
        documents: usize,
        entries: usize,
    },
    Failed(String),
}

/// Host hooks threaded into every index generation.
#[derive(Default)]
pub struct SearchContext {
    pub config: IndexConfig,
    pub skip: Option<SkipPredicate>,
    pub resolver: Option<ContentResolver>,
}

/// Owns a searchable index and serializes builds and updates against it.
pub struct IndexManager {
    name: String,
    context: SearchContext,
    producer: Arc<dyn ArtifactProducer>,
    inner: RwLock<SearchIndexer>,
    state: Mutex<IndexState>,
    queue: Mutex<VecDeque<ChangeSet>>,
    draining: AtomicBool,
    cancel: Arc<AtomicBool>,
    subscribers: Mutex<Vec<Sender<IndexEvent>>>,
    last_error: Mutex<Option<String>>,
}

impl IndexManager {
    pub fn new(
        name: impl Into<String>,
        context: SearchContext,
        producer: Arc<dyn ArtifactProducer>,
    ) -> Self {
        let name = name.into();
        let mut index = SearchIndexer::new(&name);
        if let Some(skip) = &context.skip {
            index.set_skip_predicate(Arc::clone(skip));
        }
        if let Some(resolver) = &context.resolver {
            index.set_content_resolver(Arc::clone(resolver));
        }
        Self {
            name,
            context,
            producer,
            inner: RwLock::new(index),
            state: Mutex::new(IndexState::Unbuilt),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            subscribers: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &IndexConfig {
        &self.context.config
    }

    pub fn state(&self) -> IndexState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request cancellation of the build in progress.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Register an event subscriber.
    pub fn subscribe(&self) -> Receiver<IndexEvent> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Run a query against the current index generation.
    pub fn search(
        &self,
        query: &str,
        max_score: i32,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        self.read_index().search(query, max_score, max_results)
    }

    /// Read access to the current generation, for stats and inspection.
    pub fn with_index<R>(&self, f: impl FnOnce(&SearchIndexer) -> R) -> R {
        f(&self.read_index())
    }

    // -- full build --------------------------------------------------------

    /// Build a fresh index generation from scratch and swap it in. The
    /// previous generation stays searchable until the swap.
    pub fn build(&self, docs: Vec<DocumentSpec>) -> Result<(), IndexError> {
        self.cancel.store(false, Ordering::Relaxed);
        match self.build_generation(docs) {
            Ok(fresh) => {
                let documents = fresh.document_count();
                let entries = fresh.entry_count();
                *self.write_index() = fresh;
                self.set_state(IndexState::Ready);
                self.clear_error();
                self.emit(IndexEvent::Ready { documents, entries });
                info!(index = %self.name, documents, entries, "index built");
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn build_generation(&self, docs: Vec<DocumentSpec>) -> Result<SearchIndexer, IndexError> {
        self.set_state(IndexState::Resolving);
        let total = docs.len();
        let mut report = |resolved: usize, total: usize| {
            self.emit(IndexEvent::Progress {
                state: IndexState::Resolving,
                resolved,
                total,
            });
        };
        let artifacts = produce_all(
            &*self.producer,
            docs,
            &self.produce_options(),
            &self.cancel,
            Some(&mut report),
        )?;

        self.set_state(IndexState::Combining);
        let hashes: Vec<(String, u64)> = artifacts
            .iter()
            .map(|a| (a.doc.id.clone(), a.content_hash))
            .collect();
        let mut fresh = self.fresh_index();
        fresh.start(true);
        let mut combined = 0usize;
        fresh.combine(
            artifacts.into_iter().map(|a| a.index),
            self.context.config.base_score,
            Some(&mut |done| {
                combined = done;
                self.emit(IndexEvent::Progress {
                    state: IndexState::Combining,
                    resolved: done,
                    total,
                });
            }),
        );
        for (id, hash) in hashes {
            fresh.set_source_hash(id, hash);
        }
        fresh.finish(&[]);
        debug!(index = %self.name, combined, "combined artifacts");
        Ok(fresh)
    }

    // -- incremental updates ----------------------------------------------

    /// Queue a change batch and drain the queue. Batches are applied
    /// strictly in arrival order; a batch enqueued while another drain is
    /// running is picked up by that drain.
    pub fn update(&self, changes: ChangeSet) -> Result<(), IndexError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(changes);
        self.drain()
    }

    fn drain(&self) -> Result<(), IndexError> {
        loop {
            if self.draining.swap(true, Ordering::Acquire) {
                return Ok(());
            }
            let result = self.drain_queue();
            self.draining.store(false, Ordering::Release);
            result?;
            // A batch enqueued between the empty-queue check and the guard
            // release would otherwise sit until the next update arrives.
            let empty = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty();
            if empty {
                return Ok(());
            }
        }
    }

    fn drain_queue(&self) -> Result<(), IndexError> {
        loop {
            let Some(changes) = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
            else {
                return Ok(());
            };
            if let Err(err) = self.apply_changes(changes) {
                return self.fail(err);
            }
        }
    }

    fn apply_changes(&self, changes: ChangeSet) -> Result<(), IndexError> {
        self.cancel.store(false, Ordering::Relaxed);
        self.set_state(IndexState::Updating);

        let docs: Vec<DocumentSpec> = changes
            .updated
            .iter()
            .filter(|id| !self.context.skip.as_ref().is_some_and(|skip| skip(id)))
            .map(|id| DocumentSpec::new(id.clone()))
            .collect();
        let artifacts = produce_all(
            &*self.producer,
            docs,
            &self.produce_options(),
            &self.cancel,
            None,
        )?;

        // Unchanged documents resolve to the same content hash and need no
        // re-merge.
        let current_hashes: Vec<(String, Option<u64>)> = {
            let index = self.read_index();
            artifacts
                .iter()
                .map(|a| (a.doc.id.clone(), index.source_hash(&a.doc.id)))
                .collect()
        };
        let changed: Vec<_> = artifacts
            .into_iter()
            .zip(current_hashes)
            .filter(|(artifact, (_, old))| *old != Some(artifact.content_hash))
            .map(|(artifact, _)| artifact)
            .collect();

        if changed.is_empty() && changes.removed.is_empty() {
            self.set_state(IndexState::Ready);
            return Ok(());
        }

        let mut delta = SearchIndexer::new(&self.name);
        delta.start(true);
        let hashes: Vec<(String, u64)> = changed
            .iter()
            .map(|a| (a.doc.id.clone(), a.content_hash))
            .collect();
        delta.combine(changed.into_iter().map(|a| a.index), 0, None);
        for (id, hash) in hashes {
            delta.set_source_hash(id, hash);
        }
        delta.finish(&[]);

        // Merge into a clone so searches never observe a half-applied batch.
        let mut next = self.read_index().clone();
        next.merge(
            &changes.removed,
            &delta,
            self.context.config.base_score,
            None,
        );
        let documents = next.document_count();
        let entries = next.entry_count();
        *self.write_index() = next;

        self.set_state(IndexState::Ready);
        self.clear_error();
        self.emit(IndexEvent::Ready { documents, entries });
        debug!(index = %self.name, documents, entries, "applied change batch");
        Ok(())
    }

    // -- persistence -------------------------------------------------------

    /// Write the current generation to disk atomically, via a temp file
    /// renamed into place.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let index = self.read_index();
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            index.write(&mut writer)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        debug!(index = %self.name, path = %path.display(), "index saved");
        Ok(())
    }

    /// Load a previously saved index. Returns `Ok(false)` when the file is
    /// missing, outdated or corrupt, meaning the caller should rebuild from
    /// source documents; hard I/O errors propagate.
    pub fn load(&self, path: &Path) -> Result<bool, IndexError> {
        if !path.exists() {
            return Ok(false);
        }
        let mut reader = BufReader::new(fs::File::open(path)?);
        match SearchIndexer::read(&self.name, &mut reader) {
            Ok(mut index) => {
                if let Some(skip) = &self.context.skip {
                    index.set_skip_predicate(Arc::clone(skip));
                }
                if let Some(resolver) = &self.context.resolver {
                    index.set_content_resolver(Arc::clone(resolver));
                }
                let documents = index.document_count();
                let entries = index.entry_count();
                *self.write_index() = index;
                self.set_state(IndexState::Ready);
                self.emit(IndexEvent::Ready { documents, entries });
                info!(index = %self.name, documents, entries, "index loaded");
                Ok(true)
            }
            Err(err) if err.is_rebuild_needed() => {
                warn!(index = %self.name, %err, "stored index unusable, rebuild needed");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    // -- internals ---------------------------------------------------------

    fn produce_options(&self) -> ProduceOptions {
        ProduceOptions {
            initial_in_flight: self.context.config.initial_in_flight.max(1),
            timeout: Duration::from_millis(self.context.config.artifact_timeout_ms),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn fresh_index(&self) -> SearchIndexer {
        let mut index = SearchIndexer::new(&self.name);
        if let Some(skip) = &self.context.skip {
            index.set_skip_predicate(Arc::clone(skip));
        }
        if let Some(resolver) = &self.context.resolver {
            index.set_content_resolver(Arc::clone(resolver));
        }
        index
    }

    fn fail(&self, err: IndexError) -> Result<(), IndexError> {
        let message = err.to_string();
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
        let state = if self.read_index().is_ready() {
            IndexState::Ready
        } else {
            IndexState::Unbuilt
        };
        self.set_state(state);
        self.emit(IndexEvent::Failed(message));
        Err(err)
    }

    fn clear_error(&self) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn set_state(&self, state: IndexState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn emit(&self, event: IndexEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn read_index(&self) -> RwLockReadGuard<'_, SearchIndexer> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, SearchIndexer> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
