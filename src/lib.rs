//! # sidx - Embeddable Fuzzy Search Index
//!
//! sidx is an in-memory inverted search index for document catalogs: asset
//! databases, project browsers, anything with many small named documents
//! that users search incrementally while typing. It indexes words and
//! properties with prefix variations so partial terms match immediately,
//! supports numeric range filters, persists to a compact binary format, and
//! applies incremental updates without ever taking the index offline.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - The inverted index: entry model, document tables, the core
//!   indexer, and the versioned binary format
//! - [`query`] - Query parsing and evaluation (words, filters, boolean
//!   combinators)
//! - [`build`] - Build orchestration: artifact producers, the adaptive
//!   resolution pipeline, and the manager that keeps a live index
//!   searchable through rebuilds
//! - [`feed`] - Debounced change-event batching for incremental updates
//! - [`utils`] - Stable hashing, binary encoding, storage locations
//!
//! ## Quick Start
//!
//! ```
//! use sidx::SearchIndexer;
//!
//! let mut index = SearchIndexer::new("assets");
//! index.start(true);
//! let slot = index.add_document("textures/rock_albedo.png", None, None, true).unwrap();
//! index.add_word("rock", 2, 16, 10, slot);
//! index.add_word("albedo", 2, 16, 10, slot);
//! index.add_property("ext", "png", 1, 8, 0, slot, true, true);
//! index.add_number("size", 4096.0, 0, slot);
//! index.finish(&[]);
//!
//! let results = index.search("alb ext:png", i32::MAX, 10).unwrap();
//! assert_eq!(results[0].id, "textures/rock_albedo.png");
//! ```
//!
//! Scores are costs: lower is better, and results come back ordered by
//! (score, id). Prefix matches rank below full words, which rank below
//! exact matches.

pub mod build;
pub mod error;
pub mod feed;
pub mod index;
pub mod query;
pub mod utils;

pub use build::{
    ArtifactProducer, ArtifactStatus, DocumentSpec, IndexArtifact, IndexConfig, IndexEvent,
    IndexManager, IndexState, SearchContext,
};
pub use error::IndexError;
pub use feed::{ChangeFeed, ChangeSet, FeedEvent};
pub use index::document::Document;
pub use index::entry::{DocSlot, EntryKind, IndexEntry};
pub use index::indexer::{ContentResolver, SearchIndexer, SearchResult, SkipPredicate};
pub use query::{CompareOp, QueryNode, parse_query};
