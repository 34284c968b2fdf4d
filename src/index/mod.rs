//! The inverted-index engine: entry model, document/string tables, the core
//! indexer, and the versioned binary format.

pub mod document;
pub mod entry;
pub mod format;
pub mod indexer;
