//! Shared utilities.
//!
//! - [`app_data`] - per-user storage locations for index files and config
//! - [`encoding`] - little-endian scalar and string I/O for the binary index format
//! - [`hashing`] - stable posting-key hashes and the order-preserving double encoding

pub mod app_data;
pub mod encoding;
pub mod hashing;

pub use app_data::{get_app_data_dir, get_config_path, get_index_path, remove_index};
pub use encoding::*;
pub use hashing::*;
