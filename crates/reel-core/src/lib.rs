//! reel-core - Core library for Reel
//!
//! This crate contains the collection document model, the local libSQL store,
//! the cross-device sync engine, and the metadata read-through cache used by
//! every Reel interface.

pub mod backup;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Document, ItemKey, MediaKind, TrackedItem};
pub use state::SharedState;
