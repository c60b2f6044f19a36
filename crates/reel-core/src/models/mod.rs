//! Data models for Reel

mod document;
mod item;
mod list;
mod preferences;

pub use document::Document;
pub use item::{is_region_code, union_tags, ItemKey, MediaKind, TrackedItem};
pub use list::{CustomList, ListEntry, DEFAULT_LIST_TYPE};
pub use preferences::{Filters, ListViewState, SelectionState, StreamingPreference, ThemeMode};
