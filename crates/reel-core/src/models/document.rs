//! The synchronized collection document

use serde::{Deserialize, Serialize};

use super::item::{ItemKey, TrackedItem};
use super::list::CustomList;
use super::preferences::{Filters, ListViewState, SelectionState, StreamingPreference, ThemeMode};

/// Every user-owned collection and preference that travels between devices.
///
/// The document is replaced wholesale on sync. Optional scalars serialize as
/// explicit `null` so a cleared value on one device clears it everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub items: Vec<TrackedItem>,
    #[serde(default)]
    pub lists: Vec<CustomList>,
    #[serde(default)]
    pub list_view: ListViewState,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub favourite_categories: Vec<String>,
    #[serde(default)]
    pub sort_mode: Option<String>,
    #[serde(default)]
    pub rating_threshold: Option<u8>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub include_tv: Option<bool>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub streaming: StreamingPreference,
    #[serde(default)]
    pub selection: SelectionState,
    #[serde(default)]
    pub sync_enabled: Option<bool>,
    #[serde(default)]
    pub theme: Option<ThemeMode>,
}

impl Document {
    #[must_use]
    pub fn item(&self, key: ItemKey) -> Option<&TrackedItem> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn item_mut(&mut self, key: ItemKey) -> Option<&mut TrackedItem> {
        self.items.iter_mut().find(|item| item.key() == key)
    }

    /// Get the item for `key`, inserting a blank one if it is not tracked yet
    pub fn item_entry(&mut self, key: ItemKey) -> &mut TrackedItem {
        let index = match self.items.iter().position(|item| item.key() == key) {
            Some(index) => index,
            None => {
                self.items.push(TrackedItem::new(key.id, key.media_type));
                self.items.len() - 1
            }
        };
        &mut self.items[index]
    }

    #[must_use]
    pub fn list(&self, id: &str) -> Option<&CustomList> {
        self.lists.iter().find(|list| list.id == id)
    }

    /// Sync is on unless the user explicitly turned it off
    #[must_use]
    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled.unwrap_or(true)
    }

    #[must_use]
    pub fn watchlist_len(&self) -> usize {
        self.items.iter().filter(|item| item.in_watchlist).count()
    }

    #[must_use]
    pub fn watched_len(&self) -> usize {
        self.items.iter().filter(|item| item.watched).count()
    }
}
