//! Preference and UI-state models carried in the collection document

use serde::{Deserialize, Serialize};

use super::item::ItemKey;

/// Theme mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Light theme
    Light,
    /// Dark theme
    Dark,
    /// Follow system preference
    #[default]
    System,
}

/// Which list is open and how it is laid out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewState {
    #[serde(default)]
    pub active_list_id: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub collapsed_sections: Vec<String>,
}

/// Browse filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(default)]
    pub genres: Vec<u32>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub hide_watched: Option<bool>,
}

/// Streaming provider preference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingPreference {
    #[serde(default)]
    pub providers: Vec<u32>,
    #[serde(default)]
    pub subscribed_only: Option<bool>,
}

/// Multi-select state of the collection view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    #[serde(default)]
    pub selected: Vec<ItemKey>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl ListViewState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Filters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl StreamingPreference {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl SelectionState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
