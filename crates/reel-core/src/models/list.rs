//! Custom list model

use serde::{Deserialize, Serialize};

use super::item::{ItemKey, MediaKind};

/// List type assigned when a stored list has none
pub const DEFAULT_LIST_TYPE: &str = "custom";

fn default_list_type() -> String {
    DEFAULT_LIST_TYPE.to_string()
}

/// An entry in a custom list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub id: u64,
    #[serde(default)]
    pub media_type: MediaKind,
    #[serde(default)]
    pub added_at: Option<i64>,
}

impl ListEntry {
    #[must_use]
    pub const fn key(&self) -> ItemKey {
        ItemKey::new(self.id, self.media_type)
    }
}

/// A user-curated list of titles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomList {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_list_type")]
    pub list_type: String,
    #[serde(default)]
    pub entries: Vec<ListEntry>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl CustomList {
    /// Create an empty list with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.into(),
            list_type: default_list_type(),
            entries: Vec::new(),
            created_at: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    #[must_use]
    pub fn contains(&self, key: ItemKey) -> bool {
        self.entries.iter().any(|entry| entry.key() == key)
    }

    /// Whether `other` names the same list: equal type and equal name ignoring case
    #[must_use]
    pub fn same_name_and_type(&self, other: &Self) -> bool {
        self.list_type == other.list_type
            && self.name.trim().to_lowercase() == other.name.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_defaults_type() {
        let list: CustomList =
            serde_json::from_str(r#"{"id": "a", "name": "Halloween"}"#).unwrap();
        assert_eq!(list.list_type, DEFAULT_LIST_TYPE);
        assert!(list.entries.is_empty());
    }

    #[test]
    fn test_list_contains_uses_composite_key() {
        let mut list = CustomList::new("Mixed");
        list.entries.push(ListEntry {
            id: 1399,
            media_type: MediaKind::Tv,
            added_at: None,
        });
        assert!(list.contains(ItemKey::new(1399, MediaKind::Tv)));
        assert!(!list.contains(ItemKey::new(1399, MediaKind::Movie)));
    }

    #[test]
    fn test_same_name_and_type_ignores_case() {
        let a = CustomList::new("Comfort Films");
        let mut b = CustomList::new(" comfort films ");
        assert!(a.same_name_and_type(&b));
        b.list_type = "ranked".to_string();
        assert!(!a.same_name_and_type(&b));
    }
}
