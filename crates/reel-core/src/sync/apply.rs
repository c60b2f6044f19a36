//! Validation and application of untrusted remote snapshots

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::relay::RemoteRecord;
use crate::models::{
    is_region_code, CustomList, Document, Filters, ListViewState, SelectionState,
    StreamingPreference, ThemeMode, TrackedItem,
};
use crate::state::SharedState;
use crate::Result;

/// Fields of a snapshot that passed validation.
///
/// `None` means the key was absent or rejected and local state is kept.
/// For optional scalars `Some(None)` is an explicit `null` that clears the
/// local value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFields {
    pub items: Option<Vec<TrackedItem>>,
    pub lists: Option<Vec<CustomList>>,
    pub list_view: Option<ListViewState>,
    pub filters: Option<Filters>,
    pub favourite_categories: Option<Vec<String>>,
    pub sort_mode: Option<Option<String>>,
    pub rating_threshold: Option<Option<u8>>,
    pub region: Option<Option<String>>,
    pub include_tv: Option<Option<bool>>,
    pub mood: Option<Option<String>>,
    pub streaming: Option<StreamingPreference>,
    pub selection: Option<SelectionState>,
    pub sync_enabled: Option<Option<bool>>,
    pub theme: Option<Option<ThemeMode>>,
    rejected: Vec<&'static str>,
}

impl SnapshotFields {
    /// Validate every recognized key of `snapshot` on its own.
    ///
    /// Unknown keys are ignored. A key whose value has the wrong shape is
    /// recorded in [`SnapshotFields::rejected`]. Array fields keep their
    /// well-formed elements.
    #[must_use]
    pub fn parse(snapshot: &Value) -> Self {
        let mut fields = Self::default();
        let Some(object) = snapshot.as_object() else {
            fields.rejected.push("snapshot");
            return fields;
        };

        fields.items = fields.array(object, "items").map(|items: Vec<TrackedItem>| {
            items
                .into_iter()
                .map(|mut item| {
                    item.rating = item.rating.filter(|rating| (1..=10).contains(rating));
                    item
                })
                .collect()
        });
        fields.lists = fields.array(object, "lists");
        fields.list_view = fields.value(object, "listView");
        fields.filters = fields.value(object, "filters");
        fields.favourite_categories = fields.value(object, "favouriteCategories");
        fields.sort_mode = fields.value(object, "sortMode");
        fields.rating_threshold =
            fields.checked(object, "ratingThreshold", |threshold: &Option<u8>| {
                threshold.is_none_or(|value| value <= 10)
            });
        fields.region = fields
            .checked(object, "region", |region: &Option<String>| {
                region.as_deref().is_none_or(is_region_code)
            })
            .map(|region| region.map(|code| code.to_ascii_uppercase()));
        fields.include_tv = fields.value(object, "includeTv");
        fields.mood = fields.value(object, "mood");
        fields.streaming = fields.value(object, "streaming");
        fields.selection = fields.value(object, "selection");
        fields.sync_enabled = fields.value(object, "syncEnabled");
        fields.theme = fields.value(object, "theme");

        fields
    }

    /// Keys that were present but rejected
    #[must_use]
    pub fn rejected(&self) -> &[&'static str] {
        &self.rejected
    }

    fn value<T: DeserializeOwned>(
        &mut self,
        object: &Map<String, Value>,
        key: &'static str,
    ) -> Option<T> {
        self.checked(object, key, |_| true)
    }

    fn checked<T: DeserializeOwned>(
        &mut self,
        object: &Map<String, Value>,
        key: &'static str,
        valid: impl FnOnce(&T) -> bool,
    ) -> Option<T> {
        let raw = object.get(key)?;
        match T::deserialize(raw) {
            Ok(value) if valid(&value) => Some(value),
            _ => {
                self.rejected.push(key);
                None
            }
        }
    }

    fn array<T: DeserializeOwned>(
        &mut self,
        object: &Map<String, Value>,
        key: &'static str,
    ) -> Option<Vec<T>> {
        let raw = object.get(key)?;
        let Some(elements) = raw.as_array() else {
            self.rejected.push(key);
            return None;
        };

        let parsed: Vec<T> = elements
            .iter()
            .filter_map(|element| T::deserialize(element).ok())
            .collect();
        let dropped = elements.len() - parsed.len();
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} malformed entries from snapshot field '{key}'");
        }
        Some(parsed)
    }

    /// Replace every present field of `document`
    pub fn apply_to(self, document: &mut Document) {
        fn replace<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        replace(&mut document.items, self.items);
        replace(&mut document.lists, self.lists);
        replace(&mut document.list_view, self.list_view);
        replace(&mut document.filters, self.filters);
        replace(&mut document.favourite_categories, self.favourite_categories);
        replace(&mut document.sort_mode, self.sort_mode);
        replace(&mut document.rating_threshold, self.rating_threshold);
        replace(&mut document.region, self.region);
        replace(&mut document.include_tv, self.include_tv);
        replace(&mut document.mood, self.mood);
        replace(&mut document.streaming, self.streaming);
        replace(&mut document.selection, self.selection);
        replace(&mut document.sync_enabled, self.sync_enabled);
        replace(&mut document.theme, self.theme);
    }

    /// Build a document from the valid fields, defaulting the rest
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut document = Document::default();
        self.apply_to(&mut document);
        document
    }
}

impl<'de> Deserialize<'de> for SnapshotFields {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Result of handing a remote record to the applier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Whether the record was newer than local state and replaced it
    pub applied: bool,
    pub rejected_fields: Vec<&'static str>,
}

/// Validate `record` and apply it to `state` if it is newer than the local
/// write marker.
pub async fn apply_snapshot(state: &SharedState, record: &RemoteRecord) -> Result<ApplyOutcome> {
    let fields = SnapshotFields::parse(&record.snapshot);
    let rejected_fields = fields.rejected().to_vec();
    for field in &rejected_fields {
        tracing::warn!(
            "Ignoring malformed field '{}' in snapshot from device {}",
            field,
            record.device_id
        );
    }

    let applied = state.apply_remote(fields, record.logical_timestamp).await?;
    if applied {
        tracing::info!(
            "Applied remote snapshot {} from device {}",
            record.logical_timestamp,
            record.device_id
        );
    } else {
        tracing::debug!(
            "Remote snapshot {} is not newer than local state",
            record.logical_timestamp
        );
    }

    Ok(ApplyOutcome {
        applied,
        rejected_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStore;
    use crate::models::{ItemKey, MediaKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(snapshot: Value, logical_timestamp: i64) -> RemoteRecord {
        RemoteRecord {
            snapshot,
            logical_timestamp,
            device_id: "device-b".to_string(),
            server_updated_at: None,
        }
    }

    async fn fresh_state() -> SharedState {
        SharedState::load(LocalStore::open_in_memory().await.unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn parses_a_full_document() {
        let mut document = Document {
            region: Some("GB".to_string()),
            theme: Some(ThemeMode::Dark),
            ..Document::default()
        };
        document.item_entry(ItemKey::new(550, MediaKind::Movie)).watched = true;
        document.lists.push(CustomList::new("Weekend"));

        let fields = SnapshotFields::parse(&serde_json::to_value(&document).unwrap());

        assert!(fields.rejected().is_empty());
        assert_eq!(fields.into_document(), document);
    }

    #[test]
    fn malformed_fields_are_rejected_individually() {
        let fields = SnapshotFields::parse(&json!({
            "items": "not a list",
            "region": "Narnia",
            "ratingThreshold": 42,
            "mood": "cosy",
            "unknownKey": true,
        }));

        assert_eq!(fields.rejected(), ["items", "ratingThreshold", "region"]);
        assert_eq!(fields.items, None);
        assert_eq!(fields.region, None);
        assert_eq!(fields.mood, Some(Some("cosy".to_string())));
    }

    #[test]
    fn arrays_keep_well_formed_elements() {
        let fields = SnapshotFields::parse(&json!({
            "items": [
                { "id": 550, "mediaType": "movie", "watched": true },
                { "title": "missing id" },
                { "id": 1399, "mediaType": "tv", "rating": 11 },
            ]
        }));

        let items = fields.items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].key(), ItemKey::new(1399, MediaKind::Tv));
        assert_eq!(items[1].rating, None);
    }

    #[test]
    fn non_object_snapshot_changes_nothing() {
        let fields = SnapshotFields::parse(&json!([1, 2, 3]));
        assert_eq!(fields.rejected(), ["snapshot"]);

        let mut document = Document {
            mood: Some("kept".to_string()),
            ..Document::default()
        };
        let before = document.clone();
        fields.apply_to(&mut document);
        assert_eq!(document, before);
    }

    #[test]
    fn absent_keys_keep_local_and_null_clears() {
        let mut document = Document {
            mood: Some("cosy".to_string()),
            sort_mode: Some("title".to_string()),
            ..Document::default()
        };

        SnapshotFields::parse(&json!({ "mood": null })).apply_to(&mut document);

        assert_eq!(document.mood, None);
        assert_eq!(document.sort_mode.as_deref(), Some("title"));
    }

    #[test]
    fn region_is_normalized_to_uppercase() {
        let fields = SnapshotFields::parse(&json!({ "region": "gb" }));
        assert_eq!(fields.region, Some(Some("GB".to_string())));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_device_adopts_remote_document() {
        let state = fresh_state().await;
        let snapshot = json!({ "items": [{ "id": 550, "mediaType": "movie", "inWatchlist": true }] });

        let outcome = apply_snapshot(&state, &record(snapshot, 1_000)).await.unwrap();

        assert!(outcome.applied);
        assert_eq!(state.marker(), 1_000);
        let document = state.document();
        assert_eq!(document.items.len(), 1);
        assert!(document.items[0].in_watchlist);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn applying_twice_is_idempotent() {
        let state = fresh_state().await;
        let incoming = record(json!({ "mood": "tense", "includeTv": true }), 5_000);

        apply_snapshot(&state, &incoming).await.unwrap();
        let after_first = state.snapshot();
        let second = apply_snapshot(&state, &incoming).await.unwrap();

        assert!(!second.applied);
        assert_eq!(state.snapshot(), after_first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_fields_are_reported() {
        let state = fresh_state().await;
        let outcome = apply_snapshot(&state, &record(json!({ "theme": "sepia" }), 10))
            .await
            .unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.rejected_fields, vec!["theme"]);
        assert_eq!(state.read(|document| document.theme), None);
    }
}
