//! Additive merge of an imported document into local state

use std::collections::HashSet;
use std::fmt;

use crate::models::{union_tags, CustomList, Document, ListEntry, TrackedItem};

/// Separator placed between note texts from different sources
pub const NOTES_SEPARATOR: &str = "\n\n---\n\n";

/// What an import changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub items_added: usize,
    pub items_updated: usize,
    pub lists_added: usize,
    pub lists_updated: usize,
    pub preferences_filled: usize,
}

impl MergeReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items_added == 0
            && self.items_updated == 0
            && self.lists_added == 0
            && self.lists_updated == 0
            && self.preferences_filled == 0
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing new to import");
        }
        write!(
            f,
            "{} items added, {} updated; {} lists added, {} updated; {} preferences filled",
            self.items_added,
            self.items_updated,
            self.lists_added,
            self.lists_updated,
            self.preferences_filled
        )
    }
}

/// Merge `incoming` into `local` without discarding anything local.
///
/// Flags are OR-ed, empty values are filled, tags and list entries are
/// unioned and notes are concatenated. Merging the same input twice changes
/// nothing the second time.
pub fn merge_import(local: &mut Document, incoming: &Document) -> MergeReport {
    let mut report = MergeReport::default();

    for incoming_item in &incoming.items {
        match local.item_mut(incoming_item.key()) {
            Some(existing) => {
                if merge_item(existing, incoming_item) {
                    report.items_updated += 1;
                }
            }
            None => {
                local.items.push(normalized_item(incoming_item));
                report.items_added += 1;
            }
        }
    }

    for incoming_list in &incoming.lists {
        let mut candidate = incoming_list.clone();
        if candidate.id.trim().is_empty() {
            candidate.id = derived_list_id(&candidate);
        }

        let matched = local
            .lists
            .iter()
            .position(|list| list.id == candidate.id)
            .or_else(|| {
                local
                    .lists
                    .iter()
                    .position(|list| list.same_name_and_type(&candidate))
            });

        match matched {
            Some(index) => {
                if merge_list_entries(&mut local.lists[index], &candidate) {
                    report.lists_updated += 1;
                }
            }
            None => {
                candidate.name = disambiguated_name(&local.lists, &candidate.name);
                candidate.entries = deduplicated_entries(&candidate);
                local.lists.push(candidate);
                report.lists_added += 1;
            }
        }
    }

    report.preferences_filled = fill_preferences(local, incoming);
    report
}

fn fill<T: Clone>(slot: &mut Option<T>, incoming: Option<&T>) -> bool {
    match (slot.as_ref(), incoming) {
        (None, Some(value)) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// An imported item in the shape a later merge would leave it in
fn normalized_item(incoming: &TrackedItem) -> TrackedItem {
    let mut item = incoming.clone();
    item.tags = union_tags(&[], &incoming.tags);
    item.notes = merge_notes(None, incoming.notes.as_deref());
    item
}

fn merge_item(local: &mut TrackedItem, incoming: &TrackedItem) -> bool {
    let before = local.clone();

    local.in_watchlist |= incoming.in_watchlist;
    local.watched |= incoming.watched;
    local.favourite |= incoming.favourite;

    fill(&mut local.title, incoming.title.as_ref());
    fill(&mut local.poster_path, incoming.poster_path.as_ref());
    fill(&mut local.release_date, incoming.release_date.as_ref());
    fill(&mut local.rating, incoming.rating.as_ref());
    fill(&mut local.added_at, incoming.added_at.as_ref());
    fill(&mut local.watched_at, incoming.watched_at.as_ref());

    local.tags = union_tags(&local.tags, &incoming.tags);
    local.notes = merge_notes(local.notes.take(), incoming.notes.as_deref());

    *local != before
}

/// Append every incoming note segment that local notes do not contain yet
fn merge_notes(local: Option<String>, incoming: Option<&str>) -> Option<String> {
    let incoming_segments: Vec<&str> = incoming
        .map(|text| {
            text.split(NOTES_SEPARATOR)
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut merged = match local {
        Some(text) if !text.trim().is_empty() => text,
        _ => return (!incoming_segments.is_empty()).then(|| incoming_segments.join(NOTES_SEPARATOR)),
    };

    for segment in incoming_segments {
        let already_present = merged
            .split(NOTES_SEPARATOR)
            .any(|existing| existing.trim() == segment);
        if !already_present {
            merged.push_str(NOTES_SEPARATOR);
            merged.push_str(segment);
        }
    }
    Some(merged)
}

fn merge_list_entries(local: &mut CustomList, incoming: &CustomList) -> bool {
    let mut changed = false;
    for entry in &incoming.entries {
        if !local.contains(entry.key()) {
            local.entries.push(entry.clone());
            changed = true;
        }
    }
    changed
}

fn deduplicated_entries(list: &CustomList) -> Vec<ListEntry> {
    let mut seen = HashSet::new();
    list.entries
        .iter()
        .filter(|entry| seen.insert(entry.key()))
        .cloned()
        .collect()
}

/// Stable id for a list that arrived without one
fn derived_list_id(list: &CustomList) -> String {
    let seed = format!("{}:{}", list.list_type, list.name.trim().to_lowercase());
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

fn disambiguated_name(existing: &[CustomList], name: &str) -> String {
    let taken = |candidate: &str| {
        let candidate = candidate.trim().to_lowercase();
        existing
            .iter()
            .any(|list| list.name.trim().to_lowercase() == candidate)
    };

    if !taken(name) {
        return name.to_string();
    }
    let first = format!("{name} (imported)");
    if !taken(&first) {
        return first;
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{name} (imported {counter})");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn fill_preferences(local: &mut Document, incoming: &Document) -> usize {
    fn fill_default<T: Clone + Default + PartialEq>(slot: &mut T, incoming: &T) -> bool {
        let empty = T::default();
        if *slot == empty && *incoming != empty {
            slot.clone_from(incoming);
            true
        } else {
            false
        }
    }

    [
        fill_default(&mut local.list_view, &incoming.list_view),
        fill_default(&mut local.filters, &incoming.filters),
        fill_default(&mut local.favourite_categories, &incoming.favourite_categories),
        fill_default(&mut local.streaming, &incoming.streaming),
        fill_default(&mut local.selection, &incoming.selection),
        fill(&mut local.sort_mode, incoming.sort_mode.as_ref()),
        fill(&mut local.rating_threshold, incoming.rating_threshold.as_ref()),
        fill(&mut local.region, incoming.region.as_ref()),
        fill(&mut local.include_tv, incoming.include_tv.as_ref()),
        fill(&mut local.mood, incoming.mood.as_ref()),
        fill(&mut local.theme, incoming.theme.as_ref()),
    ]
    .into_iter()
    .filter(|filled| *filled)
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKey, ListEntry, MediaKind, ThemeMode};
    use pretty_assertions::assert_eq;

    fn item(id: u64) -> TrackedItem {
        TrackedItem {
            added_at: None,
            ..TrackedItem::new(id, MediaKind::Movie)
        }
    }

    fn list(id: &str, name: &str, entries: &[u64]) -> CustomList {
        CustomList {
            id: id.to_string(),
            name: name.to_string(),
            list_type: "custom".to_string(),
            entries: entries
                .iter()
                .map(|id| ListEntry {
                    id: *id,
                    media_type: MediaKind::Movie,
                    added_at: None,
                })
                .collect(),
            created_at: None,
        }
    }

    #[test]
    fn tags_union_and_flags_or() {
        let mut local = Document::default();
        local.items.push(TrackedItem {
            tags: vec!["own".to_string()],
            ..item(550)
        });
        let mut incoming = Document::default();
        incoming.items.push(TrackedItem {
            tags: vec!["classic".to_string(), "OWN".to_string()],
            in_watchlist: true,
            ..item(550)
        });

        let report = merge_import(&mut local, &incoming);

        let merged = local.item(ItemKey::new(550, MediaKind::Movie)).unwrap();
        assert_eq!(merged.tags, vec!["own".to_string(), "classic".to_string()]);
        assert!(merged.in_watchlist);
        assert_eq!(report.items_updated, 1);
        assert_eq!(report.items_added, 0);
    }

    #[test]
    fn never_clears_local_values() {
        let mut local = Document::default();
        local.items.push(TrackedItem {
            watched: true,
            rating: Some(9),
            title: Some("Fight Club".to_string()),
            ..item(550)
        });
        let mut incoming = Document::default();
        incoming.items.push(TrackedItem {
            rating: Some(3),
            poster_path: Some("/poster.jpg".to_string()),
            ..item(550)
        });

        merge_import(&mut local, &incoming);

        let merged = &local.items[0];
        assert!(merged.watched);
        assert_eq!(merged.rating, Some(9));
        assert_eq!(merged.title.as_deref(), Some("Fight Club"));
        assert_eq!(merged.poster_path.as_deref(), Some("/poster.jpg"));
    }

    #[test]
    fn same_id_different_kind_is_a_different_item() {
        let mut local = Document::default();
        local.items.push(item(1399));
        let mut incoming = Document::default();
        incoming.items.push(TrackedItem::new(1399, MediaKind::Tv));

        let report = merge_import(&mut local, &incoming);

        assert_eq!(report.items_added, 1);
        assert_eq!(local.items.len(), 2);
    }

    #[test]
    fn notes_are_concatenated_once() {
        assert_eq!(merge_notes(None, Some("  great ")), Some("great".to_string()));
        assert_eq!(merge_notes(Some("mine".to_string()), None), Some("mine".to_string()));
        assert_eq!(
            merge_notes(Some("mine".to_string()), Some("theirs")),
            Some(format!("mine{NOTES_SEPARATOR}theirs"))
        );

        let once = merge_notes(Some("mine".to_string()), Some("theirs"));
        assert_eq!(merge_notes(once.clone(), Some("theirs")), once);
        assert_eq!(
            merge_notes(once.clone(), Some(&format!("theirs{NOTES_SEPARATOR}mine"))),
            once
        );
    }

    #[test]
    fn lists_match_by_id_then_name() {
        let mut local = Document::default();
        local.lists.push(list("a", "Weekend", &[1]));
        local.lists.push(list("b", "Horror", &[2]));
        let mut incoming = Document::default();
        incoming.lists.push(list("a", "Renamed elsewhere", &[1, 3]));
        incoming.lists.push(list("zzz", "horror", &[2, 4]));

        let report = merge_import(&mut local, &incoming);

        assert_eq!(report.lists_updated, 2);
        assert_eq!(report.lists_added, 0);
        assert_eq!(local.lists[0].name, "Weekend");
        assert_eq!(local.lists[0].entries.len(), 2);
        assert_eq!(local.lists[1].entries.len(), 2);
    }

    #[test]
    fn colliding_names_are_disambiguated() {
        let mut local = Document::default();
        local.lists.push(list("a", "Favourites", &[]));
        local.lists.push(CustomList {
            list_type: "ranked".to_string(),
            ..list("b", "Favourites (imported)", &[])
        });

        let mut incoming = Document::default();
        incoming.lists.push(CustomList {
            list_type: "ranked".to_string(),
            ..list("c", "Favourites", &[])
        });

        merge_import(&mut local, &incoming);

        assert_eq!(local.lists[2].name, "Favourites (imported 2)");
    }

    #[test]
    fn lists_without_id_get_a_stable_one() {
        let mut incoming = Document::default();
        incoming.lists.push(list("", "Road trip", &[7]));

        let mut first = Document::default();
        let mut second = Document::default();
        merge_import(&mut first, &incoming);
        merge_import(&mut second, &incoming);

        assert!(!first.lists[0].id.is_empty());
        assert_eq!(first.lists[0].id, second.lists[0].id);
    }

    #[test]
    fn preferences_fill_gaps_only() {
        let mut local = Document {
            region: Some("GB".to_string()),
            ..Document::default()
        };
        let incoming = Document {
            region: Some("US".to_string()),
            theme: Some(ThemeMode::Dark),
            favourite_categories: vec!["Drama".to_string()],
            sync_enabled: Some(false),
            ..Document::default()
        };

        let report = merge_import(&mut local, &incoming);

        assert_eq!(report.preferences_filled, 2);
        assert_eq!(local.region.as_deref(), Some("GB"));
        assert_eq!(local.theme, Some(ThemeMode::Dark));
        assert_eq!(local.sync_enabled, None);
    }

    #[test]
    fn second_import_is_a_no_op() {
        let mut local = Document::default();
        local.items.push(TrackedItem {
            notes: Some("mine".to_string()),
            ..item(550)
        });
        local.lists.push(list("a", "Watch", &[1]));

        let mut incoming = Document {
            mood: Some("cosy".to_string()),
            ..Document::default()
        };
        incoming.items.push(TrackedItem {
            notes: Some("theirs".to_string()),
            tags: vec!["classic".to_string()],
            ..item(550)
        });
        incoming.items.push(item(680));
        incoming.lists.push(list("other", "Watch", &[2]));
        incoming.lists.push(CustomList {
            list_type: "ranked".to_string(),
            ..list("", "Watch", &[3])
        });

        let first = merge_import(&mut local, &incoming);
        assert!(!first.is_empty());
        let after_first = local.clone();

        let second = merge_import(&mut local, &incoming);
        assert!(second.is_empty(), "{second}");
        assert_eq!(local, after_first);
    }

    #[test]
    fn untidy_backup_imports_once() {
        let incoming = crate::backup::parse_backup(
            r#"{"items":[{"id":550,"tags":["Classic","classic"," noir "],"notes":"  first  \n\n---\n\n\n\n---\n\nsecond"}],
                "lists":[{"id":"l1","name":"Noir","entries":[{"id":550},{"id":550,"mediaType":"movie"}]}]}"#,
        )
        .unwrap();
        let mut local = Document::default();

        let first = merge_import(&mut local, &incoming);
        assert_eq!(first.items_added, 1);
        let imported = local.item(ItemKey::new(550, MediaKind::Movie)).unwrap();
        assert_eq!(imported.tags, vec!["Classic", "noir"]);
        assert_eq!(
            imported.notes.as_deref(),
            Some("first\n\n---\n\nsecond")
        );
        assert_eq!(local.lists[0].entries.len(), 1);

        let second = merge_import(&mut local, &incoming);
        assert!(second.is_empty(), "{second}");
    }
}
