//! Collection item model

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of title an item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Feature film
    #[default]
    Movie,
    /// Television series
    Tv,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "film" => Ok(Self::Movie),
            "tv" | "show" | "series" => Ok(Self::Tv),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

/// Composite identity of an item: external id plus media kind.
///
/// The same numeric id can refer to a movie and a series, so the id alone
/// is never used to match items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKey {
    pub id: u64,
    #[serde(default)]
    pub media_type: MediaKind,
}

impl ItemKey {
    #[must_use]
    pub const fn new(id: u64, media_type: MediaKind) -> Self {
        Self { id, media_type }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.media_type, self.id)
    }
}

/// A tracked movie or series in the user's collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    /// External metadata id
    pub id: u64,
    /// Movie or series
    #[serde(default)]
    pub media_type: MediaKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    /// Saved for later
    #[serde(default)]
    pub in_watchlist: bool,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub favourite: bool,
    /// Personal rating, 1-10
    #[serde(default)]
    pub rating: Option<u8>,
    /// When the item entered the collection (Unix ms)
    #[serde(default)]
    pub added_at: Option<i64>,
    /// When the item was marked watched (Unix ms)
    #[serde(default)]
    pub watched_at: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form personal notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl TrackedItem {
    /// Create an item with no workflow flags set
    #[must_use]
    pub fn new(id: u64, media_type: MediaKind) -> Self {
        Self {
            id,
            media_type,
            title: None,
            poster_path: None,
            release_date: None,
            in_watchlist: false,
            watched: false,
            favourite: false,
            rating: None,
            added_at: Some(chrono::Utc::now().timestamp_millis()),
            watched_at: None,
            tags: Vec::new(),
            notes: None,
        }
    }

    #[must_use]
    pub const fn key(&self) -> ItemKey {
        ItemKey::new(self.id, self.media_type)
    }

    /// Add a tag unless an equal tag (ignoring case) is already present
    pub fn add_tag(&mut self, tag: &str) {
        let merged = union_tags(&self.tags, &[tag.to_string()]);
        self.tags = merged;
    }
}

/// Union two tag lists, keeping the first spelling of every tag.
///
/// Comparison ignores case and surrounding whitespace; blank tags are
/// dropped. Order is `local` first, then new tags from `incoming`.
#[must_use]
pub fn union_tags(local: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    local
        .iter()
        .chain(incoming)
        .filter_map(|tag| {
            let trimmed = tag.trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_lowercase()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Whether `value` looks like an ISO 3166-1 alpha-2 region code
pub fn is_region_code(value: &str) -> bool {
    static REGION: OnceLock<Regex> = OnceLock::new();
    REGION
        .get_or_init(|| Regex::new(r"^[A-Za-z]{2}$").expect("Invalid regex"))
        .is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_parse() {
        assert_eq!("movie".parse::<MediaKind>(), Ok(MediaKind::Movie));
        assert_eq!(" TV ".parse::<MediaKind>(), Ok(MediaKind::Tv));
        assert!("podcast".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_item_deserializes_with_defaults() {
        let item: TrackedItem = serde_json::from_str(r#"{"id": 550}"#).unwrap();
        assert_eq!(item.key(), ItemKey::new(550, MediaKind::Movie));
        assert!(!item.in_watchlist);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn test_item_uses_camel_case_keys() {
        let mut item = TrackedItem::new(1399, MediaKind::Tv);
        item.in_watchlist = true;
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["mediaType"], "tv");
        assert_eq!(json["inWatchlist"], true);
    }

    #[test]
    fn test_union_tags_is_case_insensitive() {
        let merged = union_tags(
            &["Own".to_string(), "noir".to_string()],
            &["own".to_string(), "classic".to_string(), " ".to_string()],
        );
        assert_eq!(merged, vec!["Own", "noir", "classic"]);
    }

    #[test]
    fn test_add_tag_skips_duplicates() {
        let mut item = TrackedItem::new(550, MediaKind::Movie);
        item.add_tag("classic");
        item.add_tag("CLASSIC");
        assert_eq!(item.tags, vec!["classic"]);
    }

    #[test]
    fn test_region_code() {
        assert!(is_region_code("US"));
        assert!(is_region_code("gb"));
        assert!(!is_region_code("USA"));
        assert!(!is_region_code("1A"));
    }
}
