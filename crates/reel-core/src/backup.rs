//! Backup files shared by every client.
//!
//! JSON backups wrap the whole document so a later import can merge it back;
//! Markdown renders a read-only listing for humans.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Document, TrackedItem};
use crate::sync::SnapshotFields;
use crate::{Error, Result};

/// Current backup file version
pub const BACKUP_VERSION: u32 = 1;

/// Backup output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFormat {
    Json,
    Markdown,
}

impl BackupFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupFile<'a> {
    version: u32,
    exported_at: i64,
    data: &'a Document,
}

/// Render the document as a pretty-printed JSON backup.
pub fn render_json_backup(document: &Document, exported_at: i64) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&BackupFile {
        version: BACKUP_VERSION,
        exported_at,
        data: document,
    })
}

/// Render the collection as Markdown sections.
#[must_use]
pub fn render_markdown_backup(document: &Document) -> String {
    let mut output = String::from("# Reel collection\n");

    let watchlist = document
        .items
        .iter()
        .filter(|item| item.in_watchlist && !item.watched)
        .collect::<Vec<_>>();
    let watched = document
        .items
        .iter()
        .filter(|item| item.watched)
        .collect::<Vec<_>>();

    write_section(&mut output, "Watchlist", &watchlist);
    write_section(&mut output, "Watched", &watched);

    for list in &document.lists {
        let _ = writeln!(output, "\n## {} ({})\n", list.name, list.list_type);
        for entry in &list.entries {
            let title = document
                .item(entry.key())
                .and_then(|item| item.title.as_deref())
                .unwrap_or("untitled");
            let _ = writeln!(output, "- {title} [{}]", entry.key());
        }
    }

    output
}

fn write_section(output: &mut String, heading: &str, items: &[&TrackedItem]) {
    let _ = writeln!(output, "\n## {heading}\n");
    if items.is_empty() {
        output.push_str("_nothing here yet_\n");
        return;
    }

    for item in items {
        let title = item.title.as_deref().unwrap_or("untitled");
        let _ = write!(output, "- {title} [{}]", item.key());
        if let Some(rating) = item.rating {
            let _ = write!(output, " {rating}/10");
        }
        if !item.tags.is_empty() {
            let _ = write!(output, " #{}", item.tags.join(" #"));
        }
        output.push('\n');
    }
}

/// Render the document in the selected format.
pub fn render_backup(
    document: &Document,
    format: BackupFormat,
    exported_at: i64,
) -> serde_json::Result<String> {
    match format {
        BackupFormat::Json => render_json_backup(document, exported_at),
        BackupFormat::Markdown => Ok(render_markdown_backup(document)),
    }
}

/// Build a deterministic default file name for backup flows.
#[must_use]
pub fn suggested_backup_file_name(format: BackupFormat, timestamp_ms: i64) -> String {
    format!("reel-backup-{timestamp_ms}.{}", format.extension())
}

/// Parse a JSON backup into a document ready for import.
///
/// Accepts the versioned wrapper or a bare document. Fields with the wrong
/// shape are skipped the same way a remote snapshot's would be.
pub fn parse_backup(payload: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("backup is not valid JSON: {error}")))?;
    let Value::Object(mut object) = value else {
        return Err(Error::InvalidInput(
            "backup must be a JSON object".to_string(),
        ));
    };

    let data = match object.remove("data") {
        Some(data) if object.contains_key("version") => {
            let version = object.get("version").and_then(Value::as_u64);
            if version.is_some_and(|version| version > u64::from(BACKUP_VERSION)) {
                return Err(Error::InvalidInput(format!(
                    "backup version {} is newer than this client supports",
                    version.unwrap_or_default()
                )));
            }
            data
        }
        Some(data) => {
            object.insert("data".to_string(), data);
            Value::Object(object)
        }
        None => Value::Object(object),
    };

    let fields = SnapshotFields::parse(&data);
    if !fields.rejected().is_empty() {
        tracing::warn!(
            "Backup fields ignored during import: {}",
            fields.rejected().join(", ")
        );
    }
    Ok(fields.into_document())
}
