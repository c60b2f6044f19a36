use reel_core::sync::DeviceId;
use reel_core::util::unix_millis_now;
use reel_core::Document;
use serde::Serialize;

use crate::commands::common::{format_relative_time, open_state, Context};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub profile: String,
    pub db_path: String,
    pub device_id: String,
    pub items: usize,
    pub watchlist: usize,
    pub watched: usize,
    pub lists: usize,
    pub region: Option<String>,
    pub sync_enabled: bool,
    pub relay_configured: bool,
    pub last_user: Option<String>,
    pub last_local_write: i64,
}

pub fn summarize(
    document: &Document,
    marker: i64,
    ctx: &Context,
    device_id: &DeviceId,
    last_user: Option<String>,
) -> StatusSummary {
    StatusSummary {
        profile: ctx.profile_name.clone(),
        db_path: ctx.db_path.display().to_string(),
        device_id: device_id.to_string(),
        items: document.items.len(),
        watchlist: document.watchlist_len(),
        watched: document.watched_len(),
        lists: document.lists.len(),
        region: document.region.clone(),
        sync_enabled: document.sync_enabled(),
        relay_configured: matches!(ctx.config.supabase(), Ok(Some(_))),
        last_user,
        last_local_write: marker,
    }
}

pub fn format_status_lines(summary: &StatusSummary, now_ms: i64) -> Vec<String> {
    let last_write = if summary.last_local_write > 0 {
        format_relative_time(summary.last_local_write, now_ms)
    } else {
        "never".to_string()
    };
    let sync = match (summary.sync_enabled, summary.relay_configured) {
        (false, _) => "off for this device",
        (true, false) => "on, but no relay configured",
        (true, true) => "on",
    };

    vec![
        format!(
            "Collection: {} items ({} to watch, {} watched), {} lists",
            summary.items, summary.watchlist, summary.watched, summary.lists
        ),
        format!(
            "Region: {}",
            summary.region.as_deref().unwrap_or("not set")
        ),
        format!("Sync: {sync}"),
        format!(
            "Account: {}",
            summary.last_user.as_deref().unwrap_or("never synced")
        ),
        format!("Last local edit: {last_write}"),
        format!("Device: {}", summary.device_id),
        format!("Profile: {} ({})", summary.profile, summary.db_path),
    ]
}

pub async fn run_status(ctx: &Context, as_json: bool) -> Result<(), CliError> {
    let state = open_state(&ctx.db_path).await?;
    let device_id = DeviceId::load_or_create(state.store()).await?;
    let last_user = state.store().load_last_user().await?;
    let (document, marker) = state.snapshot();

    let summary = summarize(&document, marker, ctx, &device_id, last_user);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_status_lines(&summary, unix_millis_now()) {
            println!("{line}");
        }
    }

    Ok(())
}
