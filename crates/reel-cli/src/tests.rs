use std::path::Path;

use pretty_assertions::assert_eq;
use reel_core::config::ClientConfig;
use reel_core::metadata::{Availability, OfferKind, TitleSummary, WatchProvider};
use reel_core::state::{ChangeOrigin, StateChange};
use reel_core::{Document, ItemKey, MediaKind};

use crate::cli::{ExportFormat, RelayKind, SyncCommands};
use crate::commands::add::{apply_add, run_add, AddOptions};
use crate::commands::common::{
    format_relative_time, open_state, resolve_identity, resolve_region, Context,
    MEMORY_RELAY_USER,
};
use crate::commands::config::{merge_profile, missing_sync_fields, redact};
use crate::commands::discover::{format_provider_lines, format_title_lines};
use crate::commands::export::{backup_format, resolve_output_path, run_export};
use crate::commands::import::run_import;
use crate::commands::status::{format_status_lines, StatusSummary};
use crate::commands::sync::run_sync;
use crate::commands::watch::describe_change;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn test_context(db_path: &Path) -> Context {
    Context {
        db_path: db_path.to_path_buf(),
        profile_name: "test".to_string(),
        profile: CliProfile::default(),
        config: ClientConfig::default(),
    }
}

#[test]
fn supabase_identity_needs_user_and_token() {
    let identity = resolve_identity(
        RelayKind::Supabase,
        Some("profile-user".to_string()),
        None,
        Some("token".to_string()),
    )
    .unwrap();
    assert_eq!(identity.user_id, "profile-user");

    let missing_token = resolve_identity(
        RelayKind::Supabase,
        Some("profile-user".to_string()),
        None,
        Some("  ".to_string()),
    );
    assert!(matches!(missing_token, Err(CliError::SyncNotConfigured)));
}

#[test]
fn env_user_wins_and_memory_relay_has_fallback() {
    let identity = resolve_identity(
        RelayKind::Memory,
        Some("profile-user".to_string()),
        Some("env-user".to_string()),
        None,
    )
    .unwrap();
    assert_eq!(identity.user_id, "env-user");

    let fallback = resolve_identity(RelayKind::Memory, None, None, None).unwrap();
    assert_eq!(fallback.user_id, MEMORY_RELAY_USER);
}

#[test]
fn region_prefers_explicit_value() {
    assert_eq!(
        resolve_region(Some("de".to_string()), Some("GB".to_string())).unwrap(),
        "de"
    );
    assert_eq!(resolve_region(None, Some("GB".to_string())).unwrap(), "GB");
    assert!(matches!(
        resolve_region(Some(" ".to_string()), None),
        Err(CliError::MissingRegion)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn add_queues_new_titles_on_the_watchlist() {
    let mut document = Document::default();
    let options = AddOptions {
        id: 550,
        title: Some(" Fight Club ".to_string()),
        tags: vec!["classic".to_string(), "Classic".to_string()],
        ..AddOptions::default()
    };

    apply_add(&mut document, &options, 1_000);

    let item = document.item(ItemKey::new(550, MediaKind::Movie)).unwrap();
    assert!(item.in_watchlist);
    assert!(!item.watched);
    assert_eq!(item.title.as_deref(), Some("Fight Club"));
    assert_eq!(item.tags, vec!["classic"]);
}

#[test]
fn add_watched_moves_title_off_the_watchlist() {
    let mut document = Document::default();
    apply_add(
        &mut document,
        &AddOptions {
            id: 1399,
            tv: true,
            ..AddOptions::default()
        },
        1_000,
    );
    apply_add(
        &mut document,
        &AddOptions {
            id: 1399,
            tv: true,
            watched: true,
            rating: Some(8),
            ..AddOptions::default()
        },
        2_000,
    );

    let item = document.item(ItemKey::new(1399, MediaKind::Tv)).unwrap();
    assert!(item.watched);
    assert!(!item.in_watchlist);
    assert_eq!(item.watched_at, Some(2_000));
    assert_eq!(item.rating, Some(8));
    assert_eq!(document.items.len(), 1);
}

#[test]
fn status_lines_describe_collection_and_sync() {
    let summary = StatusSummary {
        profile: "default".to_string(),
        db_path: "/tmp/reel.db".to_string(),
        device_id: "device-1".to_string(),
        items: 3,
        watchlist: 2,
        watched: 1,
        lists: 1,
        region: None,
        sync_enabled: true,
        relay_configured: false,
        last_user: None,
        last_local_write: 0,
    };

    let lines = format_status_lines(&summary, 1_000);
    assert_eq!(lines[0], "Collection: 3 items (2 to watch, 1 watched), 1 lists");
    assert_eq!(lines[1], "Region: not set");
    assert_eq!(lines[2], "Sync: on, but no relay configured");
    assert_eq!(lines[4], "Last local edit: never");
}

#[test]
fn describe_change_names_the_origin() {
    let change = StateChange {
        revision: 4,
        origin: ChangeOrigin::Remote,
        marker: 0,
    };
    assert_eq!(
        describe_change(&change, 2),
        "Collection updated from another device: 2 items (marker 1970-01-01 00:00:00 UTC)"
    );
}

#[test]
fn title_and_provider_lines() {
    let titles = vec![TitleSummary {
        id: 550,
        media_type: MediaKind::Movie,
        title: "Fight Club".to_string(),
        poster_path: None,
        release_date: Some("1999-10-15".to_string()),
    }];
    assert_eq!(format_title_lines(&titles), vec!["movie:550    Fight Club (1999)"]);

    let key = ItemKey::new(550, MediaKind::Movie);
    let nowhere = Availability {
        key,
        region: "GB".to_string(),
        link: None,
        providers: Vec::new(),
    };
    assert_eq!(
        format_provider_lines(&nowhere),
        vec!["movie:550 is not available in GB"]
    );

    let streaming = Availability {
        providers: vec![WatchProvider {
            id: 8,
            name: "Netflix".to_string(),
            offer: OfferKind::Flatrate,
        }],
        link: Some("https://example.com/550".to_string()),
        ..nowhere
    };
    assert_eq!(
        format_provider_lines(&streaming),
        vec!["stream  Netflix", "https://example.com/550"]
    );
}

#[test]
fn merge_profile_keeps_existing_values() {
    let existing = CliProfile {
        supabase_url: Some("https://project.supabase.co".to_string()),
        user_id: Some("user-1".to_string()),
        ..CliProfile::default()
    };
    let merged = merge_profile(
        &existing,
        CliProfile {
            supabase_anon_key: Some(" anon ".to_string()),
            user_id: Some(" ".to_string()),
            ..CliProfile::default()
        },
    );

    assert_eq!(merged.supabase_url, existing.supabase_url);
    assert_eq!(merged.supabase_anon_key.as_deref(), Some("anon"));
    assert_eq!(merged.user_id.as_deref(), Some("user-1"));
    assert!(missing_sync_fields(&merged).is_empty());
    assert_eq!(
        missing_sync_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key", "user_id"]
    );
}

#[test]
fn redact_keeps_a_short_prefix() {
    assert_eq!(redact(Some("eyJhbGciOi")).as_deref(), Some("eyJh****"));
    assert_eq!(redact(None), None);
}

#[test]
fn output_directory_gets_generated_file_name() {
    let tmp = tempfile::tempdir().unwrap();
    let format = backup_format(ExportFormat::Markdown);

    assert_eq!(
        resolve_output_path(tmp.path(), format, 42),
        tmp.path().join("reel-backup-42.md")
    );
    let file = tmp.path().join("mine.md");
    assert_eq!(resolve_output_path(&file, format, 42), file);
}

#[tokio::test(flavor = "multi_thread")]
async fn exported_backup_imports_into_another_store() {
    let tmp = tempfile::tempdir().unwrap();
    let source = test_context(&tmp.path().join("source.db"));
    let target = test_context(&tmp.path().join("target.db"));
    let backup_path = tmp.path().join("backup.json");

    run_add(
        &source,
        &AddOptions {
            id: 550,
            tags: vec!["classic".to_string()],
            ..AddOptions::default()
        },
    )
    .await
    .unwrap();
    run_export(&source, ExportFormat::Json, Some(&backup_path))
        .await
        .unwrap();
    run_import(&target, &backup_path).await.unwrap();
    run_import(&target, &backup_path).await.unwrap();

    let state = open_state(&target.db_path).await.unwrap();
    let document = state.document();
    assert_eq!(document.items.len(), 1);
    assert_eq!(document.items[0].tags, vec!["classic"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_out_of_range_rating() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = test_context(&tmp.path().join("reel.db"));

    let result = run_add(
        &ctx,
        &AddOptions {
            id: 1,
            rating: Some(11),
            ..AddOptions::default()
        },
    )
    .await;
    assert!(matches!(result, Err(CliError::InvalidRating(11))));
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_sync_honours_device_toggle() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = test_context(&tmp.path().join("reel.db"));

    run_add(&ctx, &AddOptions { id: 550, ..AddOptions::default() })
        .await
        .unwrap();
    run_sync(&ctx, None, RelayKind::Memory).await.unwrap();

    run_sync(&ctx, Some(SyncCommands::Disable), RelayKind::Memory)
        .await
        .unwrap();
    let result = run_sync(&ctx, None, RelayKind::Memory).await;
    assert!(matches!(result, Err(CliError::SyncDisabled)));

    let state = open_state(&ctx.db_path).await.unwrap();
    assert!(!state.read(Document::sync_enabled));
    assert_eq!(state.document().items.len(), 1);
}
