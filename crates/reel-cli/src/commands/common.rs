use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reel_core::config::{ClientConfig, SyncTuning};
use reel_core::db::LocalStore;
use reel_core::sync::{DeviceId, Relay, SupabaseRelay, SyncEngine, SyncIdentity};
use reel_core::util::normalize_text_option;
use reel_core::{Document, MediaKind, SharedState};

use crate::cli::RelayKind;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// User id the in-process relay falls back to
pub const MEMORY_RELAY_USER: &str = "local";

/// Everything a command needs to know about where it runs
#[derive(Debug, Clone)]
pub struct Context {
    pub db_path: PathBuf,
    pub profile_name: String,
    pub profile: CliProfile,
    pub config: ClientConfig,
}

pub fn load_context(db_path: Option<PathBuf>, profile: Option<&str>) -> Result<Context, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(profile);
    let profile = profiles.profile(&profile_name).cloned().unwrap_or_default();

    let from_env = ClientConfig::from_env().map_err(CliError::Config)?;
    let config = profile
        .client_config()
        .overlay(from_env)
        .normalized()
        .map_err(CliError::Config)?;

    Ok(Context {
        db_path: resolve_db_path(db_path)?,
        profile_name,
        profile,
        config,
    })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os("REEL_DB_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("reel").join("reel.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub async fn open_state(path: &Path) -> Result<SharedState, CliError> {
    let store = LocalStore::open_path(path).await?;
    Ok(SharedState::load(store).await?)
}

/// Account to sync as.
///
/// The environment wins over the profile. Supabase needs both a user id and
/// an access token; the in-process relay accepts anything.
pub fn resolve_identity(
    relay: RelayKind,
    profile_user: Option<String>,
    env_user: Option<String>,
    env_token: Option<String>,
) -> Result<SyncIdentity, CliError> {
    let user_id = normalize_text_option(env_user).or_else(|| normalize_text_option(profile_user));
    let access_token = normalize_text_option(env_token);

    match relay {
        RelayKind::Memory => Ok(SyncIdentity::new(
            user_id.unwrap_or_else(|| MEMORY_RELAY_USER.to_string()),
            access_token.unwrap_or_default(),
        )),
        RelayKind::Supabase => match (user_id, access_token) {
            (Some(user_id), Some(access_token)) => Ok(SyncIdentity::new(user_id, access_token)),
            _ => Err(CliError::SyncNotConfigured),
        },
    }
}

pub fn identity_for(ctx: &Context, relay: RelayKind) -> Result<SyncIdentity, CliError> {
    resolve_identity(
        relay,
        ctx.profile.user_id(),
        env::var("REEL_USER_ID").ok(),
        env::var("REEL_ACCESS_TOKEN").ok(),
    )
}

pub fn build_supabase_relay(config: &ClientConfig) -> Result<SupabaseRelay, CliError> {
    let (url, anon_key) = config
        .supabase()
        .map_err(CliError::Config)?
        .ok_or(CliError::SyncNotConfigured)?;
    Ok(SupabaseRelay::new(
        url,
        anon_key,
        config.relay_table(),
        config.sync.request_timeout(),
    )?)
}

/// Start a session for `identity` and return the running engine.
pub async fn start_engine<R: Relay>(
    relay: Arc<R>,
    state: SharedState,
    identity: SyncIdentity,
    tuning: SyncTuning,
) -> Result<SyncEngine<R>, CliError> {
    if !state.read(Document::sync_enabled) {
        return Err(CliError::SyncDisabled);
    }

    let device_id = DeviceId::load_or_create(state.store()).await?;
    let mut engine = SyncEngine::new(relay, state, device_id, tuning);
    engine.set_identity(Some(identity)).await?;
    Ok(engine)
}

pub const fn media_kind(tv: bool) -> MediaKind {
    if tv {
        MediaKind::Tv
    } else {
        MediaKind::Movie
    }
}

/// Explicit region, else the collection's region preference
pub fn resolve_region(
    explicit: Option<String>,
    preference: Option<String>,
) -> Result<String, CliError> {
    normalize_text_option(explicit)
        .or_else(|| normalize_text_option(preference))
        .ok_or(CliError::MissingRegion)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format_timestamp(timestamp_ms)
    }
}
