use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] reel_core::Error),
    #[error(transparent)]
    Relay(#[from] reel_core::sync::RelayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Rating must be between 1 and 10, got {0}")]
    InvalidRating(u8),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No region given and the collection has no region preference")]
    MissingRegion,
    #[error(
        "Metadata lookups are not configured. Run `reel config init --metadata-api-key <KEY>` or set REEL_METADATA_API_KEY."
    )]
    MetadataNotConfigured,
    #[error(
        "Sync is not configured. Run `reel config init --supabase-url <URL> --supabase-anon-key <KEY> --user-id <ID>` and set REEL_ACCESS_TOKEN."
    )]
    SyncNotConfigured,
    #[error("Sync is turned off for this device. Run `reel sync enable` first.")]
    SyncDisabled,
    #[error("{0}")]
    Sync(String),
}
