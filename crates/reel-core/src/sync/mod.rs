//! Cross-device sync of the collection document.
//!
//! Local edits stamp a write marker and are pushed to a single-row-per-user
//! relay after a quiet period. Remote changes arrive through the relay's
//! realtime channel or a fixed-interval poll and replace the local document
//! when their logical timestamp is newer (last writer wins).

mod apply;
mod debounce;
mod identity;
mod marker;
mod memory;
mod merge;
mod relay;
mod session;
mod status;
mod supabase;

pub use apply::{apply_snapshot, ApplyOutcome, SnapshotFields};
pub use debounce::Debouncer;
pub use identity::DeviceId;
pub use marker::WriteMarker;
pub use memory::MemoryRelay;
pub use merge::{merge_import, MergeReport, NOTES_SEPARATOR};
pub use relay::{
    Relay, RelayError, RelayResult, RelayWrite, RemoteRecord, Subscription, SyncIdentity,
};
pub use session::SyncEngine;
pub use status::{SessionError, SessionEvent, SessionState};
pub use supabase::{normalize_rest_url, SupabaseRelay, DEFAULT_RELAY_TABLE};
