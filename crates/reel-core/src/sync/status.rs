//! Sync session lifecycle state

use std::fmt;

/// Why a session is in the error state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A relay call failed; the next mutation or poll retries
    Transient { message: String },
    /// The relay cannot store documents for this account; local-only until restart
    LocalOnly { reason: String },
}

/// Lifecycle state of the current sync session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session: signed out or sync disabled
    #[default]
    Off,
    /// Initial pull in progress
    Starting,
    /// Last relay operation succeeded
    Ready,
    Error(SessionError),
}

/// Things that happen to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    InitialSyncCompleted,
    SyncSucceeded,
    SyncFailed(String),
    RelayUnprovisioned(String),
    Stop,
}

impl SessionState {
    /// Next state after `event`
    #[must_use]
    pub fn on(self, event: SessionEvent) -> Self {
        use SessionEvent as E;

        match (self, event) {
            (_, E::Stop) => Self::Off,
            (_, E::Start) => Self::Starting,
            // Events from a session that no longer exists
            (Self::Off, _) => Self::Off,
            // Permanent for the session; only a restart clears it
            (state @ Self::Error(SessionError::LocalOnly { .. }), _) => state,
            (_, E::RelayUnprovisioned(reason)) => Self::Error(SessionError::LocalOnly { reason }),
            (_, E::SyncFailed(message)) => Self::Error(SessionError::Transient { message }),
            (
                Self::Starting | Self::Ready | Self::Error(SessionError::Transient { .. }),
                E::InitialSyncCompleted | E::SyncSucceeded,
            ) => Self::Ready,
        }
    }

    /// Whether a session exists, healthy or not
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Whether the session gave up on the relay for good
    #[must_use]
    pub const fn is_local_only(&self) -> bool {
        matches!(self, Self::Error(SessionError::LocalOnly { .. }))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Sync: off"),
            Self::Starting => f.write_str("Sync: starting..."),
            Self::Ready => f.write_str("Sync: connected"),
            Self::Error(SessionError::Transient { message }) => {
                write!(f, "Sync: retrying after error ({message})")
            }
            Self::Error(SessionError::LocalOnly { reason }) => {
                write!(f, "Sync: local-only mode ({reason})")
            }
        }
    }
}
