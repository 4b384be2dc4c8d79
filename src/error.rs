//! Error surfaces: typed internal errors, and the client-facing message
//! carried back over the wire (spec §7, §9 "Static sentinels").

use std::fmt;

/// A single-line, client-facing message.
///
/// The C original distinguishes a fixed set of static sentinel strings from
/// heap-allocated ones by pointer identity, so `free_errmsg` can no-op on the
/// former. Rust has no such pointer-identity trick (and doesn't need one):
/// this enum plays the same role without unsafe aliasing games. `Static`
/// still exists, and is preferred for the three canonical messages, purely
/// so the two message families read the same way they do in the spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrMsg {
    Static(&'static str),
    Owned(String),
}

impl ErrMsg {
    pub fn as_str(&self) -> &str {
        match self {
            ErrMsg::Static(s) => s,
            ErrMsg::Owned(s) => s,
        }
    }
}

impl fmt::Display for ErrMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrMsg {
    fn from(s: String) -> Self {
        ErrMsg::Owned(s)
    }
}

impl From<&'static str> for ErrMsg {
    fn from(s: &'static str) -> Self {
        ErrMsg::Static(s)
    }
}

/// The out-of-memory sentinel (spec §9).
pub const OUT_OF_MEMORY: ErrMsg = ErrMsg::Static("out of memory");
/// The catch-all sentinel for an engine error with no more specific mapping.
pub const UNKNOWN_ERROR: ErrMsg = ErrMsg::Static("unknown error");
/// The sentinel used when the work queue is being torn down (the spec's
/// "atexit registration failed" sentinel has no equivalent concern in a Rust
/// binary; this is its functional successor — a fixed message for a
/// condition the caller cannot retry its way out of).
pub const SHUTTING_DOWN: ErrMsg = ErrMsg::Static("queue shutdown in progress");

/// Errors from the data-access layer (Component C).
///
/// `classify()` maps this down to the four-value [`crate::classify::Kind`]
/// the rest of the system reasons about; this type exists to carry a
/// human-readable message and, where applicable, the underlying
/// `rusqlite::Error` for logging.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    User(String),

    #[error("{0}")]
    Runtime(String),

    #[error("{0}")]
    Hard(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub fn user(msg: impl Into<String>) -> Self {
        DbError::User(msg.into())
    }

    pub fn hard(msg: impl Into<String>) -> Self {
        DbError::Hard(msg.into())
    }

    /// Whether the worker handling this error must exit (spec §4.F: "on a
    /// returned 'hard failure' ... exit").
    pub fn is_hard(&self) -> bool {
        matches!(self, DbError::Hard(_))
    }

    /// Render as the single-line, client-facing text (spec §7).
    pub fn to_errmsg(&self) -> ErrMsg {
        ErrMsg::Owned(self.to_string())
    }
}

/// Errors surfaced by the work queue (Component E).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is at capacity")]
    Full,
    #[error("queue shutdown in progress")]
    ShuttingDown,
}

/// Initialization-time errors (store setup, pool creation, listener bind —
/// spec §6 "Exit codes": any of these is a non-zero exit).
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to prepare database at {path}: {source}")]
    Database {
        path: String,
        #[source]
        source: DbError,
    },
    #[error("failed to bind listener on port {port}: {source}")]
    Listener {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("no workers could be started")]
    Pool,
    #[error("invalid configuration: {0}")]
    Config(String),
}
