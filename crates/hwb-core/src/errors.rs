use std::time::Duration;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the controller
/// can decide between a user-facing reply and a logged failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("contact store error: {0}")]
    Store(#[from] StoreError),

    #[error("conversation state error: {0}")]
    State(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the contact store.
///
/// `Conflict` and `Rejected` are caused by the values themselves and are kept
/// apart from backend failures so callers can answer them as normal replies.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("contact with this email or phone already exists")]
    Conflict,

    /// A value does not fit its column.
    #[error("value rejected: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Backend(String),
}

/// Failures of one remote command execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authentication failed")]
    Auth,

    #[error("channel error: {0}")]
    Channel(String),

    /// The command wrote to stderr; the text is shown to the user as-is.
    #[error("{0}")]
    Stderr(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
