/// Core error type for the dormitory bot.
///
/// Adapter crates map their specific errors into this type so the core can
/// tell "nothing there" apart from "backend down" and "recipient gone".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("recipient unavailable: {0}")]
    RecipientUnavailable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-friendly kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::NotFound(_) => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::InvalidState(_) => "invalid_state",
            Error::RecipientUnavailable(_) => "recipient_unavailable",
            Error::Io(_) => "io",
            Error::External(_) => "external",
        }
    }
}

/// Collapse a failed operation into a safe default after logging it.
///
/// Handlers use this where a failed read should look like an empty one to the
/// user (counts of zero, empty lists) while the log keeps the real kind.
pub trait LogDefault<T> {
    fn or_log_default(self, op: &str) -> T;
}

impl<T: Default> LogDefault<T> for Result<T> {
    fn or_log_default(self, op: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(op, kind = e.kind(), error = %e, "operation failed");
                T::default()
            }
        }
    }
}
