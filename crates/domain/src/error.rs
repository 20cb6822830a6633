/// Shared error type used across all codeloom crates.
///
/// Tool failures are deliberately absent: a tool failure is a value
/// (an error envelope folded into the results turn), never an `Err`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("stream: {0}")]
    Stream(String),

    #[error("a prompt is already running")]
    Busy,

    #[error("cancelled")]
    Cancelled,

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the cancellation variant, which terminates a prompt but
    /// is not a fault of the loop or the transport.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
