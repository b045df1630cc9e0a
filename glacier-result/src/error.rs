use arrow_schema::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors of result retrieval.
///
/// All variants are cheap to clone, so that an error raised on a prefetch
/// worker can be sent back and re-raised at the batch it belongs to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Retryable HTTP status {status}")]
    Retryable { status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Chunk URL expired with HTTP status {0}")]
    AuthExpired(u16),
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("{0} not supported")]
    NotSupported(&'static str),
    #[error("Failed to convert row {row} column {col}: {msg}")]
    Conversion { row: usize, col: usize, msg: String },
    #[error("Invalid chunk format: {0}")]
    InvalidFormat(String),
    #[error("Arrow error: {0}")]
    Arrow(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Invalid base64 data")]
    Base64,
    #[error("Prefetch worker terminated")]
    WorkerPool,
    #[error(transparent)]
    Datatype(#[from] glacier_datatype::error::Error),
}

impl Error {
    /// Whether the download should be attempted again.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Retryable { .. } | Error::Transport(_))
    }
}

impl From<ArrowError> for Error {
    #[inline]
    fn from(src: ArrowError) -> Self {
        Error::Arrow(src.to_string())
    }
}

impl From<serde_json::Error> for Error {
    #[inline]
    fn from(src: serde_json::Error) -> Self {
        Error::Json(src.to_string())
    }
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(src: std::io::Error) -> Self {
        Error::Transport(src.to_string())
    }
}

impl From<glacier_protocol::error::Error> for Error {
    #[inline]
    fn from(src: glacier_protocol::error::Error) -> Self {
        match src {
            glacier_protocol::error::Error::InvalidBase64 => Error::Base64,
            other => Error::InvalidFormat(other.to_string()),
        }
    }
}
