use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid base64 rowset")]
    InvalidBase64,
    #[error("Invalid JSON message: {0}")]
    InvalidJson(String),
    #[error("Query failed, code={code:?}, message={message:?}")]
    QueryFailed {
        code: Option<String>,
        message: Option<String>,
    },
}

impl From<base64::DecodeError> for Error {
    #[inline]
    fn from(_src: base64::DecodeError) -> Self {
        Error::InvalidBase64
    }
}

impl From<serde_json::Error> for Error {
    #[inline]
    fn from(src: serde_json::Error) -> Self {
        Error::InvalidJson(src.to_string())
    }
}
