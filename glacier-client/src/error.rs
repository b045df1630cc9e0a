use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Result(#[from] glacier_result::error::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Connection is closed")]
    Closed,
}

impl From<glacier_protocol::error::Error> for Error {
    #[inline]
    fn from(src: glacier_protocol::error::Error) -> Self {
        Error::Protocol(src.to_string())
    }
}
