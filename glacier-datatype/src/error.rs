use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unknown column type '{0}'")]
    UnknownColumnType(String),
    #[error("Invalid {ty} value '{value}'")]
    InvalidValue { ty: &'static str, value: String },
    #[error("Value out of range for {0}")]
    ValueOutOfRange(&'static str),
    #[error("Arrow type {arrow} not supported for column type {ty}")]
    ArrowTypeNotSupported { arrow: String, ty: &'static str },
    #[error("Invalid datetime")]
    InvalidDatetime,
}

impl Error {
    #[inline]
    pub(crate) fn invalid(ty: &'static str, value: impl Into<String>) -> Self {
        Error::InvalidValue {
            ty,
            value: value.into(),
        }
    }
}

impl From<time::error::ComponentRange> for Error {
    #[inline]
    fn from(_src: time::error::ComponentRange) -> Self {
        Error::InvalidDatetime
    }
}
