use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Query context is not an object")]
    InvalidContext,
    #[error("Query context entries is not an array")]
    InvalidEntries,
    #[error("Query context entry {index} has invalid field '{field}'")]
    InvalidEntryField { index: usize, field: &'static str },
}
