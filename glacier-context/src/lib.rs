//! Query context cache.
//!
//! Server attaches a small set of query context entries to each query
//! response. Client keeps the latest of them and echoes them back with
//! every following query, so that server can skip redundant metadata
//! resolution.
pub mod cache;
pub mod element;
pub mod error;

pub use cache::{QueryContextCache, DEFAULT_QUERY_CONTEXT_CACHE_SIZE};
pub use element::QueryContextElement;
