//! Messages exchanged with the warehouse service.
//!
//! Only the parts consumed by query context cache and result retrieval
//! are modeled, anything else in a response is ignored on deserialization.
pub mod error;
pub mod qcc;
pub mod response;

pub use qcc::{OpaqueContextDTO, QueryContextDTO, QueryContextEntryDTO};
pub use response::{ChunkInfo, QueryResponse, QueryResponseData, ResultFormat};
