//! Connection of Glacier driver.
//!
//! Glues query context cache and result retrieval to the responses of the
//! warehouse service. Issuing requests is left to the caller: it sends
//! [`Connection::query_context_dto`] with each query and hands the response
//! to [`Connection::handle_response`].
pub mod conn;
pub mod error;
pub mod opts;

pub use conn::Connection;
pub use glacier_datatype::Value;
pub use glacier_result::{ResultSet, Row, RowShape};
pub use opts::{ConnectionConfig, ConnectionOpts};
