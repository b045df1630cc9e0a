//! Retrieval of query results.
//!
//! A query result is split into batches: the first one inline with the
//! query response, the rest stored remotely. [`ResultSet`] turns them into
//! a single ordered stream of rows or arrow record batches, downloading
//! later batches on background threads while earlier ones are consumed.
pub mod backoff;
pub mod batch;
pub mod context;
pub mod error;
pub mod http;
pub mod result_set;
pub mod row;
pub mod telemetry;

pub use backoff::{Backoff, BackoffKind, BackoffPolicy};
pub use batch::{ArrowResultBatch, BatchMetrics, JsonResultBatch, RemoteChunk, ResultBatch};
pub use context::FetchContext;
pub use http::{HttpClient, HttpResponse, Sleep, ThreadSleep, UreqClient};
pub use result_set::{ArrowBatches, ResultRows, ResultSet};
pub use row::{Row, RowShape};
pub use telemetry::{NoopTelemetry, TelemetryEvent, TelemetryField, TelemetrySink};
