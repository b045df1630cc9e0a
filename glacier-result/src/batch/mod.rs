//! One partition of a result set.
//!
//! The first batch of a result always comes inline with the query response,
//! the rest are stored remotely behind signed URLs. A batch never caches
//! decoded data: each call of `create_iter` or `to_arrow` decodes again,
//! downloading again if the batch is remote.
mod arrow;
mod download;
mod json;

pub use self::arrow::{ArrowResultBatch, ArrowRowIter};
pub use self::download::RemoteChunk;
pub use self::json::{JsonResultBatch, JsonRowIter};

use crate::context::FetchContext;
use crate::error::{Error, Result};
use crate::row::{Row, RowShape};
use arrow_array::RecordBatch;
use glacier_datatype::arrow::ArrowConverter;
use glacier_datatype::{column_names, ColumnMeta, Converter};
use glacier_protocol::{QueryResponseData, ResultFormat};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accumulated timing of one batch, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchMetrics {
    pub download_ms: u64,
    pub parse_ms: u64,
    /// Download plus parse, measured as a whole.
    pub load_ms: u64,
}

/// Value converter that can be resolved from column metadata.
pub trait ResolveConverter: Sized {
    fn resolve_all(columns: &[ColumnMeta]) -> glacier_datatype::error::Result<Vec<Self>>;
}

impl ResolveConverter for Converter {
    #[inline]
    fn resolve_all(columns: &[ColumnMeta]) -> glacier_datatype::error::Result<Vec<Self>> {
        Converter::resolve_all(columns)
    }
}

impl ResolveConverter for ArrowConverter {
    #[inline]
    fn resolve_all(columns: &[ColumnMeta]) -> glacier_datatype::error::Result<Vec<Self>> {
        ArrowConverter::resolve_all(columns)
    }
}

/// Columns of a result with converters resolved once, shared by all batches.
#[derive(Debug)]
pub struct BatchSchema<C> {
    columns: Arc<[ColumnMeta]>,
    names: Arc<[String]>,
    converters: Arc<[C]>,
}

impl<C> Clone for BatchSchema<C> {
    #[inline]
    fn clone(&self) -> Self {
        BatchSchema {
            columns: Arc::clone(&self.columns),
            names: Arc::clone(&self.names),
            converters: Arc::clone(&self.converters),
        }
    }
}

impl<C: ResolveConverter> BatchSchema<C> {
    #[inline]
    pub fn new(columns: Vec<ColumnMeta>) -> Result<Self> {
        let converters = C::resolve_all(&columns)?;
        Ok(BatchSchema {
            names: column_names(&columns).into(),
            columns: columns.into(),
            converters: converters.into(),
        })
    }
}

impl<C> BatchSchema<C> {
    #[inline]
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub(crate) fn converters(&self) -> &Arc<[C]> {
        &self.converters
    }

    #[inline]
    pub(crate) fn shared_names(&self) -> &Arc<[String]> {
        &self.names
    }
}

pub type JsonSchema = BatchSchema<Converter>;
pub type ArrowSchema = BatchSchema<ArrowConverter>;

/// State shared by both kinds of batch.
#[derive(Debug)]
pub(crate) struct BatchCore {
    row_count: usize,
    remote: Option<RemoteChunk>,
    metrics: Mutex<BatchMetrics>,
}

impl BatchCore {
    #[inline]
    pub(crate) fn new(row_count: usize, remote: Option<RemoteChunk>) -> Self {
        BatchCore {
            row_count,
            remote,
            metrics: Mutex::new(BatchMetrics::default()),
        }
    }

    /// Download the remote chunk, with an ad hoc HTTP client if no context given.
    pub(crate) fn download(&self, ctx: Option<&FetchContext>) -> Result<Vec<u8>> {
        let chunk = self
            .remote
            .as_ref()
            .ok_or(Error::NotSupported("Download of inline batch"))?;
        let start = Instant::now();
        let body = match ctx {
            Some(ctx) => download::fetch_chunk(chunk, ctx)?,
            None => download::fetch_chunk(chunk, &FetchContext::default())?,
        };
        self.metrics.lock().download_ms += millis(start.elapsed());
        Ok(body)
    }

    #[inline]
    pub(crate) fn record_parse(&self, dur: Duration) {
        self.metrics.lock().parse_ms += millis(dur);
    }

    #[inline]
    pub(crate) fn record_load(&self, dur: Duration) {
        self.metrics.lock().load_ms += millis(dur);
    }
}

#[inline]
fn millis(dur: Duration) -> u64 {
    dur.as_millis() as u64
}

#[derive(Debug)]
pub enum ResultBatch {
    Json(JsonResultBatch),
    Arrow(ArrowResultBatch),
}

impl ResultBatch {
    /// Build all batches of a query response, inline one first.
    pub fn from_response(data: &QueryResponseData) -> Result<Vec<ResultBatch>> {
        let headers = data.chunk_request_headers();
        let mut batches = Vec::with_capacity(data.chunks.len() + 1);
        match data.query_result_format {
            ResultFormat::Json => {
                let schema = JsonSchema::new(data.rowtype.clone())?;
                let rowset = data.rowset.clone().unwrap_or_default();
                batches.push(ResultBatch::Json(JsonResultBatch::local(
                    schema.clone(),
                    rowset,
                )));
                for c in &data.chunks {
                    batches.push(ResultBatch::Json(JsonResultBatch::remote(
                        schema.clone(),
                        c.row_count as usize,
                        RemoteChunk::new(c, headers.clone()),
                    )));
                }
            }
            ResultFormat::Arrow => {
                let schema = ArrowSchema::new(data.rowtype.clone())?;
                let data_bytes = data.decode_rowset_base64()?;
                batches.push(ResultBatch::Arrow(ArrowResultBatch::local(
                    schema.clone(),
                    data.inline_row_count() as usize,
                    data_bytes,
                )));
                for c in &data.chunks {
                    batches.push(ResultBatch::Arrow(ArrowResultBatch::remote(
                        schema.clone(),
                        c.row_count as usize,
                        RemoteChunk::new(c, headers.clone()),
                    )));
                }
            }
        }
        Ok(batches)
    }

    #[inline]
    fn core(&self) -> &BatchCore {
        match self {
            ResultBatch::Json(b) => &b.core,
            ResultBatch::Arrow(b) => &b.core,
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.core().row_count
    }

    #[inline]
    pub fn schema(&self) -> &[ColumnMeta] {
        match self {
            ResultBatch::Json(b) => b.schema.columns(),
            ResultBatch::Arrow(b) => b.schema.columns(),
        }
    }

    #[inline]
    pub fn column_names(&self) -> &[String] {
        match self {
            ResultBatch::Json(b) => b.schema.names(),
            ResultBatch::Arrow(b) => b.schema.names(),
        }
    }

    /// Whether data is resident, no download needed.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.core().remote.is_none()
    }

    #[inline]
    pub fn remote(&self) -> Option<&RemoteChunk> {
        self.core().remote.as_ref()
    }

    #[inline]
    pub fn is_arrow(&self) -> bool {
        matches!(self, ResultBatch::Arrow(_))
    }

    #[inline]
    pub fn metrics(&self) -> BatchMetrics {
        *self.core().metrics.lock()
    }

    /// Raw bytes of remote chunk.
    #[inline]
    pub fn download(&self, ctx: Option<&FetchContext>) -> Result<Vec<u8>> {
        self.core().download(ctx)
    }

    /// Decode rows of this batch, a fresh decoding on each call.
    #[inline]
    pub fn create_iter(&self, ctx: Option<&FetchContext>, shape: RowShape) -> Result<RowIter> {
        match self {
            ResultBatch::Json(b) => b.create_iter(ctx, shape).map(RowIter::Json),
            ResultBatch::Arrow(b) => b.create_iter(ctx, shape).map(RowIter::Arrow),
        }
    }

    /// Decode as arrow record batches.
    /// A zero-row batch gives one empty record batch typed from schema.
    #[inline]
    pub fn to_arrow(&self, ctx: Option<&FetchContext>) -> Result<Vec<RecordBatch>> {
        match self {
            ResultBatch::Json(_) => Err(Error::NotSupported("Arrow fetch of JSON result")),
            ResultBatch::Arrow(b) => b.to_arrow(ctx),
        }
    }

    /// Decode as a single arrow table.
    #[inline]
    pub fn to_arrow_table(&self, ctx: Option<&FetchContext>) -> Result<RecordBatch> {
        match self {
            ResultBatch::Json(_) => Err(Error::NotSupported("Arrow fetch of JSON result")),
            ResultBatch::Arrow(b) => b.to_arrow_table(ctx),
        }
    }
}

/// Rows of one batch.
#[derive(Debug)]
pub enum RowIter {
    Json(JsonRowIter),
    Arrow(ArrowRowIter),
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RowIter::Json(it) => it.next(),
            RowIter::Arrow(it) => it.next(),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            RowIter::Json(it) => it.size_hint(),
            RowIter::Arrow(it) => it.size_hint(),
        }
    }
}
