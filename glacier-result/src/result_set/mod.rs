mod prefetch;

use self::prefetch::{Job, Prefetch, PrefetchMode};
use crate::batch::{BatchMetrics, ResultBatch, RowIter};
use crate::context::{clamp_prefetch_threads, FetchContext};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::telemetry::{TelemetryEvent, TelemetryField};
use arrow_array::RecordBatch;
use arrow_select::concat::concat_batches;
use glacier_protocol::QueryResponseData;
use std::sync::Arc;
use std::time::Instant;

/// All batches of one query result.
///
/// Rows are always produced in batch order, and in server order within a
/// batch, whatever order the batches finish downloading.
#[derive(Debug)]
pub struct ResultSet {
    query_id: Option<String>,
    batches: Arc<[ResultBatch]>,
    ctx: Arc<FetchContext>,
    prefetch_threads: usize,
    /// When the response carrying the first batch was handed over.
    created: Instant,
}

impl ResultSet {
    #[inline]
    pub fn new(query_id: Option<String>, batches: Vec<ResultBatch>, ctx: Arc<FetchContext>) -> Self {
        let prefetch_threads = clamp_prefetch_threads(ctx.prefetch_threads);
        ResultSet {
            query_id,
            batches: batches.into(),
            ctx,
            prefetch_threads,
            created: Instant::now(),
        }
    }

    #[inline]
    pub fn from_response(data: &QueryResponseData, ctx: Arc<FetchContext>) -> Result<Self> {
        let batches = ResultBatch::from_response(data)?;
        let query_id = Some(data.query_id.clone()).filter(|id| !id.is_empty());
        Ok(ResultSet::new(query_id, batches, ctx))
    }

    #[inline]
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    #[inline]
    pub fn batches(&self) -> &[ResultBatch] {
        &self.batches
    }

    #[inline]
    pub fn prefetch_threads(&self) -> usize {
        self.prefetch_threads
    }

    /// Total number of rows, no decoding involved.
    #[inline]
    pub fn total_row_index(&self) -> usize {
        self.batches.iter().map(|b| b.row_count()).sum()
    }

    /// Sum of metrics of all batches.
    #[inline]
    pub fn metrics(&self) -> BatchMetrics {
        self.batches
            .iter()
            .map(|b| b.metrics())
            .fold(BatchMetrics::default(), |mut acc, m| {
                acc.download_ms += m.download_ms;
                acc.parse_ms += m.parse_ms;
                acc.load_ms += m.load_ms;
                acc
            })
    }

    /// Stream rows, downloading a window of batches ahead.
    #[inline]
    pub fn iter_rows(&self) -> ResultRows {
        self.rows(PrefetchMode::Stream)
    }

    /// Download all batches at once and collect every row.
    /// The first failed row or batch fails the whole fetch.
    #[inline]
    pub fn fetch_all_rows(&self) -> Result<Vec<Row>> {
        self.rows(PrefetchMode::FetchAll).collect()
    }

    /// Stream arrow record batches.
    #[inline]
    pub fn fetch_arrow_batches(&self) -> Result<ArrowBatches> {
        self.arrow_batches(PrefetchMode::Stream)
    }

    /// Download all batches and concatenate them into one table.
    /// Returns `None` if the result has no batch.
    pub fn fetch_arrow_all(&self) -> Result<Option<RecordBatch>> {
        let records = self
            .arrow_batches(PrefetchMode::FetchAll)?
            .collect::<Result<Vec<_>>>()?;
        let non_empty: Vec<RecordBatch> = records
            .iter()
            .filter(|rb| rb.num_rows() > 0)
            .cloned()
            .collect();
        if non_empty.is_empty() {
            return Ok(records.into_iter().next());
        }
        let schema = non_empty[0].schema();
        Ok(Some(concat_batches(&schema, &non_empty)?))
    }

    fn rows(&self, mode: PrefetchMode) -> ResultRows {
        let ctx = Arc::clone(&self.ctx);
        let shape = ctx.result_shape;
        let job: Job<RowIter> = Arc::new(move |b: &ResultBatch| b.create_iter(Some(&ctx), shape));
        ResultRows {
            batches: Prefetch::new(Arc::clone(&self.batches), self.prefetch_threads, mode, job),
            current: None,
            finalizer: self.finalizer(),
            failed: false,
        }
    }

    fn arrow_batches(&self, mode: PrefetchMode) -> Result<ArrowBatches> {
        if let Some(first) = self.batches.first() {
            if !first.is_arrow() {
                return Err(Error::NotSupported("Arrow fetch of JSON result"));
            }
        }
        let ctx = Arc::clone(&self.ctx);
        let job: Job<Vec<RecordBatch>> = Arc::new(move |b: &ResultBatch| b.to_arrow(Some(&ctx)));
        Ok(ArrowBatches {
            batches: Prefetch::new(Arc::clone(&self.batches), self.prefetch_threads, mode, job),
            current: Vec::new().into_iter(),
            finalizer: self.finalizer(),
            failed: false,
        })
    }

    #[inline]
    fn finalizer(&self) -> Finalizer {
        Finalizer {
            query_id: self.query_id.clone(),
            batches: Arc::clone(&self.batches),
            ctx: Arc::clone(&self.ctx),
            start: self.created,
            first: None,
            reported: false,
        }
    }
}

/// Reports timing telemetry once the result is fully consumed.
///
/// Times are measured from creation of the result set, which is when the
/// response with the first batch became available.
struct Finalizer {
    query_id: Option<String>,
    batches: Arc<[ResultBatch]>,
    ctx: Arc<FetchContext>,
    start: Instant,
    first: Option<u64>,
    reported: bool,
}

impl Finalizer {
    #[inline]
    fn mark_first(&mut self) {
        if self.first.is_none() {
            self.first = Some(self.start.elapsed().as_millis() as u64);
        }
    }

    fn finish(&mut self) {
        if self.reported {
            return;
        }
        self.reported = true;
        let last = self.start.elapsed().as_millis() as u64;
        let (download_ms, parse_ms) = self.batches.iter().fold((0, 0), |(d, p), b| {
            let m = b.metrics();
            (d + m.download_ms, p + m.parse_ms)
        });
        let fields = [
            (TelemetryField::TimeConsumeFirstResult, self.first.unwrap_or(last)),
            (TelemetryField::TimeConsumeLastResult, last),
            (TelemetryField::TimeDownloadingResultChunks, download_ms),
            (TelemetryField::TimeParsingResultChunks, parse_ms),
        ];
        for (field, value) in fields {
            self.ctx
                .telemetry
                .report(TelemetryEvent::new(field, value, self.query_id.clone()));
        }
    }
}

/// Rows of a result set, in order.
///
/// A row that failed to convert is yielded as an error and iteration can
/// go on. A batch that failed to download or decode ends the iteration
/// after its error is yielded.
pub struct ResultRows {
    batches: Prefetch<RowIter>,
    current: Option<RowIter>,
    finalizer: Finalizer,
    failed: bool,
}

impl Iterator for ResultRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(it) = self.current.as_mut() {
                if let Some(row) = it.next() {
                    self.finalizer.mark_first();
                    return Some(row);
                }
                self.current = None;
            }
            match self.batches.next() {
                Some(Ok(it)) => self.current = Some(it),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => {
                    self.finalizer.finish();
                    return None;
                }
            }
        }
    }
}

/// Arrow record batches of a result set, in order.
pub struct ArrowBatches {
    batches: Prefetch<Vec<RecordBatch>>,
    current: std::vec::IntoIter<RecordBatch>,
    finalizer: Finalizer,
    failed: bool,
}

impl Iterator for ArrowBatches {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(rb) = self.current.next() {
                self.finalizer.mark_first();
                return Some(Ok(rb));
            }
            match self.batches.next() {
                Some(Ok(records)) => self.current = records.into_iter(),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => {
                    self.finalizer.finish();
                    return None;
                }
            }
        }
    }
}
