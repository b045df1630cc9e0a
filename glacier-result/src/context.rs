use crate::backoff::BackoffPolicy;
use crate::http::{
    HttpClient, Sleep, ThreadSleep, UreqClient, DEFAULT_DOWNLOAD_TIMEOUT, MAX_DOWNLOAD_RETRY,
};
use crate::row::RowShape;
use crate::telemetry::{NoopTelemetry, TelemetrySink};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PREFETCH_THREADS: usize = 4;
pub const MAX_PREFETCH_THREADS: usize = 10;

/// Clamp configured prefetch thread number to `[1, MAX_PREFETCH_THREADS]`.
#[inline]
pub fn clamp_prefetch_threads(n: usize) -> usize {
    n.clamp(1, MAX_PREFETCH_THREADS)
}

/// Services and settings shared by all result sets of one connection.
#[derive(Clone)]
pub struct FetchContext {
    pub http: Arc<dyn HttpClient>,
    pub sleeper: Arc<dyn Sleep>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub backoff: BackoffPolicy,
    pub download_timeout: Duration,
    pub max_download_retry: usize,
    pub prefetch_threads: usize,
    pub result_shape: RowShape,
}

impl Default for FetchContext {
    #[inline]
    fn default() -> Self {
        FetchContext {
            http: Arc::new(UreqClient::new()),
            sleeper: Arc::new(ThreadSleep),
            telemetry: Arc::new(NoopTelemetry),
            backoff: BackoffPolicy::default(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_download_retry: MAX_DOWNLOAD_RETRY,
            prefetch_threads: DEFAULT_PREFETCH_THREADS,
            result_shape: RowShape::default(),
        }
    }
}

impl fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("backoff", &self.backoff)
            .field("download_timeout", &self.download_timeout)
            .field("max_download_retry", &self.max_download_retry)
            .field("prefetch_threads", &self.prefetch_threads)
            .field("result_shape", &self.result_shape)
            .finish()
    }
}
