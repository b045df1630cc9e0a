use glacier_context::DEFAULT_QUERY_CONTEXT_CACHE_SIZE;
use glacier_result::context::{clamp_prefetch_threads, DEFAULT_PREFETCH_THREADS};
use glacier_result::http::{DEFAULT_DOWNLOAD_TIMEOUT, MAX_DOWNLOAD_RETRY};
use glacier_result::{
    BackoffPolicy, FetchContext, HttpClient, NoopTelemetry, RowShape, Sleep, TelemetrySink,
    ThreadSleep, UreqClient,
};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Plain options that can be loaded from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub client_prefetch_threads: usize,
    pub query_context_cache_size: usize,
    pub download_timeout_secs: u64,
    pub max_download_retry: usize,
    pub result_shape: RowShape,
}

impl Default for ConnectionConfig {
    #[inline]
    fn default() -> Self {
        ConnectionConfig {
            client_prefetch_threads: DEFAULT_PREFETCH_THREADS,
            query_context_cache_size: DEFAULT_QUERY_CONTEXT_CACHE_SIZE,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT.as_secs(),
            max_download_retry: MAX_DOWNLOAD_RETRY,
            result_shape: RowShape::default(),
        }
    }
}

/// Options of a connection, built by chained setters.
#[derive(Clone)]
pub struct ConnectionOpts {
    client_prefetch_threads: usize,
    query_context_cache_size: usize,
    download_timeout: Duration,
    max_download_retry: usize,
    backoff: BackoffPolicy,
    result_shape: RowShape,
    telemetry: Arc<dyn TelemetrySink>,
    http_client: Option<Arc<dyn HttpClient>>,
    sleeper: Arc<dyn Sleep>,
}

impl Default for ConnectionOpts {
    #[inline]
    fn default() -> Self {
        ConnectionOpts::from_config(ConnectionConfig::default())
    }
}

impl fmt::Debug for ConnectionOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOpts")
            .field("client_prefetch_threads", &self.client_prefetch_threads)
            .field("query_context_cache_size", &self.query_context_cache_size)
            .field("download_timeout", &self.download_timeout)
            .field("max_download_retry", &self.max_download_retry)
            .field("backoff", &self.backoff)
            .field("result_shape", &self.result_shape)
            .finish()
    }
}

impl ConnectionOpts {
    #[inline]
    pub fn from_config(config: ConnectionConfig) -> Self {
        ConnectionOpts {
            client_prefetch_threads: clamp_prefetch_threads(config.client_prefetch_threads),
            query_context_cache_size: config.query_context_cache_size,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            max_download_retry: config.max_download_retry,
            backoff: BackoffPolicy::default(),
            result_shape: config.result_shape,
            telemetry: Arc::new(NoopTelemetry),
            http_client: None,
            sleeper: Arc::new(ThreadSleep),
        }
    }

    /// Clamped to `[1, 10]`.
    #[inline]
    pub fn client_prefetch_threads(mut self, threads: usize) -> Self {
        self.client_prefetch_threads = clamp_prefetch_threads(threads);
        self
    }

    #[inline]
    pub fn query_context_cache_size(mut self, size: usize) -> Self {
        self.query_context_cache_size = size;
        self
    }

    #[inline]
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    #[inline]
    pub fn max_download_retry(mut self, retry: usize) -> Self {
        self.max_download_retry = retry;
        self
    }

    #[inline]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn result_shape(mut self, shape: RowShape) -> Self {
        self.result_shape = shape;
        self
    }

    #[inline]
    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[inline]
    pub fn http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    #[inline]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[inline]
    pub fn get_client_prefetch_threads(&self) -> usize {
        self.client_prefetch_threads
    }

    #[inline]
    pub fn get_query_context_cache_size(&self) -> usize {
        self.query_context_cache_size
    }

    /// Shared services of result retrieval.
    /// A pooled HTTP client is created if none is given.
    #[inline]
    pub(crate) fn fetch_context(&self) -> FetchContext {
        let http = match &self.http_client {
            Some(http) => Arc::clone(http),
            None => Arc::new(UreqClient::new()),
        };
        FetchContext {
            http,
            sleeper: Arc::clone(&self.sleeper),
            telemetry: Arc::clone(&self.telemetry),
            backoff: self.backoff,
            download_timeout: self.download_timeout,
            max_download_retry: self.max_download_retry,
            prefetch_threads: self.client_prefetch_threads,
            result_shape: self.result_shape,
        }
    }
}
