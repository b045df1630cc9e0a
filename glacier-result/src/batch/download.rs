use crate::context::FetchContext;
use crate::error::{Error, Result};
use crate::http::is_retryable_status;
use glacier_protocol::ChunkInfo;
use std::time::Instant;

/// Location of a chunk stored remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChunk {
    pub url: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Headers required by the signed URL, such as server side encryption key.
    pub headers: Vec<(String, String)>,
}

impl RemoteChunk {
    #[inline]
    pub fn new(info: &ChunkInfo, headers: Vec<(String, String)>) -> Self {
        RemoteChunk {
            url: info.url.clone(),
            compressed_size: info.compressed_size,
            uncompressed_size: info.uncompressed_size,
            headers,
        }
    }
}

/// Download chunk body with retry.
///
/// One backoff sequence is drawn per call. Status 200 is accepted, 401
/// means the URL has expired and fails immediately, retryable statuses and
/// transport errors are retried until attempts are exhausted, any other
/// status fails immediately.
pub(crate) fn fetch_chunk(chunk: &RemoteChunk, ctx: &FetchContext) -> Result<Vec<u8>> {
    let attempts = ctx.max_download_retry.max(1);
    let mut backoff = ctx.backoff.generator();
    let mut attempt = 1;
    loop {
        let start = Instant::now();
        let err = match ctx.http.get(&chunk.url, &chunk.headers, ctx.download_timeout) {
            Ok(resp) if resp.status == 200 => {
                log::debug!(
                    "Downloaded chunk of {} bytes in {}ms",
                    resp.body.len(),
                    start.elapsed().as_millis()
                );
                return Ok(resp.body);
            }
            Ok(resp) if resp.status == 401 => return Err(Error::AuthExpired(resp.status)),
            Ok(resp) if is_retryable_status(resp.status) => Error::Retryable {
                status: resp.status,
            },
            Ok(resp) => return Err(Error::HttpStatus(resp.status)),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };
        if attempt >= attempts {
            return Err(err);
        }
        attempt += 1;
        let delay = backoff.next_delay();
        log::warn!(
            "Retry chunk download in {}s, attempt {}/{}: {}",
            delay.as_secs(),
            attempt,
            attempts,
            err
        );
        ctx.sleeper.sleep(delay);
    }
}
