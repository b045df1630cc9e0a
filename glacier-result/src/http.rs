use crate::error::{Error, Result};
use std::io::Read;
use std::time::Duration;
use ureq::Agent;

pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(7);
pub const MAX_DOWNLOAD_RETRY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Minimal HTTP surface needed to fetch result chunks.
///
/// Any status is returned as a response. Only failures below HTTP, such as
/// connection reset or timeout, are reported as [`Error::Transport`].
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)], timeout: Duration)
        -> Result<HttpResponse>;
}

/// Pooled blocking HTTP client.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: Agent,
}

impl Default for UreqClient {
    #[inline]
    fn default() -> Self {
        UreqClient::new()
    }
}

impl UreqClient {
    #[inline]
    pub fn new() -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        UreqClient { agent }
    }
}

impl HttpClient for UreqClient {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let mut request = self.agent.get(url);
        for (k, v) in headers {
            request = request.header(k.as_str(), v.as_str());
        }
        let response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(map_ureq_error)?;
        let status = response.status().as_u16();
        let mut reader = response.into_body().into_reader();
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        Ok(HttpResponse { status, body })
    }
}

#[inline]
fn map_ureq_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::StatusCode(status) => Error::HttpStatus(status),
        ureq::Error::Timeout(t) => Error::Transport(format!("timeout: {:?}", t)),
        ureq::Error::Io(e) => Error::Transport(e.to_string()),
        other => Error::Transport(other.to_string()),
    }
}

/// Statuses worth another attempt: server errors, throttling, request
/// timeout, and a few client errors the storage layer returns transiently.
#[inline]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500..=599 | 400 | 403 | 405 | 408 | 429)
}

/// Blocks current thread between download attempts.
pub trait Sleep: Send + Sync {
    fn sleep(&self, dur: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    #[inline]
    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status() {
        for s in [400, 403, 405, 408, 429, 500, 502, 503, 504, 599] {
            assert!(is_retryable_status(s), "{}", s);
        }
        for s in [200, 204, 301, 401, 404, 410] {
            assert!(!is_retryable_status(s), "{}", s);
        }
    }
}
