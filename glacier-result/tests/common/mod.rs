#![allow(dead_code)]

use glacier_result::error::{Error, Result};
use glacier_result::{
    BackoffPolicy, FetchContext, HttpClient, HttpResponse, RowShape, Sleep, TelemetryEvent,
    TelemetrySink,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Body(Vec<u8>),
    Transport,
}

/// Replies to each URL from a script, the last reply repeats forever.
#[derive(Default)]
pub struct ScriptedHttp {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, url: &str, replies: Vec<Reply>) -> Self {
        self.script.lock().insert(url.to_string(), replies.into());
        self
    }

    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|(u, _)| u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn headers(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
    }
}

impl HttpClient for ScriptedHttp {
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse> {
        self.calls
            .lock()
            .push((url.to_string(), headers.to_vec()));
        let delay = self.delays.lock().get(url).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let reply = {
            let mut script = self.script.lock();
            match script.get_mut(url) {
                Some(replies) if replies.len() > 1 => replies.pop_front(),
                Some(replies) => replies.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Status(status)) => Ok(HttpResponse {
                status,
                body: vec![],
            }),
            Some(Reply::Body(body)) => Ok(HttpResponse { status: 200, body }),
            Some(Reply::Transport) => Err(Error::Transport("connection reset".into())),
            None => Ok(HttpResponse {
                status: 404,
                body: vec![],
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingSleep(pub Mutex<Vec<Duration>>);

impl Sleep for RecordingSleep {
    fn sleep(&self, dur: Duration) {
        self.0.lock().push(dur);
    }
}

#[derive(Default)]
pub struct RecordingTelemetry(pub Mutex<Vec<TelemetryEvent>>);

impl TelemetrySink for RecordingTelemetry {
    fn report(&self, event: TelemetryEvent) {
        self.0.lock().push(event);
    }
}

pub struct Fixture {
    pub http: Arc<ScriptedHttp>,
    pub sleeper: Arc<RecordingSleep>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub ctx: Arc<FetchContext>,
}

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Context with deterministic backoff and recording doubles.
pub fn fixture(http: ScriptedHttp, shape: RowShape) -> Fixture {
    init_log();
    let http = Arc::new(http);
    let sleeper = Arc::new(RecordingSleep::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let ctx = FetchContext {
        http: Arc::clone(&http) as Arc<dyn HttpClient>,
        sleeper: Arc::clone(&sleeper) as Arc<dyn Sleep>,
        telemetry: Arc::clone(&telemetry) as Arc<dyn TelemetrySink>,
        backoff: BackoffPolicy::exponential(2, 1, 16, false),
        result_shape: shape,
        ..FetchContext::default()
    };
    Fixture {
        http,
        sleeper,
        telemetry,
        ctx: Arc::new(ctx),
    }
}

/// Wait until `expected` requests were made or a deadline passes, then
/// give stray requests a moment to show up.
pub fn settled_calls(http: &ScriptedHttp, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    while http.total_calls() < expected && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(50));
    http.total_calls()
}

pub fn body(s: &str) -> Reply {
    Reply::Body(s.as_bytes().to_vec())
}
