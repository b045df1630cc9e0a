use crate::batch::ResultBatch;
use crate::error::{Error, Result};
use flume::{Receiver, Sender};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Work done on each batch: download and decode.
pub(crate) type Job<T> = Arc<dyn Fn(&ResultBatch) -> Result<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrefetchMode {
    /// Keep at most `threads` batches ahead of consumer.
    Stream,
    /// Submit all batches at once.
    FetchAll,
}

/// Ordered prefetch of batches.
///
/// Batch 0 is resident and decoded on the consumer thread. Batches after it
/// are decoded by a fixed number of worker threads, which pull batch indexes
/// from a job channel and push `(index, result)` back. Results arriving out
/// of order are held until their turn, so the output is always in batch order.
///
/// Dropping the prefetch stops job submission. Workers finish at most their
/// current job and quit, they are never joined.
pub(crate) struct Prefetch<T> {
    batches: Arc<[ResultBatch]>,
    job: Job<T>,
    window: usize,
    next_submit: usize,
    next_yield: usize,
    job_tx: Sender<usize>,
    res_rx: Receiver<(usize, Result<T>)>,
    pending: HashMap<usize, Result<T>>,
}

impl<T: Send + 'static> Prefetch<T> {
    pub(crate) fn new(
        batches: Arc<[ResultBatch]>,
        threads: usize,
        mode: PrefetchMode,
        job: Job<T>,
    ) -> Self {
        let remaining = batches.len().saturating_sub(1);
        let workers = threads.max(1).min(remaining);
        let (job_tx, job_rx) = flume::unbounded::<usize>();
        let (res_tx, res_rx) = flume::unbounded();
        for i in 0..workers {
            let job_rx = job_rx.clone();
            let res_tx: Sender<(usize, Result<T>)> = res_tx.clone();
            let batches = Arc::clone(&batches);
            let job = Arc::clone(&job);
            let spawned = thread::Builder::new()
                .name(format!("glacier-prefetch-{}", i))
                .spawn(move || {
                    while let Ok(idx) = job_rx.recv() {
                        if res_tx.is_disconnected() {
                            break;
                        }
                        let res = panic::catch_unwind(AssertUnwindSafe(|| job(&batches[idx])))
                            .unwrap_or(Err(Error::WorkerPool));
                        if res_tx.send((idx, res)).is_err() {
                            break;
                        }
                    }
                });
            if let Err(e) = spawned {
                log::warn!("Failed to start prefetch thread {}: {}", i, e);
            }
        }
        let window = match mode {
            PrefetchMode::Stream => threads.max(1),
            PrefetchMode::FetchAll => remaining,
        };
        let mut prefetch = Prefetch {
            batches,
            job,
            window,
            next_submit: 1,
            next_yield: 0,
            job_tx,
            res_rx,
            pending: HashMap::new(),
        };
        prefetch.fill();
        prefetch
    }

    /// Submit batches until the window is full.
    #[inline]
    fn fill(&mut self) {
        while self.next_submit < self.batches.len()
            && self.next_submit - self.next_yield.max(1) < self.window
        {
            // a send failure means no worker, reported when the batch is awaited.
            let _ = self.job_tx.send(self.next_submit);
            self.next_submit += 1;
        }
    }
}

impl<T: Send + 'static> Iterator for Prefetch<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next_yield;
        if idx >= self.batches.len() {
            return None;
        }
        self.next_yield += 1;
        self.fill();
        if idx == 0 {
            return Some((self.job)(&self.batches[0]));
        }
        loop {
            if let Some(res) = self.pending.remove(&idx) {
                return Some(res);
            }
            match self.res_rx.recv() {
                Ok((i, res)) => {
                    self.pending.insert(i, res);
                }
                Err(_) => return Some(Err(Error::WorkerPool)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glacier_datatype::{ColumnMeta, ColumnType};
    use glacier_protocol::{ChunkInfo, QueryResponseData};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// One inline batch followed by six remote ones.
    fn batches() -> Arc<[ResultBatch]> {
        let data = QueryResponseData {
            rowtype: vec![ColumnMeta::new("N", ColumnType::Fixed)],
            rowset: Some(vec![vec![serde_json::json!("0")]]),
            chunks: (1..=6)
                .map(|i| ChunkInfo {
                    url: format!("c{}", i),
                    row_count: 1,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        ResultBatch::from_response(&data).unwrap().into()
    }

    fn counting_job(started: &Arc<AtomicUsize>) -> Job<usize> {
        let started = Arc::clone(started);
        Arc::new(move |b: &ResultBatch| {
            started.fetch_add(1, Ordering::SeqCst);
            Ok(b.row_count())
        })
    }

    /// Wait for workers to pick up what they can, then read the count.
    fn settled(started: &AtomicUsize, expected: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        while started.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        started.load(Ordering::SeqCst)
    }

    #[test]
    fn test_stream_window() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut p = Prefetch::new(batches(), 2, PrefetchMode::Stream, counting_job(&started));
        assert_eq!(settled(&started, 2), 2);
        // batch 0 runs on the consumer thread
        assert_eq!(p.next(), Some(Ok(1)));
        assert_eq!(settled(&started, 3), 3);
        for expected in [4, 5, 6, 7, 7] {
            assert_eq!(p.next(), Some(Ok(1)));
            assert_eq!(settled(&started, expected), expected);
        }
        assert_eq!(p.next(), Some(Ok(1)));
        assert_eq!(p.next(), None);
        assert_eq!(started.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_fetch_all_submits_everything() {
        let started = Arc::new(AtomicUsize::new(0));
        let p = Prefetch::new(batches(), 2, PrefetchMode::FetchAll, counting_job(&started));
        assert_eq!(settled(&started, 6), 6);
        let res: Vec<_> = p.collect::<Result<_>>().unwrap();
        assert_eq!(res, vec![1; 7]);
    }

    #[test]
    fn test_panicking_job_reported_in_place() {
        let job: Job<usize> = Arc::new(|b: &ResultBatch| {
            if b.remote().map(|r| r.url == "c2").unwrap_or_default() {
                panic!("decode");
            }
            Ok(b.row_count())
        });
        let res: Vec<_> = Prefetch::new(batches(), 3, PrefetchMode::Stream, job).collect();
        assert_eq!(res.len(), 7);
        assert_eq!(res[2], Err(Error::WorkerPool));
        assert!(res.iter().enumerate().all(|(i, r)| i == 2 || r.is_ok()));
    }
}
