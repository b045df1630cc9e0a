use rand::Rng;
use std::time::Duration;

pub const DEFAULT_BACKOFF_FACTOR: u64 = 2;
pub const DEFAULT_BACKOFF_BASE: u64 = 1;
pub const DEFAULT_BACKOFF_CAP: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// Multiply previous sleep by factor.
    Exponential,
    /// Add factor to previous sleep.
    Linear,
    /// Randomly pick between an increment of previous sleep and an
    /// exponential value of the step, then apply equal jitter.
    Mixed,
}

/// Policy of retry delays, in whole seconds.
///
/// A policy is a factory: every download creates its own [`Backoff`] and
/// draws one value per retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    pub factor: u64,
    pub base: u64,
    pub cap: u64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    #[inline]
    fn default() -> Self {
        BackoffPolicy::exponential(
            DEFAULT_BACKOFF_FACTOR,
            DEFAULT_BACKOFF_BASE,
            DEFAULT_BACKOFF_CAP,
            true,
        )
    }
}

impl BackoffPolicy {
    #[inline]
    pub fn exponential(factor: u64, base: u64, cap: u64, jitter: bool) -> Self {
        BackoffPolicy {
            kind: BackoffKind::Exponential,
            factor,
            base,
            cap,
            jitter,
        }
    }

    #[inline]
    pub fn linear(factor: u64, base: u64, cap: u64, jitter: bool) -> Self {
        BackoffPolicy {
            kind: BackoffKind::Linear,
            factor,
            base,
            cap,
            jitter,
        }
    }

    /// Mixed policy always applies equal jitter.
    #[inline]
    pub fn mixed(factor: u64, base: u64, cap: u64) -> Self {
        BackoffPolicy {
            kind: BackoffKind::Mixed,
            factor,
            base,
            cap,
            jitter: true,
        }
    }

    #[inline]
    pub fn generator(&self) -> Backoff {
        Backoff {
            policy: *self,
            cnt: 0,
            sleep: None,
        }
    }
}

/// Infinite sequence of retry delays in seconds.
///
/// The un-jittered sleep is kept as state and only the yielded value is
/// jittered, so a small random draw does not stall the progression.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    cnt: u32,
    sleep: Option<u64>,
}

impl Backoff {
    /// Next delay in seconds.
    pub fn next_secs(&mut self) -> u64 {
        let p = self.policy;
        let prev = match self.sleep {
            None => {
                let base = p.base.min(p.cap);
                self.sleep = Some(base);
                return base;
            }
            Some(prev) => prev,
        };
        self.cnt = self.cnt.saturating_add(1);
        let mut rng = rand::thread_rng();
        match p.kind {
            BackoffKind::Exponential => {
                let sleep = prev.saturating_mul(p.factor).min(p.cap);
                self.sleep = Some(sleep);
                full_jitter(&mut rng, sleep, p.jitter)
            }
            BackoffKind::Linear => {
                let sleep = prev.saturating_add(p.factor).min(p.cap);
                self.sleep = Some(sleep);
                full_jitter(&mut rng, sleep, p.jitter)
            }
            BackoffKind::Mixed => {
                let sleep = if rng.gen_bool(0.5) {
                    prev.saturating_add(rng.gen_range(0..=prev.max(1)))
                } else {
                    p.base.saturating_mul(p.factor.saturating_pow(self.cnt))
                };
                let sleep = sleep.min(p.cap);
                self.sleep = Some(sleep);
                let half = sleep / 2;
                rng.gen_range(sleep - half..=sleep.saturating_add(half))
                    .min(p.cap)
            }
        }
    }

    #[inline]
    pub fn next_delay(&mut self) -> Duration {
        Duration::from_secs(self.next_secs())
    }
}

impl Iterator for Backoff {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        Some(self.next_secs())
    }
}

#[inline]
fn full_jitter<R: Rng>(rng: &mut R, sleep: u64, jitter: bool) -> u64 {
    if jitter {
        rng.gen_range(0..=sleep)
    } else {
        sleep
    }
}
