//! Admission control for generation calls.
//!
//! Every call to the generation service acquires a [`GatePermit`] first. The
//! permit is released when dropped. One gate instance is shared by all
//! concurrent runs in the process, so the aggregate call rate stays under the
//! configured ceiling.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Held for the duration of one generation call.
#[derive(Debug)]
pub struct GatePermit {
    _slot: Option<OwnedSemaphorePermit>,
}

impl GatePermit {
    /// A permit that holds nothing.
    pub fn unbounded() -> Self {
        Self { _slot: None }
    }
}

/// Blocks callers until a generation call may proceed.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn acquire(&self) -> GatePermit;
}

/// Admits every call immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGate;

#[async_trait]
impl RateGate for NoopGate {
    async fn acquire(&self) -> GatePermit {
        GatePermit::unbounded()
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: `requests_per_minute` sustained, `burst` tokens of headroom,
/// and at most `max_in_flight` calls outstanding at once.
pub struct TokenBucketGate {
    bucket: Mutex<Bucket>,
    in_flight: Arc<Semaphore>,
    per_second: f64,
    capacity: f64,
}

// Absorbs float drift in the refill arithmetic
const TOKEN_EPSILON: f64 = 1e-9;

impl TokenBucketGate {
    pub fn new(requests_per_minute: u32, burst: u32, max_in_flight: usize) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            per_second: f64::from(requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    pub fn from_config(config: &docsage_config::RateLimitConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst, config.max_in_flight)
    }

    /// Take a token, or report how long until one is available.
    async fn try_take(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            None
        } else {
            let missing = 1.0 - bucket.tokens;
            let wait = Duration::from_secs_f64(missing / self.per_second);
            Some(wait.max(Duration::from_millis(1)))
        }
    }
}

#[async_trait]
impl RateGate for TokenBucketGate {
    async fn acquire(&self) -> GatePermit {
        // The semaphore is never closed, so acquisition only fails if that changes.
        let slot = self.in_flight.clone().acquire_owned().await.ok();

        while let Some(wait) = self.try_take().await {
            debug!(wait_ms = wait.as_millis() as u64, "Rate gate full, waiting");
            sleep(wait).await;
        }

        GatePermit { _slot: slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bucket_spaces_calls_at_the_configured_rate() {
        let gate = TokenBucketGate::new(60, 1, 4);
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = gate.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_admits_immediately() {
        let gate = TokenBucketGate::new(10, 3, 4);
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = gate.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn ten_per_minute_never_exceeded() {
        let gate = TokenBucketGate::new(10, 1, 4);
        let start = Instant::now();
        for _ in 0..11 {
            let _permit = gate.acquire().await;
        }
        // 1 immediate + 10 refills at 6s each
        assert!(start.elapsed() >= Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_limit_blocks_until_release() {
        let gate = TokenBucketGate::new(600, 10, 1);
        let held = gate.acquire().await;

        let blocked = tokio::time::timeout(Duration::from_secs(30), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(held);
        let admitted = tokio::time::timeout(Duration::from_secs(30), gate.acquire()).await;
        assert!(admitted.is_ok());
    }

    /// Admission instants of `tasks` concurrent callers sharing one gate.
    async fn admissions(gate: Arc<TokenBucketGate>, tasks: usize, calls: usize) -> Vec<Instant> {
        let admitted = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let gate = gate.clone();
                let admitted = admitted.clone();
                tokio::spawn(async move {
                    for _ in 0..calls {
                        let _permit = gate.acquire().await;
                        admitted.lock().unwrap().push(Instant::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        let mut times = admitted.lock().unwrap().clone();
        times.sort();
        times
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_runs_share_one_ceiling() {
        let (rpm, burst) = (30, 3);
        let gate = Arc::new(TokenBucketGate::new(rpm, burst, 8));
        let times = admissions(gate, 5, 8).await;
        assert_eq!(times.len(), 40);

        let window = Duration::from_secs(60);
        for (i, start) in times.iter().enumerate() {
            let in_window = times[i..].iter().take_while(|t| **t - *start < window).count();
            assert!(
                in_window <= (rpm + burst - 1) as usize,
                "{in_window} calls admitted within 60s of call {i}"
            );
        }
        // 37 calls beyond the burst at 2s each
        assert!(times[39] - times[0] >= Duration::from_secs(74));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_holders_never_exceed_in_flight_cap() {
        let gate = Arc::new(TokenBucketGate::new(600, 10, 2));
        let current = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (gate, current, peak) = (gate.clone(), current.clone(), peak.clone());
                tokio::spawn(async move {
                    use std::sync::atomic::Ordering::SeqCst;
                    let _permit = gate.acquire().await;
                    let now = current.fetch_add(1, SeqCst) + 1;
                    peak.fetch_max(now, SeqCst);
                    sleep(Duration::from_secs(1)).await;
                    current.fetch_sub(1, SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn noop_gate_admits_everything() {
        let gate = NoopGate;
        for _ in 0..100 {
            let _permit = gate.acquire().await;
        }
    }
}
