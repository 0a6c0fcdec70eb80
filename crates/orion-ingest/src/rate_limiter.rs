//! Process-wide rate regulation for outbound requests to the archive host.
//!
//! A single `RateRegulator` is constructed once at program start and handed
//! (cloned, it's just an `Arc` inside) to every component that makes
//! archive HTTP calls — the index fetcher and the downloader both acquire a
//! token before each request so aggregate QPS is respected regardless of
//! how many concurrent tasks are in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug)]
struct RegulatorState {
    last_dispatch: Option<Instant>,
}

/// Enforces a minimum spacing between outbound requests. Constructed with a
/// requests-per-second budget; internally tracked as a minimum interval
/// between dispatches (e.g. 10 req/s → 100ms spacing).
#[derive(Debug, Clone)]
pub struct RateRegulator {
    state: Arc<Mutex<RegulatorState>>,
    min_interval: Duration,
}

impl RateRegulator {
    pub fn new(max_requests_per_second: u32) -> Self {
        let per_second = max_requests_per_second.max(1);
        Self {
            state: Arc::new(Mutex::new(RegulatorState { last_dispatch: None })),
            min_interval: Duration::from_millis(1000 / per_second as u64),
        }
    }

    /// Block until it is safe to dispatch the next request, then record the
    /// dispatch time. Never hold the lock during the sleep itself.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let wait = match state.last_dispatch {
                Some(last) => {
                    let elapsed = now.duration_since(last);
                    self.min_interval.checked_sub(elapsed)
                }
                None => None,
            };
            state.last_dispatch = Some(now + wait.unwrap_or_default());
            wait
        };

        if let Some(wait) = wait {
            debug!("rate regulator sleeping {:?} before next dispatch", wait);
            sleep(wait).await;
        }
    }

    /// Back off after a 429 response. The caller is expected to retry
    /// exactly once after this returns.
    pub async fn backoff_429(&self) {
        warn!("archive host returned 429, backing off 5s before one retry");
        sleep(Duration::from_secs(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let regulator = RateRegulator::new(10);
        let start = Instant::now();
        regulator.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn back_to_back_acquires_are_spaced() {
        let regulator = RateRegulator::new(10);
        regulator.acquire().await;
        let start = Instant::now();
        regulator.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn concurrent_acquires_serialize_to_the_configured_rate() {
        let regulator = Arc::new(RateRegulator::new(20));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let r = regulator.clone();
            handles.push(tokio::spawn(async move {
                r.acquire().await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // 10 requests at 20/s (50ms spacing) takes at least ~450ms.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
