//! Client side request pacing

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::Clock;

/// Sliding window limiter: at most `max_requests` calls in any `time_frame`
///
/// Call [`wait`](Self::wait) before each request. It never fails; it only
/// delays the caller.
pub struct RateLimiter {
    max_requests: usize,
    time_frame: Duration,
    clock: Arc<dyn Clock>,
    timestamps: Mutex<VecDeque<Duration>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_frame: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests: max_requests.max(1),
            time_frame,
            clock,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until one more request fits in the window, then record it
    pub async fn wait(&self) {
        let mut timestamps = self.timestamps.lock().await;

        if timestamps.len() >= self.max_requests {
            if let Some(&oldest) = timestamps.front() {
                let elapsed = self.clock.now().saturating_sub(oldest);
                if elapsed < self.time_frame {
                    let delay = self.time_frame - elapsed;
                    debug!(
                        delay_secs = delay.as_secs_f64(),
                        max_requests = self.max_requests,
                        "Request budget used up, waiting"
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }

        let now = self.clock.now();
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_sub(oldest) >= self.time_frame {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        timestamps.push_back(now);
    }

    /// Number of requests recorded in the current window
    pub async fn in_window(&self) -> usize {
        self.timestamps.lock().await.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("time_frame", &self.time_frame)
            .finish_non_exhaustive()
    }
}
