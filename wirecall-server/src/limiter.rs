//! Token-bucket admission control.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A token bucket refilled at `rate` tokens per second, holding at most
/// `burst` tokens. The bucket starts full.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter. `rate` must be positive and `burst` at least 1.
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Takes a token if one is available now.
    pub fn try_acquire(&self) -> bool {
        self.take_or_wait().is_none()
    }

    /// Takes a token, waiting at most `timeout` for one to become available.
    ///
    /// Gives up immediately when the next token cannot arrive before the
    /// deadline.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let wait = match self.take_or_wait() {
                None => return true,
                Some(wait) => wait,
            };
            match Instant::now().checked_add(wait) {
                Some(ready_at) if deadline.map_or(true, |d| ready_at <= d) => {
                    tokio::time::sleep(wait).await
                }
                _ => return false,
            }
        }
    }

    /// Returns `None` after taking a token, otherwise the time until one
    /// is available.
    fn take_or_wait(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let secs = (1.0 - bucket.tokens) / self.rate;
            Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
        }
    }
}
