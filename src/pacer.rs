use std::time::Duration;

use tokio::time::Instant;

/// Minimum-interval rate limiter. Stages call `wait` before each page
/// fetch; the first call passes immediately, later calls sleep until the
/// interval since the previous fetch has elapsed. Passthrough records in
/// the enrichment engine never touch the pacer since they make no request.
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_free_then_interval_enforced() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
