//! Periodic progress logging during the copy phase.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Point-in-time view of copy progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: i64,
    pub total: Option<i64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn rows_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Percent done, capped at 100. `None` without a positive total.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.processed as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }

    /// Remaining time at the average rate so far.
    pub fn eta(&self) -> Option<Duration> {
        let total = self.total.filter(|t| *t > 0)?;
        let rate = self.rows_per_sec();
        if rate <= 0.0 {
            return None;
        }
        let remaining = (total - self.processed).max(0) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }

    pub fn describe(&self) -> String {
        let mut line = format!(
            "Progress: {} rows ({:.0} rows/sec)",
            self.processed,
            self.rows_per_sec()
        );
        if let (Some(total), Some(pct)) = (self.total, self.percent()) {
            line.push_str(&format!(", {:.1}% of {}", pct, total));
        }
        if let Some(eta) = self.eta() {
            line.push_str(&format!(", ETA {}s", eta.as_secs()));
        }
        line
    }
}

/// Log a progress line every `every` until `cancel` fires.
pub fn spawn_progress_monitor(
    counter: Arc<AtomicI64>,
    total: Option<i64>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = ProgressSnapshot {
                        processed: counter.load(Ordering::Relaxed),
                        total,
                        elapsed: started.elapsed(),
                    };
                    info!("{}", snapshot.describe());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(processed: i64, total: Option<i64>, secs: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            processed,
            total,
            elapsed: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_rate_percent_eta() {
        let s = snapshot(2_500, Some(10_000), 10);
        assert_eq!(s.rows_per_sec(), 250.0);
        assert_eq!(s.percent(), Some(25.0));
        assert_eq!(s.eta(), Some(Duration::from_secs(30)));
        assert_eq!(
            s.describe(),
            "Progress: 2500 rows (250 rows/sec), 25.0% of 10000, ETA 30s"
        );
    }

    #[test]
    fn test_unknown_total() {
        let s = snapshot(500, None, 5);
        assert_eq!(s.percent(), None);
        assert_eq!(s.eta(), None);
        assert_eq!(s.describe(), "Progress: 500 rows (100 rows/sec)");
    }

    #[test]
    fn test_edges() {
        assert_eq!(snapshot(0, Some(100), 0).rows_per_sec(), 0.0);
        assert_eq!(snapshot(0, Some(100), 0).eta(), None);
        // Rows inserted after counting can push past the estimate.
        assert_eq!(snapshot(150, Some(100), 1).percent(), Some(100.0));
        assert_eq!(snapshot(150, Some(100), 1).eta(), Some(Duration::ZERO));
        assert_eq!(snapshot(10, Some(0), 1).percent(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_on_cancel() {
        let counter = Arc::new(AtomicI64::new(0));
        let cancel = CancellationToken::new();
        let handle = spawn_progress_monitor(
            counter.clone(),
            Some(100),
            Duration::from_secs(30),
            cancel.clone(),
        );

        counter.fetch_add(40, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_secs(65)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
