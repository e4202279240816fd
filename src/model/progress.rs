use std::time::{Duration, Instant};

/// Observer for byte-level transfer progress. Purely informational.
pub trait ProgressSink: Send + Sync {
    fn on_start(&self, _asset_id: &str, _total: Option<u64>) {}

    fn on_progress(&self, asset_id: &str, downloaded: u64, total: Option<u64>);

    fn on_finish(&self, _asset_id: &str, _downloaded: u64) {}
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _asset_id: &str, _downloaded: u64, _total: Option<u64>) {}
}

/// Writes progress to the log, one line per update.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_start(&self, asset_id: &str, total: Option<u64>) {
        match total {
            Some(total) => tracing::info!("{}: downloading {}", asset_id, format_bytes(total)),
            None => tracing::info!("{}: downloading (size unknown)", asset_id),
        }
    }

    fn on_progress(&self, asset_id: &str, downloaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => tracing::info!(
                "{}: {:>5.1}% ({} / {})",
                asset_id,
                downloaded as f64 / total as f64 * 100.0,
                format_bytes(downloaded),
                format_bytes(total)
            ),
            _ => tracing::info!("{}: {}", asset_id, format_bytes(downloaded)),
        }
    }

    fn on_finish(&self, asset_id: &str, downloaded: u64) {
        tracing::info!("{}: received {}", asset_id, format_bytes(downloaded));
    }
}

/// Rate limiter for progress updates within a single transfer.
pub(crate) struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_allows_first_then_waits() {
        let mut throttle = Throttle::new(Duration::from_secs(60));
        assert!(throttle.ready());
        assert!(!throttle.ready());

        let mut eager = Throttle::new(Duration::ZERO);
        assert!(eager.ready());
        assert!(eager.ready());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "0.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }
}
