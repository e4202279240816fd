use std::time::Duration;

/// Classification of a transfer failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request or body read timed out.
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Connection refused, reset, DNS failure, or a broken body stream.
    Connection,
    /// Other 5xx status.
    Http5xx(u16),
    /// Client errors and local I/O. Never retried.
    Fatal,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 | 503 => FailureKind::Throttled,
            500..=599 => FailureKind::Http5xx(status),
            _ => FailureKind::Fatal,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FailureKind::Timeout
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
        } else if err.is_connect() || err.is_body() || err.is_request() || err.is_decode() {
            FailureKind::Connection
        } else {
            FailureKind::Fatal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff with a cap, bounded by a number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// `attempt` is 1-based: the attempt that just failed.
    pub fn decide(&self, attempt: u32, kind: FailureKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            FailureKind::Fatal => RetryDecision::NoRetry,
            FailureKind::Timeout
            | FailureKind::Connection
            | FailureKind::Throttled
            | FailureKind::Http5xx(_) => {
                let exp = 1u32 << attempt.saturating_sub(1).min(8);
                let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_is_never_retried() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, FailureKind::Fatal), RetryDecision::NoRetry);
        assert_eq!(FailureKind::from_status(404), FailureKind::Fatal);
    }

    #[test]
    fn status_classification() {
        assert_eq!(FailureKind::from_status(429), FailureKind::Throttled);
        assert_eq!(FailureKind::from_status(503), FailureKind::Throttled);
        assert_eq!(FailureKind::from_status(502), FailureKind::Http5xx(502));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 20;
        let delay = |attempt| match p.decide(attempt, FailureKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        };
        assert_eq!(delay(1), p.base_delay);
        assert!(delay(2) > delay(1));
        assert_eq!(delay(15), p.max_delay);
    }

    #[test]
    fn respects_max_attempts() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 2;
        assert!(matches!(
            p.decide(1, FailureKind::Connection),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(2, FailureKind::Connection), RetryDecision::NoRetry);
        assert_eq!(
            RetryPolicy::no_retry().decide(1, FailureKind::Timeout),
            RetryDecision::NoRetry
        );
    }
}
