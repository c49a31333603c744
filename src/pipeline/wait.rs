//! Bounded polling primitives for the render wait.
//!
//! The orchestrator never sleeps for a fixed time hoping the page is ready.
//! It reads a readiness flag at a fixed interval ([`poll_until`]) and wraps
//! the whole wait in a hard deadline ([`with_deadline`]). The same
//! [`PollPolicy`] shape also describes the in-page math wait
//! ([`ConversionConfig::math_poll_policy`]), whose attempt budget is finite
//! and is substituted into the readiness script.
//!
//! [`ConversionConfig::math_poll_policy`]: crate::config::ConversionConfig::math_poll_policy

use crate::error::Notes2PdfError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often to check, and how many times at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the check succeeds or an outer deadline fires.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Longest time the policy can spend before giving up, if bounded.
    /// Saturates at [`Duration::MAX`].
    pub fn budget(&self) -> Option<Duration> {
        self.max_attempts
            .map(|n| self.interval.checked_mul(n).unwrap_or(Duration::MAX))
    }
}

/// How a [`poll_until`] loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The check returned `true` on attempt number `attempts`.
    Ready { attempts: u32 },
    /// The attempt budget ran out without the check succeeding.
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    /// Number of checks that ran.
    pub fn attempts(&self) -> u32 {
        match *self {
            PollOutcome::Ready { attempts } | PollOutcome::Exhausted { attempts } => attempts,
        }
    }
}

/// Sleep one interval, run `check`, repeat until it yields `true` or the
/// attempt budget is spent. Errors from `check` end the loop immediately.
pub async fn poll_until<F, Fut, E>(policy: PollPolicy, mut check: F) -> Result<PollOutcome, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut attempts: u32 = 0;
    loop {
        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                debug!(attempts, "poll budget exhausted");
                return Ok(PollOutcome::Exhausted { attempts });
            }
        }
        tokio::time::sleep(policy.interval).await;
        attempts += 1;
        if check().await? {
            debug!(attempts, "poll condition met");
            return Ok(PollOutcome::Ready { attempts });
        }
    }
}

/// Run `fut` under a hard deadline, mapping expiry to
/// [`Notes2PdfError::RenderTimeout`].
pub async fn with_deadline<T, Fut>(deadline: Duration, fut: Fut) -> Result<T, Notes2PdfError>
where
    Fut: Future<Output = Result<T, Notes2PdfError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Notes2PdfError::RenderTimeout {
            secs: deadline.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_check() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let start = Instant::now();
        let outcome = poll_until(PollPolicy::bounded(Duration::from_millis(80), 30), || {
            let c = c.clone();
            async move { Ok::<_, Notes2PdfError>(c.fetch_add(1, Ordering::SeqCst) + 1 >= 3) }
        })
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Ready { attempts: 3 });
        assert_eq!(start.elapsed(), Duration::from_millis(240));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_policy_gives_up_after_budget() {
        let policy = PollPolicy::bounded(Duration::from_millis(80), 30);
        let start = Instant::now();
        let outcome = poll_until(policy, || async { Ok::<_, Notes2PdfError>(false) })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 30 });
        assert!(!outcome.is_ready());
        assert_eq!(outcome.attempts(), 30);
        assert_eq!(start.elapsed(), Duration::from_millis(2400));
        assert_eq!(policy.budget(), Some(Duration::from_millis(2400)));
    }

    #[tokio::test(start_paused = true)]
    async fn check_error_stops_polling() {
        let result = poll_until(PollPolicy::unbounded(Duration::from_millis(10)), || async {
            Err::<bool, _>(Notes2PdfError::Surface("page crashed".into()))
        })
        .await;
        assert!(matches!(result, Err(Notes2PdfError::Surface(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_poll_is_cut_by_deadline() {
        let start = Instant::now();
        let result = with_deadline(Duration::from_secs(60), async {
            poll_until(PollPolicy::unbounded(Duration::from_millis(100)), || async {
                Ok::<_, Notes2PdfError>(false)
            })
            .await
        })
        .await;

        assert!(matches!(result, Err(Notes2PdfError::RenderTimeout { secs: 60 })));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[test]
    fn budget_saturates_instead_of_overflowing() {
        let policy = PollPolicy::bounded(Duration::from_millis(u64::MAX), u32::MAX);
        assert_eq!(policy.budget(), Some(Duration::MAX));
        assert_eq!(PollPolicy::unbounded(Duration::from_millis(1)).budget(), None);
    }

    #[tokio::test]
    async fn deadline_passes_through_success() {
        let value = with_deadline(Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
