//! Generic service supervision (§9 Design Notes): "a cancellable task with a
//! start function and an observable last error, supervised with ≥60s backoff
//! and a cap of 2 restarts within the backoff window before propagating".
//!
//! Grounded in the teacher's connection-lifecycle idiom (an
//! `Arc<AtomicUsize>` counter plus a `watch` sender notified on drop, driven
//! from a `tokio::select!` shutdown loop): here the counter becomes a
//! restart tally and the `watch` signal becomes a [`CancellationToken`].

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::BepError;

/// Default backoff window and restart cap from §9.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RESTARTS: u32 = 2;

/// Supervises a restartable async task. `start` is called repeatedly with a
/// fresh clone of the supervisor's cancellation token; a clean `Ok(())`
/// return ends supervision, an `Err` triggers a restart (after backoff) up
/// to `max_restarts` times within `backoff` of the first failure in the
/// current window, after which the error propagates to the caller.
pub struct Supervisor {
    cancel: CancellationToken,
    last_error: Mutex<Option<String>>,
    backoff: Duration,
    max_restarts: u32,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_BACKOFF, DEFAULT_MAX_RESTARTS)
    }

    pub fn with_policy(backoff: Duration, max_restarts: u32) -> Self {
        Self {
            cancel: CancellationToken::new(),
            last_error: Mutex::new(None),
            backoff,
            max_restarts,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn clear_last_error(&self) {
        *self.last_error.lock().unwrap() = None;
    }

    fn record_error(&self, err: &BepError) {
        *self.last_error.lock().unwrap() = Some(err.to_string());
    }

    /// Runs `start` under supervision until it exits cleanly, is cancelled,
    /// or exceeds the restart cap. Returns the final error, if any, so the
    /// caller can decide whether a supervisor-level failure is fatal.
    pub async fn run<F, Fut>(&self, mut start: F) -> Option<BepError>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), BepError>>,
    {
        let mut restarts_in_window: u32 = 0;
        let mut window_start = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            match start(self.cancel.clone()).await {
                Ok(()) => {
                    self.clear_last_error();
                    return None;
                }
                Err(err) => {
                    self.record_error(&err);
                    warn!(error = %err, "supervised task failed");

                    if self.cancel.is_cancelled() {
                        return None;
                    }

                    if window_start.elapsed() > self.backoff {
                        window_start = Instant::now();
                        restarts_in_window = 0;
                    }
                    restarts_in_window += 1;

                    if restarts_in_window > self.max_restarts {
                        error!(
                            error = %err,
                            "exceeded restart cap within backoff window, propagating"
                        );
                        return Some(err);
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(self.backoff) => {}
                        _ = self.cancel.cancelled() => return None,
                    }
                }
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn clean_exit_clears_last_error_and_stops() {
        let supervisor = Supervisor::with_policy(Duration::from_millis(5), 2);
        let result = supervisor.run(|_cancel| async { Ok(()) }).await;
        assert!(result.is_none());
        assert!(supervisor.last_error().is_none());
    }

    #[tokio::test]
    async fn restarts_up_to_the_cap_then_propagates() {
        let attempts = Arc::new(AtomicU32::new(0));
        let supervisor = Supervisor::with_policy(Duration::from_millis(5), 2);
        let attempts_clone = attempts.clone();
        let result = supervisor
            .run(move |_cancel| {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(BepError::Temporary("boom".into()))
                }
            })
            .await;
        // first attempt + 2 restarts = 3 calls total before propagating
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(result.is_some());
        assert!(supervisor.last_error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_retry_loop() {
        let supervisor = Arc::new(Supervisor::with_policy(Duration::from_secs(60), 10));
        let token = supervisor.cancel_token();
        let supervisor_clone = supervisor.clone();
        let handle = tokio::spawn(async move {
            supervisor_clone
                .run(|_cancel| async { Err(BepError::Temporary("still failing".into())) })
                .await
        });
        tokio::task::yield_now().await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn recovering_before_the_cap_resets_the_window() {
        let attempts = Arc::new(AtomicU32::new(0));
        let supervisor = Supervisor::with_policy(Duration::from_millis(5), 2);
        let attempts_clone = attempts.clone();
        let result = supervisor
            .run(move |_cancel| {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 1 {
                        Err(BepError::Temporary("transient".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_none());
        assert!(supervisor.last_error().is_none());
    }
}
