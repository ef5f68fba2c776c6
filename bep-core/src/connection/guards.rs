use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Decrements the shared active-connection counter on drop and, when the
/// last connection closes, notifies anyone waiting on a graceful-shutdown
/// `watch` channel. Mirrors the teacher's `ConnectionGuard`.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>, notifier: watch::Sender<()>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter, notifier }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::Relaxed);
        if remaining == 1 {
            let _ = self.notifier.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_the_last_guard_notifies() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = watch::channel(());
        rx.mark_unchanged();

        let guard_a = ConnectionGuard::new(counter.clone(), tx.clone());
        let guard_b = ConnectionGuard::new(counter.clone(), tx);
        assert_eq!(counter.load(Ordering::Relaxed), 2);

        drop(guard_a);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert!(!rx.has_changed().unwrap());

        drop(guard_b);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
        assert!(rx.has_changed().unwrap());
    }
}
