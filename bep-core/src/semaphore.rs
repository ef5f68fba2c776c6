//! The flow-control semaphore primitive from §5/§8: a byte/unit counter with
//! `take`/`give`/`set_capacity`, cancellable acquisition, and composition via
//! [`MultiSemaphore`]. This is the building block bandwidth limiting would
//! be built on; no such consumer lives in this core.

use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct State {
    capacity: u64,
    available: u64,
}

/// A counting semaphore whose capacity can be lowered below current usage.
///
/// A capacity of `0` means "uncapped": `take`/`give` always succeed
/// immediately regardless of `n`, matching the "degenerates to a no-op"
/// behavior used by test doubles and unlimited paths.
pub struct Semaphore {
    state: Mutex<State>,
    notify: Notify,
}

impl Semaphore {
    pub fn new(capacity: u64) -> Self {
        Self { state: Mutex::new(State { capacity, available: capacity }), notify: Notify::new() }
    }

    fn uncapped(&self) -> bool {
        self.state.lock().unwrap().capacity == 0
    }

    /// Acquires `n`, waiting until enough is available.
    pub async fn take(&self, n: u64) {
        if self.uncapped() {
            return;
        }
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.available >= n {
                    state.available -= n;
                    return;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Acquires `n`, or returns `false` if `ctx` is cancelled first.
    pub async fn take_with_context(&self, ctx: &CancellationToken, n: u64) -> bool {
        if self.uncapped() {
            return true;
        }
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.available >= n {
                    state.available -= n;
                    return true;
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = ctx.cancelled() => return false,
            }
        }
    }

    /// Returns `n` to the pool. Never raises `available` above the current
    /// capacity, so a `give` that follows a `set_capacity` shrink cannot
    /// resurrect headroom that was just taken away.
    pub fn give(&self, n: u64) {
        if self.uncapped() {
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            state.available = (state.available + n).min(state.capacity);
        }
        self.notify.notify_waiters();
    }

    /// Changes capacity. If lowered below current usage, `available` moves
    /// by the same delta (floored at zero) rather than being recomputed from
    /// scratch, so in-flight usage above the new cap is not forgiven.
    pub fn set_capacity(&self, new_capacity: u64) {
        let mut state = self.state.lock().unwrap();
        let delta = new_capacity as i128 - state.capacity as i128;
        state.available = (state.available as i128 + delta).max(0) as u64;
        state.capacity = new_capacity;
        drop(state);
        self.notify.notify_waiters();
    }

    pub fn available(&self) -> u64 {
        self.state.lock().unwrap().available
    }

    pub fn capacity(&self) -> u64 {
        self.state.lock().unwrap().capacity
    }
}

/// Composes several semaphores into one acquisition: `take` acquires each in
/// order, `give` releases in reverse order. A `None` element is skipped,
/// letting callers build a fixed-shape chain (e.g. per-device, per-folder)
/// where not every level is configured.
#[derive(Default)]
pub struct MultiSemaphore<'a> {
    members: Vec<Option<&'a Semaphore>>,
}

impl<'a> MultiSemaphore<'a> {
    pub fn new(members: Vec<Option<&'a Semaphore>>) -> Self {
        Self { members }
    }

    pub async fn take(&self, n: u64) {
        for member in &self.members {
            if let Some(sem) = member {
                sem.take(n).await;
            }
        }
    }

    pub fn give(&self, n: u64) {
        for member in self.members.iter().rev() {
            if let Some(sem) = member {
                sem.give(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn take_succeeds_immediately_when_capacity_available() {
        let sem = Semaphore::new(10);
        sem.take(4).await;
        assert_eq!(sem.available(), 6);
    }

    #[tokio::test]
    async fn take_blocks_until_give_frees_capacity() {
        let sem = Arc::new(Semaphore::new(2));
        sem.take(2).await;
        let sem2 = sem.clone();
        let waiter = tokio::spawn(async move {
            sem2.take(1).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        sem.give(1);
        tokio::time::timeout(Duration::from_millis(200), waiter).await.unwrap().unwrap();
    }

    #[test]
    fn set_capacity_below_usage_clamps_available_at_zero() {
        let sem = Semaphore::new(10);
        // simulate 8 in use: available starts at 10, we take 8 synchronously
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(sem.take(8));
        assert_eq!(sem.available(), 2);
        sem.set_capacity(1); // delta -9, available = max(0, 2-9) = 0
        assert_eq!(sem.available(), 0);
        assert_eq!(sem.capacity(), 1);
    }

    #[test]
    fn give_never_raises_available_above_capacity() {
        let sem = Semaphore::new(5);
        sem.give(100);
        assert_eq!(sem.available(), 5);
    }

    #[tokio::test]
    async fn zero_capacity_is_an_uncapped_no_op() {
        let sem = Semaphore::new(0);
        sem.take(1_000_000).await;
        assert_eq!(sem.available(), 0);
        sem.give(1);
        assert_eq!(sem.available(), 0);
    }

    #[tokio::test]
    async fn take_with_context_honors_cancellation() {
        let sem = Semaphore::new(1);
        sem.take(1).await;
        let ctx = CancellationToken::new();
        ctx.cancel();
        let acquired = sem.take_with_context(&ctx, 1).await;
        assert!(!acquired);
    }

    #[tokio::test]
    async fn multi_semaphore_acquires_in_order_and_releases_in_reverse() {
        let a = Semaphore::new(5);
        let b = Semaphore::new(5);
        let multi = MultiSemaphore::new(vec![Some(&a), None, Some(&b)]);
        multi.take(2).await;
        assert_eq!(a.available(), 3);
        assert_eq!(b.available(), 3);
        multi.give(2);
        assert_eq!(a.available(), 5);
        assert_eq!(b.available(), 5);
    }
}
