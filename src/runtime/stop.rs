/// Cooperative cancellation handles
///
/// Every actor owns a `StopHandle`. Composite actors link the handles of the
/// actors they own or reference, so stopping a parent stops every linked
/// handle before `stop` returns. Besides the flag that actors poll between
/// steps, the handle exposes an awaitable `stopped()` which long-running
/// external calls race against so they can be terminated instead of merely
/// flagged.

use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;

/// Shared, cloneable stop flag with propagation to linked handles
#[derive(Clone, Debug)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug)]
struct StopInner {
    owner: String,
    stopped: AtomicBool,
    message: Mutex<Option<String>>,
    linked: Mutex<Vec<StopHandle>>,
    token: Mutex<CancellationToken>,
}

impl StopHandle {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StopInner {
                owner: owner.into(),
                stopped: AtomicBool::new(false),
                message: Mutex::new(None),
                linked: Mutex::new(Vec::new()),
                token: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Name of the actor this handle belongs to
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// Raise the flag and stop every linked handle before returning
    ///
    /// Only the first call records the message; later calls are no-ops, which
    /// also terminates propagation through cyclic links.
    pub fn stop(&self, message: Option<String>) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.message.lock() = message;
        self.inner.token.lock().cancel();

        // snapshot so a linked handle may link back without deadlocking
        let linked: Vec<StopHandle> = self.inner.linked.lock().clone();
        tracing::debug!("🛑 Stopping '{}' and {} linked handle(s)", self.owner(), linked.len());
        for handle in linked {
            handle.stop(None);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn message(&self) -> Option<String> {
        self.inner.message.lock().clone()
    }

    /// Resolves once the handle has been stopped
    pub async fn stopped(&self) {
        let token = self.inner.token.lock().clone();
        token.cancelled().await;
    }

    /// Propagate future stops of this handle to `other`
    ///
    /// If this handle is already stopped, `other` is stopped right away.
    pub fn link(&self, other: StopHandle) {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        if self.is_stopped() {
            other.stop(None);
        }
        self.inner.linked.lock().push(other);
    }

    /// Clear flag, message and links so the owner can run again
    pub fn reset(&self) {
        self.inner.linked.lock().clear();
        *self.inner.message.lock() = None;
        *self.inner.token.lock() = CancellationToken::new();
        self.inner.stopped.store(false, Ordering::SeqCst);
    }

    /// Drop all links without touching the flag
    pub fn unlink_all(&self) {
        self.inner.linked.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stop_reaches_linked_handles_before_returning() {
        let parent = StopHandle::new("parent");
        let child = StopHandle::new("child");
        let grandchild = StopHandle::new("grandchild");
        parent.link(child.clone());
        child.link(grandchild.clone());

        parent.stop(Some("halt".into()));

        assert!(child.is_stopped());
        assert!(grandchild.is_stopped());
        assert_eq!(parent.message().as_deref(), Some("halt"));
        assert_eq!(child.message(), None);
    }

    #[test]
    fn cyclic_links_terminate() {
        let a = StopHandle::new("a");
        let b = StopHandle::new("b");
        a.link(b.clone());
        b.link(a.clone());
        a.stop(None);
        assert!(a.is_stopped() && b.is_stopped());
    }

    #[test]
    fn reset_makes_handle_reusable() {
        let h = StopHandle::new("h");
        let other = StopHandle::new("other");
        h.link(other.clone());
        h.stop(Some("first".into()));
        h.reset();
        other.reset();
        assert!(!h.is_stopped());
        assert_eq!(h.message(), None);

        // the old link is gone
        h.stop(None);
        assert!(!other.is_stopped());
    }

    #[tokio::test]
    async fn stopped_future_resolves_after_stop() {
        let h = StopHandle::new("h");
        let waiter = {
            let h = h.clone();
            tokio::spawn(async move { h.stopped().await })
        };
        h.stop(None);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stopped() did not resolve")
            .unwrap();
    }

    #[test]
    fn linking_to_stopped_handle_stops_immediately() {
        let parent = StopHandle::new("parent");
        parent.stop(None);
        let child = StopHandle::new("child");
        parent.link(child.clone());
        assert!(child.is_stopped());
    }
}
