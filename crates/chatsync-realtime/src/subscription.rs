use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Detach = Box<dyn FnOnce() + Send>;

/// Handle to one continuous listener.
///
/// Clones share the same underlying listener. The detach action runs at most
/// once no matter how many times, or from how many clones,
/// [`unsubscribe`](Self::unsubscribe) is called.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Mutex<Option<Detach>>>,
}

impl Subscription {
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(detach)))),
        }
    }

    /// Detach the listener. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        // Take under the lock, run outside it: detach may re-enter.
        let detach = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn detach_runs_once_across_clones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let other = sub.clone();

        assert!(sub.is_active());
        sub.unsubscribe();
        other.unsubscribe();
        sub.unsubscribe();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!other.is_active());
    }

    #[test]
    fn detach_may_unsubscribe_itself() {
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner_slot = slot.clone();
        let sub = Subscription::new(move || {
            if let Some(me) = inner_slot.lock().unwrap().as_ref() {
                me.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub.clone());

        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
