use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::subscription::Subscription;

/// Why a listener was opened. Used to tear down one kind of listener
/// without touching the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionPurpose {
    ConfigChanges,
    Messages,
    NewMessages,
    UserReactions,
    GroupChannels,
}

/// Tracks every listener handle opened on behalf of one channel.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// purpose -> handles opened for it
    handles: Mutex<HashMap<SubscriptionPurpose, Vec<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a clone of `subscription` for later teardown.
    pub fn register(&self, purpose: SubscriptionPurpose, subscription: &Subscription) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = handles.entry(purpose).or_default();
        // Forget handles the caller already detached individually
        entry.retain(Subscription::is_active);
        entry.push(subscription.clone());
    }

    /// Detach every listener registered for `purpose`. Returns how many were
    /// still active.
    pub fn unsubscribe(&self, purpose: SubscriptionPurpose) -> usize {
        let taken = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&purpose)
            .unwrap_or_default();

        detach_all(taken)
    }

    /// Detach every registered listener. Safe to call any number of times.
    pub fn unsubscribe_all(&self) -> usize {
        let taken: Vec<Subscription> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .flat_map(|(_, subs)| subs)
            .collect();

        let detached = detach_all(taken);
        if detached > 0 {
            debug!("Detached {} listener(s)", detached);
        }
        detached
    }

    /// Number of registered handles that are still attached.
    pub fn active_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flatten()
            .filter(|s| s.is_active())
            .count()
    }

    pub fn active_for(&self, purpose: SubscriptionPurpose) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&purpose)
            .map_or(0, |subs| subs.iter().filter(|s| s.is_active()).count())
    }
}

// Runs outside the registry lock so a detach action may touch the registry.
fn detach_all(subs: Vec<Subscription>) -> usize {
    let mut detached = 0;
    for sub in subs {
        if sub.is_active() {
            detached += 1;
        }
        sub.unsubscribe();
    }
    detached
}
