//! Inbound listener slot and cancellation tokens

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;

// ----------------------------------------------------------------------------
// Listener Slot
// ----------------------------------------------------------------------------

/// Holds at most one inbound listener
///
/// Installing a listener replaces the previous one. Each installation hands
/// back a [`Subscription`] that can only detach the listener it installed.
pub struct ListenerSlot<T> {
    inner: Arc<Mutex<SlotState<T>>>,
}

struct SlotState<T> {
    generation: u64,
    listener: Option<(u64, mpsc::UnboundedSender<T>)>,
}

fn lock<T>(mutex: &Mutex<SlotState<T>>) -> MutexGuard<'_, SlotState<T>> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T: Send + 'static> ListenerSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotState {
                generation: 0,
                listener: None,
            })),
        }
    }

    /// Install `listener`, dropping any previous one
    pub fn install(&self, listener: mpsc::UnboundedSender<T>) -> Subscription {
        let generation = {
            let mut state = lock(&self.inner);
            state.generation += 1;
            let generation = state.generation;
            state.listener = Some((generation, listener));
            generation
        };

        let slot: Weak<Mutex<SlotState<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(slot) = slot.upgrade() {
                let mut state = lock(&slot);
                if matches!(&state.listener, Some((current, _)) if *current == generation) {
                    state.listener = None;
                }
            }
        })
    }

    /// Deliver an item to the active listener
    ///
    /// Returns `false` when no listener is installed or it has gone away.
    pub fn emit(&self, item: T) -> bool {
        let mut state = lock(&self.inner);
        let delivered = match &state.listener {
            Some((_, sender)) => sender.send(item).is_ok(),
            None => return false,
        };
        if !delivered {
            state.listener = None;
        }
        delivered
    }

    /// Drop the active listener regardless of who installed it
    pub fn clear(&self) {
        lock(&self.inner).listener = None;
    }

    pub fn is_active(&self) -> bool {
        lock(&self.inner).listener.is_some()
    }
}

impl<T: Send + 'static> Default for ListenerSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the same slot
impl<T> Clone for ListenerSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Subscription Token
// ----------------------------------------------------------------------------

/// Cancel token for an inbound subscription
///
/// `cancel` is idempotent; dropping the token cancels it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Token with nothing to detach
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Detach the listener this token installed
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_replaces_previous_listener() {
        let slot = ListenerSlot::new();
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();

        let _first = slot.install(first_tx);
        let _second = slot.install(second_tx);
        assert!(slot.emit(7u32));

        assert_eq!(second_rx.try_recv().ok(), Some(7));
        // The replaced listener's sender was dropped with nothing delivered
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_token_does_not_detach_replacement() {
        let slot = ListenerSlot::new();
        let (first_tx, _first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();

        let mut first = slot.install(first_tx);
        let _second = slot.install(second_tx);
        first.cancel();

        assert!(slot.is_active());
        assert!(slot.emit(1u32));
        assert_eq!(second_rx.try_recv().ok(), Some(1));
    }

    #[test]
    fn test_cancel_is_idempotent_and_closes_channel() {
        let slot = ListenerSlot::<u32>::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscription = slot.install(tx);

        subscription.cancel();
        subscription.cancel();

        assert!(subscription.is_cancelled());
        assert!(!slot.is_active());
        assert!(!slot.emit(3));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_drop_cancels() {
        let slot = ListenerSlot::<u32>::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        drop(slot.install(tx));
        assert!(!slot.is_active());
    }
}
