//! Event broker connecting the protocol interpreter to waiting actions.
//!
//! Actions register interest in a `(kind, id)` pair and receive exactly one
//! matching event. Registrations are single-use and single-owner: a second
//! `wait_for` on the same key displaces the first, and dropping the returned
//! future removes the registration. The interpreter side never blocks on a
//! slow or abandoned consumer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use warptty_core::event::{Event, EventId, EventKind};

type WaitKey = (EventKind, EventId);

struct Slot {
    token: u64,
    tx: oneshot::Sender<Event>,
}

#[derive(Default)]
struct BrokerState {
    next_token: u64,
    slots: HashMap<WaitKey, Slot>,
    subs: HashMap<EventKind, Vec<mpsc::UnboundedSender<Event>>>,
}

/// Shared handle to the registration table.
#[derive(Clone, Default)]
pub struct Broker {
    state: Arc<Mutex<BrokerState>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for the next event matching `(kind, id)`.
    ///
    /// The registration exists as soon as this returns, so callers can arm
    /// a wait before sending the keystrokes that will trigger the event.
    /// The future resolves `None` if the registration is displaced.
    pub fn wait_for(&self, kind: EventKind, id: EventId) -> EventWait {
        let (tx, rx) = oneshot::channel();
        let key = (kind, id);
        let token = {
            let mut state = self.state.lock().expect("mutex poisoned");
            let token = state.next_token;
            state.next_token += 1;
            // Displacing an existing slot drops its sender, which resolves
            // the old waiter as cancelled.
            state.slots.insert(key, Slot { token, tx });
            token
        };
        EventWait {
            rx,
            key,
            token,
            state: Arc::clone(&self.state),
            finished: false,
        }
    }

    /// Deliver an event to the exact-id waiter, the wildcard waiter, and
    /// all subscribers of its kind.
    pub fn publish(&self, event: &Event) {
        let (targets, subs) = {
            let mut state = self.state.lock().expect("mutex poisoned");
            let mut targets = Vec::new();
            if event.id != EventId::Any {
                if let Some(slot) = state.slots.remove(&(event.kind, event.id)) {
                    targets.push(slot.tx);
                }
            }
            if let Some(slot) = state.slots.remove(&(event.kind, EventId::Any)) {
                targets.push(slot.tx);
            }
            let subs = state.subs.get(&event.kind).cloned().unwrap_or_default();
            (targets, subs)
        };

        // Sends happen outside the lock. A oneshot send to a dropped
        // receiver is a no-op, never a stall.
        for tx in targets {
            let _ = tx.send(event.clone());
        }

        let mut pruned = false;
        for tx in &subs {
            if tx.send(event.clone()).is_err() {
                pruned = true;
            }
        }
        if pruned {
            let mut state = self.state.lock().expect("mutex poisoned");
            if let Some(senders) = state.subs.get_mut(&event.kind) {
                senders.retain(|tx| !tx.is_closed());
            }
        }
    }

    /// Open a persistent stream of every event of `kind`.
    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().expect("mutex poisoned");
        state.subs.entry(kind).or_default().push(tx);
        rx
    }

    /// The keys currently registered, for operator diagnostics.
    pub fn waits(&self) -> Vec<WaitKey> {
        let state = self.state.lock().expect("mutex poisoned");
        let mut keys: Vec<_> = state.slots.keys().copied().collect();
        keys.sort_by_key(|k| format!("{:?}", k));
        keys
    }
}

/// A pending registration. Resolves to the delivered event, or `None` if
/// the registration was displaced. Dropping it deregisters.
pub struct EventWait {
    rx: oneshot::Receiver<Event>,
    key: WaitKey,
    token: u64,
    state: Arc<Mutex<BrokerState>>,
    finished: bool,
}

impl Future for EventWait {
    type Output = Option<Event>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(event)) => {
                self.finished = true;
                Poll::Ready(Some(event))
            }
            Poll::Ready(Err(_)) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventWait {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.state.lock().expect("mutex poisoned");
        // Remove only our own registration; a newer waiter on the same key
        // owns the slot now.
        let ours = state.slots.get(&self.key).map(|s| s.token) == Some(self.token);
        if ours {
            state.slots.remove(&self.key);
        }
    }
}
