use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::WakeEvent;
use crate::tracing::prelude::*;

const EVENT_QUEUE_DEPTH: usize = 8;

#[derive(Debug)]
struct Slot {
    generation: u64,
    tx: Option<mpsc::Sender<WakeEvent>>,
}

/// The delivery end of wake events.
///
/// Holds at most one subscriber. Subscribing again replaces the previous
/// subscriber, whose receiver then sees the channel close.
#[derive(Debug, Clone)]
pub struct WakeListener {
    slot: Arc<Mutex<Slot>>,
}

impl Default for WakeListener {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeListener {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                tx: None,
            })),
        }
    }

    /// Register a subscriber. Events are delivered to it until the
    /// returned guard is dropped.
    pub fn subscribe(&self) -> WakeSubscription {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.tx = Some(tx);

        WakeSubscription {
            rx,
            generation: slot.generation,
            slot: self.slot.clone(),
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot.lock().tx.is_some()
    }

    /// Deliver an event to the current subscriber.
    ///
    /// Returns `false` if there is no subscriber or it went away; the
    /// event is dropped in that case.
    pub async fn deliver(&self, event: WakeEvent) -> bool {
        let tx = self.slot.lock().tx.clone();
        match tx {
            Some(tx) => match tx.send(event).await {
                Ok(()) => true,
                Err(_) => {
                    debug!(?event, "Wake subscriber went away, event dropped");
                    false
                }
            },
            None => {
                warn!(?event, "No wake subscriber, event dropped");
                false
            }
        }
    }
}

/// A registered receiver of wake events.
///
/// Dropping the subscription unregisters it.
#[derive(Debug)]
pub struct WakeSubscription {
    rx: mpsc::Receiver<WakeEvent>,
    generation: u64,
    slot: Arc<Mutex<Slot>>,
}

impl WakeSubscription {
    /// Wait for the next event. Returns `None` once this subscription has
    /// been replaced by a newer one.
    pub async fn recv(&mut self) -> Option<WakeEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<WakeEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for WakeSubscription {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.generation == self.generation {
            slot.tx = None;
        }
    }
}
