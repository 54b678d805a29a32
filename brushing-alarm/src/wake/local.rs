use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use slotmap::SlotMap;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{WakeEvent, WakeHandle, WakeListener, WakeService, WakeSubscription};
use crate::clock::Clock;
use crate::playback::{PlaybackError, Player};
use crate::tracing::prelude::*;

/// Longest the timer sleeps without looking at the wall clock again.
const CLOCK_CHECK_INTERVAL: Duration = Duration::from_secs(30);

type Timers = Arc<Mutex<SlotMap<WakeHandle, CancellationToken>>>;

/// In-process wake service backed by tokio timers.
///
/// A signal fires when either the monotonic delay measured at arm time
/// has elapsed or the wall clock reaches the target, whichever is first.
/// The wall clock is re-read at least every [`CLOCK_CHECK_INTERVAL`], so
/// a clock step or a resumed host fires an overdue signal promptly.
/// Signals only fire while the process is running.
pub struct LocalWakeService<C, P> {
    clock: Arc<C>,
    player: P,
    timers: Timers,
    listener: WakeListener,
}

impl<C: Clock + 'static, P: Player> LocalWakeService<C, P> {
    pub fn new(clock: C, player: P) -> Self {
        Self {
            clock: Arc::new(clock),
            player,
            timers: Arc::new(Mutex::new(SlotMap::with_key())),
            listener: WakeListener::new(),
        }
    }

    /// Register for wake events. See [`WakeListener::subscribe`].
    pub fn subscribe(&self) -> WakeSubscription {
        self.listener.subscribe()
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Number of armed signals that have neither fired nor been disarmed.
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

fn delay_until(clock: &impl Clock, at: OffsetDateTime) -> Duration {
    Duration::try_from(at - clock.now()).unwrap_or(Duration::ZERO)
}

/// Wait until `at` by the wall clock or until `deadline`, whichever comes
/// first. Returns `false` if `token` is cancelled before then.
async fn wait_until<C: Clock>(
    clock: &C,
    at: OffsetDateTime,
    deadline: Instant,
    token: &CancellationToken,
) -> bool {
    loop {
        let remaining = delay_until(clock, at)
            .min(deadline.saturating_duration_since(Instant::now()));
        if remaining.is_zero() {
            return true;
        }

        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(remaining.min(CLOCK_CHECK_INTERVAL)) => {}
        }
    }
}

#[async_trait]
impl<C: Clock + 'static, P: Player> WakeService for LocalWakeService<C, P> {
    async fn arm(&mut self, at: OffsetDateTime) -> Result<WakeHandle, PlaybackError> {
        let delay = delay_until(self.clock.as_ref(), at);
        let deadline = Instant::now() + delay;
        let token = CancellationToken::new();
        let handle = self.timers.lock().insert(token.clone());

        let clock = self.clock.clone();
        let timers = self.timers.clone();
        let listener = self.listener.clone();
        tokio::spawn(async move {
            if !wait_until(clock.as_ref(), at, deadline, &token).await {
                return;
            }

            // Whoever removes the entry owns the signal. If disarm got
            // there first, nothing is delivered.
            let due = timers.lock().remove(handle).is_some();
            if due {
                debug!(?handle, "Wake timer fired");
                listener.deliver(WakeEvent::Fired(handle)).await;
            }
        });

        debug!(?handle, %at, delay_ms = delay.as_millis() as u64, "Wake timer armed");
        Ok(handle)
    }

    async fn disarm(&mut self, handle: WakeHandle) -> Result<(), PlaybackError> {
        let removed = self.timers.lock().remove(handle);
        match removed {
            Some(token) => {
                token.cancel();
                debug!(?handle, "Wake timer disarmed");
            }
            None => debug!(?handle, "Wake timer already fired or unknown"),
        }
        Ok(())
    }

    async fn start_playback(&mut self) -> Result<(), PlaybackError> {
        self.player.start()
    }

    async fn stop_playback(&mut self) -> Result<(), PlaybackError> {
        self.player.stop()
    }
}

impl<C, P> Drop for LocalWakeService<C, P> {
    fn drop(&mut self) {
        for (_, token) in self.timers.lock().drain() {
            token.cancel();
        }
    }
}
