//! Start, stop and the heartbeat loop.
//!
//! ```text
//! Stopped ──start()──→ Starting ──loop acknowledged──→ Running
//!    ↑                      │ stop() requested              │
//!    │                      ↓                               │
//!    └────── loop exited ←── Stopping ←──stop()─────────────┘
//! ```
//!
//! Exactly one caller moves the runtime to `Stopping` and finishes the
//! shutdown; every other `stop()` waits for it.

use super::runtime::{Counters, PublisherRuntime, RuntimeState, RuntimeStatus};
use crate::domain::errors::PublisherError;
use crate::ports::outbound::StoreError;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// What a `stop()` call has to do once it has looked at the status.
enum StopAction {
    /// Nothing is running.
    Ignore,
    /// This call owns the shutdown.
    Shutdown(Option<oneshot::Receiver<()>>),
    /// Another call owns the shutdown; wait for it.
    Wait(oneshot::Receiver<()>),
}

impl PublisherRuntime {
    /// Start the runtime.
    ///
    /// Restores stored nodes, starts the heartbeat, subscribes to inbound
    /// control messages and publishes the identity and every discovery
    /// item once. Does nothing unless the runtime is stopped. A `stop()`
    /// that arrives while starting is honoured before this returns.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn start(&self) -> Result<(), PublisherError> {
        {
            let mut state = self.inner.state.lock();
            if state.status != RuntimeStatus::Stopped {
                debug!(status = ?state.status, "Start ignored, runtime is not stopped");
                return Ok(());
            }
            state.status = RuntimeStatus::Starting;
            state.stop_requested = false;
        }
        info!(publisher = %self.publisher_id(), "Starting publisher runtime");

        self.restore_nodes();

        let (started_tx, started_rx) = oneshot::channel();
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let runtime = self.clone();
        tokio::spawn(async move { runtime.heartbeat_loop(started_tx, stopped_tx).await });

        if started_rx.await.is_err() {
            self.finish_shutdown(None, false).await;
            return Err(PublisherError::LoopStartFailed);
        }
        self.inner.state.lock().loop_stopped = Some(stopped_rx);

        if let Err(error) = self.subscribe_inbound() {
            warn!(error = %error, "Subscription failed, aborting start");
            let stopped = begin_shutdown(&mut self.inner.state.lock());
            self.finish_shutdown(stopped, false).await;
            return Err(error);
        }

        self.announce();

        let interrupted = {
            let mut state = self.inner.state.lock();
            if state.stop_requested {
                Some(begin_shutdown(&mut state))
            } else {
                state.status = RuntimeStatus::Running;
                None
            }
        };
        if let Some(stopped) = interrupted {
            info!(publisher = %self.publisher_id(), "Stop requested while starting");
            self.finish_shutdown(stopped, true).await;
            return Ok(());
        }

        info!(
            publisher = %self.publisher_id(),
            heartbeat_ms = self.config().heartbeat_period.as_millis() as u64,
            "Publisher runtime running"
        );
        Ok(())
    }

    /// Stop the runtime and wait for the heartbeat loop to exit.
    ///
    /// Unsubscribes from the bus and saves the node snapshot. On a runtime
    /// that is starting or already stopping, waits until it is stopped.
    /// On a stopped runtime it does nothing.
    pub async fn stop(&self) {
        let action = {
            let mut state = self.inner.state.lock();
            match state.status {
                RuntimeStatus::Stopped => StopAction::Ignore,
                RuntimeStatus::Running => StopAction::Shutdown(begin_shutdown(&mut state)),
                RuntimeStatus::Starting | RuntimeStatus::Stopping => {
                    let (done_tx, done_rx) = oneshot::channel();
                    state.stop_requested = true;
                    state.stop_waiters.push(done_tx);
                    StopAction::Wait(done_rx)
                }
            }
        };

        match action {
            StopAction::Ignore => debug!("Stop ignored, runtime is stopped"),
            StopAction::Wait(done) => {
                debug!("Stop waiting for the runtime to settle");
                if done.await.is_err() {
                    warn!("Runtime dropped before stop completed");
                }
            }
            StopAction::Shutdown(stopped) => {
                info!(publisher = %self.publisher_id(), "Stopping publisher runtime");
                self.finish_shutdown(stopped, true).await;
                info!(publisher = %self.publisher_id(), "Publisher runtime stopped");
            }
        }
    }

    /// Second half of a shutdown started with `begin_shutdown`: wait for the
    /// loop, drop the subscriptions and wake any waiting `stop()` calls.
    async fn finish_shutdown(&self, stopped: Option<oneshot::Receiver<()>>, save: bool) {
        if let Some(stopped) = stopped {
            if stopped.await.is_err() {
                warn!("Heartbeat loop ended without acknowledging stop");
            }
        }
        self.unsubscribe_inbound();
        if save {
            self.save_nodes();
        }

        let waiters = {
            let mut state = self.inner.state.lock();
            state.status = RuntimeStatus::Stopped;
            state.stop_requested = false;
            std::mem::take(&mut state.stop_waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Mark the identity and every discovery item pending and publish them
    /// now. Returns the number of frames published.
    pub fn announce(&self) -> usize {
        self.inner.state.lock().registry.mark_all_pending();
        self.publish_updates()
    }

    fn restore_nodes(&self) {
        let Some(store) = &self.inner.node_store else {
            return;
        };
        match store.load_nodes(self.publisher_id()) {
            Ok(nodes) => {
                let count = nodes.len();
                self.inner.state.lock().registry.restore_nodes(nodes);
                info!(nodes = count, "Restored node snapshot");
            }
            Err(StoreError::NotFound(_)) => debug!("No stored node snapshot"),
            Err(error) => warn!(error = %error, "Failed to load node snapshot"),
        }
    }

    async fn heartbeat_loop(self, started: oneshot::Sender<()>, stopped: oneshot::Sender<()>) {
        let mut ticker = tokio::time::interval(self.config().heartbeat_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if started.send(()).is_err() {
            return;
        }
        debug!(publisher = %self.publisher_id(), "Heartbeat loop started");

        loop {
            ticker.tick().await;
            self.tick().await;
            if matches!(self.status(), RuntimeStatus::Stopping | RuntimeStatus::Stopped) {
                break;
            }
        }

        debug!(publisher = %self.publisher_id(), "Heartbeat loop exited");
        let _ = stopped.send(());
    }

    /// One heartbeat: discovery, then poll, then publication of everything
    /// pending.
    pub(crate) async fn tick(&self) {
        let (discover, poll, hooks) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let discover = count_down(&mut state.discovery_countdown, state.discovery_interval);
            let poll = count_down(&mut state.poll_countdown, state.poll_interval);
            if discover {
                state.registry.mark_all_pending();
            }
            (discover, poll, state.hooks.clone())
        };
        let counters = &self.inner.counters;

        if discover {
            Counters::bump(&counters.discoveries);
            if let Some(hook) = hooks.on_discovery {
                let runtime = self.clone();
                // not awaited: discovery may take longer than a tick
                drop(tokio::task::spawn_blocking(move || hook(&runtime)));
            }
        }

        if poll {
            if let Some(hook) = hooks.on_poll {
                let runtime = self.clone();
                if let Err(error) = tokio::task::spawn_blocking(move || hook(&runtime)).await {
                    warn!(error = %error, "Poll hook failed");
                }
            }
            Counters::bump(&counters.polls);
        }

        let published = self.publish_updates();
        Counters::bump(&counters.ticks);
        trace!(discover, poll, published, "Tick complete");
    }
}

/// Move to `Stopping` and take the loop's exit signal, under the caller's
/// lock so only one caller owns the shutdown.
fn begin_shutdown(state: &mut RuntimeState) -> Option<oneshot::Receiver<()>> {
    state.status = RuntimeStatus::Stopping;
    state.loop_stopped.take()
}

/// Decrement `counter`; on reaching zero reset it to `interval` and fire.
fn count_down(counter: &mut u32, interval: u32) -> bool {
    *counter = counter.saturating_sub(1);
    if *counter == 0 {
        *counter = interval;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::count_down;

    #[test]
    fn test_count_down_fires_every_interval() {
        let mut counter = 1;
        let fired: Vec<bool> = (0..7).map(|_| count_down(&mut counter, 3)).collect();
        assert_eq!(fired, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_count_down_interval_one_always_fires() {
        let mut counter = 1;
        assert!((0..5).all(|_| count_down(&mut counter, 1)));
    }
}
