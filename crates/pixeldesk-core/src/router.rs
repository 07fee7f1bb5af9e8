use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, ClockHandle, SystemClock, spawn_clock};
use crate::desk::DeskState;
use crate::settings::{AppearanceKind, AppearanceSettings, Catalog};
use crate::store::KeyValueStore;
use crate::tasks::Task;

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub settings: AppearanceSettings,
    pub now: DateTime<Local>,
}

/// Entry point for the presentation layer: user intents in, snapshots out.
///
/// Intent handlers take the state lock for the whole mutation, so they are
/// applied one at a time no matter how many threads call in.
pub struct Dashboard<S> {
    state: Mutex<DeskState<S>>,
    catalog: Catalog,
    snapshot: Arc<watch::Sender<Snapshot>>,
    clock: Mutex<Option<ClockHandle>>,
}

impl<S: KeyValueStore> Dashboard<S> {
    pub async fn start(store: Arc<S>, catalog: Catalog, tick: Duration) -> Self {
        Self::start_with_clock(store, catalog, SystemClock, tick).await
    }

    #[instrument(skip(store, catalog, clock))]
    pub async fn start_with_clock<C: Clock>(
        store: Arc<S>,
        catalog: Catalog,
        clock: C,
        tick: Duration,
    ) -> Self {
        let state = DeskState::load(store, catalog.clone()).await;
        let (tx, _rx) = watch::channel(Snapshot {
            tasks: state.tasks().as_slice().to_vec(),
            settings: state.settings(),
            now: clock.now(),
        });
        let snapshot = Arc::new(tx);

        let ticker = Arc::clone(&snapshot);
        let handle = spawn_clock(clock, tick, move |now| {
            ticker.send_modify(|snap| snap.now = now);
        });

        info!(tick_ms = tick.as_millis() as u64, "dashboard started");
        Self {
            state: Mutex::new(state),
            catalog,
            snapshot,
            clock: Mutex::new(Some(handle)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns false and leaves state untouched for an unknown option.
    #[instrument(skip(self))]
    pub fn on_appearance_pick(&self, kind: AppearanceKind, index: usize) -> bool {
        let mut state = self.state.lock();
        if let Err(err) = state.set_appearance(kind, index) {
            warn!(error = %err, "ignoring appearance pick");
            return false;
        }
        self.publish(&state);
        true
    }

    #[instrument(skip(self, text))]
    pub fn on_task_submit(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        let added = state.add_task(text);
        if added {
            self.publish(&state);
        }
        added
    }

    #[instrument(skip(self))]
    pub fn on_task_toggle(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        let toggled = state.toggle_task(index);
        if toggled {
            self.publish(&state);
        }
        toggled
    }

    #[instrument(skip(self))]
    pub fn on_clear_completed(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.clear_completed();
        if removed > 0 {
            self.publish(&state);
        }
        removed
    }

    /// Stops the clock and waits for outstanding store writes. Later calls
    /// only wait for writes.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let clock = self.clock.lock().take();
        if let Some(handle) = clock {
            handle.stop().await;
        }

        let pending = self.state.lock().take_pending_writes();
        debug!(pending = pending.len(), "waiting for store writes");
        pending.wait().await;
        info!("dashboard shut down");
    }

    fn publish(&self, state: &DeskState<S>) {
        let tasks = state.tasks().as_slice().to_vec();
        let settings = state.settings();
        self.snapshot.send_modify(|snap| {
            snap.tasks = tasks;
            snap.settings = settings;
        });
    }
}
