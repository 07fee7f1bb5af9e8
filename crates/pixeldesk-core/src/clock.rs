use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Fixed-cadence source of timestamps. The first tick completes immediately.
pub struct ClockSource<C> {
    clock: C,
    interval: Interval,
}

impl<C: Clock> ClockSource<C> {
    pub fn new(clock: C, period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { clock, interval }
    }

    pub async fn tick(&mut self) -> DateTime<Local> {
        self.interval.tick().await;
        self.clock.now()
    }
}

/// A running clock task. Dropping the handle without calling [`stop`]
/// leaves the task running until the runtime shuts down.
///
/// [`stop`]: ClockHandle::stop
pub struct ClockHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ClockHandle {
    pub async fn stop(self) {
        // The task may already be gone if the runtime is shutting down.
        let _ = self.stop.send(());
        if let Err(err) = self.task.await {
            warn!(error = %err, "clock task ended abnormally");
        }
        debug!("clock stopped");
    }
}

/// Spawns a task that feeds every tick to `on_tick` until stopped.
pub fn spawn_clock<C, F>(clock: C, period: Duration, mut on_tick: F) -> ClockHandle
where
    C: Clock,
    F: FnMut(DateTime<Local>) + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut source = ClockSource::new(clock, period);

    let task = tokio::spawn(async move {
        debug!(period_ms = period.as_millis() as u64, "clock started");
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                now = source.tick() => on_tick(now),
            }
        }
    });

    ClockHandle {
        stop: stop_tx,
        task,
    }
}
