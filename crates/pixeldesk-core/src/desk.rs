//! The state owner for appearance settings and the task list.
//!
//! Every mutator updates memory first, then schedules a store write and
//! returns without waiting for it (write-through). Writes are not ordered
//! against each other; a later write to the same key may land before an
//! earlier one. Writes run on the runtime that loaded the state, so mutators
//! may be called from any thread.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::settings::{self, AppearanceKind, AppearanceSettings, Catalog};
use crate::store::KeyValueStore;
use crate::tasks::{self, TASKS_KEY, TaskList};

/// Dropping the state aborts writes still in flight; call [`DeskState::flush`]
/// or detach them with [`DeskState::take_pending_writes`] first.
pub struct DeskState<S> {
    store: Arc<S>,
    catalog: Catalog,
    settings: AppearanceSettings,
    tasks: TaskList,
    runtime: Handle,
    writes: JoinSet<()>,
}

/// Store writes detached from their owner, so they can be awaited without
/// holding any lock on it.
#[derive(Default)]
pub struct PendingWrites {
    writes: JoinSet<()>,
}

impl PendingWrites {
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub async fn wait(mut self) {
        while let Some(result) = self.writes.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "store write task failed");
            }
        }
    }
}

impl<S: KeyValueStore> DeskState<S> {
    /// Reads the task list, then the background index, then the color index.
    /// Read failures fall back to defaults; nothing is written.
    #[tracing::instrument(skip_all)]
    pub async fn load(store: Arc<S>, catalog: Catalog) -> Self {
        let tasks = tasks::load_tasks(store.as_ref()).await;
        let settings = settings::load_settings(store.as_ref(), &catalog).await;

        info!(
            tasks = tasks.len(),
            background = settings.background_index,
            color = settings.color_index,
            "desk state loaded"
        );

        Self {
            store,
            catalog,
            settings,
            tasks,
            runtime: Handle::current(),
            writes: JoinSet::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> AppearanceSettings {
        self.settings
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn set_background(&mut self, index: usize) -> anyhow::Result<()> {
        self.set_appearance(AppearanceKind::Background, index)
    }

    pub fn set_color(&mut self, index: usize) -> anyhow::Result<()> {
        self.set_appearance(AppearanceKind::Color, index)
    }

    /// Schedules exactly one write of the changed field, even when the index
    /// equals the current one.
    #[tracing::instrument(skip(self))]
    pub fn set_appearance(&mut self, kind: AppearanceKind, index: usize) -> anyhow::Result<()> {
        self.catalog.check_index(kind, index)?;
        self.settings.set_index(kind, index);
        debug!(%kind, index, "appearance updated");
        self.schedule_write(kind.storage_key(), index.to_string());
        Ok(())
    }

    #[tracing::instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub fn add_task(&mut self, text: &str) -> bool {
        if !self.tasks.add(text) {
            debug!("ignoring blank task text");
            return false;
        }
        self.persist_tasks();
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_task(&mut self, index: usize) -> bool {
        if !self.tasks.toggle(index) {
            debug!(len = self.tasks.len(), "toggle index out of range; ignoring");
            return false;
        }
        self.persist_tasks();
        true
    }

    /// Always rewrites the list, even when nothing was removed.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let removed = self.tasks.clear_completed();
        info!(removed, remaining = self.tasks.len(), "cleared completed tasks");
        self.persist_tasks();
        removed
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn take_pending_writes(&mut self) -> PendingWrites {
        PendingWrites {
            writes: std::mem::take(&mut self.writes),
        }
    }

    /// Waits for every write scheduled so far.
    pub async fn flush(&mut self) {
        self.take_pending_writes().wait().await;
    }

    fn persist_tasks(&mut self) {
        match self.tasks.to_json() {
            Ok(json) => self.schedule_write(TASKS_KEY, json),
            Err(err) => warn!(error = %err, "failed to serialize task list; not persisted"),
        }
    }

    fn schedule_write(&mut self, key: &'static str, value: String) {
        self.reap_finished_writes();

        let store = Arc::clone(&self.store);
        self.writes.spawn_on(
            async move {
                match store.set(key, &value).await {
                    Ok(()) => debug!(key, bytes = value.len(), "persisted value"),
                    Err(err) => warn!(
                        key,
                        error = %format!("{err:#}"),
                        "failed to persist value; in-memory state stays current"
                    ),
                }
            },
            &self.runtime,
        );
    }

    fn reap_finished_writes(&mut self) {
        while let Some(result) = self.writes.try_join_next() {
            if let Err(err) = result {
                warn!(error = %err, "store write task failed");
            }
        }
    }
}
