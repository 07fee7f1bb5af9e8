use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::KeyValueStore;

pub const TASKS_KEY: &str = "tasks";

/// A checklist entry. Identity is its position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }
}

/// Ordered checklist. Mutations never reorder surviving entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let tasks: Vec<Task> = serde_json::from_str(raw)?;
        Ok(Self { tasks })
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self.tasks)?)
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.done).count()
    }

    /// Appends an open task unless `text` is blank. The text is kept as given.
    pub fn add(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.tasks.push(Task::new(text));
        true
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            return false;
        };
        task.done = !task.done;
        true
    }

    /// Drops every finished task and returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.done);
        before - self.tasks.len()
    }
}

/// Reads the persisted list. Missing, unreadable or malformed data all yield
/// an empty list.
#[tracing::instrument(skip(store))]
pub async fn load_tasks<S: KeyValueStore>(store: &S) -> TaskList {
    let raw = match store.get(TASKS_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no stored task list");
            return TaskList::new();
        }
        Err(err) => {
            warn!(key = TASKS_KEY, error = %format!("{err:#}"), "failed to read task list; starting empty");
            return TaskList::new();
        }
    };

    match TaskList::from_json(&raw) {
        Ok(list) => {
            debug!(count = list.len(), "loaded task list");
            list
        }
        Err(err) => {
            warn!(key = TASKS_KEY, error = %err, "stored task list is malformed; starting empty");
            TaskList::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskList};

    fn texts(list: &TaskList) -> Vec<&str> {
        list.as_slice().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn add_appends_in_submission_order() {
        let mut list = TaskList::new();
        assert!(list.add("Buy milk"));
        assert!(list.add("Feed cat"));
        assert!(list.add("  Water plants "));

        assert_eq!(texts(&list), vec!["Buy milk", "Feed cat", "  Water plants "]);
        assert!(list.as_slice().iter().all(|t| !t.done));
    }

    #[test]
    fn blank_text_is_ignored() {
        let mut list = TaskList::new();
        assert!(!list.add(""));
        assert!(!list.add("   "));
        assert!(!list.add("\t\n"));
        assert!(list.is_empty());
    }

    #[test]
    fn toggle_flips_exactly_one_entry() {
        let mut list = TaskList::from_tasks(vec![Task::new("a"), Task::new("b"), Task::new("c")]);

        assert!(list.toggle(1));
        let done: Vec<bool> = list.as_slice().iter().map(|t| t.done).collect();
        assert_eq!(done, vec![false, true, false]);

        assert!(list.toggle(1));
        assert_eq!(list.completed_count(), 0);
    }

    #[test]
    fn toggle_out_of_bounds_leaves_list_alone() {
        let mut list = TaskList::from_tasks(vec![Task::new("a")]);
        let before = list.clone();

        assert!(!list.toggle(1));
        assert!(!list.toggle(usize::MAX));
        assert_eq!(list, before);
    }

    #[test]
    fn clear_completed_keeps_survivor_order_and_is_idempotent() {
        let mut list = TaskList::from_tasks(vec![
            Task::new("a"),
            Task { text: "b".into(), done: true },
            Task::new("c"),
            Task { text: "d".into(), done: true },
            Task::new("e"),
        ]);

        assert_eq!(list.clear_completed(), 2);
        assert_eq!(texts(&list), vec!["a", "c", "e"]);

        let once = list.clone();
        assert_eq!(list.clear_completed(), 0);
        assert_eq!(list, once);
    }

    #[test]
    fn json_layout_matches_stored_format() {
        let list = TaskList::from_tasks(vec![
            Task::new("Buy milk"),
            Task { text: "Feed cat".into(), done: true },
        ]);

        let json = list.to_json().expect("serialize");
        assert_eq!(
            json,
            r#"[{"text":"Buy milk","done":false},{"text":"Feed cat","done":true}]"#
        );
        assert_eq!(TaskList::from_json(&json).expect("parse"), list);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(TaskList::from_json("not-json").is_err());
        assert!(TaskList::from_json("null").is_err());
        assert!(TaskList::from_json(r#"[{"text":1}]"#).is_err());
        assert!(TaskList::from_json(r#"[{"done":true}]"#).is_err());
    }

    #[test]
    fn missing_done_flag_reads_as_open() {
        let list = TaskList::from_json(r#"[{"text":"a"},{"text":"b","done":true}]"#).expect("parse");
        assert_eq!(
            list.as_slice(),
            [Task::new("a"), Task { text: "b".into(), done: true }]
        );
    }
}
