use crate::task::{Status, Task, now};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Error type for TaskRepository operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Task {0} not found")]
    TaskNotFound(u32),
    #[error("no task ids left: the highest id is already {}", u32::MAX)]
    IdsExhausted,
}

/// The full ordered collection of tasks, in insertion order.
///
/// This is exactly the document stored on disk: `{"tasks": [...]}`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(try_from = "TaskDocument")]
pub struct TaskRepository {
    tasks: Vec<Task>,
}

/// Raw shape of the task file, checked before it becomes a repository.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskDocument {
    tasks: Vec<Task>,
}

impl TryFrom<TaskDocument> for TaskRepository {
    type Error = String;

    fn try_from(document: TaskDocument) -> Result<Self, Self::Error> {
        let mut seen = HashSet::with_capacity(document.tasks.len());
        for task in &document.tasks {
            if task.id() == 0 {
                return Err("task ids must be positive, found 0".to_string());
            }
            if !seen.insert(task.id()) {
                return Err(format!("task id {} appears more than once", task.id()));
            }
        }
        Ok(Self {
            tasks: document.tasks,
        })
    }
}

impl TaskRepository {
    pub fn new() -> Self {
        Self { tasks: vec![] }
    }

    pub fn new_from_json(json: &str) -> serde_json::Result<Self> {
        Self::new_from_slice(json.as_bytes())
    }

    /// Parses raw file contents; bytes that are not UTF-8 fail like any other malformed JSON.
    pub fn new_from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn save_as_json(&self, writer: impl std::io::Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, &self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The id the next added task receives: highest current id plus one.
    pub fn next_id(&self) -> Result<u32, RepositoryError> {
        self.tasks
            .iter()
            .map(Task::id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(RepositoryError::IdsExhausted)
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Appends a new `todo` task and returns its id.
    pub fn add(&mut self, description: String) -> Result<u32, RepositoryError> {
        self.add_at(description, now())
    }

    pub fn update(&mut self, id: u32, description: String) -> Result<&Task, RepositoryError> {
        self.update_at(id, description, now())
    }

    pub fn set_status(&mut self, id: u32, status: Status) -> Result<&Task, RepositoryError> {
        self.set_status_at(id, status, now())
    }

    /// Removes the task and hands it back to the caller.
    pub fn delete(&mut self, id: u32) -> Result<Task, RepositoryError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id() == id)
            .ok_or(RepositoryError::TaskNotFound(id))?;
        Ok(self.tasks.remove(index))
    }

    /// Tasks in insertion order, optionally only those with the given status.
    ///
    /// The iterator is lazy and can be cloned to walk the collection again.
    pub fn list(&self, filter: Option<Status>) -> impl Iterator<Item = &Task> + Clone {
        self.tasks
            .iter()
            .filter(move |task| filter.is_none_or(|status| task.status() == status))
    }

    pub(crate) fn add_at(
        &mut self,
        description: String,
        now: NaiveDateTime,
    ) -> Result<u32, RepositoryError> {
        let id = self.next_id()?;
        self.tasks.push(Task::new(id, description, now));
        Ok(id)
    }

    pub(crate) fn update_at(
        &mut self,
        id: u32,
        description: String,
        now: NaiveDateTime,
    ) -> Result<&Task, RepositoryError> {
        let task = self.find_by_id_mut(id)?;
        task.set_description(description, now);
        Ok(&*task)
    }

    pub(crate) fn set_status_at(
        &mut self,
        id: u32,
        status: Status,
        now: NaiveDateTime,
    ) -> Result<&Task, RepositoryError> {
        let task = self.find_by_id_mut(id)?;
        task.set_status(status, now);
        Ok(&*task)
    }

    fn find_by_id_mut(&mut self, id: u32) -> Result<&mut Task, RepositoryError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id() == id)
            .ok_or(RepositoryError::TaskNotFound(id))
    }
}
