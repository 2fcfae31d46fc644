use crate::repository::{RepositoryError, TaskRepository};
use crate::task::{Status, Task};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Error type for TaskStore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// The file exists but is not a task document this tool understands.
    #[error("task file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot read task file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write task file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// File-backed task collection.
///
/// Every operation is one complete load, mutate, save cycle; nothing is kept
/// open between calls. There is no locking: two processes writing the same
/// file at the same time can lose each other's changes.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the task file. A missing file is an empty repository.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<TaskRepository, StoreError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("task file does not exist yet, starting empty");
                return Ok(TaskRepository::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let repository =
            TaskRepository::new_from_slice(&contents).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!(tasks = repository.len(), "loaded tasks");
        Ok(repository)
    }

    /// Overwrites the task file with the whole repository.
    #[tracing::instrument(skip(self, repository), fields(path = %self.path.display()))]
    pub fn save(&self, repository: &TaskRepository) -> Result<(), StoreError> {
        let write_error = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&self.path).map_err(write_error)?);
        repository
            .save_as_json(&mut writer)
            .map_err(io::Error::from)
            .map_err(write_error)?;
        writer.write_all(b"\n").map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        debug!(tasks = repository.len(), "saved tasks");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn add(&self, description: String) -> Result<u32, StoreError> {
        let mut repository = self.load()?;
        let id = repository.add(description).inspect_err(|err| warn!("{err}"))?;
        self.save(&repository)?;
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn update(&self, id: u32, description: String) -> Result<Task, StoreError> {
        self.mutate(|repository| repository.update(id, description).cloned())
    }

    #[tracing::instrument(skip(self))]
    pub fn set_status(&self, id: u32, status: Status) -> Result<Task, StoreError> {
        self.mutate(|repository| repository.set_status(id, status).cloned())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: u32) -> Result<Task, StoreError> {
        self.mutate(|repository| repository.delete(id))
    }

    /// Tasks in file order, optionally filtered by status. Never writes.
    #[tracing::instrument(skip(self))]
    pub fn list(&self, filter: Option<Status>) -> Result<Vec<Task>, StoreError> {
        let repository = self.load()?;
        Ok(repository.list(filter).cloned().collect())
    }

    /// Loads, applies `change` and saves only if it succeeded.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut TaskRepository) -> Result<T, RepositoryError>,
    ) -> Result<T, StoreError> {
        let mut repository = self.load()?;
        let outcome = change(&mut repository).inspect_err(|err| warn!("{err}"))?;
        self.save(&repository)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    fn store_in(dir: &TempDir) -> TaskStore {
        TaskStore::new(dir.child("tasks.json").path())
    }

    #[test]
    fn load_of_missing_file_is_empty_and_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let repository = store.load().unwrap();

        assert!(repository.is_empty());
        dir.child("tasks.json").assert(predicates::path::missing());
    }

    #[test]
    fn add_to_empty_store_creates_task_one() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let id = store.add("Buy groceries".to_string()).unwrap();

        assert_eq!(id, 1);
        let tasks = store.list(None).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id(), 1);
        assert_eq!(tasks[0].description(), "Buy groceries");
        assert_eq!(tasks[0].status(), Status::Todo);
        assert_eq!(tasks[0].created_at(), tasks[0].updated_at());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut repository = TaskRepository::new();
        repository.add("First".to_string()).unwrap();
        repository.add("Second".to_string()).unwrap();
        repository.set_status(2, Status::InProgress).unwrap();

        store.save(&repository).unwrap();

        assert_eq!(store.load().unwrap(), repository);
    }

    #[test]
    fn saved_file_is_indented_json() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&TaskRepository::new()).unwrap();

        dir.child("tasks.json").assert("{\n  \"tasks\": []\n}\n");
    }

    #[test]
    fn mark_done_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("Task".to_string()).unwrap();
        let before = store.list(None).unwrap().remove(0);

        let after = store.set_status(1, Status::Done).unwrap();

        assert_eq!(after.status(), Status::Done);
        assert_eq!(after.created_at(), before.created_at());
        assert!(after.updated_at() >= before.updated_at());
        assert_eq!(store.list(Some(Status::Done)).unwrap(), vec![after]);
    }

    #[test]
    fn update_persists_new_description() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("Draft".to_string()).unwrap();

        store.update(1, "Final".to_string()).unwrap();

        let tasks = store.list(None).unwrap();
        assert_eq!(tasks[0].description(), "Final");
        assert_eq!(tasks[0].status(), Status::Todo);
    }

    #[test]
    fn delete_then_add_reuses_id_one() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("Only".to_string()).unwrap();

        store.delete(1).unwrap();

        assert!(store.list(None).unwrap().is_empty());
        assert_eq!(store.add("Next".to_string()).unwrap(), 1);
    }

    #[test]
    fn list_filters_by_status() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("Todo".to_string()).unwrap();
        store.add("Done".to_string()).unwrap();
        store.set_status(2, Status::Done).unwrap();

        let done = store.list(Some(Status::Done)).unwrap();

        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id(), 2);
    }

    #[test]
    fn not_found_leaves_file_byte_for_byte_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("Task".to_string()).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        for result in [
            store.update(9, "x".to_string()).map(|_| ()),
            store.set_status(9, Status::Done).map(|_| ()),
            store.delete(9).map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(StoreError::Repository(RepositoryError::TaskNotFound(9)))
            ));
        }

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_reported_and_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("tasks.json");
        file.write_str("{\"tasks\": \"nope\"}").unwrap();
        let store = store_in(&dir);

        let err = store.add("Task".to_string()).unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("is corrupt"));
        file.assert("{\"tasks\": \"nope\"}");
    }

    #[test]
    fn unknown_top_level_key_is_corrupt() {
        let dir = TempDir::new().unwrap();
        dir.child("tasks.json")
            .write_str(r#"{"tasks": [], "owner": "me"}"#)
            .unwrap();

        let err = store_in(&dir).list(None).unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    fn write_document(dir: &TempDir, tasks: &[(u32, &str)]) {
        let tasks: Vec<String> = tasks
            .iter()
            .map(|(id, description)| {
                format!(
                    r#"{{"id": {id}, "description": "{description}", "status": "todo", "createdAt": "2024-01-01T00:00:00", "updatedAt": "2024-01-01T00:00:00"}}"#
                )
            })
            .collect();
        dir.child("tasks.json")
            .write_str(&format!(r#"{{"tasks": [{}]}}"#, tasks.join(", ")))
            .unwrap();
    }

    #[test]
    fn duplicate_ids_are_corrupt_and_never_overwritten() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, &[(1, "First"), (1, "Twin")]);
        let before = std::fs::read(dir.child("tasks.json").path()).unwrap();
        let store = store_in(&dir);

        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
        assert!(matches!(
            store.delete(1),
            Err(StoreError::Corrupt { .. })
        ));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn id_zero_is_corrupt() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, &[(0, "Zero")]);

        let err = store_in(&dir).list(None).unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn invalid_utf8_is_corrupt_not_a_read_error() {
        let dir = TempDir::new().unwrap();
        dir.child("tasks.json")
            .write_binary(b"{\"tasks\": [\"\xff\xfe\"]}")
            .unwrap();

        let err = store_in(&dir).load().unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn add_past_the_largest_id_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, &[(u32::MAX, "Last")]);
        let before = std::fs::read(dir.child("tasks.json").path()).unwrap();
        let store = store_in(&dir);

        let err = store.add("One more".to_string()).unwrap_err();

        assert!(matches!(
            err,
            StoreError::Repository(RepositoryError::IdsExhausted)
        ));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let err = store.load().unwrap_err();

        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn missing_parent_directory_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.child("missing").child("tasks.json").path());

        let err = store.add("Task".to_string()).unwrap_err();

        assert!(matches!(err, StoreError::Write { .. }));
    }
}
