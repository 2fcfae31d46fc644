pub mod cli;
pub mod config;
pub mod repository;
pub mod store;
pub mod task;

pub use repository::{RepositoryError, TaskRepository};
pub use store::{StoreError, TaskStore};
pub use task::{Status, Task};
