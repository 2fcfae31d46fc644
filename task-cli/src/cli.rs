use crate::store::TaskStore;
use crate::task::Status;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Track short text tasks in a local JSON file.
#[derive(Parser, Debug)]
#[command(name = "task-cli", version)]
pub struct Cli {
    /// Task file to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Replace the description of a task
    Update {
        id: u32,
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
    /// Delete a task
    Delete { id: u32 },
    /// Mark a task as in-progress
    MarkInProgress { id: u32 },
    /// Mark a task as done
    MarkDone { id: u32 },
    /// List tasks, optionally only those with one status
    List { status: Option<Status> },
}

/// Runs one command against the store and writes the confirmation or listing to `out`.
pub fn run(command: Commands, store: &TaskStore, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Add { description } => {
            let id = store.add(description.join(" "))?;
            writeln!(out, "Task added successfully (ID: {id})")?;
        }
        Commands::Update { id, description } => {
            store.update(id, description.join(" "))?;
            writeln!(out, "Task {id} updated successfully")?;
        }
        Commands::Delete { id } => {
            store.delete(id)?;
            writeln!(out, "Task {id} deleted successfully")?;
        }
        Commands::MarkInProgress { id } => mark(store, id, Status::InProgress, out)?,
        Commands::MarkDone { id } => mark(store, id, Status::Done, out)?,
        Commands::List { status } => {
            let tasks = store.list(status)?;
            if tasks.is_empty() {
                writeln!(out, "No tasks found.")?;
            }
            for task in tasks {
                writeln!(out, "{task}")?;
            }
        }
    };
    Ok(())
}

fn mark(store: &TaskStore, id: u32, status: Status, out: &mut impl Write) -> anyhow::Result<()> {
    let task = store.set_status(id, status)?;
    writeln!(out, "Task {id} marked as {} successfully", task.status())?;
    Ok(())
}
