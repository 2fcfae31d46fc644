use clap::{CommandFactory, Parser};
use task_cli::TaskStore;
use task_cli::cli::{self, Cli};
use task_cli::config::Config;
use tracing::debug;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.log_level()?)
        .init();

    let Some(command) = args.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let store = TaskStore::new(args.file.unwrap_or(config.file));
    debug!(path = %store.path().display(), ?command, "dispatching");

    cli::run(command, &store, &mut std::io::stdout().lock())
}
