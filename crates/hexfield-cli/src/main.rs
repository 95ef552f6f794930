mod cli;
mod config;
mod paths;
mod run;

use anyhow::Result;
use cli::{Command, ConfigAction};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Some(Command::Still(args)) => run::still(config, args),
        Some(Command::Config(command)) => match command.action {
            ConfigAction::Where => run::config_where(config),
        },
        None => run::preview(config, cli.run),
    }
}
