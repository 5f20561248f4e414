mod cli;
mod commands;
mod logging;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use commands::CommandOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\n\nInterrupted by user (Ctrl+C)");
        std::process::exit(130);
    })
    .context("Failed to install Ctrl+C handler")?;

    let cli = Cli::parse();

    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let writes_log = matches!(cli.command, Commands::Push(_) | Commands::Pull(_));
    let log_file = logging::init(writes_log.then_some(dir.as_path()), cli.verbose);

    let options = CommandOptions {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
        dir: &dir,
        url: cli.url.as_deref(),
        user: cli.user.as_deref(),
        password: cli.password.as_deref(),
        config_path: cli.config.as_deref(),
        no_config: cli.no_config,
        log_file: log_file.as_deref(),
    };

    let clean = match &cli.command {
        Commands::Push(args) => commands::Push::execute(args, &options)
            .await
            .context("Failed to execute push command")?,
        Commands::Pull(args) => commands::Pull::execute(args, &options)
            .await
            .context("Failed to execute pull command")?,
        Commands::Status { selection } => {
            commands::Status::execute(selection, &options)
                .await
                .context("Failed to execute status command")?;
            true
        }
        Commands::Diff {
            artifact_type,
            named,
        } => {
            commands::Diff::execute((*artifact_type).into(), named, &options)
                .await
                .context("Failed to execute diff command")?;
            true
        }
        Commands::Config => {
            commands::Config::execute(&options).context("Failed to execute config command")?;
            true
        }
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}
