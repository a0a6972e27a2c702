use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;
use linkpeek::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    linkpeek::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let store_dir = linkpeek::config::store_dir(cli.store.as_deref().map(std::path::Path::new));
    tracing::debug!(store = %store_dir.display(), "using store");

    match cli.command {
        Command::Analyze(args) => {
            linkpeek::host::analyze(&store_dir, args)
                .await
                .context("analyze")?;
        }
        Command::Visit(args) => {
            linkpeek::host::visit(&store_dir, args)
                .await
                .context("visit")?;
        }
        Command::Screenshot(args) => {
            linkpeek::host::screenshot(&store_dir, args)
                .await
                .context("screenshot")?;
        }
        Command::Prune(args) => {
            linkpeek::host::prune(&store_dir, args)
                .await
                .context("prune")?;
        }
        Command::Settings { command } => {
            linkpeek::host::settings(&store_dir, command)
                .await
                .context("settings")?;
        }
    }

    Ok(())
}
