//! gdrive - Command line client for Google Drive.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gdrive_cli::cli::{Cli, Commands};
use gdrive_cli::error::DriveError;
use gdrive_cli::export::TerminalPrompt;
use gdrive_cli::settings::{find_settings_file, Settings, ACCESS_TOKEN_ENV};
use gdrive_cli::{commands, Authenticator, Dispatcher, DriveApi, DriveClient};

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn authenticator() -> Result<Authenticator> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            debug!("using access token from {}", ACCESS_TOKEN_ENV);
            return Ok(Authenticator::with_token(token.trim()));
        }
    }

    let path = find_settings_file()
        .ok_or_else(|| DriveError::Settings("no settings file found".to_string()))?;
    let settings = Settings::load(&path)
        .with_context(|| format!("Failed to load settings from {:?}", path))?;
    Authenticator::from_settings(&settings).context("Failed to set up authentication")
}

/// A setup hint for errors that only configuration can fix.
fn setup_hint(err: &anyhow::Error) -> Option<&'static str> {
    let mut cause = err
        .chain()
        .filter_map(|e| e.downcast_ref::<DriveError>())
        .find(|e| e.is_fatal())?;
    while let DriveError::Context { source, .. } = cause {
        cause = &**source;
    }
    Some(match cause {
        DriveError::Config(_) => "run gdrive-config to set up the local directories",
        _ => "run gdrive-auth to configure and authorize the CLI",
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            if let Some(hint) = setup_hint(&err) {
                eprintln!("{} {}", style("hint:").cyan(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let api: Arc<dyn DriveApi> = Arc::new(DriveClient::new(authenticator()?));
    let dispatcher = Dispatcher::new(cli.jobs).with_interrupt(true);

    let report = match cli.command {
        Commands::List(args) => commands::list(api.as_ref(), &args)
            .await
            .context("Failed to list files")?,

        Commands::Download(args) => {
            let destination = commands::download_destination(&args)
                .context("Failed to determine the download directory")?;
            commands::download(api, &dispatcher, &args, &destination, &TerminalPrompt)
                .await
                .context("Failed to download")?
        }

        Commands::Upload(args) => commands::upload(api, &dispatcher, &args)
            .await
            .context("Failed to upload")?,

        Commands::Create(args) => commands::create(api.as_ref(), &args)
            .await
            .context("Failed to create")?,

        Commands::Delete(args) => commands::delete(api, &dispatcher, &args.ids)
            .await
            .context("Failed to delete")?,

        Commands::Trash(args) => commands::trash(api, &dispatcher, &args.ids)
            .await
            .context("Failed to trash")?,

        Commands::Untrash(args) => commands::untrash(api, &dispatcher, &args.ids)
            .await
            .context("Failed to untrash")?,

        Commands::Move(args) => commands::move_entries(api, &dispatcher, &args)
            .await
            .context("Failed to move")?,

        Commands::Rename(args) => commands::rename(api, &dispatcher, &args)
            .await
            .context("Failed to rename")?,

        Commands::Share(args) => commands::share(api, &dispatcher, &args)
            .await
            .context("Failed to share")?,

        Commands::Unshare(args) => commands::unshare(api, &dispatcher, &args)
            .await
            .context("Failed to unshare")?,
    };

    if report.outcomes().len() > 1 || !report.is_clean() {
        println!("{}", style(report.summary()).dim());
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_setup_hint_for_configuration_errors() {
        let missing = anyhow::Error::new(DriveError::MissingCredentials(PathBuf::from("c.yaml")))
            .context("Failed to set up authentication");
        assert_eq!(
            setup_hint(&missing),
            Some("run gdrive-auth to configure and authorize the CLI")
        );

        let config = anyhow::Error::new(DriveError::Config("absent".into()).context("download"))
            .context("Failed to determine the download directory");
        assert_eq!(
            setup_hint(&config),
            Some("run gdrive-config to set up the local directories")
        );
    }

    #[test]
    fn test_no_hint_for_remote_errors() {
        let err = anyhow::Error::new(DriveError::ApiError {
            status: 404,
            message: "File not found".into(),
        })
        .context("Failed to list files");
        assert_eq!(setup_hint(&err), None);
        assert_eq!(setup_hint(&anyhow::anyhow!("interrupted")), None);
    }
}
