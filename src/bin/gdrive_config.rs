//! gdrive-config - Choose the local directories used by gdrive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input};

use gdrive_cli::config::{default_config_path, Config};

/// Initial configuration of the local drive directories.
#[derive(Parser, Debug)]
#[command(name = "gdrive-config", version, about, long_about = None)]
struct Cli {
    /// Configuration file to write (default: ~/.gdrive/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reconfigure without asking when a configuration already exists.
    #[arg(short, long)]
    yes: bool,
}

fn prompt(defaults: &Config) -> Result<Config> {
    let root: String = Input::new()
        .with_prompt("Set the root directory for your drive")
        .default(defaults.root.display().to_string())
        .interact_text()?;
    let downloads: String = Input::new()
        .with_prompt("Set the name for your downloads directory")
        .default(defaults.downloads.clone())
        .interact_text()?;
    Ok(Config {
        root: PathBuf::from(root.trim()),
        downloads: downloads.trim().to_string(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    if path.exists() && !cli.yes {
        let reconfigure = Confirm::new()
            .with_prompt("Configuration file already exists. Reconfigure?")
            .default(false)
            .interact()?;
        if !reconfigure {
            println!("bye~");
            return Ok(());
        }
    }

    let config = prompt(&Config::default_layout()?)?;
    config
        .save(&path)
        .with_context(|| format!("Failed to write configuration to {:?}", path))?;

    for created in config
        .create_directories()
        .context("Please re-configure with gdrive-config")?
    {
        println!("{} has been created.", created.display());
    }

    println!("\nFinished configuring the google drive client.");
    println!("Authorize the CLI with gdrive-auth if you have not done so yet.");
    println!("Then, use `gdrive --help` for more information.");
    Ok(())
}
