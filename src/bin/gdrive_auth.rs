//! gdrive-auth - Configure the OAuth application and authorize the CLI.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gdrive_cli::auth::InstalledFlow;
use gdrive_cli::settings::{
    default_settings_path, ClientConfigBackend, ClientSecret, CredentialsBackend, Settings,
    StoredCredentials, DEFAULT_AUTH_URI, DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_URI, DRIVE_SCOPE,
    SETTINGS_ENV,
};
use gdrive_cli::Authenticator;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendArg {
    File,
    #[value(alias = "setting")]
    Settings,
    Service,
}

impl From<BackendArg> for ClientConfigBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::File => ClientConfigBackend::File,
            BackendArg::Settings => ClientConfigBackend::Settings,
            BackendArg::Service => ClientConfigBackend::Service,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialsBackendArg {
    File,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Local,
    #[value(name = "command_line", alias = "command-line")]
    CommandLine,
}

/// Authenticate yourself and authorize the gdrive CLI.
#[derive(Parser, Debug)]
#[command(name = "gdrive-auth", version, about, long_about = None)]
struct Cli {
    /// Settings file to create or reuse.
    #[arg(long, env = SETTINGS_ENV)]
    settings: Option<PathBuf>,

    /// Where the OAuth client configuration comes from.
    #[arg(long, value_enum, default_value = "file")]
    client_config_backend: BackendArg,

    /// Client secrets (or service account key) file.
    #[arg(long, default_value = "client_secrets.json")]
    client_config_file: PathBuf,

    /// Client id (required with --client-config-backend=setting).
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret (required with --client-config-backend=setting).
    #[arg(long)]
    client_secret: Option<String>,

    #[arg(long, default_value = DEFAULT_AUTH_URI)]
    auth_uri: String,

    #[arg(long, default_value = DEFAULT_TOKEN_URI)]
    token_uri: String,

    #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,

    #[arg(long)]
    revoke_uri: Option<String>,

    /// Backend to save credentials to.
    #[arg(long, value_enum, default_value = "file")]
    save_credentials_backend: CredentialsBackendArg,

    /// Save the credentials after authorizing.
    #[arg(long)]
    save_credentials: bool,

    /// Destination of the credentials file (default: ~/.gdrive/credentials.yaml).
    #[arg(long)]
    save_credentials_file: Option<PathBuf>,

    /// Ask for a refresh token so the CLI keeps working after the access token expires.
    #[arg(long)]
    get_refresh_token: bool,

    /// OAuth scope to request; may be repeated.
    #[arg(long = "oauth-scope")]
    oauth_scopes: Vec<String>,

    /// Write a new settings file even when one exists.
    #[arg(long)]
    reconfigure: bool,

    /// Hostname for the local redirect server.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Ports to try for the local redirect server.
    #[arg(long = "port", default_values_t = [8080u16, 8090])]
    ports: Vec<u16>,

    /// How the authorization code is obtained.
    #[arg(long, value_enum, default_value = "command_line")]
    method: Method,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn new_settings(cli: &Cli) -> Result<Settings> {
    let backend = ClientConfigBackend::from(cli.client_config_backend);
    let mut scopes = cli.oauth_scopes.clone();
    if scopes.is_empty() {
        scopes.push(DRIVE_SCOPE.to_string());
    }
    scopes.sort();
    scopes.dedup();

    let (client_config_file, client_config) = match backend {
        ClientConfigBackend::File | ClientConfigBackend::Service => {
            (Some(absolute(&cli.client_config_file)?), None)
        }
        ClientConfigBackend::Settings => {
            let (Some(client_id), Some(client_secret)) = (&cli.client_id, &cli.client_secret) else {
                bail!("--client-id and --client-secret are required with --client-config-backend=setting");
            };
            let client = ClientSecret {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                auth_uri: cli.auth_uri.clone(),
                token_uri: cli.token_uri.clone(),
                redirect_uri: cli.redirect_uri.clone(),
                revoke_uri: cli.revoke_uri.clone(),
            };
            (None, Some(client))
        }
    };

    let settings = Settings {
        client_config_backend: backend,
        client_config_file,
        client_config,
        save_credentials: cli.save_credentials,
        save_credentials_backend: match cli.save_credentials_backend {
            CredentialsBackendArg::File => CredentialsBackend::File,
        },
        save_credentials_file: cli
            .save_credentials_file
            .as_deref()
            .map(absolute)
            .transpose()?,
        get_refresh_token: cli.get_refresh_token,
        oauth_scope: scopes,
    };
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings_path = match cli.settings {
        Some(ref path) => path.clone(),
        None => default_settings_path()?,
    };

    let settings = if settings_path.is_file() && !cli.reconfigure {
        println!("Found settings file at {}; using it.", settings_path.display());
        Settings::load(&settings_path)
            .with_context(|| format!("Failed to load settings from {:?}", settings_path))?
    } else {
        let settings = new_settings(&cli)?;
        settings
            .save(&settings_path)
            .with_context(|| format!("Failed to write settings to {:?}", settings_path))?;
        println!("Configured new settings file at {}", settings_path.display());
        settings
    };

    if settings.client_config_backend == ClientConfigBackend::Service {
        Authenticator::from_settings(&settings)
            .context("Failed to load the service account key")?
            .get_access_token()
            .await
            .context("Failed to authorize the service account")?;
        println!("\nService account authorized.");
        return Ok(());
    }

    let credentials_path = settings.credentials_path()?;
    if StoredCredentials::load(&credentials_path)?.is_some() {
        bail!(
            "credentials found at {} and the CLI is already authorized; skipping",
            credentials_path.display()
        );
    }

    let flow = InstalledFlow::new(
        settings.client_secret().context("Failed to load the client configuration")?,
        settings.oauth_scope.clone(),
        settings.get_refresh_token,
    );
    let credentials = match cli.method {
        Method::Local => flow.local_server(&cli.hostname, &cli.ports).await,
        Method::CommandLine => flow.command_line().await,
    }
    .context("Authorization failed")?;

    if settings.save_credentials {
        credentials
            .save(&credentials_path)
            .with_context(|| format!("Failed to save credentials to {:?}", credentials_path))?;
        println!("Saved credentials to {}", credentials_path.display());
    } else {
        eprintln!("warning: credentials were not saved; re-run with --reconfigure --save-credentials to keep them");
    }

    println!("\nFinished authentication and authorization.");
    println!("Configure the local directories with gdrive-config if you have not done so yet.");
    println!("Then, use `gdrive --help` for more information.");
    Ok(())
}
