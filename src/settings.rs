//! OAuth application settings and stored credentials.
//!
//! Settings live in `~/.gdrive/settings.yaml` unless `GDRIVE_SETTINGS`
//! points elsewhere. Stored credentials are a separate YAML file written
//! by `gdrive-auth`.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DriveError, Result};

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV: &str = "GDRIVE_SETTINGS";

/// Environment variable holding a ready access token; bypasses the settings file.
pub const ACCESS_TOKEN_ENV: &str = "GDRIVE_ACCESS_TOKEN";

pub const SETTINGS_FILE_NAME: &str = "settings.yaml";
pub const CREDENTIALS_FILE_NAME: &str = "credentials.yaml";

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Directory holding configuration, settings and credentials (`~/.gdrive`).
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".gdrive"))
        .ok_or_else(|| DriveError::Config("cannot determine the home directory".to_string()))
}

pub fn default_settings_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(SETTINGS_FILE_NAME))
}

pub fn default_credentials_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(CREDENTIALS_FILE_NAME))
}

/// Locate an existing settings file: `$GDRIVE_SETTINGS` first, then the default location.
pub fn find_settings_file() -> Option<PathBuf> {
    let from_env = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
    let default = default_settings_path().ok();
    [from_env, default]
        .into_iter()
        .flatten()
        .find(|path| path.is_file())
}

/// Where the OAuth client configuration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientConfigBackend {
    /// A Google `client_secrets.json` file.
    File,
    /// Client id and secret stored inline in the settings file.
    Settings,
    /// A service account key file; no interactive flow.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsBackend {
    File,
}

/// OAuth client configuration for an installed application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_uri: Option<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

/// Layout of a `client_secrets.json` downloaded from the Google console.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<RawClientSecret>,
    web: Option<RawClientSecret>,
}

#[derive(Debug, Deserialize)]
struct RawClientSecret {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientSecret {
    /// Read a `client_secrets.json` file (either the `installed` or `web` flavour).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriveError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        let file: ClientSecretsFile = serde_json::from_str(&content)?;
        let raw = file.installed.or(file.web).ok_or_else(|| {
            DriveError::Settings(format!(
                "{} has neither an 'installed' nor a 'web' section",
                path.display()
            ))
        })?;
        Ok(Self {
            client_id: raw.client_id,
            client_secret: raw.client_secret,
            auth_uri: raw.auth_uri.unwrap_or_else(default_auth_uri),
            token_uri: raw.token_uri.unwrap_or_else(default_token_uri),
            redirect_uri: raw
                .redirect_uris
                .into_iter()
                .next()
                .unwrap_or_else(default_redirect_uri),
            revoke_uri: None,
        })
    }
}

/// Contents of `settings.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub client_config_backend: ClientConfigBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_config_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_config: Option<ClientSecret>,
    #[serde(default)]
    pub save_credentials: bool,
    #[serde(default = "default_credentials_backend")]
    pub save_credentials_backend: CredentialsBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub get_refresh_token: bool,
    #[serde(default = "default_scopes")]
    pub oauth_scope: Vec<String>,
}

fn default_credentials_backend() -> CredentialsBackend {
    CredentialsBackend::File
}

fn default_scopes() -> Vec<String> {
    vec![DRIVE_SCOPE.to_string()]
}

impl Settings {
    /// Load and validate a settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriveError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_yaml::from_str(&content)
            .map_err(|e| DriveError::Settings(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Write the settings; the file is readable by its owner only, as it may
    /// hold an inline client secret.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        write_private(path.as_ref(), &serde_yaml::to_string(self)?)
    }

    /// Check that the chosen backends have everything they need.
    pub fn validate(&self) -> Result<()> {
        match self.client_config_backend {
            ClientConfigBackend::File | ClientConfigBackend::Service => {
                if self.client_config_file.is_none() {
                    return Err(DriveError::Settings(
                        "client_config_file is required for this client_config_backend".to_string(),
                    ));
                }
            }
            ClientConfigBackend::Settings => match self.client_config {
                Some(ref config)
                    if !config.client_id.is_empty() && !config.client_secret.is_empty() => {}
                _ => {
                    return Err(DriveError::Settings(
                        "client_config with client_id and client_secret is required when client_config_backend is 'settings'"
                            .to_string(),
                    ))
                }
            },
        }
        if self.oauth_scope.is_empty() {
            return Err(DriveError::Settings("oauth_scope must not be empty".to_string()));
        }
        Ok(())
    }

    /// The OAuth client configuration for the installed-application flow.
    pub fn client_secret(&self) -> Result<ClientSecret> {
        match self.client_config_backend {
            ClientConfigBackend::File => {
                let path = self.client_config_file.as_ref().ok_or_else(|| {
                    DriveError::Settings("client_config_file is not set".to_string())
                })?;
                ClientSecret::from_file(path)
            }
            ClientConfigBackend::Settings => self
                .client_config
                .clone()
                .ok_or_else(|| DriveError::Settings("client_config is not set".to_string())),
            ClientConfigBackend::Service => Err(DriveError::Settings(
                "a service account backend has no OAuth client secret".to_string(),
            )),
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        match self.save_credentials_file {
            Some(ref path) => Ok(path.clone()),
            None => default_credentials_path(),
        }
    }
}

/// Tokens persisted by `gdrive-auth`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredCredentials {
    /// Load credentials, returning `None` when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_yaml::from_str(&content)?))
    }

    /// Write the credentials with mode 0600.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_private(path.as_ref(), &serde_yaml::to_string(self)?)
    }
}

/// Create or replace `path` with permissions for the owner only.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    // An existing file keeps its old mode when opened.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
