//! Access tokens for the Drive API.
//!
//! Three token sources are supported: a service account key (signed JWT
//! assertion), a stored refresh token from the installed-application flow,
//! and a fixed access token supplied by the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::Serialize;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenUrl,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{DriveError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};
use crate::settings::{
    ClientConfigBackend, ClientSecret, Settings, StoredCredentials, DEFAULT_TOKEN_URI,
    DRIVE_SCOPE,
};

/// Refresh tokens this long before they expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount {
        credentials: ServiceAccountCredentials,
        scope: String,
    },
    RefreshToken {
        client: ClientSecret,
        refresh_token: String,
        credentials_file: Option<PathBuf>,
    },
    Fixed,
}

/// Authenticator for Google APIs.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a service account JSON file.
    pub fn from_service_account_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::from_service_account(credentials, DRIVE_SCOPE))
    }

    pub fn from_service_account(credentials: ServiceAccountCredentials, scope: &str) -> Self {
        Self::with_source(
            TokenSource::ServiceAccount {
                credentials,
                scope: scope.to_string(),
            },
            None,
        )
    }

    /// Create an authenticator that refreshes access tokens with a stored refresh token.
    ///
    /// A still-valid access token in `stored` is used until it expires.
    /// Refreshed tokens are written back to `credentials_file` when given.
    pub fn from_refresh_token(
        client: ClientSecret,
        stored: StoredCredentials,
        credentials_file: Option<PathBuf>,
    ) -> Result<Self> {
        let refresh_token = stored.refresh_token.clone().ok_or_else(|| {
            DriveError::AuthenticationError(
                "stored credentials carry no refresh token; re-run gdrive-auth with --get-refresh-token"
                    .to_string(),
            )
        })?;
        let cached = match (stored.access_token, stored.token_expiry) {
            (Some(access_token), Some(expiry)) => {
                let expires_at = SystemTime::UNIX_EPOCH
                    + Duration::from_secs(expiry.timestamp().max(0) as u64);
                Some(CachedToken {
                    access_token,
                    expires_at,
                })
            }
            _ => None,
        };
        Ok(Self::with_source(
            TokenSource::RefreshToken {
                client,
                refresh_token,
                credentials_file,
            },
            cached,
        ))
    }

    /// Use a ready access token as is; it is never refreshed.
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self::with_source(
            TokenSource::Fixed,
            Some(CachedToken {
                access_token: access_token.into(),
                expires_at: SystemTime::now() + Duration::from_secs(365 * 24 * 3600),
            }),
        )
    }

    /// Build the authenticator described by a settings file.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match settings.client_config_backend {
            ClientConfigBackend::Service => {
                let path = settings.client_config_file.as_ref().ok_or_else(|| {
                    DriveError::Settings("client_config_file is not set".to_string())
                })?;
                let content = fs::read_to_string(path).map_err(|e| {
                    DriveError::Settings(format!("cannot read {}: {}", path.display(), e))
                })?;
                let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
                Ok(Self::from_service_account(
                    credentials,
                    &settings.oauth_scope.join(" "),
                ))
            }
            ClientConfigBackend::File | ClientConfigBackend::Settings => {
                let client = settings.client_secret()?;
                let path = settings.credentials_path()?;
                let stored = StoredCredentials::load(&path)?
                    .ok_or_else(|| DriveError::MissingCredentials(path.clone()))?;
                Self::from_refresh_token(client, stored, Some(path))
            }
        }
    }

    fn with_source(source: TokenSource, cached: Option<CachedToken>) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_BUFFER {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > SystemTime::now() + EXPIRY_BUFFER {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = self.refresh_token().await?;
        *cached = Some(new_token.clone());
        Ok(new_token.access_token)
    }

    async fn refresh_token(&self) -> Result<CachedToken> {
        match self.source.as_ref() {
            TokenSource::ServiceAccount { credentials, scope } => {
                self.refresh_service_account(credentials, scope).await
            }
            TokenSource::RefreshToken {
                client,
                refresh_token,
                credentials_file,
            } => {
                let token = self.refresh_installed(client, refresh_token).await?;
                if let Some(path) = credentials_file.clone() {
                    let refreshed = token.clone();
                    tokio::task::spawn_blocking(move || persist_refreshed(&path, &refreshed))
                        .await
                        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))??;
                }
                Ok(token)
            }
            TokenSource::Fixed => Err(DriveError::TokenRefreshError(
                "the supplied access token has expired".to_string(),
            )),
        }
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_service_account(
        &self,
        credentials: &ServiceAccountCredentials,
        scope: &str,
    ) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::AuthenticationError(e.to_string()))?
            .as_secs();
        let token_uri = credentials.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: scope.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];
        debug!(issuer = %credentials.client_email, "requesting service account token");
        let response = self.client.post(token_uri).form(&params).send().await?;
        token_from_response(response).await.map(|t| t.into_cached())
    }

    async fn refresh_installed(
        &self,
        client: &ClientSecret,
        refresh_token: &str,
    ) -> Result<CachedToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        debug!("refreshing access token");
        let response = self
            .client
            .post(&client.token_uri)
            .form(&params)
            .send()
            .await?;
        token_from_response(response).await.map(|t| t.into_cached())
    }
}

impl TokenResponse {
    fn into_cached(self) -> CachedToken {
        CachedToken {
            access_token: self.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(self.expires_in),
        }
    }
}

async fn token_from_response(response: reqwest::Response) -> Result<TokenResponse> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }
    Ok(response.json().await?)
}

fn persist_refreshed(path: &Path, token: &CachedToken) -> Result<()> {
    let mut stored = StoredCredentials::load(path)?.unwrap_or_default();
    stored.access_token = Some(token.access_token.clone());
    let remaining = token
        .expires_at
        .duration_since(SystemTime::now())
        .unwrap_or_default();
    stored.token_expiry = chrono::Duration::from_std(remaining)
        .ok()
        .map(|d| Utc::now() + d);
    stored.save(path)
}

/// Redirect URI for the copy-paste flow, where the consent page shows the code.
const OUT_OF_BAND: &str = "urn:ietf:wg:oauth:2.0:oob";

/// A consent request waiting for the user's answer.
///
/// Holds the anti-forgery state sent with the request and the PKCE
/// verifier that must accompany the code exchange.
pub struct PendingAuthorization {
    pub url: Url,
    redirect_uri: String,
    state: CsrfToken,
    verifier: PkceCodeVerifier,
}

impl PendingAuthorization {
    /// Check that `redirect` answers this request and return its code.
    pub fn accept(&self, redirect: Redirect) -> Result<String> {
        match redirect.state {
            Some(ref state) if state == self.state.secret() => Ok(redirect.code),
            Some(_) => Err(DriveError::AuthenticationError(
                "state mismatch; the redirect does not belong to this authorization request"
                    .to_string(),
            )),
            None if self.redirect_uri == OUT_OF_BAND => Ok(redirect.code),
            None => Err(DriveError::AuthenticationError(
                "redirect did not carry a state parameter".to_string(),
            )),
        }
    }
}

/// The query of the redirect the consent page sends the browser to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub code: String,
    pub state: Option<String>,
}

impl Redirect {
    /// Parse a redirect target: a request path such as `/?code=..&state=..`
    /// or the full URL the browser ended up on.
    pub fn parse(target: &str) -> Result<Self> {
        let url = Url::parse("http://localhost")
            .and_then(|base| base.join(target.trim()))
            .map_err(|e| DriveError::AuthenticationError(format!("malformed redirect: {}", e)))?;
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(DriveError::AuthenticationError(format!(
                        "authorization denied: {}",
                        value
                    )))
                }
                _ => {}
            }
        }
        let code = code.ok_or_else(|| {
            DriveError::AuthenticationError(
                "redirect did not carry an authorization code".to_string(),
            )
        })?;
        Ok(Self { code, state })
    }

    /// Interpret what the user pasted: a redirect URL, or a bare code shown
    /// by the consent page.
    pub fn from_pasted(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.contains("code=") {
            Self::parse(input)
        } else if input.is_empty() {
            Err(DriveError::AuthenticationError(
                "no authorization code entered".to_string(),
            ))
        } else {
            Ok(Self {
                code: input.to_string(),
                state: None,
            })
        }
    }
}

/// The interactive OAuth flow for installed applications, used by `gdrive-auth`.
///
/// Every request carries a random `state` and a PKCE S256 challenge; the
/// state is verified on the way back and the verifier is sent with the
/// code exchange.
pub struct InstalledFlow {
    client: ClientSecret,
    scopes: Vec<String>,
    offline: bool,
    http: Client,
}

impl InstalledFlow {
    pub fn new(client: ClientSecret, scopes: Vec<String>, offline: bool) -> Self {
        Self {
            client,
            scopes,
            offline,
            http: Client::new(),
        }
    }

    /// Start a consent request that redirects to `redirect_uri`.
    pub fn authorize(&self, redirect_uri: &str) -> Result<PendingAuthorization> {
        let auth_url = AuthUrl::new(self.client.auth_uri.clone())
            .map_err(|e| DriveError::Settings(format!("invalid auth_uri: {}", e)))?;
        let token_url = TokenUrl::new(self.client.token_uri.clone())
            .map_err(|e| DriveError::Settings(format!("invalid token_uri: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| DriveError::Settings(format!("invalid redirect_uri: {}", e)))?;
        let client = BasicClient::new(ClientId::new(self.client.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge);
        if self.offline {
            request = request
                .add_extra_param("access_type", "offline")
                .add_extra_param("prompt", "consent");
        }
        let (url, state) = request.url();

        Ok(PendingAuthorization {
            url,
            redirect_uri: redirect_uri.to_string(),
            state,
            verifier,
        })
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        pending: PendingAuthorization,
        code: &str,
    ) -> Result<StoredCredentials> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
            ("code_verifier", pending.verifier.secret().as_str()),
        ];
        debug!(token_uri = %self.client.token_uri, "exchanging authorization code");
        let response = self
            .http
            .post(&self.client.token_uri)
            .form(&params)
            .send()
            .await?;
        let token = token_from_response(response)
            .await
            .map_err(|e| DriveError::AuthenticationError(e.to_string()))?;
        Ok(StoredCredentials {
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token,
            token_expiry: Some(Utc::now() + chrono::Duration::seconds(token.expires_in as i64)),
            scopes: self.scopes.clone(),
        })
    }

    /// Print the consent URL and read the pasted code or redirect URL from the terminal.
    pub async fn command_line(&self) -> Result<StoredCredentials> {
        let pending = self.authorize(&self.client.redirect_uri)?;
        println!("Go to the following link in your browser:\n\n    {}\n", pending.url);
        let answer = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Enter verification code (or the URL you were redirected to)")
                .interact_text()
        })
        .await
        .map_err(|e| DriveError::AuthenticationError(e.to_string()))??;
        let code = pending.accept(Redirect::from_pasted(&answer)?)?;
        self.exchange_code(pending, &code).await
    }

    /// Serve a one-shot local redirect endpoint and wait for the browser to deliver the code.
    pub async fn local_server(&self, hostname: &str, ports: &[u16]) -> Result<StoredCredentials> {
        let (listener, port) = bind_first(hostname, ports).await?;
        let pending = self.authorize(&format!("http://{}:{}/", hostname, port))?;
        println!(
            "Your browser should open the following link; if it does not, open it manually:\n\n    {}\n",
            pending.url
        );
        info!(redirect_uri = %pending.redirect_uri, "waiting for authorization redirect");

        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "redirect received");
        let mut stream = BufReader::new(stream);
        let mut request_line = String::new();
        stream.read_line(&mut request_line).await?;
        let code = request_target(&request_line)
            .and_then(Redirect::parse)
            .and_then(|redirect| pending.accept(redirect));

        let body = match code {
            Ok(_) => "Authentication complete. You may close this window.",
            Err(_) => "Authentication failed. Check the terminal for details.",
        };
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let stream = stream.get_mut();
        stream.write_all(reply.as_bytes()).await?;
        stream.flush().await?;

        self.exchange_code(pending, &code?).await
    }
}

async fn bind_first(hostname: &str, ports: &[u16]) -> Result<(TcpListener, u16)> {
    let mut last_error = None;
    for &port in ports {
        match TcpListener::bind((hostname, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                debug!(port, error = %e, "port unavailable");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => DriveError::Io(e),
        None => DriveError::Validation("no ports given for the local server".to_string()),
    })
}

/// The target of an HTTP request line (`GET /?code=.. HTTP/1.1`).
fn request_target(request_line: &str) -> Result<&str> {
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target),
        _ => Err(DriveError::AuthenticationError(
            "malformed redirect request".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClientSecret {
        ClientSecret {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            auth_uri: "https://accounts.example.com/auth".into(),
            token_uri: "https://accounts.example.com/token".into(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".into(),
            revoke_uri: None,
        }
    }

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: DEFAULT_TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().into_owned().collect()
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_authorization_url() {
        let flow = InstalledFlow::new(client(), vec![DRIVE_SCOPE.to_string()], true);
        let pending = flow.authorize("http://localhost:8080/").unwrap();
        let pairs = query(&pending.url);
        assert_eq!(value(&pairs, "client_id"), Some("cid"));
        assert_eq!(value(&pairs, "access_type"), Some("offline"));
        assert_eq!(value(&pairs, "scope"), Some(DRIVE_SCOPE));
        assert_eq!(value(&pairs, "code_challenge_method"), Some("S256"));
        assert!(value(&pairs, "code_challenge").is_some());
        assert_eq!(value(&pairs, "state"), Some(pending.state.secret().as_str()));
    }

    #[test]
    fn test_each_request_gets_a_fresh_state() {
        let flow = InstalledFlow::new(client(), vec![DRIVE_SCOPE.to_string()], false);
        let first = flow.authorize("http://localhost:8080/").unwrap();
        let second = flow.authorize("http://localhost:8080/").unwrap();
        assert_ne!(first.state.secret(), second.state.secret());
        assert_eq!(value(&query(&first.url), "access_type"), None);
    }

    #[test]
    fn test_redirect_with_matching_state_is_accepted() {
        let flow = InstalledFlow::new(client(), vec![DRIVE_SCOPE.to_string()], false);
        let pending = flow.authorize("http://localhost:8080/").unwrap();
        let target = format!("/?code=4/abc&state={}&scope=drive", pending.state.secret());
        let redirect = Redirect::parse(&target).unwrap();
        assert_eq!(pending.accept(redirect).unwrap(), "4/abc");
    }

    #[test]
    fn test_forged_or_missing_state_is_rejected() {
        let flow = InstalledFlow::new(client(), vec![DRIVE_SCOPE.to_string()], false);
        let pending = flow.authorize("http://localhost:8080/").unwrap();

        let forged = Redirect::parse("/?code=4/evil&state=guessed").unwrap();
        let err = pending.accept(forged).unwrap_err();
        assert!(err.to_string().contains("state mismatch"));

        let stateless = Redirect::parse("/?code=4/evil").unwrap();
        assert!(pending.accept(stateless).is_err());
    }

    #[test]
    fn test_pasted_code_without_redirect() {
        let flow = InstalledFlow::new(client(), vec![DRIVE_SCOPE.to_string()], false);
        let pending = flow.authorize(OUT_OF_BAND).unwrap();
        let pasted = Redirect::from_pasted("  4/abc \n").unwrap();
        assert_eq!(pending.accept(pasted).unwrap(), "4/abc");
        assert!(Redirect::from_pasted("   ").is_err());
    }

    #[test]
    fn test_redirect_parsing() {
        assert_eq!(
            Redirect::parse("http://localhost:8080/?code=4/abc&state=s1").unwrap(),
            Redirect {
                code: "4/abc".into(),
                state: Some("s1".into()),
            }
        );
        assert!(Redirect::parse("/?error=access_denied").is_err());
        assert!(Redirect::parse("/").is_err());
        assert_eq!(request_target("GET /?code=x HTTP/1.1\r\n").unwrap(), "/?code=x");
        assert!(request_target("").is_err());
    }

    #[tokio::test]
    async fn test_code_exchange_sends_verifier() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("code".into(), "4/abc".into()),
                mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                mockito::Matcher::Regex("code_verifier=[A-Za-z0-9_~.-]{43,}".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"access_token":"at","expires_in":3600,"refresh_token":"rt","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;
        let secret = ClientSecret {
            token_uri: format!("{}/token", server.url()),
            ..client()
        };
        let flow = InstalledFlow::new(secret, vec![DRIVE_SCOPE.to_string()], true);
        let pending = flow.authorize("http://localhost:8080/").unwrap();

        let stored = flow.exchange_code(pending, "4/abc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(stored.access_token.as_deref(), Some("at"));
        assert_eq!(stored.refresh_token.as_deref(), Some("rt"));
    }

    #[test]
    fn test_refresh_token_required() {
        let stored = StoredCredentials {
            access_token: Some("a".into()),
            ..Default::default()
        };
        assert!(Authenticator::from_refresh_token(client(), stored, None).is_err());
    }

    #[tokio::test]
    async fn test_fixed_token() {
        let auth = Authenticator::with_token("abc");
        assert_eq!(auth.get_access_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_valid_stored_token_is_reused() {
        let stored = StoredCredentials {
            access_token: Some("stored".into()),
            refresh_token: Some("refresh".into()),
            token_expiry: Some(Utc::now() + chrono::Duration::hours(1)),
            scopes: vec![],
        };
        let auth = Authenticator::from_refresh_token(client(), stored, None).unwrap();
        assert_eq!(auth.get_access_token().await.unwrap(), "stored");
    }
}
