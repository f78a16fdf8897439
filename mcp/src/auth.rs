//! Credential provider
//!
//! Every remote call asks a [`CredentialProvider`] for a bearer token. The
//! OAuth implementation keeps the authorized-user token file in the format
//! the Google client libraries write, refreshes it when it expires and falls
//! back to the installed-app loopback flow when there is nothing to refresh.

use crate::error::{McpError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gtools_config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tiny_http::{Request, Response, Server};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};
use uuid::Uuid;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this margin are treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// How long the loopback flow waits for the browser redirect
const AUTH_FLOW_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Source of access tokens for remote calls
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a currently valid bearer token
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token, for tests and pre-authorized deployments
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Authorized-user token file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "token", alias = "access_token", default)]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    /// Whether the cached access token can be used as of `now`
    ///
    /// A token without an expiry is taken at face value.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => false,
            (Some(token), _) if token.is_empty() => false,
            (Some(_), None) => true,
            (Some(_), Some(expiry)) => now + Duration::seconds(EXPIRY_SKEW_SECS) < expiry,
        }
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// OAuth credentials backed by the token and client-secrets files
pub struct OAuthCredentials {
    client_secrets_file: PathBuf,
    token_file: PathBuf,
    scopes: Vec<String>,
    http: reqwest::Client,
    cached: Mutex<Option<AuthorizedUser>>,
}

impl OAuthCredentials {
    /// Create a provider from the server configuration
    pub fn new(config: &Config) -> Self {
        Self {
            client_secrets_file: config.client_secrets_file.clone(),
            token_file: config.token_file.clone(),
            scopes: config.scopes.clone(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Token file this provider reads and writes
    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    /// Run the interactive authorization and persist the token file
    pub async fn authorize(&self) -> Result<()> {
        let user = self.run_installed_flow().await?;
        save_token_file(&self.token_file, &user)?;
        *self.cached.lock().await = Some(user);
        Ok(())
    }

    async fn refresh(&self, user: &AuthorizedUser) -> Result<AuthorizedUser> {
        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or_else(|| McpError::Configuration("Token has no refresh_token".to_string()))?;

        let (client_id, client_secret) = match (&user.client_id, &user.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                let secrets = load_client_secrets(&self.client_secrets_file)?;
                (secrets.client_id, secrets.client_secret)
            }
        };

        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.request_token(&user.token_uri, &form).await?;

        let mut refreshed = user.clone();
        refreshed.client_id = Some(client_id);
        refreshed.client_secret = Some(client_secret);
        apply_token_response(&mut refreshed, response, Utc::now());

        info!(token_file = %self.token_file.display(), "Access token refreshed");
        Ok(refreshed)
    }

    async fn run_installed_flow(&self) -> Result<AuthorizedUser> {
        let secrets = load_client_secrets(&self.client_secrets_file)?;

        let server = Server::http("127.0.0.1:0")
            .map_err(|e| McpError::Configuration(format!("Cannot bind loopback listener: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| McpError::Configuration("Loopback listener has no port".to_string()))?;
        let redirect_uri = format!("http://localhost:{}/", port);
        let state = Uuid::new_v4().simple().to_string();
        let scope = self.scopes.join(" ");

        let consent_url = Url::parse_with_params(
            &secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| McpError::Configuration(format!("Invalid auth_uri: {}", e)))?;

        // stdout carries the protocol
        eprintln!(
            "Please visit this URL to authorize this application:\n{}",
            consent_url
        );
        info!(port, "Waiting for OAuth redirect");

        let code = tokio::task::spawn_blocking(move || {
            receive_code(&server, &state, AUTH_FLOW_TIMEOUT)
        })
        .await
        .map_err(|e| McpError::Internal(format!("Redirect listener failed: {}", e)))??;

        let form = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.request_token(&secrets.token_uri, &form).await?;

        let mut user = AuthorizedUser {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: Some(secrets.client_id.clone()),
            client_secret: Some(secrets.client_secret.clone()),
            scopes: self.scopes.clone(),
            expiry: None,
        };
        apply_token_response(&mut user, response, Utc::now());

        info!("Authorization completed");
        Ok(user)
    }

    async fn request_token(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| McpError::Configuration(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Configuration(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| McpError::Configuration(format!("Invalid token response: {}", e)))
    }

    fn load_cached(&self) -> Option<AuthorizedUser> {
        if !self.token_file.exists() {
            return None;
        }

        match load_token_file(&self.token_file) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, path = %self.token_file.display(), "Ignoring unreadable token file");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentials {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = self.load_cached();
        }

        if let Some(user) = cached.as_ref() {
            if user.is_fresh(Utc::now()) {
                if let Some(token) = &user.token {
                    return Ok(token.clone());
                }
            }
        }

        if let Some(user) = cached.clone().filter(|u| u.refresh_token.is_some()) {
            match self.refresh(&user).await {
                Ok(refreshed) => {
                    save_token_file(&self.token_file, &refreshed)?;
                    let token = refreshed.token.clone().unwrap_or_default();
                    *cached = Some(refreshed);
                    return Ok(token);
                }
                Err(e) => warn!(error = %e, "Token refresh failed, starting authorization"),
            }
        }

        let user = self.run_installed_flow().await?;
        save_token_file(&self.token_file, &user)?;
        let token = user.token.clone().unwrap_or_default();
        *cached = Some(user);
        Ok(token)
    }
}

fn apply_token_response(user: &mut AuthorizedUser, response: TokenResponse, now: DateTime<Utc>) {
    user.token = Some(response.access_token);
    user.expiry = response.expires_in.map(|secs| now + Duration::seconds(secs));
    // Refresh responses usually omit the refresh token; keep the old one
    if response.refresh_token.is_some() {
        user.refresh_token = response.refresh_token;
    }
}

fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    if !path.exists() {
        return Err(McpError::Configuration(format!(
            "Client secrets file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| {
        McpError::Configuration(format!("Invalid client secrets file {}: {}", path.display(), e))
    })?;

    file.installed.or(file.web).ok_or_else(|| {
        McpError::Configuration(format!(
            "Client secrets file {} has no 'installed' or 'web' section",
            path.display()
        ))
    })
}

/// Read an authorized-user token file
pub fn load_token_file(path: &Path) -> Result<AuthorizedUser> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| McpError::Configuration(format!("Invalid token file {}: {}", path.display(), e)))
}

/// Write an authorized-user token file, creating its directory
pub fn save_token_file(path: &Path, user: &AuthorizedUser) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(user)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    debug!(path = %path.display(), "Token file written");
    Ok(())
}

/// Query parameters of an OAuth redirect
#[derive(Debug, Default, PartialEq)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn redirect_params(url: &str) -> RedirectParams {
    let query = url.split_once('?').map_or("", |(_, query)| query);
    let mut params = RedirectParams::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let slot = match key.as_ref() {
            "code" => &mut params.code,
            "state" => &mut params.state,
            "error" => &mut params.error,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }

    params
}

/// Serve loopback requests until one carries the authorization code
///
/// Blocks the calling thread; gives up once `timeout` has passed.
fn receive_code(
    server: &Server,
    expected_state: &str,
    timeout: std::time::Duration,
) -> Result<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(McpError::Configuration(
                "Timed out waiting for authorization".to_string(),
            ));
        }

        let Some(request) = server.recv_timeout(remaining)? else {
            continue;
        };
        let params = redirect_params(request.url());

        if let Some(error) = params.error {
            respond(request, 400, "Authorization was denied.");
            return Err(McpError::Configuration(format!("Authorization failed: {}", error)));
        }

        let Some(code) = params.code else {
            // Browsers also ask for /favicon.ico
            respond(request, 404, "Not found.");
            continue;
        };

        if params.state.as_deref() != Some(expected_state) {
            respond(request, 400, "State mismatch.");
            return Err(McpError::Configuration(
                "Authorization state mismatch".to_string(),
            ));
        }

        respond(
            request,
            200,
            "The authentication flow has completed. You may close this window.",
        );
        return Ok(code);
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let response = Response::from_string(body).with_status_code(status);
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "Failed to answer loopback request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        Config {
            client_secrets_file: dir.join("oauth.keys.json"),
            token_file: dir.join("token.json"),
            backup_dir: dir.join("backups"),
            ..Config::default()
        }
    }

    #[test]
    fn test_token_freshness() {
        let now = Utc::now();
        let mut user = AuthorizedUser {
            token: Some("ya29.token".to_string()),
            expiry: Some(now + Duration::minutes(30)),
            ..AuthorizedUser::default()
        };
        assert!(user.is_fresh(now));

        user.expiry = Some(now + Duration::seconds(30));
        assert!(!user.is_fresh(now));

        user.expiry = None;
        assert!(user.is_fresh(now));

        user.token = None;
        assert!(!user.is_fresh(now));
    }

    #[test]
    fn test_parse_library_token_file() {
        let content = r#"{
            "token": "ya29.a0Af",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "expiry": "2030-01-31T12:00:00.123456Z"
        }"#;

        let user: AuthorizedUser = serde_json::from_str(content).unwrap();
        assert_eq!(user.token.as_deref(), Some("ya29.a0Af"));
        assert_eq!(user.refresh_token.as_deref(), Some("1//0g"));
        assert!(user.is_fresh(Utc::now()));
    }

    #[test]
    fn test_access_token_alias() {
        let user: AuthorizedUser =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(user.token.as_deref(), Some("abc"));
        assert_eq!(user.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_refresh_keeps_refresh_token() {
        let now = Utc::now();
        let mut user = AuthorizedUser {
            refresh_token: Some("keep-me".to_string()),
            ..AuthorizedUser::default()
        };
        let response = TokenResponse {
            access_token: "new".to_string(),
            expires_in: Some(3599),
            refresh_token: None,
        };

        apply_token_response(&mut user, response, now);
        assert_eq!(user.token.as_deref(), Some("new"));
        assert_eq!(user.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(user.expiry, Some(now + Duration::seconds(3599)));
    }

    #[test]
    fn test_client_secrets_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oauth.keys.json");

        std::fs::write(&path, r#"{"web": {"client_id": "id", "client_secret": "s"}}"#).unwrap();
        let secrets = load_client_secrets(&path).unwrap();
        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);

        std::fs::write(&path, r#"{"other": {}}"#).unwrap();
        assert!(matches!(
            load_client_secrets(&path),
            Err(McpError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_secrets_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let provider = OAuthCredentials::new(&config_in(dir.path()));

        match provider.access_token().await {
            Err(McpError::Configuration(msg)) => assert!(msg.contains("Client secrets file not found")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_token_file_is_used() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let user = AuthorizedUser {
            token: Some("cached".to_string()),
            expiry: Some(Utc::now() + Duration::hours(1)),
            ..AuthorizedUser::default()
        };
        save_token_file(&config.token_file, &user).unwrap();

        let provider = OAuthCredentials::new(&config);
        assert_eq!(provider.access_token().await.unwrap(), "cached");
    }

    #[test]
    fn test_token_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let user = AuthorizedUser {
            token: Some("t".to_string()),
            refresh_token: Some("r".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            ..AuthorizedUser::default()
        };

        save_token_file(&path, &user).unwrap();
        assert_eq!(load_token_file(&path).unwrap(), user);
    }

    #[test]
    fn test_redirect_params() {
        let params = redirect_params("/?state=s1&code=4%2F0Ab-x&scope=email+profile");
        assert_eq!(params.code.as_deref(), Some("4/0Ab-x"));
        assert_eq!(params.state.as_deref(), Some("s1"));
        assert!(params.error.is_none());

        assert_eq!(redirect_params("/favicon.ico"), RedirectParams::default());
        assert_eq!(
            redirect_params("/?error=access_denied&state=s1").error.as_deref(),
            Some("access_denied")
        );
    }

    #[tokio::test]
    async fn test_loopback_skips_stray_requests() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let listener = tokio::task::spawn_blocking(move || {
            receive_code(&server, "s1", std::time::Duration::from_secs(10))
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let base = format!("http://127.0.0.1:{}", port);

        let favicon = client
            .get(format!("{}/favicon.ico", base))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), 404);

        let redirect = client
            .get(format!("{}/?code=c1&state=s1", base))
            .send()
            .await
            .unwrap();
        assert_eq!(redirect.status(), 200);

        assert_eq!(listener.await.unwrap().unwrap(), "c1");
    }

    #[tokio::test]
    async fn test_loopback_rejects_state_mismatch() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let listener = tokio::task::spawn_blocking(move || {
            receive_code(&server, "s1", std::time::Duration::from_secs(10))
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client
            .get(format!("http://127.0.0.1:{}/?code=c1&state=forged", port))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        match listener.await.unwrap() {
            Err(McpError::Configuration(msg)) => assert!(msg.contains("state mismatch")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_loopback_times_out() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let result = receive_code(&server, "s1", std::time::Duration::from_millis(50));
        assert!(matches!(result, Err(McpError::Configuration(msg)) if msg.contains("Timed out")));
    }
}
