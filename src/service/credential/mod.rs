//! OAuth credential lifecycle for the Google capabilities.
//!
//! A credential is cached in one JSON file per capability scope. On every
//! acquisition the file is read, the token is refreshed in place when it has
//! merely expired, and the interactive consent flow runs when nothing usable
//! is on disk. Whatever comes out of a refresh or a consent is written back.

mod consent;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::base::{
    config::Config,
    error::{AssistantError, CapabilityRes},
};

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

// Scopes.

/// External permission grant a credential is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityScope {
    /// Read-only access to the mailbox.
    ReadMessages,
    /// Read/write access to calendars.
    ScheduledEvents,
}

impl CapabilityScope {
    /// The OAuth scope URLs for this capability.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            CapabilityScope::ReadMessages => &["https://www.googleapis.com/auth/gmail.readonly"],
            CapabilityScope::ScheduledEvents => &["https://www.googleapis.com/auth/calendar"],
        }
    }

    /// Where the credential for this capability is persisted.
    pub fn token_path(&self, config: &Config) -> PathBuf {
        match self {
            CapabilityScope::ReadMessages => config.gmail_token_path.clone(),
            CapabilityScope::ScheduledEvents => config.calendar_token_path.clone(),
        }
    }
}

// Credential.

/// Persisted authorization material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credential {
    /// Whether every requested scope was granted.
    pub fn covers(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }

    /// Whether the access token is past (or about to pass) its expiry.
    ///
    /// A credential without an expiry never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now + Duration::seconds(EXPIRY_SKEW_SECS))
    }

    /// Whether the credential can be used as-is for `scopes`.
    pub fn is_valid(&self, scopes: &[&str], now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.covers(scopes) && !self.is_expired(now)
    }
}

/// OAuth client descriptor as downloaded from the Google Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

// Manager.

/// Obtains and persists credentials.
///
/// It is designed to be trivially cloneable. Read-refresh-write of each
/// credential file is serialized through a per-file lock.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<CredentialManagerInner>,
}

struct CredentialManagerInner {
    http: reqwest::Client,
    client_secret_path: PathBuf,
    auth_base_url: String,
    consent: consent::ConsentOptions,
    locks: std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl CredentialManager {
    /// Create a new credential manager.
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(CredentialManagerInner {
                http,
                client_secret_path: config.google_client_secret_path.clone(),
                auth_base_url: config.google_auth_base_url.clone(),
                consent: consent::ConsentOptions {
                    timeout: StdDuration::from_secs(config.google_consent_timeout_secs),
                    open_browser: config.google_consent_open_browser,
                },
                locks: std::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Acquire a usable credential for `scope`, persisted at `path`.
    #[instrument(name = "CredentialManager::acquire", skip(self))]
    pub async fn acquire(&self, scope: CapabilityScope, path: &Path) -> CapabilityRes<Credential> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        let scopes = scope.scopes();
        let now = Utc::now();
        let existing = load_credential(path).await?;

        if let Some(credential) = &existing
            && credential.is_valid(scopes, now)
        {
            return Ok(credential.clone());
        }

        let credential = match existing {
            Some(credential) if credential.covers(scopes) && credential.is_expired(now) && credential.refresh_token.is_some() => {
                info!("Refreshing expired credential at {}", path.display());
                self.refresh(credential).await?
            }
            _ => {
                info!("No usable credential at {}; starting interactive authorization", path.display());
                self.authorize(scopes).await?
            }
        };

        persist_credential(path, &credential).await?;

        Ok(credential)
    }

    /// Exchange the refresh token for a new access token.
    #[instrument(name = "CredentialManager::refresh", skip_all)]
    async fn refresh(&self, credential: Credential) -> CapabilityRes<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| AssistantError::Authorization("credential has no refresh token".to_string()))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.inner.http.post(&credential.token_uri).form(&params).send().await?;
        let token = read_token_response(response).await?;

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            ..credential
        })
    }

    /// Run the consent flow and exchange the resulting code.
    #[instrument(name = "CredentialManager::authorize", skip_all)]
    async fn authorize(&self, scopes: &[&str]) -> CapabilityRes<Credential> {
        let secret = self.load_client_secret().await?;
        let auth_uri = secret.auth_uri.clone().unwrap_or_else(|| self.inner.auth_base_url.clone());

        let grant = consent::obtain_consent(&auth_uri, &secret.client_id, scopes, self.inner.consent).await?;

        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", grant.code.as_str()),
            ("redirect_uri", grant.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self.inner.http.post(&secret.token_uri).form(&params).send().await?;
        let token = read_token_response(response).await?;

        let granted = match token.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => scopes.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            scopes: granted,
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
        })
    }

    /// Read the client-secret descriptor; its absence is a configuration error.
    async fn load_client_secret(&self) -> CapabilityRes<ClientSecret> {
        let path = &self.inner.client_secret_path;

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssistantError::Configuration(format!(
                    "{} not found. Please download an OAuth client descriptor from the Google Cloud Console.",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let file: ClientSecretFile = serde_json::from_str(&raw)?;

        file.installed
            .or(file.web)
            .ok_or_else(|| AssistantError::Configuration(format!("{} has neither an `installed` nor a `web` client.", path.display())))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        // A poisoned map only means another acquire panicked; the locks themselves are still fine.
        let mut locks = self.inner.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

// Helpers.

/// Read a persisted credential, treating an undecodable file as absent.
async fn load_credential(path: &Path) -> CapabilityRes<Option<Credential>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(credential) => Ok(Some(credential)),
        Err(e) => {
            warn!("Ignoring unreadable credential at {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Write the credential, replacing any previous content.
async fn persist_credential(path: &Path, credential: &Credential) -> CapabilityRes<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(credential)?;
    tokio::fs::write(path, json).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

/// Turn a token endpoint response into a `TokenResponse`, or an authorization error.
async fn read_token_response(response: reqwest::Response) -> CapabilityRes<TokenResponse> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AssistantError::Authorization(format!("token endpoint responded with HTTP {}: {}", status.as_u16(), body)));
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

// Tests.

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::base::{config::ConfigInner, error::ErrorKind};

    fn manager(dir: &Path) -> CredentialManager {
        let config = Config::from(ConfigInner {
            google_client_secret_path: dir.join("credentials.json"),
            ..Default::default()
        });

        CredentialManager::new(&config, reqwest::Client::new())
    }

    fn credential(token_uri: &str, expires_at: Option<DateTime<Utc>>) -> Credential {
        Credential {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at,
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
            token_uri: token_uri.to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
        }
    }

    async fn write(path: &Path, credential: &Credential) {
        tokio::fs::write(path, serde_json::to_string(credential).unwrap()).await.unwrap();
    }

    #[test]
    fn test_expiry_skew() {
        let now = Utc::now();
        let soon = credential("http://unused", Some(now + Duration::seconds(30)));
        let later = credential("http://unused", Some(now + Duration::hours(1)));
        let never = credential("http://unused", None);

        assert!(soon.is_expired(now));
        assert!(!later.is_expired(now));
        assert!(!never.is_expired(now));
    }

    #[test]
    fn test_scope_coverage() {
        let credential = credential("http://unused", None);

        assert!(credential.covers(CapabilityScope::ReadMessages.scopes()));
        assert!(!credential.covers(CapabilityScope::ScheduledEvents.scopes()));
    }

    #[tokio::test]
    async fn test_valid_credential_is_used_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail_token.json");
        let stored = credential("http://127.0.0.1:9/unreachable", Some(Utc::now() + Duration::hours(1)));
        write(&path, &stored).await;

        let acquired = manager(dir.path()).acquire(CapabilityScope::ReadMessages, &path).await.unwrap();

        assert_eq!(acquired, stored);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed_and_persisted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.new", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail_token.json");
        write(&path, &credential(&format!("{}/token", server.url()), Some(Utc::now() - Duration::hours(1)))).await;

        let acquired = manager(dir.path()).acquire(CapabilityScope::ReadMessages, &path).await.unwrap();

        mock.assert_async().await;
        assert_eq!(acquired.access_token, "ya29.new");
        assert_eq!(acquired.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!acquired.is_expired(Utc::now()));

        let persisted: Credential = serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(persisted, acquired);
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_an_authorization_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/token").with_status(400).with_body(r#"{"error": "invalid_grant"}"#).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail_token.json");
        write(&path, &credential(&format!("{}/token", server.url()), Some(Utc::now() - Duration::hours(1)))).await;

        let err = manager(dir.path()).acquire(CapabilityScope::ReadMessages, &path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail_token.json");

        let err = manager(dir.path()).acquire(CapabilityScope::ReadMessages, &path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("credentials.json"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scope_mismatch_requires_reauthorization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar_token.json");
        write(&path, &credential("http://127.0.0.1:9/unreachable", Some(Utc::now() + Duration::hours(1)))).await;

        let err = manager(dir.path()).acquire(CapabilityScope::ScheduledEvents, &path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail_token.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let err = manager(dir.path()).acquire(CapabilityScope::ReadMessages, &path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_abandoned_consent_releases_the_credential_lock() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("credentials.json"), r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#)
            .await
            .unwrap();

        let config = Config::from(ConfigInner {
            google_client_secret_path: dir.path().join("credentials.json"),
            google_consent_timeout_secs: 1,
            google_consent_open_browser: false,
            ..Default::default()
        });
        let manager = CredentialManager::new(&config, reqwest::Client::new());
        let path = dir.path().join("gmail_token.json");

        let first = {
            let manager = manager.clone();
            let path = path.clone();
            tokio::spawn(async move { manager.acquire(CapabilityScope::ReadMessages, &path).await })
        };
        tokio::task::yield_now().await;

        let second = tokio::time::timeout(StdDuration::from_secs(10), manager.acquire(CapabilityScope::ReadMessages, &path))
            .await
            .expect("second acquire stayed blocked behind the first consent");

        let first = first.await.unwrap().unwrap_err();
        assert_eq!(first.kind(), ErrorKind::Authorization);
        assert!(first.to_string().contains("not completed within 1 seconds"));

        assert_eq!(second.unwrap_err().kind(), ErrorKind::Authorization);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_descriptor_without_client_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("credentials.json"), "{}").await.unwrap();

        let err = manager(dir.path()).load_client_secret().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_descriptor_parses_installed_client() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("credentials.json"),
            r#"{"installed": {"client_id": "id", "client_secret": "secret", "auth_uri": "https://accounts.google.com/o/oauth2/auth"}}"#,
        )
        .await
        .unwrap();

        let secret = manager(dir.path()).load_client_secret().await.unwrap();

        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(secret.auth_uri.as_deref(), Some("https://accounts.google.com/o/oauth2/auth"));
    }
}
