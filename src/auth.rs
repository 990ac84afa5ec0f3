//! OAuth2 credential manager.
//!
//! Obtains and persists a Google OAuth token for the Drive backup flow:
//! read from the local cache when possible, otherwise run the interactive
//! authorization-code exchange once and cache the result. Access tokens
//! are refreshed transparently when the cached one has expired.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// File-level access only. Changing this invalidates cached tokens at
/// `~/.credentials/vaultsync/drive-token.json`.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Tokens within this window of their expiry are treated as expired.
const EXPIRY_SKEW_SECONDS: i64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Wrapper object of Google's client_secret.json: credentials live under
/// an `installed` or `web` key depending on the console's client type.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

/// OAuth client credentials parsed from a client_secret.json file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SyncError::Config {
            message: format!("Unable to read client secret file {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;

        let parsed: ClientSecretFile = serde_json::from_str(&raw).map_err(|e| {
            SyncError::Config {
                message: format!("Unable to parse client secret file {}: {e}", path.display()),
                source: Some(Box::new(e)),
            }
        })?;

        parsed.installed.or(parsed.web).ok_or_else(|| {
            SyncError::config(format!(
                "Client secret file {} has neither an 'installed' nor a 'web' section",
                path.display()
            ))
        })
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT_URI)
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

/// Token record persisted to the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Refresh responses may omit the refresh token; keep the previous one.
    fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiry: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    pub fn is_fresh(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS) < expiry,
            None => false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(SyncError::token_cache)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the token, tightening permissions so only the owner can
    /// reach the cache directory and file.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving token to {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SyncError::token_cache)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = std::fs::metadata(parent)
                    .map_err(SyncError::token_cache)?
                    .permissions();
                perms.set_mode(0o700); // rwx------
                std::fs::set_permissions(parent, perms).map_err(SyncError::token_cache)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(SyncError::token_cache)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)
                .map_err(SyncError::token_cache)?
                .permissions();
            perms.set_mode(0o600); // rw-------
            std::fs::set_permissions(path, perms).map_err(SyncError::token_cache)?;
        }

        Ok(())
    }
}

/// Fixed cache location: `<home>/.credentials/vaultsync/drive-token.json`.
pub fn token_cache_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SyncError::config("Could not find home directory"))?;
    Ok(home
        .join(".credentials")
        .join("vaultsync")
        .join("drive-token.json"))
}

/// Bootstraps an authorized Drive credential from the token cache, or via
/// the interactive authorization-code flow on first use.
pub struct Authenticator {
    secret: ClientSecret,
    cache_path: PathBuf,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn from_secret_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ClientSecret::from_file(path)?, token_cache_path()?))
    }

    pub fn new(secret: ClientSecret, cache_path: PathBuf) -> Self {
        Self {
            secret,
            cache_path,
            http: reqwest::Client::new(),
        }
    }

    pub async fn authenticate(self) -> Result<DriveAuth> {
        let token = match StoredToken::load(&self.cache_path) {
            Ok(token) => {
                debug!("Loaded cached token from {:?}", self.cache_path);
                token
            }
            Err(_) => {
                let token = self.token_from_web().await?;
                info!("Saving credential file to: {}", self.cache_path.display());
                token.save(&self.cache_path)?;
                token
            }
        };

        Ok(DriveAuth {
            secret: self.secret,
            token,
            cache_path: self.cache_path,
            http: self.http,
        })
    }

    /// Interactive authorization-code flow: print the consent URL, block on
    /// a one-time code typed by the operator, exchange it for a token.
    async fn token_from_web(&self) -> Result<StoredToken> {
        let auth_url = self.authorization_url()?;
        println!("Go to the following link in your browser then type the authorization code:");
        println!("{auth_url}");

        let code = read_authorization_code()?;
        self.exchange_code(code.trim()).await
    }

    fn authorization_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.secret.auth_uri).map_err(|e| SyncError::Auth {
            message: format!("Invalid authorization endpoint: {e}"),
            source: Some(Box::new(e)),
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.secret.client_id)
            .append_pair("redirect_uri", self.secret.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", DRIVE_FILE_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("state", "state-token");

        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.secret.redirect_uri()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::Auth {
                message: format!("Token exchange request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(format!(
                "Unable to retrieve token from web: {error_text}"
            )));
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| SyncError::Auth {
                message: format!("Malformed token response: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(StoredToken::from_response(token_response, None))
    }
}

fn read_authorization_code() -> Result<String> {
    print!("Authorization code: ");
    io::stdout()
        .flush()
        .map_err(|e| SyncError::auth(format!("Unable to prompt for authorization code: {e}")))?;

    let mut code = String::new();
    io::stdin()
        .lock()
        .read_line(&mut code)
        .map_err(|e| SyncError::auth(format!("Unable to read authorization code: {e}")))?;

    if code.trim().is_empty() {
        return Err(SyncError::auth("Empty authorization code"));
    }
    Ok(code)
}

/// Authorized credential handle. Hands out a usable access token on
/// demand, refreshing and re-persisting it once the cached one expires.
#[derive(Debug)]
pub struct DriveAuth {
    secret: ClientSecret,
    token: StoredToken,
    cache_path: PathBuf,
    http: reqwest::Client,
}

impl DriveAuth {
    pub fn new(secret: ClientSecret, token: StoredToken, cache_path: PathBuf) -> Self {
        Self {
            secret,
            token,
            cache_path,
            http: reqwest::Client::new(),
        }
    }

    pub async fn access_token(&mut self) -> Result<String> {
        if self.token.is_fresh() {
            return Ok(self.token.access_token.clone());
        }
        self.refresh().await?;
        Ok(self.token.access_token.clone())
    }

    async fn refresh(&mut self) -> Result<()> {
        info!("Refreshing OAuth access token");

        let refresh_token = self.token.refresh_token.clone().ok_or_else(|| {
            SyncError::auth(
                "Cached token expired and no refresh token is available; \
                 delete the cache file and re-authorize",
            )
        })?;

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::Auth {
                message: format!("Token refresh request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(format!("Token refresh failed: {error_text}")));
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| SyncError::Auth {
                message: format!("Malformed token refresh response: {e}"),
                source: Some(Box::new(e)),
            })?;

        self.token = StoredToken::from_response(token_response, Some(refresh_token));
        self.token.save(&self.cache_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn secret() -> ClientSecret {
        ClientSecret {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            redirect_uris: vec![OOB_REDIRECT_URI.to_string()],
        }
    }

    #[test]
    fn parses_installed_client_secret() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"abc","client_secret":"xyz",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "redirect_uris":["urn:ietf:wg:oauth:2.0:oob","http://localhost"]}}"#,
        )
        .unwrap();

        let parsed = ClientSecret::from_file(&path).unwrap();
        assert_eq!(parsed.client_id, "abc");
        assert_eq!(parsed.redirect_uri(), "urn:ietf:wg:oauth:2.0:oob");
    }

    #[test]
    fn parses_web_client_secret_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("client_secret.json");
        std::fs::write(&path, r#"{"web":{"client_id":"abc","client_secret":"xyz"}}"#).unwrap();

        let parsed = ClientSecret::from_file(&path).unwrap();
        assert_eq!(parsed.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(parsed.redirect_uri(), OOB_REDIRECT_URI);
    }

    #[test]
    fn rejects_secret_without_client_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("client_secret.json");
        std::fs::write(&path, r#"{"something_else":{}}"#).unwrap();
        assert!(ClientSecret::from_file(&path).is_err());
    }

    #[test]
    fn authorization_url_carries_scope_and_offline_access() {
        let auth = Authenticator::new(secret(), PathBuf::from("/tmp/unused"));
        let url = auth.authorization_url().unwrap();
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(query.contains(&("scope".to_string(), DRIVE_FILE_SCOPE.to_string())));
        assert!(query.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(query.contains(&("client_id".to_string(), "test-client-id".to_string())));
        assert!(query.contains(&("response_type".to_string(), "code".to_string())));
    }

    #[test]
    fn token_freshness() {
        let mut token = StoredToken {
            access_token: "t".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expiry: Some(Utc::now() + Duration::hours(1)),
        };
        assert!(token.is_fresh());

        token.expiry = Some(Utc::now() - Duration::hours(1));
        assert!(!token.is_fresh());

        // An expiry inside the skew window counts as expired
        token.expiry = Some(Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS / 2));
        assert!(!token.is_fresh());

        token.expiry = None;
        assert!(!token.is_fresh());
    }

    #[test]
    fn token_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache").join("drive-token.json");

        let token = StoredToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expiry: Some(Utc::now() + Duration::hours(1)),
        };
        token.save(&path).unwrap();

        let loaded = StoredToken::load(&path).unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token, Some("refresh".to_string()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(file_mode & 0o777, 0o600);
            let dir_mode = std::fs::metadata(path.parent().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(dir_mode & 0o777, 0o700);
        }
    }

    #[test]
    fn cache_path_is_under_home_credentials() {
        let path = token_cache_path().unwrap();
        assert!(path.ends_with(".credentials/vaultsync/drive-token.json"));
    }
}
