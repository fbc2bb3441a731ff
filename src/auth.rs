use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Read-only access is all an export needs
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Environment variable holding a pre-issued OAuth access token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this many seconds before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Assertion lifetime accepted by Google's token endpoint
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Google authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Sign a JWT with a service account key and exchange it for a token
    ServiceAccount,
    /// Use a token taken from the environment as is
    EnvironmentToken,
}

/// Fields of a service account JSON key that the token exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Load a key from its JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key: {:?}", path))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse service account key: {:?}", path))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
    },
    Static(String),
}

/// Hands out bearer tokens for Drive requests, refreshing them as needed
pub struct Authenticator {
    source: TokenSource,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    /// Detect credentials according to the configured auth method
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let key_path = config.key_file_path();
        let strategy = Self::detect_strategy(&config.credentials.auth_method, &key_path)?;

        info!("Using authentication strategy: {:?}", strategy);

        match strategy {
            AuthStrategy::ServiceAccount => {
                let key = ServiceAccountKey::load(&key_path)?;
                Self::service_account(key, http)
            }
            AuthStrategy::EnvironmentToken => {
                let token = Self::try_environment_token()?;
                Ok(Self::static_token(token, http))
            }
        }
    }

    /// Build an authenticator from an already loaded service account key
    pub fn service_account(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM key")?;

        debug!("Loaded service account key for {}", key.client_email);

        Ok(Self {
            source: TokenSource::ServiceAccount { key, encoding_key },
            http,
            cached: Mutex::new(None),
        })
    }

    /// Build an authenticator that always returns the given token
    pub fn static_token(token: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            http,
            cached: Mutex::new(None),
        }
    }

    fn detect_strategy(auth_method: &str, key_path: &Path) -> Result<AuthStrategy> {
        match auth_method {
            "auto" => {
                if key_path.exists() {
                    Ok(AuthStrategy::ServiceAccount)
                } else if env::var(ACCESS_TOKEN_ENV).is_ok() {
                    Ok(AuthStrategy::EnvironmentToken)
                } else {
                    Err(anyhow!(
                        "No Google credentials found. Please either:\n\
                         1. Place a service account key at {}\n\
                         2. Pass the key file name with --keyfile\n\
                         3. Set the {} environment variable",
                        key_path.display(),
                        ACCESS_TOKEN_ENV
                    ))
                }
            }
            "service_account" => Ok(AuthStrategy::ServiceAccount),
            "token" => Ok(AuthStrategy::EnvironmentToken),
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    fn try_environment_token() -> Result<String> {
        let token = env::var(ACCESS_TOKEN_ENV)
            .with_context(|| format!("{} environment variable not set", ACCESS_TOKEN_ENV))?;

        if token.trim().is_empty() {
            return Err(anyhow!("{} is empty", ACCESS_TOKEN_ENV));
        }

        if !token.starts_with("ya29.") {
            warn!("{} doesn't look like a Google access token", ACCESS_TOKEN_ENV);
        }

        Ok(token.trim().to_string())
    }

    /// Return a valid access token, exchanging a fresh assertion when needed
    pub async fn access_token(&self) -> Result<String> {
        let (key, encoding_key) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount { key, encoding_key } => (key, encoding_key),
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting access token for {}", key.client_email);
        let token = self.exchange_assertion(key, encoding_key, now).await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    async fn exchange_assertion(
        &self,
        key: &ServiceAccountKey,
        encoding_key: &EncodingKey,
        now: i64,
    ) -> Result<CachedToken> {
        let claims = Claims {
            iss: &key.client_email,
            scope: DRIVE_READONLY_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        let assertion =
            encode(&header, &claims, encoding_key).context("Failed to sign token assertion")?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Token exchange failed ({}): {}", status, body.trim()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
        })
    }
}
