use crate::scope::{Scope, ScopePolicy, ScopeSet};
use crate::token::SigningKey;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Upper bound for either token lifetime: ten years, in seconds.
pub const MAX_TOKEN_LIFETIME: i64 = 10 * 365 * 24 * 3600;

#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    /// Seconds.
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    /// Seconds.
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    /// Revoke the presented refresh token when a new one is issued for it.
    #[serde(default = "default_true")]
    pub rotate_refresh_tokens: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            rotate_refresh_tokens: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScopeConfig {
    #[serde(default = "default_registered_scopes")]
    pub registered: Vec<String>,
    #[serde(default = "default_default_scopes")]
    pub default: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            registered: default_registered_scopes(),
            default: default_default_scopes(),
        }
    }
}

impl ScopeConfig {
    pub fn policy(&self) -> Result<ScopePolicy, ConfigError> {
        let registered = parse_scopes("scopes.registered", &self.registered)?;
        let defaults = parse_scopes("scopes.default", &self.default)?;
        if !defaults.is_subset(&registered) {
            return Err(ConfigError::Validation(
                "scopes.default must be a subset of scopes.registered".into(),
            ));
        }
        Ok(ScopePolicy::new(registered, defaults))
    }
}

fn parse_scopes(key: &str, names: &[String]) -> Result<ScopeSet, ConfigError> {
    names
        .iter()
        .map(|name| {
            name.parse::<Scope>()
                .map_err(|_| ConfigError::Validation(format!("{key}: unknown scope `{name}`")))
        })
        .collect()
}

/// Account created at startup when missing.
#[derive(Clone, Deserialize)]
pub struct BootstrapUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl fmt::Debug for BootstrapUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish()
    }
}

/// PEM-encoded RS256 key pair.
#[derive(Clone, Deserialize)]
pub struct RsaKeyConfig {
    pub private_pem: String,
    pub public_pem: String,
}

impl fmt::Debug for RsaKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyConfig")
            .field("private_pem", &"<redacted>")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Written to the `iss` claim and required on verification.
    pub issuer: String,
    /// HMAC secret for HS256 token signatures. Unused when `signing_key` is set.
    #[serde(default)]
    pub signing_secret: String,
    /// Sign with RS256 instead of HS256.
    #[serde(default)]
    pub signing_key: Option<RsaKeyConfig>,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub scopes: ScopeConfig,
    #[serde(default)]
    pub bootstrap_user: Option<BootstrapUser>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("listen_addr", &self.listen_addr)
            .field("issuer", &self.issuer)
            .field("signing_secret", &"<redacted>")
            .field("signing_key", &self.signing_key)
            .field("tokens", &self.tokens)
            .field("scopes", &self.scopes)
            .field("bootstrap_user", &self.bootstrap_user)
            .finish()
    }
}

impl AppConfig {
    /// The token signing key: RS256 from `signing_key` if present, otherwise
    /// HS256 from `signing_secret`.
    pub fn signing_key(&self) -> Result<SigningKey, ConfigError> {
        match &self.signing_key {
            Some(rsa) => {
                SigningKey::from_rsa_pem(rsa.private_pem.as_bytes(), rsa.public_pem.as_bytes())
                    .map_err(|e| ConfigError::Validation(format!("signing_key: {e}")))
            }
            None if self.signing_secret.len() < 32 => Err(ConfigError::Validation(
                "signing_secret must be at least 32 bytes".into(),
            )),
            None => Ok(SigningKey::from_secret(self.signing_secret.as_bytes())),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signing_key()?;
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Validation("issuer must not be empty".into()));
        }
        if self.tokens.access_token_lifetime <= 0 {
            return Err(ConfigError::Validation(
                "tokens.access_token_lifetime must be > 0".into(),
            ));
        }
        if self.tokens.refresh_token_lifetime < self.tokens.access_token_lifetime {
            return Err(ConfigError::Validation(
                "tokens.refresh_token_lifetime must not be shorter than tokens.access_token_lifetime"
                    .into(),
            ));
        }
        if self.tokens.refresh_token_lifetime > MAX_TOKEN_LIFETIME {
            return Err(ConfigError::Validation(format!(
                "token lifetimes must not exceed {MAX_TOKEN_LIFETIME} seconds"
            )));
        }
        self.scopes.policy()?;
        if let Some(user) = &self.bootstrap_user
            && (user.username.trim().is_empty() || user.password.is_empty())
        {
            return Err(ConfigError::Validation(
                "bootstrap_user needs a username and a password".into(),
            ));
        }
        Ok(())
    }
}

fn default_access_token_lifetime() -> i64 {
    3600
}

fn default_refresh_token_lifetime() -> i64 {
    7 * 24 * 3600
}

fn default_true() -> bool {
    true
}

fn default_registered_scopes() -> Vec<String> {
    Scope::ALL.iter().map(|s| s.as_str().to_string()).collect()
}

fn default_default_scopes() -> Vec<String> {
    [Scope::OpenId, Scope::Profile, Scope::OfflineAccess]
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variables override file values using the key path separated by
/// double underscores, e.g. `TOKENS__ACCESS_TOKEN_LIFETIME=1800`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

/// Same as [`load_config`] with an explicit file. A missing file is allowed
/// as long as the environment supplies the required keys.
pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
