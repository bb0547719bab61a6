use crate::auth::{MAX_HASH_COST, MIN_HASH_COST};
use crate::error::ConfigError;

/// Minimum HMAC key length accepted for signing access tokens
const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub delivery: DeliverySettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub issuer: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl AuthSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired("auth.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must be a positive number of seconds".to_string(),
            ));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.password_hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        Ok(())
    }
}

/// How issued credentials travel between client and server
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Tokens in the JSON body, access token replayed in `Authorization: Bearer`
    #[default]
    Json,
    /// Tokens in HttpOnly cookies
    Cookie,
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DeliverySettings {
    pub mode: DeliveryMode,
    pub access_cookie_name: String,
    pub refresh_cookie_name: String,
    pub access_cookie_path: String,
    pub refresh_cookie_path: String,
    pub cookie_max_age: i64,  // seconds
    pub secure_cookies: bool,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Json,
            access_cookie_name: "accessCookie".to_string(),
            refresh_cookie_name: "refreshCookie".to_string(),
            access_cookie_path: "/api".to_string(),
            refresh_cookie_path: "/api/auth/refresh".to_string(),
            cookie_max_age: 24 * 60 * 60,
            secure_cookies: false,
        }
    }
}

/// Reads `configuration.{yaml,toml,json}` and then `APP_*` environment overrides,
/// e.g. `APP_AUTH__SECRET` or `APP_DELIVERY__MODE=cookie`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
