//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BASE_URL` - Public URL of this API (used for OAuth and webhook callbacks)
//! - `FRONTEND_URL` - Public URL of the customer/admin frontend
//! - `ETSY_CLIENT_ID` - Etsy app keystring
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 5000)
//! - `FRONTEND_URL_ALT` - Additional allowed CORS origin
//! - `ETSY_CLIENT_SECRET` - Etsy shared secret (sent as `keystring:secret` in `x-api-key`)
//! - `ETSY_STORE_SECTION_ID` - Shop section whose listings get scratch cards
//! - `ETSY_WEBHOOK_SECRET` - Signing secret for incoming webhooks
//! - `ETSY_WEBHOOK_CALLBACK_URL` - Callback URL registered with Etsy
//!   (default: `{BASE_URL}/api/etsy/etsy-webhook`)
//! - `ETSY_API_BASE_URL`, `ETSY_TOKEN_URL`, `ETSY_CONNECT_URL` - Endpoint overrides
//! - `ALLOW_ADMIN_REGISTRATION` - Keep admin registration open (default: false)
//! - `SESSION_CROSS_SITE` - Issue `SameSite=None` session cookies (default: false)
//! - `ORDER_POLL_ENABLED` - Run the order poller (default: true)
//! - `ORDER_POLL_SCHEDULE` - Cron expression for the poller (default: every 4 minutes)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (blob storage - enables template uploads)
//! - `SUPABASE_URL` - Supabase project URL
//! - `SUPABASE_SERVICE_KEY` - Service role key
//! - `SUPABASE_BUCKETNAME` - Bucket holding template images
//!
//! ## Optional (SMTP - enables customer emails)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `EMAIL_FROM` - Sender address

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

pub const DEFAULT_ETSY_API_BASE_URL: &str = "https://openapi.etsy.com/v3/application";
pub const DEFAULT_ETSY_TOKEN_URL: &str = "https://api.etsy.com/v3/public/oauth/token";
pub const DEFAULT_ETSY_CONNECT_URL: &str = "https://www.etsy.com/oauth/connect";
pub const DEFAULT_ORDER_POLL_SCHEDULE: &str = "0 */4 * * * *";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API
    pub base_url: String,
    /// Public URL of the frontend application
    pub frontend_url: String,
    /// Extra allowed CORS origin
    pub frontend_url_alt: Option<String>,
    /// Etsy Open API configuration
    pub etsy: EtsyConfig,
    /// Blob storage configuration (template images)
    pub storage: Option<StorageConfig>,
    /// SMTP configuration (customer emails)
    pub email: Option<EmailConfig>,
    /// Keep admin registration open after the first account exists
    pub allow_admin_registration: bool,
    /// Issue `SameSite=None` cookies so a frontend on another site can log in
    pub session_cross_site: bool,
    /// Order poller settings
    pub order_poll: OrderPollConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Etsy Open API v3 configuration.
///
/// Implements `Debug` manually to redact the shared secret and webhook secret.
#[derive(Clone)]
pub struct EtsyConfig {
    /// App keystring (OAuth `client_id`)
    pub client_id: String,
    /// App shared secret
    pub client_secret: Option<SecretString>,
    /// OAuth redirect URI registered with Etsy
    pub redirect_uri: String,
    /// Shop section whose listings are scratch card products
    pub section_id: Option<i64>,
    /// Secret used to verify incoming webhook signatures
    pub webhook_secret: Option<SecretString>,
    /// Callback URL registered when creating webhooks
    pub webhook_callback_url: String,
    /// API base URL
    pub api_base_url: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// OAuth consent page
    pub connect_url: String,
}

impl std::fmt::Debug for EtsyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtsyConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("section_id", &self.section_id)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("webhook_callback_url", &self.webhook_callback_url)
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("connect_url", &self.connect_url)
            .finish()
    }
}

/// Supabase Storage configuration.
///
/// Implements `Debug` manually to redact the service key.
#[derive(Clone)]
pub struct StorageConfig {
    /// Supabase project URL
    pub url: String,
    /// Service role key
    pub service_key: SecretString,
    /// Bucket for template images
    pub bucket: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("service_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Order poller configuration.
#[derive(Debug, Clone)]
pub struct OrderPollConfig {
    /// Whether the scheduled job runs at all
    pub enabled: bool,
    /// Six-field cron expression (seconds first)
    pub schedule: String,
}

impl Default for OrderPollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: DEFAULT_ORDER_POLL_SCHEDULE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = trim_url(get_required_env("BASE_URL")?);
        let frontend_url = trim_url(get_required_env("FRONTEND_URL")?);
        let frontend_url_alt = get_optional_env("FRONTEND_URL_ALT").map(trim_url);

        let etsy = EtsyConfig::from_env(&base_url)?;
        let storage = StorageConfig::from_env()?;
        let email = EmailConfig::from_env()?;

        let allow_admin_registration = get_bool_env("ALLOW_ADMIN_REGISTRATION", false)?;
        let session_cross_site = get_bool_env("SESSION_CROSS_SITE", false)?;
        let order_poll = OrderPollConfig {
            enabled: get_bool_env("ORDER_POLL_ENABLED", true)?,
            schedule: get_env_or_default("ORDER_POLL_SCHEDULE", DEFAULT_ORDER_POLL_SCHEDULE),
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            frontend_url,
            frontend_url_alt,
            etsy,
            storage,
            email,
            allow_admin_registration,
            session_cross_site,
            order_poll,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Non-fatal configuration problems, to be logged once tracing is up.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.etsy
            .webhook_secret
            .as_ref()
            .and_then(|secret| {
                validate_secret_strength(secret.expose_secret(), "ETSY_WEBHOOK_SECRET").err()
            })
            .map(|e| e.to_string())
            .into_iter()
            .collect()
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// All origins allowed to make credentialed CORS requests.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<&str> {
        std::iter::once(self.frontend_url.as_str())
            .chain(self.frontend_url_alt.as_deref())
            .collect()
    }
}

impl EtsyConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        let client_secret = get_optional_env("ETSY_CLIENT_SECRET").map(SecretString::from);

        let section_id = get_optional_env("ETSY_STORE_SECTION_ID")
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim().parse::<i64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("ETSY_STORE_SECTION_ID".to_string(), e.to_string())
                })
            })
            .transpose()?;

        let webhook_secret = get_optional_env("ETSY_WEBHOOK_SECRET").map(SecretString::from);

        Ok(Self {
            client_id: get_required_env("ETSY_CLIENT_ID")?,
            client_secret,
            redirect_uri: format!("{base_url}/api/etsy/auth/oauth/redirect"),
            section_id,
            webhook_secret,
            webhook_callback_url: get_optional_env("ETSY_WEBHOOK_CALLBACK_URL")
                .unwrap_or_else(|| format!("{base_url}/api/etsy/etsy-webhook")),
            api_base_url: trim_url(get_env_or_default(
                "ETSY_API_BASE_URL",
                DEFAULT_ETSY_API_BASE_URL,
            )),
            token_url: get_env_or_default("ETSY_TOKEN_URL", DEFAULT_ETSY_TOKEN_URL),
            connect_url: get_env_or_default("ETSY_CONNECT_URL", DEFAULT_ETSY_CONNECT_URL),
        })
    }
}

impl StorageConfig {
    /// Returns `None` if Supabase is not configured (uploads disabled).
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let url = get_optional_env("SUPABASE_URL");
        let key = get_optional_env("SUPABASE_SERVICE_KEY");

        match (url, key) {
            (Some(url), Some(key)) => Ok(Some(Self {
                url: trim_url(url),
                service_key: SecretString::from(key),
                bucket: get_optional_env("SUPABASE_BUCKETNAME").filter(|b| !b.is_empty()),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SUPABASE_*".to_string(),
                "Both SUPABASE_URL and SUPABASE_SERVICE_KEY must be set together".to_string(),
            )),
        }
    }
}

impl EmailConfig {
    /// Returns `None` if `SMTP_HOST` is not set (emails disabled).
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a boolean flag. Accepts `true/false`, `1/0`, `yes/no`.
fn get_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        parse_bool(&value).ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got {value:?}"))
        })
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
