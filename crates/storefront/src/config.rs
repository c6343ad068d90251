//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (sessions)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (proof callbacks)
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_STOREFRONT_PRIVATE_TOKEN` - Storefront API private access token
//! - `RECLAIM_APP_ID` - Reclaim application address
//! - `RECLAIM_APP_SECRET` - Reclaim application private key (hex)
//! - `ZKPASS_APP_ID` - zkPass TransGate application ID
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `RECLAIM_API_URL` - Reclaim backend (default: <https://api.reclaimprotocol.org>)
//! - `RECLAIM_SHARE_URL` - Reclaim verifier pages (default: <https://share.reclaimprotocol.org>)
//! - `RECLAIM_ATTESTORS` - Comma separated trusted attestor addresses
//! - `RECLAIM_REQUIRED_PARAMETER` - Extracted parameter a proof must carry (default: following)
//! - `ZKPASS_ALLOCATOR_ADDRESS` - TransGate allocator address
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use zkcart_core::EvmAddress;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Reclaim's hosted attestor, trusted when `RECLAIM_ATTESTORS` is unset.
pub const DEFAULT_RECLAIM_ATTESTOR: &str = "0x244897572368eadf65bfbc5aec98d8e5443a9072";

/// TransGate's production allocator.
pub const DEFAULT_ZKPASS_ALLOCATOR: &str = "0x19a567b3b212a5b35bA0E3B600FbEd5c2eE9083d";

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Shopify Storefront API configuration
    pub shopify: ShopifyStorefrontConfig,
    /// Reclaim (zkTLS) gate configuration
    pub reclaim: ReclaimConfig,
    /// zkPass `TransGate` gate configuration
    pub zkpass: ZkPassConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Shopify Storefront API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyStorefrontConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2026-01)
    pub api_version: String,
    /// Storefront API private access token (server-side only)
    pub storefront_private_token: SecretString,
}

impl std::fmt::Debug for ShopifyStorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyStorefrontConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("storefront_private_token", &"[REDACTED]")
            .finish()
    }
}

/// Reclaim protocol configuration.
///
/// Implements `Debug` manually to redact the application key.
#[derive(Clone)]
pub struct ReclaimConfig {
    /// Application ID (the address of `app_secret`)
    pub app_id: String,
    /// Application private key, hex encoded
    pub app_secret: SecretString,
    /// Reclaim backend base URL
    pub api_url: String,
    /// Base URL of the hosted verifier pages
    pub share_url: String,
    /// Attestors whose signatures make a proof valid
    pub trusted_attestors: Vec<EvmAddress>,
    /// Extracted parameter that must be non-empty for the gate to pass
    pub required_parameter: String,
}

impl std::fmt::Debug for ReclaimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReclaimConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("share_url", &self.share_url)
            .field("trusted_attestors", &self.trusted_attestors)
            .field("required_parameter", &self.required_parameter)
            .finish()
    }
}

/// zkPass `TransGate` configuration.
#[derive(Debug, Clone)]
pub struct ZkPassConfig {
    /// Application ID registered with zkPass
    pub app_id: String,
    /// Allocator whose signature assigns tasks to validators
    pub allocator_address: EvmAddress,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = validate_base_url(
            "STOREFRONT_BASE_URL",
            trim_url(get_required_env("STOREFRONT_BASE_URL")?),
        )?;

        let shopify = ShopifyStorefrontConfig::from_env()?;
        let reclaim = ReclaimConfig::from_env()?;
        let zkpass = ZkPassConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            shopify,
            reclaim,
            zkpass,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_env_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ShopifyStorefrontConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOPIFY_STORE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
            storefront_private_token: get_validated_secret("SHOPIFY_STOREFRONT_PRIVATE_TOKEN")?,
        })
    }
}

impl ReclaimConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let attestors = get_env_or_default("RECLAIM_ATTESTORS", DEFAULT_RECLAIM_ATTESTOR);
        let trusted_attestors = parse_address_list("RECLAIM_ATTESTORS", &attestors)?;
        if trusted_attestors.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "RECLAIM_ATTESTORS".to_string(),
                "at least one attestor address is required".to_string(),
            ));
        }

        Ok(Self {
            app_id: get_required_env("RECLAIM_APP_ID")?,
            app_secret: get_validated_secret("RECLAIM_APP_SECRET")?,
            api_url: trim_url(get_env_or_default(
                "RECLAIM_API_URL",
                "https://api.reclaimprotocol.org",
            )),
            share_url: trim_url(get_env_or_default(
                "RECLAIM_SHARE_URL",
                "https://share.reclaimprotocol.org",
            )),
            trusted_attestors,
            required_parameter: get_env_or_default("RECLAIM_REQUIRED_PARAMETER", "following"),
        })
    }
}

impl ZkPassConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let allocator = get_env_or_default("ZKPASS_ALLOCATOR_ADDRESS", DEFAULT_ZKPASS_ALLOCATOR);
        let allocator_address = EvmAddress::parse(&allocator).map_err(|e| {
            ConfigError::InvalidEnvVar("ZKPASS_ALLOCATOR_ADDRESS".to_string(), e.to_string())
        })?;

        Ok(Self {
            app_id: get_required_env("ZKPASS_APP_ID")?,
            allocator_address,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, keeping `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a comma separated list of EVM addresses.
fn parse_address_list(key: &str, raw: &str) -> Result<Vec<EvmAddress>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            EvmAddress::parse(s)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{s}: {e}")))
        })
        .collect()
}

/// Strip trailing slashes so paths can be appended with `format!`.
fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Reject base URLs the proof services could not call back or redirect to.
fn validate_base_url(key: &str, value: String) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    Ok(value)
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_reclaim_config() -> ReclaimConfig {
        ReclaimConfig {
            app_id: "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".to_string(),
            app_secret: SecretString::from("super_secret_reclaim_key"),
            api_url: "https://api.reclaimprotocol.org".to_string(),
            share_url: "https://share.reclaimprotocol.org".to_string(),
            trusted_attestors: vec![EvmAddress::parse(DEFAULT_RECLAIM_ATTESTOR).unwrap()],
            required_parameter: "following".to_string(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_hex_key() {
        // A random secp256k1 key in hex clears the threshold
        let entropy =
            shannon_entropy("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");
        assert!(entropy > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_address_list() {
        let list = parse_address_list(
            "RECLAIM_ATTESTORS",
            " 0x244897572368eadf65bfbc5aec98d8e5443a9072, ,0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf",
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[1].to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_parse_address_list_invalid() {
        let err = parse_address_list("RECLAIM_ATTESTORS", "0x1234").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "RECLAIM_ATTESTORS"));
    }

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("K", "https://shop.example.com".to_string()).unwrap(),
            "https://shop.example.com"
        );
        assert!(validate_base_url("K", "shop.example.com".to_string()).is_err());
        assert!(validate_base_url("K", "ftp://shop.example.com".to_string()).is_err());
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(
            trim_url("https://shop.example.com/".to_string()),
            "https://shop.example.com"
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            shopify: ShopifyStorefrontConfig {
                store: "test.myshopify.com".to_string(),
                api_version: "2026-01".to_string(),
                storefront_private_token: SecretString::from("private"),
            },
            reclaim: test_reclaim_config(),
            zkpass: ZkPassConfig {
                app_id: "zkpass-app".to_string(),
                allocator_address: EvmAddress::parse(DEFAULT_ZKPASS_ALLOCATOR).unwrap(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_https());
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let shopify = ShopifyStorefrontConfig {
            store: "test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            storefront_private_token: SecretString::from("super_secret_private_token"),
        };
        let debug_output = format!("{shopify:?} {:?}", test_reclaim_config());

        assert!(debug_output.contains("test.myshopify.com"));
        assert!(debug_output.contains("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"));

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_private_token"));
        assert!(!debug_output.contains("super_secret_reclaim_key"));
    }
}
