//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (HTTP gateway only)
//! - `FORKFUL_API_BASE_URL` - Base URL of the ordering service (e.g. `https://api.forkful.test`)
//!
//! ## Optional
//! - `FORKFUL_API_TOKEN` - Bearer token issued by the external auth flow
//! - `FORKFUL_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `FORKFUL_CATALOG_CACHE_TTL_SECS` - Restaurant/menu cache TTL (default: 300)
//! - `FORKFUL_PAYEE_VPA` - UPI address shown in payment QR codes
//! - `FORKFUL_PAYEE_NAME` - Payee display name shown in payment QR codes
//! - `FORKFUL_PAYMENT_DELAY_MS` - Simulated payment processing delay (default: 0)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_CACHE_TTL_SECS: &str = "300";
const DEFAULT_PAYEE_VPA: &str = "orders@forkful";
const DEFAULT_PAYEE_NAME: &str = "Forkful";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ordering service connection settings
    pub api: ApiConfig,
    /// Simulated payment settings
    pub payment: PaymentConfig,
    /// Error tracking settings
    pub sentry: SentryConfig,
}

/// Error tracking settings.
///
/// Loadable on their own so commands that never reach the ordering service
/// still report errors.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// Sentry DSN for error tracking
    pub dsn: Option<String>,
    /// Sentry environment name
    pub environment: Option<String>,
}

impl SentryConfig {
    /// Load from environment variables (and `.env` if present).
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(&lookup);
        Self {
            dsn: env.optional("SENTRY_DSN"),
            environment: env.optional("SENTRY_ENVIRONMENT"),
        }
    }
}

/// Ordering service connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    pub base_url: Url,
    /// Bearer token from the auth flow, if the service requires one
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long restaurant and menu listings stay cached
    pub catalog_ttl: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("catalog_ttl", &self.catalog_ttl)
            .finish()
    }
}

/// Payment confirmation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    /// UPI virtual payment address receiving QR payments
    pub payee_vpa: String,
    /// Name shown to the payer
    pub payee_name: String,
    /// Simulated processing time for pay-ID authorization
    pub processing_delay: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            payee_vpa: DEFAULT_PAYEE_VPA.to_string(),
            payee_name: DEFAULT_PAYEE_NAME.to_string(),
            processing_delay: Duration::ZERO,
        }
    }
}

impl ClientConfig {
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let base_url = env.required("FORKFUL_API_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("FORKFUL_API_BASE_URL".to_string(), e.to_string())
        })?;

        let api = ApiConfig {
            base_url,
            token: env.optional("FORKFUL_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(
                env.parsed("FORKFUL_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            ),
            catalog_ttl: Duration::from_secs(
                env.parsed("FORKFUL_CATALOG_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            ),
        };

        let payment = PaymentConfig {
            payee_vpa: env.or_default("FORKFUL_PAYEE_VPA", DEFAULT_PAYEE_VPA),
            payee_name: env.or_default("FORKFUL_PAYEE_NAME", DEFAULT_PAYEE_NAME),
            processing_delay: Duration::from_millis(env.parsed("FORKFUL_PAYMENT_DELAY_MS", "0")?),
        };

        Ok(Self {
            api,
            payment,
            sentry: SentryConfig::from_lookup(&lookup),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get a variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed(&self, key: &str, default: &str) -> Result<u64, ConfigError> {
        self.or_default(key, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&[("FORKFUL_API_BASE_URL", "http://localhost:8080")]).unwrap();
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.api.catalog_ttl, Duration::from_secs(300));
        assert!(config.api.token.is_none());
        assert_eq!(config.payment, PaymentConfig::default());
        assert!(config.sentry.dsn.is_none());
    }

    #[test]
    fn test_missing_base_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "FORKFUL_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = load(&[("FORKFUL_API_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));

        let err = load(&[
            ("FORKFUL_API_BASE_URL", "http://localhost:8080"),
            ("FORKFUL_HTTP_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "FORKFUL_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let config = load(&[
            ("FORKFUL_API_BASE_URL", "http://localhost:8080"),
            ("FORKFUL_API_TOKEN", "tok_live_abc123"),
        ])
        .unwrap();
        assert_eq!(
            config.api.token.as_ref().unwrap().expose_secret(),
            "tok_live_abc123"
        );
        let debug = format!("{:?}", config.api);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok_live_abc123"));
    }

    #[test]
    fn test_sentry_loads_without_api() {
        let sentry = SentryConfig::from_lookup(|key| {
            (key == "SENTRY_DSN").then(|| "https://key@sentry.example/1".to_string())
        });
        assert!(sentry.dsn.is_some());
        assert!(sentry.environment.is_none());
    }

    #[test]
    fn test_payment_overrides() {
        let config = load(&[
            ("FORKFUL_API_BASE_URL", "http://localhost:8080"),
            ("FORKFUL_PAYEE_VPA", "kitchen@bank"),
            ("FORKFUL_PAYMENT_DELAY_MS", "1500"),
        ])
        .unwrap();
        assert_eq!(config.payment.payee_vpa, "kitchen@bank");
        assert_eq!(config.payment.payee_name, "Forkful");
        assert_eq!(config.payment.processing_delay, Duration::from_millis(1500));
    }
}
