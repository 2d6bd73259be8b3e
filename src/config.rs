//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::payments::types::ProviderName;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub gateways: GatewayConfig,
    pub skip_externals: bool,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64, // seconds
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Gateway A (payment requests, payouts, balance)
#[derive(Debug, Clone)]
pub struct XenditSettings {
    pub secret_key: String,
    pub base_url: String,
    pub callback_token: Option<String>,
    pub timeout_secs: u64,
    pub country: String,
}

/// Gateway B (bill payments, disbursements, balance)
#[derive(Debug, Clone)]
pub struct FlipSettings {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Which gateway handles which flow
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub xendit: XenditSettings,
    pub flip: Option<FlipSettings>,
    pub payment_gateway: ProviderName,
    pub payout_gateway: ProviderName,
    pub currency: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let skip_externals = env::var("SKIP_EXTERNALS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env(skip_externals)?,
            logging: LoggingConfig::from_env()?,
            gateways: GatewayConfig::from_env()?,
            skip_externals,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if !self.skip_externals {
            self.database.validate()?;
        }
        self.logging.validate()?;
        self.gateways.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl DatabaseConfig {
    pub fn from_env(skip_externals: bool) -> Result<Self, ConfigError> {
        let url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) if skip_externals => String::new(),
            Err(_) => return Err(ConfigError::MissingVariable("DATABASE_URL".to_string())),
        };

        Ok(DatabaseConfig {
            url,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl XenditSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(XenditSettings {
            secret_key: env::var("XENDIT_SECRET_KEY")
                .map_err(|_| ConfigError::MissingVariable("XENDIT_SECRET_KEY".to_string()))?,
            base_url: env::var("XENDIT_BASE_URL")
                .unwrap_or_else(|_| "https://api.xendit.co".to_string()),
            callback_token: env::var("XENDIT_CALLBACK_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_secs: env::var("XENDIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("XENDIT_TIMEOUT_SECS".to_string()))?,
            country: env::var("XENDIT_COUNTRY").unwrap_or_else(|_| "ID".to_string()),
        })
    }
}

impl FlipSettings {
    /// Gateway B is optional; `None` when no secret key is configured.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let secret_key = match env::var("FLIP_SECRET_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };

        Ok(Some(FlipSettings {
            secret_key,
            base_url: env::var("FLIP_BASE_URL")
                .unwrap_or_else(|_| "https://bigflip.id/api".to_string()),
            timeout_secs: env::var("FLIP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FLIP_TIMEOUT_SECS".to_string()))?,
        }))
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let payment_gateway = env::var("PAYMENT_GATEWAY").unwrap_or_else(|_| "xendit".to_string());
        let payout_gateway = env::var("PAYOUT_GATEWAY").unwrap_or_else(|_| "xendit".to_string());

        Ok(GatewayConfig {
            xendit: XenditSettings::from_env()?,
            flip: FlipSettings::from_env()?,
            payment_gateway: ProviderName::from_str(&payment_gateway)
                .map_err(|_| ConfigError::InvalidValue("PAYMENT_GATEWAY".to_string()))?,
            payout_gateway: ProviderName::from_str(&payout_gateway)
                .map_err(|_| ConfigError::InvalidValue("PAYOUT_GATEWAY".to_string()))?,
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "IDR".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xendit.secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("XENDIT_SECRET_KEY".to_string()));
        }

        for url in std::iter::once(&self.xendit.base_url)
            .chain(self.flip.as_ref().map(|flip| &flip.base_url))
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "gateway base url must be a valid URL: {}",
                    url
                )));
            }
        }

        let needs_flip = self.payment_gateway == ProviderName::Flip
            || self.payout_gateway == ProviderName::Flip;
        if needs_flip && self.flip.is_none() {
            return Err(ConfigError::ValidationFailed(
                "FLIP_SECRET_KEY is required when flip is selected".to_string(),
            ));
        }

        if self.currency.trim().len() != 3 {
            return Err(ConfigError::InvalidValue("PAYMENT_CURRENCY".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
