//! Engine configuration.
//!
//! Loaded from a JSON file, then overridden by environment variables:
//!
//! | Variable                              | Field                       |
//! |---------------------------------------|-----------------------------|
//! | `DARK_OTC_VALIDATOR`                  | `validator`                 |
//! | `DARK_OTC_CUSTODY`                    | `custody`                   |
//! | `DARK_OTC_GRANT_VALIDATOR_ACCESS`     | `grant_validator_access`    |
//! | `DARK_OTC_ALLOW_CANCEL_AFTER_EXPIRY`  | `allow_cancel_after_expiry` |
//! | `DARK_OTC_MAX_ORDER_LIFETIME_SECS`    | `max_order_lifetime_secs`   |
//!
//! ```
//! use dark_otc::config::EngineConfig;
//!
//! let cfg = EngineConfig::from_json_str(r#"{
//!     "validator": "0x1111111111111111111111111111111111111111",
//!     "custody":   "0x2222222222222222222222222222222222222222"
//! }"#).unwrap();
//! assert!(cfg.grant_validator_access);
//! assert!(!cfg.allow_cancel_after_expiry);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;
use crate::types::{Identity, IdentityParseError};

pub const ENV_VALIDATOR: &str = "DARK_OTC_VALIDATOR";
pub const ENV_CUSTODY: &str = "DARK_OTC_CUSTODY";
pub const ENV_GRANT_VALIDATOR_ACCESS: &str = "DARK_OTC_GRANT_VALIDATOR_ACCESS";
pub const ENV_ALLOW_CANCEL_AFTER_EXPIRY: &str = "DARK_OTC_ALLOW_CANCEL_AFTER_EXPIRY";
pub const ENV_MAX_ORDER_LIFETIME_SECS: &str = "DARK_OTC_MAX_ORDER_LIFETIME_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{var} is not a valid identity: {source}")]
    InvalidIdentity {
        var: &'static str,
        #[source]
        source: IdentityParseError,
    },

    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Runtime parameters of an [`EscrowEngine`](crate::engine::EscrowEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Initial trust root. Rotated afterwards only by itself.
    pub validator: Identity,

    /// The escrow contract account: receives escrowed funds and is the
    /// contract half of every attestation context.
    pub custody: Identity,

    /// Grant the validator decryption rights on order and payment handles so
    /// it can run the equality check.
    #[serde(default = "default_true")]
    pub grant_validator_access: bool,

    /// Let makers cancel orders whose deadline has passed.
    #[serde(default)]
    pub allow_cancel_after_expiry: bool,

    /// Upper bound on `deadline - now` at creation.
    #[serde(default)]
    pub max_order_lifetime_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    pub fn new(validator: Identity, custody: Identity) -> Self {
        Self {
            validator,
            custody,
            grant_validator_access: true,
            allow_cancel_after_expiry: false,
            max_order_lifetime_secs: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.validator.is_null() {
            return Err(ValidationError::NullValidator);
        }
        if self.custody.is_null() {
            return Err(ValidationError::NullCustody);
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `path`, apply environment overrides, validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: EngineConfig = serde_json::from_str(&raw)?;
        let cfg = cfg.with_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `DARK_OTC_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_VALIDATOR) {
            self.validator = parse_identity(ENV_VALIDATOR, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CUSTODY) {
            self.custody = parse_identity(ENV_CUSTODY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_GRANT_VALIDATOR_ACCESS) {
            self.grant_validator_access = parse_bool(ENV_GRANT_VALIDATOR_ACCESS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ALLOW_CANCEL_AFTER_EXPIRY) {
            self.allow_cancel_after_expiry = parse_bool(ENV_ALLOW_CANCEL_AFTER_EXPIRY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ORDER_LIFETIME_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: ENV_MAX_ORDER_LIFETIME_SECS,
                value: raw.clone(),
            })?;
            self.max_order_lifetime_secs = Some(secs);
        }
        Ok(self)
    }
}

fn parse_identity(var: &'static str, raw: &str) -> Result<Identity, ConfigError> {
    Identity::from_hex(raw.trim()).map_err(|source| ConfigError::InvalidIdentity { var, source })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        }),
    }
}
