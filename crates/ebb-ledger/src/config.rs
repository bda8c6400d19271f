//! Ledger configuration: JSON file plus environment overrides.
//!
//! Recognised environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `EBB_TOKEN` | `token` |
//! | `EBB_ADMIN` | `escrow.admin` |
//! | `EBB_TREASURY` | `escrow.treasury` |
//! | `EBB_PENALTY_BPS` | `escrow.penalty_bps` |
//! | `EBB_MIN_LOCK_AMOUNT` | `escrow.min_lock_amount` |
//! | `EBB_OPERATOR` | `rewards.operator` |

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ebb_core::config::{EscrowConfig, RewardConfig};
use ebb_core::error::ConfigError;
use ebb_core::types::Address;

/// Label of the default locked token.
pub const TOKEN_LABEL: &str = "ebb.token";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// The token users lock.
    pub token: Address,
    pub escrow: EscrowConfig,
    pub rewards: RewardConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            token: Address::from_label(TOKEN_LABEL),
            escrow: EscrowConfig::default(),
            rewards: RewardConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("EBB_TOKEN") {
            self.token = parse("EBB_TOKEN", &v)?;
        }
        if let Some(v) = lookup("EBB_ADMIN") {
            self.escrow.admin = parse("EBB_ADMIN", &v)?;
        }
        if let Some(v) = lookup("EBB_TREASURY") {
            self.escrow.treasury = parse("EBB_TREASURY", &v)?;
        }
        if let Some(v) = lookup("EBB_PENALTY_BPS") {
            self.escrow.penalty_bps = parse("EBB_PENALTY_BPS", &v)?;
        }
        if let Some(v) = lookup("EBB_MIN_LOCK_AMOUNT") {
            self.escrow.min_lock_amount = parse("EBB_MIN_LOCK_AMOUNT", &v)?;
        }
        if let Some(v) = lookup("EBB_OPERATOR") {
            self.rewards.operator = parse("EBB_OPERATOR", &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_zero() {
            return Err(ConfigError::ZeroAddress("token"));
        }
        self.escrow.validate()?;
        self.rewards.validate()
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
