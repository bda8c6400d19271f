//! Engine configuration.
//!
//! Both structs deserialize with per-field defaults, so a config file only
//! needs the keys it overrides. Defaults point the system accounts at
//! well-known labelled addresses and are always valid.

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_PRECISION, DEFAULT_PENALTY_BPS};
use crate::error::ConfigError;
use crate::types::Address;

/// Label of the default escrow admin account.
pub const ADMIN_LABEL: &str = "ebb.admin";
/// Label of the default early-withdraw treasury.
pub const TREASURY_LABEL: &str = "ebb.treasury";
/// Label of the default reward operator.
pub const OPERATOR_LABEL: &str = "ebb.operator";

/// Escrow parameters that the admin can change at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
#[serde(default)]
pub struct EscrowConfig {
    /// Account allowed to call the admin setters and `toggle_split`.
    pub admin: Address,
    /// Receives early-withdraw penalties.
    pub treasury: Address,
    /// Smallest amount a new lock may hold, in base units.
    pub min_lock_amount: u128,
    /// Early-withdraw penalty at full remaining duration, in basis points.
    pub penalty_bps: u64,
    /// Seed for the global split permission (the zero-address flag).
    pub split_globally_enabled: bool,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            admin: Address::from_label(ADMIN_LABEL),
            treasury: Address::from_label(TREASURY_LABEL),
            min_lock_amount: 1,
            penalty_bps: DEFAULT_PENALTY_BPS,
            split_globally_enabled: false,
        }
    }
}

impl EscrowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_penalty(self.penalty_bps)?;
        if self.admin.is_zero() {
            return Err(ConfigError::ZeroAddress("admin"));
        }
        if self.treasury.is_zero() {
            return Err(ConfigError::ZeroAddress("treasury"));
        }
        Ok(())
    }
}

/// Check a penalty rate against the basis-point scale.
pub fn validate_penalty(bps: u64) -> Result<(), ConfigError> {
    if bps > BPS_PRECISION {
        return Err(ConfigError::InvalidPenalty(bps));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RewardConfig {
    /// Account allowed to sweep unaccounted reward balances.
    pub operator: Address,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            operator: Address::from_label(OPERATOR_LABEL),
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator.is_zero() {
            return Err(ConfigError::ZeroAddress("operator"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EscrowConfig::default().validate().is_ok());
        assert!(RewardConfig::default().validate().is_ok());
    }

    #[test]
    fn penalty_above_scale_rejected() {
        let cfg = EscrowConfig {
            penalty_bps: BPS_PRECISION + 1,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidPenalty(BPS_PRECISION + 1)));
        assert!(validate_penalty(BPS_PRECISION).is_ok());
        assert!(validate_penalty(0).is_ok());
    }

    #[test]
    fn zero_treasury_rejected() {
        let cfg = EscrowConfig {
            treasury: Address::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAddress("treasury")));
    }

    #[test]
    fn zero_operator_rejected() {
        let cfg = RewardConfig {
            operator: Address::ZERO,
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAddress("operator")));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EscrowConfig = serde_json::from_str(r#"{ "penalty_bps": 2500 }"#).unwrap();
        assert_eq!(cfg.penalty_bps, 2_500);
        assert_eq!(cfg.treasury, Address::from_label(TREASURY_LABEL));
        assert_eq!(cfg.min_lock_amount, 1);
    }
}
