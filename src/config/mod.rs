//! Configuration management for OracleSync
//!
//! Loads deployment parameters and protocol constants from an optional
//! config file + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use ethers::types::Address;
use serde::Deserialize;

/// Historical mock USD asset address used as the protocol's unit of
/// account.
pub const USD_BASE_UNIT: &str = "0x10f7fc1f91ba351f9c629c5947ad69bd03c05b96";

/// Maker token address whose display symbol is pinned unconditionally,
/// preserving consistency with a pre-decimals-fix deployment.
pub const MAKER_TOKEN: &str = "0x9f8f72aa9304c8b593d555f12ef6589cc3a579a2";

/// Display symbol override for the maker token.
pub const MAKER_SYMBOL: &str = "MKR";

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    oracle_version: u32,
    usd_base_unit: String,
    maker_token: String,
}

/// Engine configuration threaded through every reconciliation step.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deployment protocol version (>= 1), applied when the oracle
    /// singleton is first created.
    pub oracle_version: u32,
    /// USD base-unit asset address.
    pub usd_base_unit: Address,
    /// Asset whose compatibility symbol is always `MAKER_SYMBOL`.
    pub maker_token: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            oracle_version: 1,
            usd_base_unit: USD_BASE_UNIT.parse().expect("static address constant"),
            maker_token: MAKER_TOKEN.parse().expect("static address constant"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let raw: RawConfig = Config::builder()
            .set_default("oracle_version", 1i64)?
            .set_default("usd_base_unit", USD_BASE_UNIT)?
            .set_default("maker_token", MAKER_TOKEN)?
            .add_source(File::with_name("config/oraclesync").required(false))
            .add_source(Environment::with_prefix("ORACLESYNC"))
            .build()?
            .try_deserialize()
            .context("invalid engine configuration")?;

        Ok(Self {
            // version is monotonically set by deployment, never below 1
            oracle_version: raw.oracle_version.max(1),
            usd_base_unit: raw
                .usd_base_unit
                .parse()
                .context("usd_base_unit is not a valid address")?,
            maker_token: raw
                .maker_token
                .parse()
                .context("maker_token is not a valid address")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants_parse() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.oracle_version, 1);
        assert_ne!(cfg.usd_base_unit, Address::zero());
        assert_ne!(cfg.maker_token, Address::zero());
        assert_ne!(cfg.usd_base_unit, cfg.maker_token);
    }
}
