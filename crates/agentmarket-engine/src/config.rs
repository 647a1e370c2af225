//! Engine configuration

use agentmarket_fees::SplitPolicy;
use agentmarket_types::{Amount, PrincipalId, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a `MarketEngine`
///
/// Deserializable so deployments can load it from a JSON file; `Default`
/// gives development values with fresh platform and treasury principals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum escrowable amount per request, in minor units
    pub amount_ceiling: Amount,
    /// Maximum price an agent may list, in minor units
    pub price_ceiling: Amount,
    /// How released payments are divided
    pub split_policy: SplitPolicy,
    /// Hours before an unresolved dispute is flagged overdue
    pub dispute_review_hours: i64,
    /// Receives the platform share of every release
    pub platform_account: PrincipalId,
    /// Receives the treasury share and split remainders
    pub treasury_account: PrincipalId,
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.split_policy.validate()?;
        if self.amount_ceiling.is_zero() {
            return Err(agentmarket_types::MarketError::invalid_field(
                "amount_ceiling",
                "must be greater than zero",
            ));
        }
        if self.price_ceiling.is_zero() {
            return Err(agentmarket_types::MarketError::invalid_field(
                "price_ceiling",
                "must be greater than zero",
            ));
        }
        if self.dispute_review_hours <= 0 {
            return Err(agentmarket_types::MarketError::invalid_field(
                "dispute_review_hours",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| agentmarket_types::MarketError::invalid_field("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // $1,000,000.00 in minor units
            amount_ceiling: Amount::new(100_000_000),
            price_ceiling: Amount::new(100_000_000),
            split_policy: SplitPolicy::default(),
            dispute_review_hours: 72,
            platform_account: PrincipalId::new(),
            treasury_account: PrincipalId::new(),
        }
    }
}
