//! Agent profile and pricing types
//!
//! An agent is a registered, priced service offering tied to an owner. The
//! profile carries derived reputation state maintained by the reputation
//! ledger and monotonic service counters maintained by the escrow ledger.

use crate::{AgentId, Amount, MarketError, PrincipalId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of an agent name
pub const MAX_NAME_LEN: usize = 50;
/// Maximum length of an agent description
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Maximum length of the opaque endpoint reference
pub const MAX_ENDPOINT_LEN: usize = 200;
/// Maximum number of capability tags
pub const MAX_CAPABILITIES: usize = 10;
/// Maximum length of a single capability tag
pub const MAX_CAPABILITY_LEN: usize = 50;

/// Pricing policy for an agent's service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingModel {
    /// Flat price per query
    PerQuery { price: Amount },
    /// Monthly subscription
    Subscription { monthly: Amount },
    /// Base price plus a variable percentage
    Custom { base: Amount, variable_pct: u8 },
}

impl PricingModel {
    /// The base amount this model charges
    pub fn base_amount(&self) -> Amount {
        match self {
            Self::PerQuery { price } => *price,
            Self::Subscription { monthly } => *monthly,
            Self::Custom { base, .. } => *base,
        }
    }

    /// Validate pricing bounds against the configured price ceiling
    pub fn validate(&self, ceiling: Amount) -> Result<()> {
        let base = self.base_amount();
        if base.is_zero() {
            return Err(MarketError::NonPositiveAmount);
        }
        if base > ceiling {
            return Err(MarketError::AmountAboveCeiling {
                amount: base.value(),
                ceiling: ceiling.value(),
            });
        }
        if let Self::Custom { variable_pct, .. } = self {
            if *variable_pct > 100 {
                return Err(MarketError::invalid_field(
                    "variable_pct",
                    "must be between 0 and 100",
                ));
            }
        }
        Ok(())
    }
}

/// A registered agent profile
///
/// `owner_id` is immutable after creation; `total_services` and
/// `total_earnings` only ever increase; `reputation_score` is derived from
/// ratings and stored as stars x100 for exact integer precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent ID
    pub agent_id: AgentId,
    /// Principal that may mutate or deactivate this agent
    pub owner_id: PrincipalId,
    /// Principals the owner has authorized to act for the agent
    /// (start work, submit results); owner-managed
    pub operators: BTreeSet<PrincipalId>,
    /// Display name (1-50 chars)
    pub name: String,
    /// Description (0-500 chars)
    pub description: String,
    /// Capability tags
    pub capabilities: BTreeSet<String>,
    /// Pricing policy
    pub pricing: PricingModel,
    /// Opaque endpoint reference consumed by collaborators only
    pub endpoint_ref: String,
    /// Derived reputation score, stars x100 (0-500)
    pub reputation_score: u32,
    /// Number of ratings behind the score
    pub total_ratings: u64,
    /// Running sum of star values, kept so the mean recompute is exact
    pub rating_points: u64,
    /// Monotonic count of approved services
    pub total_services: u64,
    /// Monotonic accumulator of creator-share earnings
    pub total_earnings: Amount,
    /// Whether the agent accepts new requests
    pub is_active: bool,
    /// When the agent was registered
    pub created_at: DateTime<Utc>,
}

impl AgentProfile {
    /// Reputation as fractional stars (0.00-5.00)
    pub fn reputation_stars(&self) -> f64 {
        self.reputation_score as f64 / 100.0
    }
}

/// Partial update to an agent profile; only supplied fields change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capabilities: Option<BTreeSet<String>>,
    pub pricing: Option<PricingModel>,
    pub endpoint_ref: Option<String>,
}

impl AgentUpdate {
    /// True when no field is supplied
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.capabilities.is_none()
            && self.pricing.is_none()
            && self.endpoint_ref.is_none()
    }
}

/// Validate an agent name
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(MarketError::invalid_field(
            "name",
            format!("length must be 1-{} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

/// Validate an agent description
pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(MarketError::invalid_field(
            "description",
            format!("length must be at most {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
    Ok(())
}

/// Validate an endpoint reference
pub fn validate_endpoint_ref(endpoint_ref: &str) -> Result<()> {
    if endpoint_ref.len() > MAX_ENDPOINT_LEN {
        return Err(MarketError::invalid_field(
            "endpoint_ref",
            format!("length must be at most {} characters", MAX_ENDPOINT_LEN),
        ));
    }
    Ok(())
}

/// Validate a capability set
pub fn validate_capabilities(capabilities: &BTreeSet<String>) -> Result<()> {
    if capabilities.len() > MAX_CAPABILITIES {
        return Err(MarketError::invalid_field(
            "capabilities",
            format!("at most {} entries", MAX_CAPABILITIES),
        ));
    }
    for cap in capabilities {
        if cap.is_empty() || cap.len() > MAX_CAPABILITY_LEN {
            return Err(MarketError::invalid_field(
                "capabilities",
                format!("entries must be 1-{} characters", MAX_CAPABILITY_LEN),
            ));
        }
    }
    Ok(())
}
