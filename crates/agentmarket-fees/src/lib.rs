//! AgentMarket Fees - Payment split computation
//!
//! A released payment is divided among the agent's creator, the platform,
//! and the treasury according to a `SplitPolicy`. The computation is a pure
//! function of the amount and the policy: integer minor-unit arithmetic,
//! truncating division, remainder absorbed by the treasury so the three
//! shares always sum to the amount exactly.
//!
//! # Default Policy
//!
//! | Share    | Percent |
//! |----------|---------|
//! | Creator  | 85%     |
//! | Platform | 10%     |
//! | Treasury | 5% + remainder |

use agentmarket_types::{Amount, MarketError, Result};
use serde::{Deserialize, Serialize};

/// Percentage allocation of a released payment
///
/// Percentages must sum to exactly 100; validated at construction and again
/// at split time so a hand-built policy cannot leak value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPolicy {
    /// Percent to the agent's creator
    pub creator_pct: u8,
    /// Percent to the platform
    pub platform_pct: u8,
    /// Percent to the treasury (also absorbs the division remainder)
    pub treasury_pct: u8,
}

impl SplitPolicy {
    /// Create a validated policy
    pub fn new(creator_pct: u8, platform_pct: u8, treasury_pct: u8) -> Result<Self> {
        let policy = Self {
            creator_pct,
            platform_pct,
            treasury_pct,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the percentages sum to 100
    pub fn validate(&self) -> Result<()> {
        let sum = self.creator_pct as u32 + self.platform_pct as u32 + self.treasury_pct as u32;
        if sum != 100 {
            return Err(MarketError::InvalidSplitPolicy { sum });
        }
        Ok(())
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            creator_pct: 85,
            platform_pct: 10,
            treasury_pct: 5,
        }
    }
}

/// The three shares of a split payment
///
/// Invariant: `creator + platform + treasury == amount` for the amount the
/// split was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub creator: Amount,
    pub platform: Amount,
    pub treasury: Amount,
}

impl PaymentSplit {
    /// Sum of the three shares
    pub fn total(&self) -> Amount {
        // Each share is at most the original amount; the sum cannot
        // overflow because it equals the original amount by construction.
        Amount::new(self.creator.value() + self.platform.value() + self.treasury.value())
    }
}

/// Compute the fund split for a released payment
///
/// Creator and platform shares truncate; the treasury takes the remainder
/// so the shares conserve the amount exactly.
pub fn split(amount: Amount, policy: &SplitPolicy) -> Result<PaymentSplit> {
    policy.validate()?;
    if amount.is_zero() {
        return Err(MarketError::NonPositiveAmount);
    }

    let creator = amount.percentage(policy.creator_pct);
    let platform = amount.percentage(policy.platform_pct);
    let treasury = amount
        .checked_sub(creator)
        .and_then(|rest| rest.checked_sub(platform))
        .ok_or(MarketError::AmountOverflow)?;

    Ok(PaymentSplit {
        creator,
        platform,
        treasury,
    })
}
