//! Dispute types
//!
//! A dispute is a manual-review process that freezes an escrowed payment
//! and later redirects it according to an arbiter's decision.

use crate::{DisputeId, MarketError, PrincipalId, RequestId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum length of a dispute reason
pub const MIN_REASON_LEN: usize = 10;
/// Maximum length of a dispute reason
pub const MAX_REASON_LEN: usize = 1000;
/// Maximum length of arbiter resolution notes
pub const MAX_NOTES_LEN: usize = 1000;

/// Arbiter decision for a dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeOutcome {
    /// Release the full escrowed amount through the split policy
    ReleaseToAgent,
    /// Refund the full escrowed amount to the payer
    RefundToPayer,
    /// Release `agent_pct` percent through the split policy, refund the rest
    PartialSplit { agent_pct: u8 },
}

impl DisputeOutcome {
    /// Validate the outcome parameters
    ///
    /// A partial split must be strictly partial; 0 and 100 have the
    /// dedicated full-refund and full-release forms.
    pub fn validate(&self) -> Result<()> {
        if let Self::PartialSplit { agent_pct } = self {
            if !(1..=99).contains(agent_pct) {
                return Err(MarketError::invalid_field(
                    "agent_pct",
                    "must be between 1 and 99",
                ));
            }
        }
        Ok(())
    }
}

/// Status of a dispute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Opened, awaiting an arbiter
    Pending,
    /// Under manual review by an arbiter
    Reviewing { arbiter: PrincipalId },
    /// Resolved; the outcome has been applied to the escrow ledger
    Resolved { outcome: DisputeOutcome },
}

impl DisputeStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Status name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Reviewing { .. } => "Reviewing",
            Self::Resolved { .. } => "Resolved",
        }
    }
}

/// Resolution attached to a resolved dispute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    /// The applied outcome
    pub outcome: DisputeOutcome,
    /// Arbiter notes
    pub notes: String,
    /// Who decided
    pub arbiter: PrincipalId,
}

/// A dispute opened against a completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Unique dispute ID
    pub dispute_id: DisputeId,
    /// The disputed request
    pub request_id: RequestId,
    /// The payer that opened the dispute
    pub opened_by: PrincipalId,
    /// Reason (10-1000 chars)
    pub reason: String,
    /// Current status
    pub status: DisputeStatus,
    /// Resolution; None until resolved
    pub resolution: Option<DisputeResolution>,
    /// When the dispute was opened
    pub opened_at: DateTime<Utc>,
    /// When the dispute was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Validate a dispute reason
pub fn validate_reason(reason: &str) -> Result<()> {
    if reason.len() < MIN_REASON_LEN || reason.len() > MAX_REASON_LEN {
        return Err(MarketError::invalid_field(
            "reason",
            format!(
                "length must be {}-{} characters",
                MIN_REASON_LEN, MAX_REASON_LEN
            ),
        ));
    }
    Ok(())
}

/// Validate arbiter resolution notes
pub fn validate_notes(notes: &str) -> Result<()> {
    if notes.len() > MAX_NOTES_LEN {
        return Err(MarketError::invalid_field(
            "notes",
            format!("length must be at most {} characters", MAX_NOTES_LEN),
        ));
    }
    Ok(())
}
