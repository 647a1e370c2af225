//! Service request lifecycle types
//!
//! A service request is one paid transaction lifecycle between a payer and
//! an agent. Funds are custodied in a per-request escrow account from
//! creation until release or refund.

use crate::{AgentId, Amount, EscrowRef, MarketError, PrincipalId, RequestId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of the opaque request payload reference
pub const MAX_REQUEST_PAYLOAD_LEN: usize = 1000;
/// Maximum length of the opaque result payload reference
pub const MAX_RESULT_PAYLOAD_LEN: usize = 2000;

/// Status of a service request
///
/// Forward-only: `Pending -> InProgress -> Completed -> {Approved | Disputed}`,
/// `Pending -> Cancelled`, and a resolved dispute ends `Approved` (release)
/// or `Cancelled` (refund). There is no path out of a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Created, funds escrowed, not yet picked up
    Pending,
    /// Acknowledged by the agent
    InProgress,
    /// Result submitted, awaiting payer decision
    Completed,
    /// Payer approved; funds released
    Approved,
    /// Payer disputed; funds frozen pending arbitration
    Disputed,
    /// Cancelled or refunded; funds returned to payer
    Cancelled,
}

impl RequestStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled)
    }

    /// Check if funds are still custodied in escrow
    pub fn is_custodied(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::InProgress | Self::Completed | Self::Disputed
        )
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (*self, next),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (Completed, Approved)
                | (Completed, Disputed)
                | (Disputed, Approved)
                | (Disputed, Cancelled)
        )
    }

    /// Status name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Approved => "Approved",
            Self::Disputed => "Disputed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A service request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Unique request ID
    pub request_id: RequestId,
    /// Target agent (active at creation time)
    pub agent_id: AgentId,
    /// Principal that funded the request
    pub payer_id: PrincipalId,
    /// Escrowed amount in minor units; immutable after creation
    pub amount: Amount,
    /// Current status
    pub status: RequestStatus,
    /// Opaque request payload reference
    pub request_payload: String,
    /// Opaque result payload reference; write-once
    pub result_payload: Option<String>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the result was submitted; set once
    pub completed_at: Option<DateTime<Utc>>,
    /// Custodial escrow account holding the funds
    pub escrow_ref: EscrowRef,
}

impl ServiceRequest {
    /// Guard: error unless the request is in `expected` status
    pub fn require_status(&self, expected: RequestStatus) -> Result<()> {
        if self.status != expected {
            return Err(MarketError::WrongRequestStatus {
                request_id: self.request_id.to_string(),
                expected: expected.name().to_string(),
                actual: self.status.name().to_string(),
            });
        }
        Ok(())
    }

    /// Guard: error unless `principal` is the payer
    pub fn require_payer(&self, principal: &PrincipalId) -> Result<()> {
        if &self.payer_id != principal {
            return Err(MarketError::NotPayer {
                principal: principal.to_string(),
                request_id: self.request_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Validate an opaque request payload reference
pub fn validate_request_payload(payload: &str) -> Result<()> {
    if payload.len() > MAX_REQUEST_PAYLOAD_LEN {
        return Err(MarketError::invalid_field(
            "request_payload",
            format!("length must be at most {} characters", MAX_REQUEST_PAYLOAD_LEN),
        ));
    }
    Ok(())
}

/// Validate an opaque result payload reference
pub fn validate_result_payload(payload: &str) -> Result<()> {
    if payload.len() > MAX_RESULT_PAYLOAD_LEN {
        return Err(MarketError::invalid_field(
            "result_payload",
            format!("length must be at most {} characters", MAX_RESULT_PAYLOAD_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(!RequestStatus::Completed.is_terminal());
        assert!(!RequestStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_no_backward_transitions() {
        use RequestStatus::*;
        assert!(!Approved.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Disputed));
    }

    #[test]
    fn test_completed_cannot_cancel() {
        assert!(!RequestStatus::Completed.can_transition_to(RequestStatus::Cancelled));
    }

    #[test]
    fn test_forward_paths() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Approved));
        assert!(Completed.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Approved));
        assert!(Disputed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_guard() {
        let request = ServiceRequest {
            request_id: RequestId::new(),
            agent_id: AgentId::new(),
            payer_id: PrincipalId::new(),
            amount: Amount::new(100),
            status: RequestStatus::Pending,
            request_payload: String::new(),
            result_payload: None,
            created_at: Utc::now(),
            completed_at: None,
            escrow_ref: EscrowRef::new(),
        };

        assert!(request.require_status(RequestStatus::Pending).is_ok());
        let err = request.require_status(RequestStatus::Completed).unwrap_err();
        assert!(matches!(err, MarketError::WrongRequestStatus { .. }));
    }
}
