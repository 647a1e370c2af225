//! Error types for AgentMarket
//!
//! Every fallible operation returns a structured error. Money-moving
//! failures guarantee the ledger is left in its pre-call state; nothing is
//! retried internally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for AgentMarket operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Coarse classification of an error, for callers that dispatch on kind
/// rather than on the specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or out-of-range input; recoverable by caller correction
    Validation,
    /// Caller is not the required principal
    Unauthorized,
    /// Unknown agent/request/dispute/account
    NotFound,
    /// Operation attempted from a status that does not permit it
    InvalidState,
    /// Overflow or split-policy inconsistency; fatal, never clamped
    Arithmetic,
    /// Second rating or second active dispute on the same request
    Duplicate,
    /// Invariant breach that indicates a bug, not a caller mistake
    Internal,
}

/// AgentMarket error types
#[derive(Debug, Clone, Error)]
pub enum MarketError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// A field failed validation
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Amount must be strictly positive
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    /// Amount exceeds the configured ceiling
    #[error("Amount {amount} exceeds the configured ceiling {ceiling}")]
    AmountAboveCeiling { amount: u64, ceiling: u64 },

    /// Target agent is deactivated
    #[error("Agent {agent_id} is not active")]
    AgentInactive { agent_id: String },

    /// Split policy percentages do not sum to 100
    #[error("Split policy percentages sum to {sum}, expected 100")]
    InvalidSplitPolicy { sum: u32 },

    /// Payer cannot cover the requested escrow lock
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: String,
        requested: u64,
        available: u64,
    },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Caller is not the agent's owner
    #[error("Principal {principal} is not the owner of agent {agent_id}")]
    NotOwner { principal: String, agent_id: String },

    /// Caller is not the request's payer
    #[error("Principal {principal} is not the payer of request {request_id}")]
    NotPayer {
        principal: String,
        request_id: String,
    },

    /// Caller may not submit results for this agent
    #[error("Principal {principal} may not act for agent {agent_id}")]
    NotAgentOperator { principal: String, agent_id: String },

    /// Caller is not the reviewing arbiter
    #[error("Principal {principal} is not the reviewing arbiter for dispute {dispute_id}")]
    NotArbiter {
        principal: String,
        dispute_id: String,
    },

    // ========================================================================
    // Not-Found Errors
    // ========================================================================

    /// Agent not found
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: String },

    /// Service request not found
    #[error("Request {request_id} not found")]
    RequestNotFound { request_id: String },

    /// Dispute not found
    #[error("Dispute {dispute_id} not found")]
    DisputeNotFound { dispute_id: String },

    /// Ledger account not found
    #[error("Account {account} not found")]
    AccountNotFound { account: String },

    // ========================================================================
    // State Errors
    // ========================================================================

    /// Request is not in the status this transition requires
    #[error("Request {request_id} is {actual}; operation requires {expected}")]
    WrongRequestStatus {
        request_id: String,
        expected: String,
        actual: String,
    },

    /// Dispute is not in the status this transition requires
    #[error("Dispute {dispute_id} is {actual}; operation requires {expected}")]
    WrongDisputeStatus {
        dispute_id: String,
        expected: String,
        actual: String,
    },

    // ========================================================================
    // Arithmetic Errors
    // ========================================================================

    /// Amount arithmetic overflow
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Agent counter overflow while recording a completed service
    #[error("Counter overflow while recording earnings for agent {agent_id}")]
    EarningsOverflow { agent_id: String },

    /// Rating counter overflow while folding in a rating
    #[error("Rating counter overflow for agent {agent_id}")]
    RatingOverflow { agent_id: String },

    // ========================================================================
    // Duplicate Errors
    // ========================================================================

    /// A rating already exists for this request
    #[error("Request {request_id} already has a rating")]
    DuplicateRating { request_id: String },

    /// An active dispute already exists for this request
    #[error("Request {request_id} already has an active dispute")]
    DuplicateDispute { request_id: String },

    // ========================================================================
    // Internal Errors
    // ========================================================================

    /// Invariant breach; indicates a bug rather than a caller mistake
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MarketError {
    /// Create a validation error for a named field
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidField { .. }
            | Self::NonPositiveAmount
            | Self::AmountAboveCeiling { .. }
            | Self::AgentInactive { .. }
            | Self::InvalidSplitPolicy { .. }
            | Self::InsufficientFunds { .. } => ErrorKind::Validation,
            Self::NotOwner { .. }
            | Self::NotPayer { .. }
            | Self::NotAgentOperator { .. }
            | Self::NotArbiter { .. } => ErrorKind::Unauthorized,
            Self::AgentNotFound { .. }
            | Self::RequestNotFound { .. }
            | Self::DisputeNotFound { .. }
            | Self::AccountNotFound { .. } => ErrorKind::NotFound,
            Self::WrongRequestStatus { .. } | Self::WrongDisputeStatus { .. } => {
                ErrorKind::InvalidState
            }
            Self::AmountOverflow
            | Self::EarningsOverflow { .. }
            | Self::RatingOverflow { .. } => ErrorKind::Arithmetic,
            Self::DuplicateRating { .. } | Self::DuplicateDispute { .. } => ErrorKind::Duplicate,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            Self::AmountAboveCeiling { .. } => "AMOUNT_ABOVE_CEILING",
            Self::AgentInactive { .. } => "AGENT_INACTIVE",
            Self::InvalidSplitPolicy { .. } => "INVALID_SPLIT_POLICY",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::NotOwner { .. } => "NOT_OWNER",
            Self::NotPayer { .. } => "NOT_PAYER",
            Self::NotAgentOperator { .. } => "NOT_AGENT_OPERATOR",
            Self::NotArbiter { .. } => "NOT_ARBITER",
            Self::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            Self::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            Self::DisputeNotFound { .. } => "DISPUTE_NOT_FOUND",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::WrongRequestStatus { .. } => "WRONG_REQUEST_STATUS",
            Self::WrongDisputeStatus { .. } => "WRONG_DISPUTE_STATUS",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::EarningsOverflow { .. } => "EARNINGS_OVERFLOW",
            Self::RatingOverflow { .. } => "RATING_OVERFLOW",
            Self::DuplicateRating { .. } => "DUPLICATE_RATING",
            Self::DuplicateDispute { .. } => "DUPLICATE_DISPUTE",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
