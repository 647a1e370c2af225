//! Rating types for the reputation ledger
//!
//! Ratings are gated to paying participants: one per approved request,
//! submitted by the payer, never mutated afterwards.

use crate::{AgentId, MarketError, PrincipalId, RatingId, RequestId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of the optional review text
pub const MAX_REVIEW_LEN: usize = 500;

/// A rating attached to an approved service request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    /// Unique rating ID
    pub rating_id: RatingId,
    /// The approved request this rating is for (unique per request)
    pub request_id: RequestId,
    /// Agent being rated
    pub agent_id: AgentId,
    /// Must equal the request's payer
    pub rater_id: PrincipalId,
    /// Overall stars (1-5)
    pub stars: u8,
    /// Optional quality dimension (1-5)
    pub quality: Option<u8>,
    /// Optional speed dimension (1-5)
    pub speed: Option<u8>,
    /// Optional value dimension (1-5)
    pub value: Option<u8>,
    /// Optional review text
    pub review_text: Option<String>,
    /// When the rating was submitted
    pub created_at: DateTime<Utc>,
}

/// Validate a star value (1-5)
pub fn validate_stars(field: &str, stars: u8) -> Result<()> {
    if !(1..=5).contains(&stars) {
        return Err(MarketError::invalid_field(
            field,
            "must be between 1 and 5",
        ));
    }
    Ok(())
}

/// Validate the optional review text
pub fn validate_review(review_text: &str) -> Result<()> {
    if review_text.len() > MAX_REVIEW_LEN {
        return Err(MarketError::invalid_field(
            "review_text",
            format!("length must be at most {} characters", MAX_REVIEW_LEN),
        ));
    }
    Ok(())
}
