//! AgentMarket Reputation - Payment-gated ratings
//!
//! Every rating is backed by a payment: only the payer of an `Approved`
//! request may rate it, exactly once, and the rating is immutable after
//! submission. Accepted ratings fold into the agent's running reputation
//! score (stars x100) on the registry profile.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use agentmarket_escrow::EscrowLedger;
use agentmarket_registry::AgentRegistry;
use agentmarket_types::{
    rating, AgentId, MarketError, Page, PrincipalId, Rating, RatingId, RequestId, RequestStatus,
    Result,
};

/// The reputation ledger
///
/// Ratings are keyed by request ID, so the one-rating-per-request rule is
/// a map-level check-and-insert under one write guard.
#[derive(Clone)]
pub struct ReputationLedger {
    ratings: Arc<RwLock<HashMap<RequestId, Rating>>>,
    escrow: EscrowLedger,
    registry: AgentRegistry,
}

impl ReputationLedger {
    /// Create a reputation ledger over the given escrow ledger and registry
    pub fn new(escrow: EscrowLedger, registry: AgentRegistry) -> Self {
        Self {
            ratings: Arc::new(RwLock::new(HashMap::new())),
            escrow,
            registry,
        }
    }

    /// Submit a rating for an approved request
    ///
    /// The rater must be the request's payer, the request must be
    /// `Approved`, and no rating may exist for it yet. The duplicate check
    /// and the insert share one write guard, so two concurrent submissions
    /// cannot both land.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit(
        &self,
        request_id: &RequestId,
        rater: &PrincipalId,
        stars: u8,
        quality: Option<u8>,
        speed: Option<u8>,
        value: Option<u8>,
        review_text: Option<String>,
    ) -> Result<Rating> {
        rating::validate_stars("stars", stars)?;
        if let Some(quality) = quality {
            rating::validate_stars("quality", quality)?;
        }
        if let Some(speed) = speed {
            rating::validate_stars("speed", speed)?;
        }
        if let Some(value) = value {
            rating::validate_stars("value", value)?;
        }
        if let Some(text) = &review_text {
            rating::validate_review(text)?;
        }

        let request = self.escrow.get(request_id).await?;
        request.require_payer(rater)?;
        request.require_status(RequestStatus::Approved)?;

        let mut ratings = self.ratings.write().await;
        if ratings.contains_key(request_id) {
            return Err(MarketError::DuplicateRating {
                request_id: request_id.to_string(),
            });
        }

        self.registry.apply_rating(&request.agent_id, stars).await?;

        let record = Rating {
            rating_id: RatingId::new(),
            request_id: request_id.clone(),
            agent_id: request.agent_id.clone(),
            rater_id: rater.clone(),
            stars,
            quality,
            speed,
            value,
            review_text,
            created_at: Utc::now(),
        };
        ratings.insert(request_id.clone(), record.clone());

        info!(
            "Rating submitted: {} stars for {} on {}",
            stars, record.agent_id, request_id
        );
        Ok(record)
    }

    /// Ratings for an agent, newest first, paginated
    pub async fn ratings_for_agent(&self, agent_id: &AgentId, page: Page) -> Vec<Rating> {
        let ratings = self.ratings.read().await;
        let mut matching: Vec<Rating> = ratings
            .values()
            .filter(|r| &r.agent_id == agent_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.apply(&matching)
    }

    /// The rating for a request, if one was submitted
    pub async fn rating_for_request(&self, request_id: &RequestId) -> Option<Rating> {
        let ratings = self.ratings.read().await;
        ratings.get(request_id).cloned()
    }
}
