//! AgentMarket Registry - Agent identity, metadata, and pricing
//!
//! The registry owns agent profiles: who may mutate them, whether they
//! accept new requests, and the derived counters the rest of the engine
//! maintains through it. Deactivation is one-way and never deletes history.
//!
//! # Invariants
//!
//! 1. `owner_id` is immutable after creation
//! 2. Only the owner mutates or deactivates a profile
//! 3. `total_services` and `total_earnings` are monotonic and
//!    overflow-checked; overflow aborts the enclosing operation
//! 4. `reputation_score` is derived exclusively from submitted ratings

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use agentmarket_types::{
    agent, AgentId, AgentProfile, AgentUpdate, Amount, MarketError, Page, PricingModel,
    PrincipalId, Result,
};

/// The agent registry
///
/// Thread-safe store of agent profiles keyed by `AgentId`.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<AgentId, AgentProfile>>>,
    /// Ceiling for pricing fields, from engine config
    price_ceiling: Amount,
}

impl AgentRegistry {
    /// Create a registry with the given price ceiling
    pub fn new(price_ceiling: Amount) -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            price_ceiling,
        }
    }

    /// Register a new agent
    ///
    /// Validates name/description/endpoint/capability bounds and pricing
    /// against the configured ceiling. Counters start at zero and the agent
    /// starts active.
    pub async fn register(
        &self,
        owner: PrincipalId,
        name: String,
        description: String,
        capabilities: BTreeSet<String>,
        pricing: PricingModel,
        endpoint_ref: String,
    ) -> Result<AgentId> {
        agent::validate_name(&name)?;
        agent::validate_description(&description)?;
        agent::validate_endpoint_ref(&endpoint_ref)?;
        agent::validate_capabilities(&capabilities)?;
        pricing.validate(self.price_ceiling)?;

        let agent_id = AgentId::new();
        let profile = AgentProfile {
            agent_id: agent_id.clone(),
            owner_id: owner,
            operators: BTreeSet::new(),
            name,
            description,
            capabilities,
            pricing,
            endpoint_ref,
            reputation_score: 0,
            total_ratings: 0,
            rating_points: 0,
            total_services: 0,
            total_earnings: Amount::zero(),
            is_active: true,
            created_at: Utc::now(),
        };

        let mut agents = self.agents.write().await;
        agents.insert(agent_id.clone(), profile);

        info!("Agent registered: {}", agent_id);
        Ok(agent_id)
    }

    /// Apply a partial update; only supplied fields change
    ///
    /// Fails `NotOwner` unless `caller` is the profile owner.
    pub async fn update(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        update: AgentUpdate,
    ) -> Result<()> {
        // Validate before taking the write path so a bad field cannot
        // leave a half-applied update.
        if let Some(ref name) = update.name {
            agent::validate_name(name)?;
        }
        if let Some(ref description) = update.description {
            agent::validate_description(description)?;
        }
        if let Some(ref endpoint_ref) = update.endpoint_ref {
            agent::validate_endpoint_ref(endpoint_ref)?;
        }
        if let Some(ref capabilities) = update.capabilities {
            agent::validate_capabilities(capabilities)?;
        }
        if let Some(ref pricing) = update.pricing {
            pricing.validate(self.price_ceiling)?;
        }

        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        require_owner(profile, caller)?;

        if let Some(name) = update.name {
            profile.name = name;
        }
        if let Some(description) = update.description {
            profile.description = description;
        }
        if let Some(capabilities) = update.capabilities {
            profile.capabilities = capabilities;
        }
        if let Some(pricing) = update.pricing {
            profile.pricing = pricing;
        }
        if let Some(endpoint_ref) = update.endpoint_ref {
            profile.endpoint_ref = endpoint_ref;
        }

        Ok(())
    }

    /// Deactivate an agent; history is kept, new requests are refused
    pub async fn deactivate(&self, agent_id: &AgentId, caller: &PrincipalId) -> Result<()> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        require_owner(profile, caller)?;

        profile.is_active = false;
        info!("Agent deactivated: {}", agent_id);
        Ok(())
    }

    /// Authorize a principal to act for the agent; owner only
    pub async fn add_operator(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        operator: PrincipalId,
    ) -> Result<()> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        require_owner(profile, caller)?;

        profile.operators.insert(operator);
        Ok(())
    }

    /// Revoke an operator authorization; owner only
    pub async fn remove_operator(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        operator: &PrincipalId,
    ) -> Result<()> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        require_owner(profile, caller)?;

        profile.operators.remove(operator);
        Ok(())
    }

    /// Get a profile by ID
    pub async fn get(&self, agent_id: &AgentId) -> Result<AgentProfile> {
        let agents = self.agents.read().await;
        agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })
    }

    /// List profiles, newest first, paginated
    pub async fn list(&self, page: Page) -> Vec<AgentProfile> {
        let agents = self.agents.read().await;
        let mut profiles: Vec<AgentProfile> = agents.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.apply(&profiles)
    }

    /// Record an approved service; invoked only by the escrow ledger
    ///
    /// Increments `total_services` and adds the creator share to
    /// `total_earnings` with checked arithmetic. Overflow fails
    /// `EarningsOverflow` with the profile untouched, aborting the caller's
    /// enclosing transition.
    pub async fn record_completed_service(
        &self,
        agent_id: &AgentId,
        earned: Amount,
    ) -> Result<()> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;

        let overflow = || MarketError::EarningsOverflow {
            agent_id: agent_id.to_string(),
        };
        let services = profile.total_services.checked_add(1).ok_or_else(overflow)?;
        let earnings = profile
            .total_earnings
            .checked_add(earned)
            .ok_or_else(overflow)?;

        profile.total_services = services;
        profile.total_earnings = earnings;
        Ok(())
    }

    /// Fold a new star value into the running reputation mean
    ///
    /// Invoked only by the reputation ledger. The mean is kept exact via a
    /// running point sum and stored as stars x100.
    pub async fn apply_rating(&self, agent_id: &AgentId, stars: u8) -> Result<()> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| MarketError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;

        let overflow = || MarketError::RatingOverflow {
            agent_id: agent_id.to_string(),
        };
        let total_ratings = profile.total_ratings.checked_add(1).ok_or_else(overflow)?;
        let rating_points = profile
            .rating_points
            .checked_add(stars as u64)
            .ok_or_else(overflow)?;
        let score = rating_points.checked_mul(100).ok_or_else(overflow)? / total_ratings;

        profile.total_ratings = total_ratings;
        profile.rating_points = rating_points;
        // points <= 5 * ratings, so the mean is at most 500.
        profile.reputation_score = score as u32;
        Ok(())
    }
}

fn require_owner(profile: &AgentProfile, caller: &PrincipalId) -> Result<()> {
    if &profile.owner_id != caller {
        return Err(MarketError::NotOwner {
            principal: caller.to_string(),
            agent_id: profile.agent_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Amount::new(1_000_000))
    }

    fn pricing(price: u64) -> PricingModel {
        PricingModel::PerQuery {
            price: Amount::new(price),
        }
    }

    async fn register_test_agent(registry: &AgentRegistry, owner: &PrincipalId) -> AgentId {
        registry
            .register(
                owner.clone(),
                "translator".to_string(),
                "Translates documents".to_string(),
                BTreeSet::from(["translation".to_string()]),
                pricing(100),
                "https://example.com/agent".to_string(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_initializes_counters() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        let profile = registry.get(&agent_id).await.unwrap();
        assert!(profile.is_active);
        assert_eq!(profile.total_services, 0);
        assert_eq!(profile.total_earnings, Amount::zero());
        assert_eq!(profile.reputation_score, 0);
        assert_eq!(profile.owner_id, owner);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_name() {
        let registry = registry();
        let result = registry
            .register(
                PrincipalId::new(),
                String::new(),
                String::new(),
                BTreeSet::new(),
                pricing(100),
                String::new(),
            )
            .await;
        assert!(matches!(result, Err(MarketError::InvalidField { .. })));
    }

    #[tokio::test]
    async fn test_update_partial_fields() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        registry
            .update(
                &agent_id,
                &owner,
                AgentUpdate {
                    name: Some("better translator".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profile = registry.get(&agent_id).await.unwrap();
        assert_eq!(profile.name, "better translator");
        // Unsupplied fields unchanged.
        assert_eq!(profile.description, "Translates documents");
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        let stranger = PrincipalId::new();
        let result = registry
            .update(
                &agent_id,
                &stranger,
                AgentUpdate {
                    name: Some("hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(MarketError::NotOwner { .. })));
    }

    #[tokio::test]
    async fn test_deactivate_keeps_history() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        registry
            .record_completed_service(&agent_id, Amount::new(85))
            .await
            .unwrap();
        registry.deactivate(&agent_id, &owner).await.unwrap();

        let profile = registry.get(&agent_id).await.unwrap();
        assert!(!profile.is_active);
        assert_eq!(profile.total_services, 1);
        assert_eq!(profile.total_earnings, Amount::new(85));
    }

    #[tokio::test]
    async fn test_record_completed_service_overflow() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        registry
            .record_completed_service(&agent_id, Amount::new(u64::MAX))
            .await
            .unwrap();
        let result = registry
            .record_completed_service(&agent_id, Amount::new(1))
            .await;
        assert!(matches!(result, Err(MarketError::EarningsOverflow { .. })));

        // Profile untouched by the failed call.
        let profile = registry.get(&agent_id).await.unwrap();
        assert_eq!(profile.total_services, 1);
        assert_eq!(profile.total_earnings, Amount::new(u64::MAX));
    }

    #[tokio::test]
    async fn test_apply_rating_running_mean() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;

        registry.apply_rating(&agent_id, 5).await.unwrap();
        assert_eq!(registry.get(&agent_id).await.unwrap().reputation_score, 500);

        registry.apply_rating(&agent_id, 4).await.unwrap();
        assert_eq!(registry.get(&agent_id).await.unwrap().reputation_score, 450);

        registry.apply_rating(&agent_id, 1).await.unwrap();
        // (5 + 4 + 1) * 100 / 3 = 333
        assert_eq!(registry.get(&agent_id).await.unwrap().reputation_score, 333);
    }

    #[tokio::test]
    async fn test_operator_management() {
        let registry = registry();
        let owner = PrincipalId::new();
        let agent_id = register_test_agent(&registry, &owner).await;
        let operator = PrincipalId::new();

        // Only the owner may grant.
        let stranger = PrincipalId::new();
        let result = registry
            .add_operator(&agent_id, &stranger, operator.clone())
            .await;
        assert!(matches!(result, Err(MarketError::NotOwner { .. })));

        registry
            .add_operator(&agent_id, &owner, operator.clone())
            .await
            .unwrap();
        let profile = registry.get(&agent_id).await.unwrap();
        assert!(profile.operators.contains(&operator));

        registry
            .remove_operator(&agent_id, &owner, &operator)
            .await
            .unwrap();
        let profile = registry.get(&agent_id).await.unwrap();
        assert!(profile.operators.is_empty());
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let registry = registry();
        let owner = PrincipalId::new();
        for _ in 0..25 {
            register_test_agent(&registry, &owner).await;
        }

        let first = registry.list(Page::new(1, 20).unwrap()).await;
        assert_eq!(first.len(), 20);
        let second = registry.list(Page::new(2, 20).unwrap()).await;
        assert_eq!(second.len(), 5);
    }
}
