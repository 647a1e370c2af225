//! AgentMarket Engine - The marketplace transaction engine
//!
//! One facade over the five components: agent registry, funds ledger,
//! escrow state machine, dispute resolver, and reputation ledger. The
//! engine wires them together, owns the configuration, and emits a
//! broadcast event after every committed state change.
//!
//! # Invariants
//!
//! - Value is conserved: every escrow release or refund moves exactly the
//!   custodied amount, and the sum of all balances never changes except
//!   through deposits.
//! - Releases are single-shot: the request status guard under the escrow
//!   write lock means funds for one request move at most once.
//! - Ratings are payment-gated: one rating per approved request, by its
//!   payer only.

mod config;
mod events;

pub use config::EngineConfig;
pub use events::{MarketEvent, EVENT_CHANNEL_CAPACITY};

use std::collections::BTreeSet;

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::info;

use agentmarket_disputes::DisputeResolver;
use agentmarket_escrow::{EscrowLedger, PlatformAccounts, ResolutionApplied};
use agentmarket_fees::PaymentSplit;
use agentmarket_ledger::{FundsLedger, LedgerEntry};
use agentmarket_registry::AgentRegistry;
use agentmarket_reputation::ReputationLedger;
use agentmarket_types::{
    AgentId, AgentProfile, AgentUpdate, Amount, Dispute, DisputeId, DisputeOutcome, EntryId,
    Page, PricingModel, PrincipalId, Rating, RequestId, Result, ServiceRequest,
};

/// The marketplace transaction engine
#[derive(Clone)]
pub struct MarketEngine {
    config: EngineConfig,
    funds: FundsLedger,
    registry: AgentRegistry,
    escrow: EscrowLedger,
    disputes: DisputeResolver,
    reputation: ReputationLedger,
    events: broadcast::Sender<MarketEvent>,
}

impl MarketEngine {
    /// Build an engine from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let funds = FundsLedger::new();
        let registry = AgentRegistry::new(config.price_ceiling);
        let escrow = EscrowLedger::new(
            funds.clone(),
            registry.clone(),
            PlatformAccounts {
                platform: config.platform_account.clone(),
                treasury: config.treasury_account.clone(),
            },
            config.amount_ceiling,
        );
        let disputes = DisputeResolver::new(escrow.clone());
        let reputation = ReputationLedger::new(escrow.clone(), registry.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Engine started: ceiling {} split {}/{}/{}",
            config.amount_ceiling,
            config.split_policy.creator_pct,
            config.split_policy.platform_pct,
            config.split_policy.treasury_pct
        );

        Ok(Self {
            config,
            funds,
            registry,
            escrow,
            disputes,
            reputation,
            events,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: MarketEvent) {
        // Fire-and-forget: no subscribers is not an error.
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Funding
    // ========================================================================

    /// Fund a principal's spendable balance
    pub async fn deposit(&self, principal: &PrincipalId, amount: Amount) -> Result<EntryId> {
        self.funds.deposit(principal, amount).await
    }

    /// Spendable balance of a principal
    pub async fn balance_of(&self, principal: &PrincipalId) -> Amount {
        self.funds.principal_balance(principal).await
    }

    /// Ledger entries for a principal's account
    pub async fn account_history(&self, principal: &PrincipalId) -> Vec<LedgerEntry> {
        self.funds
            .account_entries(&principal.clone().into())
            .await
    }

    /// Sum of every balance in the system
    pub async fn total_value(&self) -> Amount {
        self.funds.total_value().await
    }

    // ========================================================================
    // Agents
    // ========================================================================

    /// Register a new agent
    pub async fn register_agent(
        &self,
        owner: PrincipalId,
        name: String,
        description: String,
        capabilities: BTreeSet<String>,
        pricing: PricingModel,
        endpoint_ref: String,
    ) -> Result<AgentId> {
        let agent_id = self
            .registry
            .register(owner, name, description, capabilities, pricing, endpoint_ref)
            .await?;
        self.emit(MarketEvent::AgentRegistered {
            agent_id: agent_id.clone(),
        });
        Ok(agent_id)
    }

    /// Update mutable fields of an agent profile; owner only
    pub async fn update_agent(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        update: AgentUpdate,
    ) -> Result<()> {
        self.registry.update(agent_id, caller, update).await
    }

    /// Authorize a principal to act for an agent; owner only
    pub async fn add_agent_operator(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        operator: PrincipalId,
    ) -> Result<()> {
        self.registry.add_operator(agent_id, caller, operator).await
    }

    /// Revoke an operator authorization; owner only
    pub async fn remove_agent_operator(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
        operator: &PrincipalId,
    ) -> Result<()> {
        self.registry.remove_operator(agent_id, caller, operator).await
    }

    /// Deactivate an agent; in-flight requests keep processing
    pub async fn deactivate_agent(&self, agent_id: &AgentId, caller: &PrincipalId) -> Result<()> {
        self.registry.deactivate(agent_id, caller).await?;
        self.emit(MarketEvent::AgentDeactivated {
            agent_id: agent_id.clone(),
        });
        Ok(())
    }

    /// Get an agent profile
    pub async fn get_agent(&self, agent_id: &AgentId) -> Result<AgentProfile> {
        self.registry.get(agent_id).await
    }

    /// List agent profiles, newest first, paginated
    pub async fn list_agents(&self, page: Page) -> Vec<AgentProfile> {
        self.registry.list(page).await
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Create a service request, locking the amount into escrow
    pub async fn create_request(
        &self,
        payer: PrincipalId,
        agent_id: AgentId,
        amount: Amount,
        request_payload: String,
    ) -> Result<ServiceRequest> {
        let request = self
            .escrow
            .create_request(payer, agent_id, amount, request_payload)
            .await?;
        self.emit(MarketEvent::RequestCreated {
            request_id: request.request_id.clone(),
            agent_id: request.agent_id.clone(),
            amount: request.amount,
        });
        Ok(request)
    }

    /// Agent acknowledges a pending request
    pub async fn start_work(&self, request_id: &RequestId, caller: &PrincipalId) -> Result<()> {
        self.escrow.start_work(request_id, caller).await
    }

    /// Agent submits the service result
    pub async fn submit_result(
        &self,
        request_id: &RequestId,
        caller: &PrincipalId,
        result_payload: String,
    ) -> Result<()> {
        self.escrow
            .submit_result(request_id, caller, result_payload)
            .await?;
        self.emit(MarketEvent::ResultSubmitted {
            request_id: request_id.clone(),
        });
        Ok(())
    }

    /// Payer approves a completed request, releasing the split payment
    pub async fn approve(
        &self,
        request_id: &RequestId,
        payer: &PrincipalId,
    ) -> Result<PaymentSplit> {
        let split = self
            .escrow
            .approve(request_id, payer, &self.config.split_policy)
            .await?;
        self.emit(MarketEvent::PaymentReleased {
            request_id: request_id.clone(),
            split,
        });
        Ok(split)
    }

    /// Payer cancels a pending request; the full amount is refunded
    pub async fn cancel(&self, request_id: &RequestId, payer: &PrincipalId) -> Result<()> {
        let amount = self.escrow.get(request_id).await?.amount;
        self.escrow.cancel(request_id, payer).await?;
        self.emit(MarketEvent::RequestCancelled {
            request_id: request_id.clone(),
            refunded: amount,
        });
        Ok(())
    }

    /// Get a request
    pub async fn get_request(&self, request_id: &RequestId) -> Result<ServiceRequest> {
        self.escrow.get(request_id).await
    }

    /// Requests targeting an agent, newest first, paginated
    pub async fn requests_for_agent(&self, agent_id: &AgentId, page: Page) -> Vec<ServiceRequest> {
        self.escrow.list_for_agent(agent_id, page).await
    }

    /// Requests funded by a payer, newest first, paginated
    pub async fn requests_for_payer(
        &self,
        payer: &PrincipalId,
        page: Page,
    ) -> Vec<ServiceRequest> {
        self.escrow.list_for_payer(payer, page).await
    }

    // ========================================================================
    // Disputes
    // ========================================================================

    /// Payer disputes a completed result; funds freeze pending arbitration
    pub async fn dispute(
        &self,
        request_id: &RequestId,
        payer: &PrincipalId,
        reason: String,
    ) -> Result<Dispute> {
        let record = self.disputes.open(request_id, payer, reason).await?;
        self.emit(MarketEvent::DisputeOpened {
            dispute_id: record.dispute_id.clone(),
            request_id: request_id.clone(),
        });
        Ok(record)
    }

    /// An arbiter claims a pending dispute
    pub async fn begin_dispute_review(
        &self,
        dispute_id: &DisputeId,
        arbiter: &PrincipalId,
    ) -> Result<()> {
        self.disputes.begin_review(dispute_id, arbiter).await
    }

    /// The claiming arbiter resolves a dispute
    pub async fn resolve_dispute(
        &self,
        dispute_id: &DisputeId,
        arbiter: &PrincipalId,
        outcome: DisputeOutcome,
        notes: String,
    ) -> Result<ResolutionApplied> {
        let applied = self
            .disputes
            .resolve(dispute_id, arbiter, outcome, notes, &self.config.split_policy)
            .await?;
        let request_id = self.disputes.get(dispute_id).await?.request_id;
        self.emit(MarketEvent::DisputeResolved {
            dispute_id: dispute_id.clone(),
            request_id,
            outcome: applied.outcome,
        });
        Ok(applied)
    }

    /// Get a dispute
    pub async fn get_dispute(&self, dispute_id: &DisputeId) -> Result<Dispute> {
        self.disputes.get(dispute_id).await
    }

    /// The dispute attached to a request, if any
    pub async fn dispute_for_request(&self, request_id: &RequestId) -> Option<Dispute> {
        self.disputes.get_by_request(request_id).await
    }

    /// Unresolved disputes, oldest first, paginated
    pub async fn open_disputes(&self, page: Page) -> Vec<Dispute> {
        self.disputes.list_open(page).await
    }

    /// Unresolved disputes past the configured review window
    pub async fn overdue_disputes(&self) -> Vec<Dispute> {
        self.disputes
            .overdue(Duration::hours(self.config.dispute_review_hours))
            .await
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    /// Payer rates an approved request
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_rating(
        &self,
        request_id: &RequestId,
        rater: &PrincipalId,
        stars: u8,
        quality: Option<u8>,
        speed: Option<u8>,
        value: Option<u8>,
        review_text: Option<String>,
    ) -> Result<Rating> {
        let record = self
            .reputation
            .submit(request_id, rater, stars, quality, speed, value, review_text)
            .await?;
        self.emit(MarketEvent::RatingSubmitted {
            rating_id: record.rating_id.clone(),
            agent_id: record.agent_id.clone(),
            stars: record.stars,
        });
        Ok(record)
    }

    /// Ratings for an agent, newest first, paginated
    pub async fn ratings_for_agent(&self, agent_id: &AgentId, page: Page) -> Vec<Rating> {
        self.reputation.ratings_for_agent(agent_id, page).await
    }

    /// The rating for a request, if one was submitted
    pub async fn rating_for_request(&self, request_id: &RequestId) -> Option<Rating> {
        self.reputation.rating_for_request(request_id).await
    }
}
