//! AgentMarket Escrow - The service request state machine
//!
//! Owns `ServiceRequest` records and the custody of their funds from
//! creation to release or refund. Fund-moving transitions hold the request
//! store's write guard across the status check, the ledger legs, and the
//! status flip, so concurrent callers on the same request serialize and
//! exactly one wins.
//!
//! # State machine
//!
//! ```text
//! Pending -> InProgress -> Completed -> { Approved | Disputed }
//! Pending -> Cancelled
//! Disputed -> { Approved | Cancelled }   (via dispute resolution)
//! ```
//!
//! `Approved` and `Cancelled` are terminal. `Completed -> Cancelled` is
//! not a legal path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use agentmarket_fees::{split, PaymentSplit, SplitPolicy};
use agentmarket_ledger::{EntryReason, FundsLedger, PayoutLeg};
use agentmarket_registry::AgentRegistry;
use agentmarket_types::{
    request, AgentId, Amount, DisputeOutcome, EscrowRef, MarketError, Page, PrincipalId,
    RequestId, RequestStatus, Result, ServiceRequest,
};

/// Platform-level payout destinations for released funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccounts {
    /// Receives the platform share of every release
    pub platform: PrincipalId,
    /// Receives the treasury share (and split remainders)
    pub treasury: PrincipalId,
}

/// What a dispute resolution did to the escrowed funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionApplied {
    /// The outcome that was applied
    pub outcome: DisputeOutcome,
    /// Shares released through the split policy (zero if full refund)
    pub released: PaymentSplit,
    /// Amount refunded to the payer
    pub refunded: Amount,
    /// Terminal status the request ended in
    pub final_status: RequestStatus,
}

/// The escrow ledger
///
/// One write guard over the request store is the per-entity serialization
/// point required for double-release protection.
#[derive(Clone)]
pub struct EscrowLedger {
    requests: Arc<RwLock<HashMap<RequestId, ServiceRequest>>>,
    funds: FundsLedger,
    registry: AgentRegistry,
    accounts: PlatformAccounts,
    /// Ceiling for request amounts, from engine config
    amount_ceiling: Amount,
}

impl EscrowLedger {
    /// Create an escrow ledger over the given funds ledger and registry
    pub fn new(
        funds: FundsLedger,
        registry: AgentRegistry,
        accounts: PlatformAccounts,
        amount_ceiling: Amount,
    ) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            funds,
            registry,
            accounts,
            amount_ceiling,
        }
    }

    /// Create a service request and lock its funds into escrow
    ///
    /// The target agent must be active; deactivation only blocks new
    /// requests, in-flight ones keep processing. The ledger lock and the
    /// record insert happen under one write guard: if the payer cannot
    /// cover the amount no record is created, and a created record always
    /// has custodied funds behind it.
    pub async fn create_request(
        &self,
        payer: PrincipalId,
        agent_id: AgentId,
        amount: Amount,
        request_payload: String,
    ) -> Result<ServiceRequest> {
        if amount.is_zero() {
            return Err(MarketError::NonPositiveAmount);
        }
        if amount > self.amount_ceiling {
            return Err(MarketError::AmountAboveCeiling {
                amount: amount.value(),
                ceiling: self.amount_ceiling.value(),
            });
        }
        request::validate_request_payload(&request_payload)?;

        let profile = self.registry.get(&agent_id).await?;
        if !profile.is_active {
            return Err(MarketError::AgentInactive {
                agent_id: agent_id.to_string(),
            });
        }

        let mut requests = self.requests.write().await;

        let request_id = RequestId::new();
        let escrow_ref = EscrowRef::new();
        self.funds
            .lock_escrow(&payer, &escrow_ref, amount, &request_id)
            .await?;

        let request = ServiceRequest {
            request_id: request_id.clone(),
            agent_id,
            payer_id: payer,
            amount,
            status: RequestStatus::Pending,
            request_payload,
            result_payload: None,
            created_at: Utc::now(),
            completed_at: None,
            escrow_ref,
        };
        requests.insert(request_id.clone(), request.clone());

        info!("Request created: {} for {}", request_id, amount);
        Ok(request)
    }

    /// Agent acknowledges a pending request and begins work
    pub async fn start_work(&self, request_id: &RequestId, caller: &PrincipalId) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        self.require_agent_operator(&request.agent_id, caller).await?;
        request.require_status(RequestStatus::Pending)?;

        request.status = RequestStatus::InProgress;
        Ok(())
    }

    /// Agent submits the service result
    ///
    /// Allowed from `Pending` or `InProgress`; the result payload is
    /// write-once and `completed_at` is stamped exactly once.
    pub async fn submit_result(
        &self,
        request_id: &RequestId,
        caller: &PrincipalId,
        result_payload: String,
    ) -> Result<()> {
        request::validate_result_payload(&result_payload)?;

        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        self.require_agent_operator(&request.agent_id, caller).await?;

        if !matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::InProgress
        ) {
            return Err(MarketError::WrongRequestStatus {
                request_id: request_id.to_string(),
                expected: "Pending or InProgress".to_string(),
                actual: request.status.name().to_string(),
            });
        }

        request.result_payload = Some(result_payload);
        request.status = RequestStatus::Completed;
        request.completed_at = Some(Utc::now());

        info!("Result submitted: {}", request_id);
        Ok(())
    }

    /// Payer approves a completed request, releasing the split payment
    ///
    /// Atomic: the status guard, the registry counters, the three-way
    /// release, and the status flip happen under one write guard. If any
    /// step fails the request stays `Completed` and no funds have moved.
    pub async fn approve(
        &self,
        request_id: &RequestId,
        payer: &PrincipalId,
        policy: &SplitPolicy,
    ) -> Result<PaymentSplit> {
        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        request.require_payer(payer)?;
        request.require_status(RequestStatus::Completed)?;

        let shares = self.release_through_split(request, request.amount, policy).await?;

        request.status = RequestStatus::Approved;
        info!(
            "Payment released: {} creator {} platform {} treasury {}",
            request_id, shares.creator, shares.platform, shares.treasury
        );
        Ok(shares)
    }

    /// Payer cancels a request that has not been picked up
    ///
    /// Only legal from `Pending`; refunds the full amount atomically.
    pub async fn cancel(&self, request_id: &RequestId, payer: &PrincipalId) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        request.require_payer(payer)?;
        request.require_status(RequestStatus::Pending)?;

        self.funds
            .refund_escrow(&request.escrow_ref, &request.payer_id, request_id)
            .await?;

        request.status = RequestStatus::Cancelled;
        info!("Request cancelled: {} refunded {}", request_id, request.amount);
        Ok(())
    }

    /// Payer disputes a completed result; funds stay custodied and frozen
    ///
    /// The dispute record itself is owned by the dispute resolver; this
    /// transition is the serialization point that lets exactly one of a
    /// concurrent approve/dispute pair win.
    pub async fn mark_disputed(&self, request_id: &RequestId, payer: &PrincipalId) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        request.require_payer(payer)?;
        request.require_status(RequestStatus::Completed)?;

        request.status = RequestStatus::Disputed;
        info!("Request disputed: {}", request_id);
        Ok(())
    }

    /// Apply an arbiter outcome to a disputed request
    ///
    /// The `Disputed` status guard inside the write guard is the
    /// idempotency point: a second resolution attempt finds a terminal
    /// status and fails `InvalidState` without touching funds.
    pub async fn resolve_dispute(
        &self,
        request_id: &RequestId,
        outcome: DisputeOutcome,
        policy: &SplitPolicy,
    ) -> Result<ResolutionApplied> {
        outcome.validate()?;

        let mut requests = self.requests.write().await;
        let request = get_mut(&mut requests, request_id)?;
        request.require_status(RequestStatus::Disputed)?;

        let zero_split = PaymentSplit {
            creator: Amount::zero(),
            platform: Amount::zero(),
            treasury: Amount::zero(),
        };

        let applied = match outcome {
            DisputeOutcome::ReleaseToAgent => {
                let shares = self
                    .release_through_split(request, request.amount, policy)
                    .await?;
                request.status = RequestStatus::Approved;
                ResolutionApplied {
                    outcome,
                    released: shares,
                    refunded: Amount::zero(),
                    final_status: RequestStatus::Approved,
                }
            }
            DisputeOutcome::RefundToPayer => {
                self.funds
                    .refund_escrow(&request.escrow_ref, &request.payer_id, request_id)
                    .await?;
                request.status = RequestStatus::Cancelled;
                ResolutionApplied {
                    outcome,
                    released: zero_split,
                    refunded: request.amount,
                    final_status: RequestStatus::Cancelled,
                }
            }
            DisputeOutcome::PartialSplit { agent_pct } => {
                let released = request.amount.percentage(agent_pct);
                let refunded = request
                    .amount
                    .checked_sub(released)
                    .ok_or(MarketError::AmountOverflow)?;
                let shares = self
                    .release_partial(request, released, refunded, policy)
                    .await?;
                request.status = RequestStatus::Approved;
                ResolutionApplied {
                    outcome,
                    released: shares,
                    refunded,
                    final_status: RequestStatus::Approved,
                }
            }
        };

        info!(
            "Dispute resolved on {}: {:?} -> {}",
            request_id, applied.outcome, applied.final_status
        );
        Ok(applied)
    }

    /// Get a request by ID
    pub async fn get(&self, request_id: &RequestId) -> Result<ServiceRequest> {
        let requests = self.requests.read().await;
        requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| MarketError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// List requests targeting an agent, newest first, paginated
    pub async fn list_for_agent(&self, agent_id: &AgentId, page: Page) -> Vec<ServiceRequest> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ServiceRequest> = requests
            .values()
            .filter(|r| &r.agent_id == agent_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.apply(&matching)
    }

    /// List requests funded by a payer, newest first, paginated
    pub async fn list_for_payer(&self, payer: &PrincipalId, page: Page) -> Vec<ServiceRequest> {
        let requests = self.requests.read().await;
        let mut matching: Vec<ServiceRequest> = requests
            .values()
            .filter(|r| &r.payer_id == payer)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.apply(&matching)
    }

    /// Release `released` through the split policy, refunding `refunded`
    /// to the payer in the same atomic settlement.
    async fn release_partial(
        &self,
        request: &ServiceRequest,
        released: Amount,
        refunded: Amount,
        policy: &SplitPolicy,
    ) -> Result<PaymentSplit> {
        let custodied = self.funds.escrow_balance(&request.escrow_ref).await;
        if custodied != request.amount {
            return Err(MarketError::internal(format!(
                "escrow {} holds {}, expected {}",
                request.escrow_ref, custodied, request.amount
            )));
        }

        let shares = if released.is_zero() {
            PaymentSplit {
                creator: Amount::zero(),
                platform: Amount::zero(),
                treasury: Amount::zero(),
            }
        } else {
            split(released, policy)?
        };

        // Headroom check only, no mutation. The requests write guard
        // serializes every release, so nothing consumes this headroom
        // before the record below.
        let profile = self.registry.get(&request.agent_id).await?;
        if profile.total_services.checked_add(1).is_none()
            || profile.total_earnings.checked_add(shares.creator).is_none()
        {
            return Err(MarketError::EarningsOverflow {
                agent_id: request.agent_id.to_string(),
            });
        }

        let owner = profile.owner_id;
        let release_reason = EntryReason::EscrowRelease {
            request_id: request.request_id.clone(),
        };
        let mut legs = vec![
            PayoutLeg {
                to: owner,
                amount: shares.creator,
                reason: release_reason.clone(),
            },
            PayoutLeg {
                to: self.accounts.platform.clone(),
                amount: shares.platform,
                reason: release_reason.clone(),
            },
            PayoutLeg {
                to: self.accounts.treasury.clone(),
                amount: shares.treasury,
                reason: release_reason,
            },
        ];
        if !refunded.is_zero() {
            legs.push(PayoutLeg {
                to: request.payer_id.clone(),
                amount: refunded,
                reason: EntryReason::EscrowRefund {
                    request_id: request.request_id.clone(),
                },
            });
        }
        self.funds.settle_escrow(&request.escrow_ref, &legs).await?;

        // Headroom was reserved above; this cannot fail after funds move.
        self.registry
            .record_completed_service(&request.agent_id, shares.creator)
            .await?;
        Ok(shares)
    }

    /// Full release of the custodied amount through the split policy
    async fn release_through_split(
        &self,
        request: &ServiceRequest,
        amount: Amount,
        policy: &SplitPolicy,
    ) -> Result<PaymentSplit> {
        self.release_partial(request, amount, Amount::zero(), policy)
            .await
    }

    async fn require_agent_operator(
        &self,
        agent_id: &AgentId,
        caller: &PrincipalId,
    ) -> Result<()> {
        let profile = self.registry.get(agent_id).await?;
        if &profile.owner_id != caller && !profile.operators.contains(caller) {
            return Err(MarketError::NotAgentOperator {
                principal: caller.to_string(),
                agent_id: agent_id.to_string(),
            });
        }
        Ok(())
    }
}

fn get_mut<'a>(
    requests: &'a mut HashMap<RequestId, ServiceRequest>,
    request_id: &RequestId,
) -> Result<&'a mut ServiceRequest> {
    requests
        .get_mut(request_id)
        .ok_or_else(|| MarketError::RequestNotFound {
            request_id: request_id.to_string(),
        })
}
