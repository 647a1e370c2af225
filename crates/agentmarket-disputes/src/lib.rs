//! AgentMarket Disputes - Manual review of contested payments
//!
//! A dispute freezes a completed request's escrowed funds and routes them
//! through an arbiter decision instead of the payer's approval. Lifecycle:
//!
//! ```text
//! Pending -> Reviewing { arbiter } -> Resolved { outcome }
//! ```
//!
//! Opening a dispute flips the request `Completed -> Disputed` first; the
//! request-status guard is the serialization point, so at most one active
//! dispute can exist per request. Resolution applies the outcome to the
//! escrow ledger before the dispute record is marked resolved, and the
//! request's `Disputed` guard makes a second application impossible.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use agentmarket_escrow::{EscrowLedger, ResolutionApplied};
use agentmarket_fees::SplitPolicy;
use agentmarket_types::{
    dispute, Dispute, DisputeId, DisputeOutcome, DisputeResolution, DisputeStatus, MarketError,
    Page, PrincipalId, RequestId, Result,
};

/// The dispute resolver
///
/// Holds its own write guard across the duplicate check and the escrow
/// transition so two concurrent opens on one request cannot both pass.
#[derive(Clone)]
pub struct DisputeResolver {
    disputes: Arc<RwLock<HashMap<DisputeId, Dispute>>>,
    escrow: EscrowLedger,
}

impl DisputeResolver {
    /// Create a resolver over the given escrow ledger
    pub fn new(escrow: EscrowLedger) -> Self {
        Self {
            disputes: Arc::new(RwLock::new(HashMap::new())),
            escrow,
        }
    }

    /// Open a dispute against a completed request
    ///
    /// Only the payer may open one, only from `Completed`, and only once:
    /// the request flips to `Disputed` under this resolver's write guard,
    /// which also freezes the escrowed funds.
    pub async fn open(
        &self,
        request_id: &RequestId,
        opened_by: &PrincipalId,
        reason: String,
    ) -> Result<Dispute> {
        dispute::validate_reason(&reason)?;

        let mut disputes = self.disputes.write().await;
        if disputes
            .values()
            .any(|d| &d.request_id == request_id && !d.status.is_terminal())
        {
            return Err(MarketError::DuplicateDispute {
                request_id: request_id.to_string(),
            });
        }

        self.escrow.mark_disputed(request_id, opened_by).await?;

        let record = Dispute {
            dispute_id: DisputeId::new(),
            request_id: request_id.clone(),
            opened_by: opened_by.clone(),
            reason,
            status: DisputeStatus::Pending,
            resolution: None,
            opened_at: Utc::now(),
            resolved_at: None,
        };
        disputes.insert(record.dispute_id.clone(), record.clone());

        info!("Dispute opened: {} on {}", record.dispute_id, request_id);
        Ok(record)
    }

    /// An arbiter claims a pending dispute for review
    pub async fn begin_review(
        &self,
        dispute_id: &DisputeId,
        arbiter: &PrincipalId,
    ) -> Result<()> {
        let mut disputes = self.disputes.write().await;
        let record = get_mut(&mut disputes, dispute_id)?;
        require_status(record, "Pending")?;

        record.status = DisputeStatus::Reviewing {
            arbiter: arbiter.clone(),
        };
        info!("Dispute under review: {} by {}", dispute_id, arbiter);
        Ok(())
    }

    /// Resolve a dispute under review, applying the outcome to escrow
    ///
    /// The caller must be the arbiter that claimed the dispute. Funds move
    /// before the record is marked resolved; if the escrow application
    /// fails, the dispute stays `Reviewing` and can be retried.
    pub async fn resolve(
        &self,
        dispute_id: &DisputeId,
        arbiter: &PrincipalId,
        outcome: DisputeOutcome,
        notes: String,
        policy: &SplitPolicy,
    ) -> Result<ResolutionApplied> {
        outcome.validate()?;
        dispute::validate_notes(&notes)?;

        let mut disputes = self.disputes.write().await;
        let record = get_mut(&mut disputes, dispute_id)?;
        match &record.status {
            DisputeStatus::Reviewing { arbiter: claimed } if claimed == arbiter => {}
            DisputeStatus::Reviewing { .. } => {
                return Err(MarketError::NotArbiter {
                    principal: arbiter.to_string(),
                    dispute_id: dispute_id.to_string(),
                });
            }
            other => {
                return Err(MarketError::WrongDisputeStatus {
                    dispute_id: dispute_id.to_string(),
                    expected: "Reviewing".to_string(),
                    actual: other.name().to_string(),
                });
            }
        }

        let applied = self
            .escrow
            .resolve_dispute(&record.request_id, outcome, policy)
            .await?;

        record.status = DisputeStatus::Resolved { outcome };
        record.resolution = Some(DisputeResolution {
            outcome,
            notes,
            arbiter: arbiter.clone(),
        });
        record.resolved_at = Some(Utc::now());

        info!(
            "Dispute resolved: {} outcome {:?} refunded {}",
            dispute_id, applied.outcome, applied.refunded
        );
        Ok(applied)
    }

    /// Get a dispute by ID
    pub async fn get(&self, dispute_id: &DisputeId) -> Result<Dispute> {
        let disputes = self.disputes.read().await;
        disputes
            .get(dispute_id)
            .cloned()
            .ok_or_else(|| MarketError::DisputeNotFound {
                dispute_id: dispute_id.to_string(),
            })
    }

    /// Get the dispute for a request, if any (active first, else latest)
    pub async fn get_by_request(&self, request_id: &RequestId) -> Option<Dispute> {
        let disputes = self.disputes.read().await;
        let mut matching: Vec<&Dispute> = disputes
            .values()
            .filter(|d| &d.request_id == request_id)
            .collect();
        matching.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        matching
            .iter()
            .find(|d| !d.status.is_terminal())
            .or_else(|| matching.first())
            .map(|d| (*d).clone())
    }

    /// List unresolved disputes, oldest first, paginated
    pub async fn list_open(&self, page: Page) -> Vec<Dispute> {
        let disputes = self.disputes.read().await;
        let mut open: Vec<Dispute> = disputes
            .values()
            .filter(|d| !d.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        page.apply(&open)
    }

    /// Unresolved disputes older than the review window, for escalation
    pub async fn overdue(&self, window: Duration) -> Vec<Dispute> {
        let cutoff = Utc::now() - window;
        let disputes = self.disputes.read().await;
        let mut late: Vec<Dispute> = disputes
            .values()
            .filter(|d| !d.status.is_terminal() && d.opened_at < cutoff)
            .cloned()
            .collect();
        late.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        for record in &late {
            warn!(
                "Dispute {} on {} past review window ({})",
                record.dispute_id, record.request_id, record.opened_at
            );
        }
        late
    }
}

fn get_mut<'a>(
    disputes: &'a mut HashMap<DisputeId, Dispute>,
    dispute_id: &DisputeId,
) -> Result<&'a mut Dispute> {
    disputes
        .get_mut(dispute_id)
        .ok_or_else(|| MarketError::DisputeNotFound {
            dispute_id: dispute_id.to_string(),
        })
}

fn require_status(record: &Dispute, expected: &str) -> Result<()> {
    if record.status.name() != expected {
        return Err(MarketError::WrongDisputeStatus {
            dispute_id: record.dispute_id.to_string(),
            expected: expected.to_string(),
            actual: record.status.name().to_string(),
        });
    }
    Ok(())
}
