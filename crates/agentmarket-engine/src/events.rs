//! Engine event stream
//!
//! Every state-changing operation emits one event on a broadcast channel
//! after it commits. Delivery is fire-and-forget: a full or dropped
//! subscriber never blocks or fails the operation.

use agentmarket_fees::PaymentSplit;
use agentmarket_types::{AgentId, Amount, DisputeId, DisputeOutcome, RatingId, RequestId};
use serde::{Deserialize, Serialize};

/// Channel capacity; slow subscribers past this lag see `RecvError::Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A committed state change in the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    /// A new agent was registered
    AgentRegistered { agent_id: AgentId },
    /// An agent was deactivated
    AgentDeactivated { agent_id: AgentId },
    /// A request was created and its funds escrowed
    RequestCreated {
        request_id: RequestId,
        agent_id: AgentId,
        amount: Amount,
    },
    /// The agent submitted a result
    ResultSubmitted { request_id: RequestId },
    /// Escrowed funds were released and split
    PaymentReleased {
        request_id: RequestId,
        split: PaymentSplit,
    },
    /// A pending request was cancelled and refunded
    RequestCancelled {
        request_id: RequestId,
        refunded: Amount,
    },
    /// A dispute was opened; the request's funds are frozen
    DisputeOpened {
        dispute_id: DisputeId,
        request_id: RequestId,
    },
    /// An arbiter resolved a dispute
    DisputeResolved {
        dispute_id: DisputeId,
        request_id: RequestId,
        outcome: DisputeOutcome,
    },
    /// A rating was accepted into the reputation ledger
    RatingSubmitted {
        rating_id: RatingId,
        agent_id: AgentId,
        stars: u8,
    },
}
