//! AgentMarket Ledger - Append-only funds ledger with escrow custody
//!
//! The ledger is:
//! - Account-keyed by principal or per-request escrow account
//! - Append-only (entries are immutable once written)
//! - Atomic (multi-leg movements validate every leg before applying any)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason tied to a request or deposit
//! 3. An escrow settlement conserves value exactly: the payout legs sum to
//!    the custodied balance, and the escrow account ends at zero
//! 4. No partial multi-leg movements, ever

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use agentmarket_types::{
    AccountId, Amount, EntryId, EscrowRef, MarketError, PrincipalId, RequestId, Result,
};

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// External funding of a principal account
    Deposit,
    /// Funds moved into escrow custody at request creation
    EscrowLock { request_id: RequestId },
    /// Split share released from escrow on approval or dispute release
    EscrowRelease { request_id: RequestId },
    /// Escrowed funds returned to the payer
    EscrowRefund { request_id: RequestId },
}

/// A single ledger entry (one side of a movement)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: AccountId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// One payout leg of an escrow settlement
#[derive(Debug, Clone)]
pub struct PayoutLeg {
    /// Recipient principal
    pub to: PrincipalId,
    /// Amount for this leg; zero legs are skipped
    pub amount: Amount,
    /// Why this leg exists (release vs refund)
    pub reason: EntryReason,
}

/// The AgentMarket funds ledger
///
/// Materialized balances plus an append-only entry log. Thread-safe; every
/// movement happens inside one write guard so concurrent callers observe
/// either all of a movement or none of it.
#[derive(Clone)]
pub struct FundsLedger {
    inner: Arc<RwLock<LedgerState>>,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<AccountId, Amount>,
    entries: Vec<LedgerEntry>,
}

impl LedgerState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn push_credit(&mut self, account: AccountId, amount: Amount, reason: EntryReason) -> Result<EntryId> {
        let current = self.balance(&account);
        let new_balance = current
            .checked_add(amount)
            .ok_or(MarketError::AmountOverflow)?;
        self.balances.insert(account.clone(), new_balance);
        let entry_id = EntryId::new();
        self.entries.push(LedgerEntry {
            entry_id: entry_id.clone(),
            account,
            entry_type: EntryType::Credit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        });
        Ok(entry_id)
    }

    fn push_debit(&mut self, account: AccountId, amount: Amount, reason: EntryReason) -> Result<EntryId> {
        let current = self.balance(&account);
        let new_balance = current
            .checked_sub(amount)
            .ok_or_else(|| MarketError::InsufficientFunds {
                account: account.to_string(),
                requested: amount.value(),
                available: current.value(),
            })?;
        self.balances.insert(account.clone(), new_balance);
        let entry_id = EntryId::new();
        self.entries.push(LedgerEntry {
            entry_id: entry_id.clone(),
            account,
            entry_type: EntryType::Debit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        });
        Ok(entry_id)
    }
}

impl FundsLedger {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(LedgerState::default())),
        }
    }

    /// Get the balance of an account
    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.inner.read().await.balance(account)
    }

    /// Spendable balance of a principal
    pub async fn principal_balance(&self, principal: &PrincipalId) -> Amount {
        self.balance(&AccountId::Principal(principal.clone())).await
    }

    /// Custodied balance of an escrow account
    pub async fn escrow_balance(&self, escrow_ref: &EscrowRef) -> Amount {
        self.balance(&AccountId::Escrow(escrow_ref.clone())).await
    }

    /// Fund a principal account from outside the engine
    pub async fn deposit(&self, principal: &PrincipalId, amount: Amount) -> Result<EntryId> {
        if amount.is_zero() {
            return Err(MarketError::NonPositiveAmount);
        }
        let mut state = self.inner.write().await;
        state.push_credit(
            AccountId::Principal(principal.clone()),
            amount,
            EntryReason::Deposit,
        )
    }

    /// Move funds from a payer into a fresh escrow account
    ///
    /// Atomic with respect to the payer balance check: if the payer cannot
    /// cover the amount, nothing is written.
    pub async fn lock_escrow(
        &self,
        payer: &PrincipalId,
        escrow_ref: &EscrowRef,
        amount: Amount,
        request_id: &RequestId,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(MarketError::NonPositiveAmount);
        }
        let mut state = self.inner.write().await;

        let payer_account = AccountId::Principal(payer.clone());
        let available = state.balance(&payer_account);
        if available < amount {
            return Err(MarketError::InsufficientFunds {
                account: payer_account.to_string(),
                requested: amount.value(),
                available: available.value(),
            });
        }

        let reason = EntryReason::EscrowLock {
            request_id: request_id.clone(),
        };
        state.push_debit(payer_account, amount, reason.clone())?;
        state.push_credit(AccountId::Escrow(escrow_ref.clone()), amount, reason)?;

        info!("Escrow locked: {} for {}", amount, request_id);
        Ok(())
    }

    /// Drain an escrow account into a set of payout legs
    ///
    /// All legs are validated before any is applied: the legs must sum to
    /// exactly the custodied balance (value conservation) and no recipient
    /// credit may overflow. Zero-amount legs are skipped. On success the
    /// escrow account holds zero.
    pub async fn settle_escrow(
        &self,
        escrow_ref: &EscrowRef,
        legs: &[PayoutLeg],
    ) -> Result<Vec<EntryId>> {
        let mut state = self.inner.write().await;

        let escrow_account = AccountId::Escrow(escrow_ref.clone());
        let custodied = state.balance(&escrow_account);
        if custodied.is_zero() {
            return Err(MarketError::AccountNotFound {
                account: escrow_account.to_string(),
            });
        }

        let mut total = Amount::zero();
        for leg in legs {
            total = total
                .checked_add(leg.amount)
                .ok_or(MarketError::AmountOverflow)?;
            let recipient = AccountId::Principal(leg.to.clone());
            state
                .balance(&recipient)
                .checked_add(leg.amount)
                .ok_or(MarketError::AmountOverflow)?;
        }
        if total != custodied {
            return Err(MarketError::internal(format!(
                "escrow settlement does not conserve value: legs sum to {}, custodied {}",
                total, custodied
            )));
        }

        // Validated above; nothing below can fail.
        let mut entry_ids = Vec::new();
        for leg in legs {
            if leg.amount.is_zero() {
                continue;
            }
            entry_ids.push(state.push_debit(
                escrow_account.clone(),
                leg.amount,
                leg.reason.clone(),
            )?);
            entry_ids.push(state.push_credit(
                AccountId::Principal(leg.to.clone()),
                leg.amount,
                leg.reason.clone(),
            )?);
        }

        info!("Escrow settled: {} across {} legs", custodied, legs.len());
        Ok(entry_ids)
    }

    /// Refund the full custodied balance to one principal
    pub async fn refund_escrow(
        &self,
        escrow_ref: &EscrowRef,
        payer: &PrincipalId,
        request_id: &RequestId,
    ) -> Result<Vec<EntryId>> {
        let custodied = self.escrow_balance(escrow_ref).await;
        self.settle_escrow(
            escrow_ref,
            &[PayoutLeg {
                to: payer.clone(),
                amount: custodied,
                reason: EntryReason::EscrowRefund {
                    request_id: request_id.clone(),
                },
            }],
        )
        .await
    }

    /// Get all entries for an account
    pub async fn account_entries(&self, account: &AccountId) -> Vec<LedgerEntry> {
        let state = self.inner.read().await;
        state
            .entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub async fn entry_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Get recent entries (newest first)
    pub async fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        let state = self.inner.read().await;
        state.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Sum of all balances; conserved across every escrow operation
    pub async fn total_value(&self) -> Amount {
        let state = self.inner.read().await;
        state
            .balances
            .values()
            .fold(Amount::zero(), |acc, b| {
                acc.checked_add(*b).unwrap_or(Amount::new(u64::MAX))
            })
    }
}

impl Default for FundsLedger {
    fn default() -> Self {
        Self::new()
    }
}
