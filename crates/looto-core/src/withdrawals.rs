//! # Withdrawals
//!
//! Payout review. Filing a withdrawal already took the money out of the
//! user's balance through a pending `withdrawal` transaction; approval settles
//! that transaction, rejection cancels it and refunds the amount.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::query::{Page, PageRequest, SortOrder, matches_search, paginate};
use crate::records::{
    Transaction, TransactionStatus, TransactionType, User, WithdrawalRequest, WithdrawalStatus,
};
use crate::storage::DocumentRead;
use crate::views::{Directory, TransactionView, WithdrawalView};
use crate::{AdminId, WithdrawalRequestId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_REJECTION_REASON: &str = "Rejected by admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum WithdrawalSort {
    #[default]
    #[serde(rename = "createdAt", alias = "requestedAt")]
    CreatedAt,
    #[serde(rename = "amount")]
    Amount,
}

impl WithdrawalSort {
    fn compare(self, a: &WithdrawalRequest, b: &WithdrawalRequest) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.requested_at.cmp(&b.requested_at),
            Self::Amount => a.amount.cmp(&b.amount),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct WithdrawalQuery {
    pub page: PageRequest,
    pub status: Option<WithdrawalStatus>,
    pub search: Option<String>,
    pub sort_by: WithdrawalSort,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDetails {
    pub request: WithdrawalView,
    pub transaction: Option<TransactionView>,
}

fn ensure_pending(request: &WithdrawalRequest) -> Result<()> {
    if request.status == WithdrawalStatus::Pending {
        Ok(())
    } else {
        Err(LootoError::invalid_state("Withdrawal request has already been processed"))
    }
}

impl Backoffice {
    pub fn list_withdrawal_requests(&self, query: &WithdrawalQuery) -> Result<Page<WithdrawalView>> {
        self.store().read(|tx| {
            let directory = Directory::load(tx)?;
            let search = query.search.as_deref().unwrap_or_default();
            let mut requests: Vec<WithdrawalRequest> = tx.scan::<WithdrawalRequest>()?;
            requests.retain(|r| {
                let (name, phone) = directory
                    .user(r.user_id)
                    .map(|u| (u.name.as_str(), u.phone.as_str()))
                    .unwrap_or_default();
                query.status.is_none_or(|s| r.status == s)
                    && matches_search(search, &[&r.upi_id, name, phone])
            });
            requests.sort_by(|a, b| query.sort_order.apply(query.sort_by.compare(a, b)));
            Ok(paginate(requests, query.page).map(|r| directory.withdrawal_view(r)))
        })
    }

    pub fn withdrawal_request_details(&self, id: WithdrawalRequestId) -> Result<WithdrawalDetails> {
        self.store().read(|tx| {
            let request = tx.require::<WithdrawalRequest>(id.0)?;
            let directory = Directory::load(tx)?;
            let transaction = tx
                .get::<Transaction>(request.transaction_id.0)?
                .map(|t| directory.transaction_view(t));
            Ok(WithdrawalDetails {
                request: directory.withdrawal_view(request),
                transaction,
            })
        })
    }

    /// Mark the payout as sent.
    pub fn approve_withdrawal(
        &self,
        admin: AdminId,
        id: WithdrawalRequestId,
        notes: Option<&str>,
        payment_proof: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let now = self.now();
        let request = self.store().write(|tx| {
            let mut request = tx.require::<WithdrawalRequest>(id.0)?;
            ensure_pending(&request)?;
            let mut transaction = tx.require::<Transaction>(request.transaction_id.0)?;

            request.status = WithdrawalStatus::Approved;
            request.admin_notes = notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
            request.payment_proof = payment_proof
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            request.processed_by = Some(admin);
            request.processed_at = Some(now);
            tx.put(&request)?;

            transaction.status = TransactionStatus::Completed;
            transaction.processed_by = Some(admin);
            tx.put(&transaction)?;
            Ok(request)
        })?;
        tracing::info!(admin_id = %admin, request_id = %id, amount = request.amount, "withdrawal approved");
        Ok(request)
    }

    /// Refuse the payout and give the money back.
    pub fn reject_withdrawal(
        &self,
        admin: AdminId,
        id: WithdrawalRequestId,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECTION_REASON)
            .to_string();
        let now = self.now();

        let request = self.store().write(|tx| {
            let mut request = tx.require::<WithdrawalRequest>(id.0)?;
            ensure_pending(&request)?;
            let mut transaction = tx.require::<Transaction>(request.transaction_id.0)?;
            let mut user = tx.require::<User>(request.user_id.0)?;

            transaction.status = TransactionStatus::Cancelled;
            transaction.processed_by = Some(admin);
            tx.put(&transaction)?;

            ledger::post(
                tx,
                &mut user,
                Entry::new(
                    TransactionType::Refund,
                    request.amount,
                    format!("Withdrawal rejected: {}", reason),
                )
                .by(admin)
                .related_to(transaction.id),
                now,
            )?;

            request.status = WithdrawalStatus::Rejected;
            request.rejection_reason = Some(reason.clone());
            request.processed_by = Some(admin);
            request.processed_at = Some(now);
            tx.put(&request)?;
            Ok(request)
        })?;
        tracing::info!(admin_id = %admin, request_id = %id, amount = request.amount, "withdrawal rejected");
        Ok(request)
    }
}
