//! # Transactions
//!
//! The ledger as an audit table: filtered listing, details and refunds.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::query::{DateWindow, Page, PageRequest, SortOrder, paginate};
use crate::records::{
    Direction, RefundMarker, Transaction, TransactionStatus, TransactionType, User,
};
use crate::storage::DocumentRead;
use crate::views::{Directory, TransactionView};
use crate::{AdminId, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_REFUND_REASON: &str = "Refunded by admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TransactionSort {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "amount")]
    Amount,
}

impl TransactionSort {
    fn compare(self, a: &Transaction, b: &Transaction) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Amount => a.amount.cmp(&b.amount),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub page: PageRequest,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub user: Option<UserId>,
    pub window: DateWindow,
    pub sort_by: TransactionSort,
    pub sort_order: SortOrder,
}

impl TransactionQuery {
    fn accepts(&self, t: &Transaction) -> bool {
        self.kind.is_none_or(|k| t.kind == k)
            && self.status.is_none_or(|s| t.status == s)
            && self.user.is_none_or(|u| t.user_id == u)
            && self.window.contains(t.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub original_transaction: Transaction,
    pub refund_transaction: Transaction,
}

impl Backoffice {
    pub fn list_transactions(&self, query: &TransactionQuery) -> Result<Page<TransactionView>> {
        self.store().read(|tx| {
            let directory = Directory::load(tx)?;
            let mut list: Vec<Transaction> = tx.scan::<Transaction>()?;
            list.retain(|t| query.accepts(t));
            list.sort_by(|a, b| query.sort_order.apply(query.sort_by.compare(a, b)));
            Ok(paginate(list, query.page).map(|t| directory.transaction_view(t)))
        })
    }

    /// One transaction with its user, room and processing admin.
    pub fn transaction(&self, id: TransactionId) -> Result<TransactionView> {
        self.store().read(|tx| {
            let transaction = tx.require::<Transaction>(id.0)?;
            Ok(Directory::load(tx)?.transaction_view(transaction))
        })
    }

    /// Return the amount of a completed debit to the user.
    pub fn refund_transaction(
        &self,
        admin: AdminId,
        id: TransactionId,
        reason: Option<&str>,
    ) -> Result<RefundOutcome> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REFUND_REASON)
            .to_string();
        let now = self.now();

        let outcome = self.store().write(|tx| {
            let mut original = tx.require::<Transaction>(id.0)?;
            if original.status != TransactionStatus::Completed {
                return Err(LootoError::invalid_state("Can only refund completed transactions"));
            }
            if original.kind.direction() != Direction::Debit {
                return Err(LootoError::invalid_state(format!(
                    "Cannot refund a {} transaction",
                    original.kind
                )));
            }
            if original.kind == TransactionType::AdminReversal {
                return Err(LootoError::invalid_state(
                    "Winner reversals can only change through a new winner declaration",
                ));
            }
            if original.is_refunded() {
                return Err(LootoError::invalid_state("Transaction is already refunded"));
            }
            let mut user = tx.require::<User>(original.user_id.0)?;

            let mut entry = Entry::new(
                TransactionType::Refund,
                original.amount,
                format!("Refund for transaction {}: {}", original.id, reason),
            )
            .by(admin)
            .related_to(original.id);
            if let Some(room) = original.room_id {
                entry = entry.in_room(room);
            }
            let refund = ledger::post(tx, &mut user, entry, now)?;

            original.refund = Some(RefundMarker {
                refunded_at: now,
                refunded_by: admin,
                reason: reason.clone(),
                refund_transaction: refund.id,
            });
            tx.put(&original)?;
            Ok(RefundOutcome {
                original_transaction: original,
                refund_transaction: refund,
            })
        })?;

        tracing::info!(
            admin_id = %admin,
            transaction_id = %id,
            refund_id = %outcome.refund_transaction.id,
            amount = outcome.refund_transaction.amount,
            "transaction refunded"
        );
        Ok(outcome)
    }
}
