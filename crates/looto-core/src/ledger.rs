//! # Ledger
//!
//! The single posting routine. Every balance change in the back-office goes
//! through [`post`], which writes the user and a [`Transaction`] carrying the
//! before/after snapshot in the same write transaction.
//!
//! Balance rules:
//! - credit types add the amount
//! - debit types subtract it and may not overdraw, except `admin_reversal`
//! - `platform_fee` leaves the balance untouched

use crate::error::{LootoError, Result};
use crate::records::{Direction, Transaction, TransactionStatus, TransactionType, User};
use crate::storage::WriteTx;
use crate::{AdminId, Amount, RoomId, TransactionId};
use chrono::{DateTime, Utc};

/// A balance movement waiting to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: TransactionType,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub room: Option<RoomId>,
    pub description: String,
    pub processed_by: Option<AdminId>,
    pub related: Option<TransactionId>,
}

impl Entry {
    /// A completed entry with no room, admin or related transaction.
    pub fn new(kind: TransactionType, amount: Amount, description: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            status: TransactionStatus::Completed,
            room: None,
            description: description.into(),
            processed_by: None,
            related: None,
        }
    }

    #[must_use]
    pub fn in_room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }

    #[must_use]
    pub fn by(mut self, admin: AdminId) -> Self {
        self.processed_by = Some(admin);
        self
    }

    #[must_use]
    pub fn related_to(mut self, transaction: TransactionId) -> Self {
        self.related = Some(transaction);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }
}

/// Balance after applying `amount` of `kind` to `balance`.
pub fn apply(balance: Amount, kind: TransactionType, amount: Amount) -> Result<Amount> {
    if amount <= 0 {
        return Err(LootoError::invalid_input("Amount must be a positive number"));
    }
    match kind.direction() {
        Direction::Credit => balance
            .checked_add(amount)
            .ok_or_else(|| LootoError::invalid_input("Amount overflows the balance")),
        Direction::Debit => {
            if kind != TransactionType::AdminReversal && balance < amount {
                return Err(LootoError::InsufficientBalance {
                    available: balance,
                    requested: amount,
                });
            }
            balance
                .checked_sub(amount)
                .ok_or_else(|| LootoError::invalid_input("Amount overflows the balance"))
        }
        Direction::Neutral => Ok(balance),
    }
}

/// Apply `entry` to `user`, then store both the user and the new transaction.
///
/// Counter updates (wins, winnings, games) belong to the caller and must be
/// made on `user` before calling, so they land in the same `put`.
pub fn post(tx: &WriteTx, user: &mut User, entry: Entry, now: DateTime<Utc>) -> Result<Transaction> {
    let balance_before = user.balance;
    let balance_after = apply(balance_before, entry.kind, entry.amount)?;

    let transaction = Transaction {
        id: TransactionId(tx.next_id::<Transaction>()?),
        user_id: user.id,
        room_id: entry.room,
        kind: entry.kind,
        amount: entry.amount,
        status: entry.status,
        description: entry.description,
        balance_before,
        balance_after,
        processed_by: entry.processed_by,
        related_transaction: entry.related,
        refund: None,
        created_at: now,
    };

    user.balance = balance_after;
    tx.put(user)?;
    tx.put(&transaction)?;

    tracing::debug!(
        user_id = %user.id,
        transaction_id = %transaction.id,
        kind = %transaction.kind,
        amount = transaction.amount,
        balance_after,
        "ledger entry posted"
    );
    Ok(transaction)
}

/// True if the entry's snapshot agrees with its type and amount.
#[must_use]
pub fn is_consistent(transaction: &Transaction) -> bool {
    transaction.balance_before.checked_add(transaction.signed_amount())
        == Some(transaction.balance_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;
    use crate::storage::{DocumentRead, Store};
    use proptest::prelude::*;

    fn fresh_user(store: &Store) -> Result<User> {
        store.write(|tx| {
            let user = User::new(
                UserId(tx.next_id::<User>()?),
                "Asha".into(),
                "9000000001".into(),
                DateTime::<Utc>::UNIX_EPOCH,
            );
            tx.put(&user)?;
            Ok(user)
        })
    }

    #[test]
    fn apply_by_direction() -> Result<()> {
        assert_eq!(apply(100, TransactionType::Deposit, 50)?, 150);
        assert_eq!(apply(100, TransactionType::GameEntry, 50)?, 50);
        assert_eq!(apply(100, TransactionType::PlatformFee, 50)?, 100);
        assert_eq!(apply(10, TransactionType::AdminReversal, 50)?, -40);
        assert!(matches!(
            apply(10, TransactionType::AdminDebit, 50),
            Err(LootoError::InsufficientBalance {
                available: 10,
                requested: 50
            })
        ));
        assert!(apply(10, TransactionType::Deposit, 0).is_err());
        assert!(apply(10, TransactionType::Deposit, -5).is_err());
        Ok(())
    }

    #[test]
    fn post_writes_user_and_snapshot() -> Result<()> {
        let store = Store::in_memory()?;
        let mut user = fresh_user(&store)?;
        let now = DateTime::<Utc>::UNIX_EPOCH;

        let posted = store.write(|tx| {
            post(
                tx,
                &mut user,
                Entry::new(TransactionType::AdminCredit, 2_500, "goodwill").by(AdminId(1)),
                now,
            )
        })?;

        assert_eq!(posted.balance_before, 0);
        assert_eq!(posted.balance_after, 2_500);
        assert_eq!(posted.processed_by, Some(AdminId(1)));
        assert!(is_consistent(&posted));

        let stored = store.read(|tx| tx.require::<User>(user.id.0))?;
        assert_eq!(stored.balance, 2_500);
        Ok(())
    }

    #[test]
    fn rejected_debit_writes_nothing() -> Result<()> {
        let store = Store::in_memory()?;
        let mut user = fresh_user(&store)?;
        let result = store.write(|tx| {
            post(
                tx,
                &mut user,
                Entry::new(TransactionType::AdminDebit, 1, "too much"),
                DateTime::<Utc>::UNIX_EPOCH,
            )
        });
        assert!(result.is_err());
        assert_eq!(store.counts()?.transactions, 0);
        Ok(())
    }

    fn kind_strategy() -> impl Strategy<Value = TransactionType> {
        prop::sample::select(TransactionType::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn balance_equals_sum_of_signed_entries(
            ops in prop::collection::vec((kind_strategy(), 1i64..100_000), 1..40)
        ) {
            let store = Store::in_memory().map_err(|e| TestCaseError::fail(e.to_string()))?;
            let mut user = fresh_user(&store).map_err(|e| TestCaseError::fail(e.to_string()))?;

            let mut posted = Vec::new();
            for (kind, amount) in ops {
                let result = store.write(|tx| {
                    post(tx, &mut user, Entry::new(kind, amount, "prop"), DateTime::<Utc>::UNIX_EPOCH)
                });
                match result {
                    Ok(t) => posted.push(t),
                    Err(LootoError::InsufficientBalance { .. }) => {}
                    Err(e) => return Err(TestCaseError::fail(e.to_string())),
                }
            }

            let stored: User = store
                .read(|tx| tx.require(user.id.0))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let sum: Amount = posted.iter().map(Transaction::signed_amount).sum();
            prop_assert_eq!(stored.balance, sum);
            prop_assert!(posted.iter().all(is_consistent));
            for pair in posted.windows(2) {
                prop_assert_eq!(pair[0].balance_after, pair[1].balance_before);
            }
        }
    }
}
