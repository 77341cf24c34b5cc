//! # Users
//!
//! Player accounts as the back-office sees them: listing, details, blocking
//! and manual balance adjustments.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::query::{Page, PageRequest, SortOrder, matches_search, paginate};
use crate::records::{BlockInfo, Transaction, TransactionType, User};
use crate::storage::DocumentRead;
use crate::views::{
    self, Directory, RECENT_LIMIT, RoomSummary, TransactionView, UserRow,
};
use crate::{AdminId, Amount, MAX_ADMIN_AMOUNT, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_BLOCK_REASON: &str = "Blocked by admin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatusFilter {
    #[default]
    All,
    Active,
    Blocked,
}

impl UserStatusFilter {
    fn accepts(self, user: &User) -> bool {
        match self {
            Self::All => true,
            Self::Active => user.is_active,
            Self::Blocked => !user.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum UserSort {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "balance")]
    Balance,
    #[serde(rename = "totalGames")]
    TotalGames,
    #[serde(rename = "totalWins")]
    TotalWins,
    #[serde(rename = "totalWinnings")]
    TotalWinnings,
}

impl UserSort {
    fn compare(self, a: &User, b: &User) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Balance => a.balance.cmp(&b.balance),
            Self::TotalGames => a.total_games.cmp(&b.total_games),
            Self::TotalWins => a.total_wins.cmp(&b.total_wins),
            Self::TotalWinnings => a.total_winnings.cmp(&b.total_winnings),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub page: PageRequest,
    pub search: Option<String>,
    pub status: UserStatusFilter,
    pub sort_by: UserSort,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceAction {
    Add,
    Deduct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: UserRow,
    pub recent_transactions: Vec<TransactionView>,
    pub recent_rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAdjustment {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub old_balance: Amount,
    pub new_balance: Amount,
    pub amount_changed: Amount,
    #[serde(rename = "type")]
    pub action: BalanceAction,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub user: User,
    pub transactions: Page<TransactionView>,
    pub rooms: Vec<RoomSummary>,
}

impl Backoffice {
    pub fn user(&self, id: UserId) -> Result<User> {
        self.store().read(|tx| tx.require::<User>(id.0))
    }

    pub fn list_users(&self, query: &UserQuery) -> Result<Page<UserRow>> {
        let mut users: Vec<User> = self.store().read(|tx| tx.scan::<User>())?;
        let search = query.search.as_deref().unwrap_or_default();
        users.retain(|u| query.status.accepts(u) && matches_search(search, &[&u.name, &u.phone]));
        users.sort_by(|a, b| query.sort_order.apply(query.sort_by.compare(a, b)));
        Ok(paginate(users, query.page).map(UserRow::from))
    }

    pub fn user_details(&self, id: UserId) -> Result<UserDetails> {
        self.store().read(|tx| {
            let user = tx.require::<User>(id.0)?;
            let directory = Directory::load(tx)?;
            let recent_transactions = views::user_transactions(tx, id)?
                .into_iter()
                .take(RECENT_LIMIT)
                .map(|t| directory.transaction_view(t))
                .collect();
            Ok(UserDetails {
                user: UserRow::from(user),
                recent_transactions,
                recent_rooms: views::recent_rooms(tx, id)?,
            })
        })
    }

    pub fn block_user(&self, admin: AdminId, id: UserId, reason: Option<&str>) -> Result<User> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_BLOCK_REASON)
            .to_string();
        let now = self.now();

        let user = self.store().write(|tx| {
            let mut user = tx.require::<User>(id.0)?;
            if !user.is_active {
                return Err(LootoError::invalid_state("User is already blocked"));
            }
            user.is_active = false;
            user.block = Some(BlockInfo {
                reason,
                blocked_at: now,
                blocked_by: admin,
            });
            tx.put(&user)?;
            Ok(user)
        })?;
        tracing::info!(admin_id = %admin, user_id = %id, "user blocked");
        Ok(user)
    }

    pub fn unblock_user(&self, admin: AdminId, id: UserId) -> Result<User> {
        let user = self.store().write(|tx| {
            let mut user = tx.require::<User>(id.0)?;
            if user.is_active {
                return Err(LootoError::invalid_state("User is not blocked"));
            }
            user.is_active = true;
            user.block = None;
            tx.put(&user)?;
            Ok(user)
        })?;
        tracing::info!(admin_id = %admin, user_id = %id, "user unblocked");
        Ok(user)
    }

    /// Credit or debit a user by hand, recorded as `admin_credit` / `admin_debit`.
    pub fn adjust_balance(
        &self,
        admin: AdminId,
        id: UserId,
        amount: Amount,
        action: BalanceAction,
        reason: &str,
    ) -> Result<BalanceAdjustment> {
        if amount <= 0 || amount > MAX_ADMIN_AMOUNT {
            return Err(LootoError::invalid_input("Amount must be a positive number"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LootoError::invalid_input("Reason is required"));
        }
        let kind = match action {
            BalanceAction::Add => TransactionType::AdminCredit,
            BalanceAction::Deduct => TransactionType::AdminDebit,
        };
        let now = self.now();

        let adjustment = self.store().write(|tx| {
            let mut user = tx.require::<User>(id.0)?;
            let transaction = ledger::post(
                tx,
                &mut user,
                Entry::new(kind, amount, reason).by(admin),
                now,
            )?;
            Ok(BalanceAdjustment {
                user_id: user.id,
                name: user.name,
                phone: user.phone,
                old_balance: transaction.balance_before,
                new_balance: transaction.balance_after,
                amount_changed: amount,
                action,
                transaction,
            })
        })?;
        tracing::info!(
            admin_id = %admin,
            user_id = %id,
            kind = %kind,
            amount,
            new_balance = adjustment.new_balance,
            "balance adjusted"
        );
        Ok(adjustment)
    }

    pub fn user_activity(&self, id: UserId, page: PageRequest) -> Result<UserActivity> {
        self.store().read(|tx| {
            let user = tx.require::<User>(id.0)?;
            let directory = Directory::load(tx)?;
            let transactions = paginate(views::user_transactions(tx, id)?, page)
                .map(|t| directory.transaction_view(t));
            Ok(UserActivity {
                user,
                transactions,
                rooms: views::recent_rooms(tx, id)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::fixtures::world;

    #[test]
    fn list_filters_searches_and_sorts() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha Rao", "9000000001", 30_000)?;
        w.player("Bilal Khan", "9000000002", 90_000)?;
        w.player("Chetan", "9811111111", 10_000)?;
        w.office.block_user(w.admin, a, None)?;

        let by_balance = w.office.list_users(&UserQuery {
            sort_by: UserSort::Balance,
            sort_order: SortOrder::Asc,
            ..UserQuery::default()
        })?;
        let names: Vec<_> = by_balance.items.iter().map(|r| r.user.name.as_str()).collect();
        assert_eq!(names, vec!["Chetan", "Asha Rao", "Bilal Khan"]);

        let blocked = w.office.list_users(&UserQuery {
            status: UserStatusFilter::Blocked,
            ..UserQuery::default()
        })?;
        assert_eq!(blocked.pagination.total_items, 1);

        let search = w.office.list_users(&UserQuery {
            search: Some("9000".into()),
            page: PageRequest::new(Some(1), Some(1)),
            ..UserQuery::default()
        })?;
        assert_eq!(search.pagination.total_items, 2);
        assert_eq!(search.pagination.total_pages, 2);
        assert_eq!(search.items.len(), 1);
        Ok(())
    }

    #[test]
    fn block_and_unblock_are_one_way_each() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 0)?;

        let blocked = w.office.block_user(w.admin, a, Some("  "))?;
        assert!(!blocked.is_active);
        assert_eq!(
            blocked.block.map(|b| b.reason),
            Some(DEFAULT_BLOCK_REASON.to_string())
        );
        assert!(matches!(
            w.office.block_user(w.admin, a, None),
            Err(LootoError::InvalidState(_))
        ));

        let unblocked = w.office.unblock_user(w.admin, a)?;
        assert!(unblocked.is_active && unblocked.block.is_none());
        assert!(w.office.unblock_user(w.admin, a).is_err());
        assert!(matches!(
            w.office.block_user(w.admin, UserId(99), None),
            Err(LootoError::NotFound("User"))
        ));
        Ok(())
    }

    #[test]
    fn adjust_balance_records_snapshot() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 10_000)?;

        let credit = w
            .office
            .adjust_balance(w.admin, a, 5_000, BalanceAction::Add, "Goodwill")?;
        assert_eq!((credit.old_balance, credit.new_balance), (10_000, 15_000));
        assert_eq!(credit.transaction.kind, TransactionType::AdminCredit);
        assert_eq!(credit.transaction.processed_by, Some(w.admin));

        let debit = w
            .office
            .adjust_balance(w.admin, a, 15_000, BalanceAction::Deduct, "Chargeback")?;
        assert_eq!(debit.new_balance, 0);

        assert!(matches!(
            w.office.adjust_balance(w.admin, a, 1, BalanceAction::Deduct, "Again"),
            Err(LootoError::InsufficientBalance { .. })
        ));
        assert!(w.office.adjust_balance(w.admin, a, 0, BalanceAction::Add, "Zero").is_err());
        assert_eq!(w.balance(a)?, 0);
        Ok(())
    }

    #[test]
    fn details_and_activity_show_recent_history() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let b = w.player("Bilal", "9000000002", 50_000)?;
        w.playing_room("LUDO2001", &[a, b])?;

        let details = w.office.user_details(a)?;
        assert_eq!(details.recent_transactions.len(), 2);
        assert_eq!(
            details.recent_transactions[0].transaction.kind,
            TransactionType::GameEntry
        );
        assert_eq!(details.recent_rooms.len(), 1);
        assert_eq!(details.user.win_rate, 0);

        let activity = w.office.user_activity(a, PageRequest::new(Some(2), Some(1)))?;
        assert_eq!(activity.transactions.pagination.total_items, 2);
        assert_eq!(
            activity.transactions.items[0].transaction.kind,
            TransactionType::Deposit
        );
        Ok(())
    }
}
