//! # Looto Core
//!
//! The back-office ledger for Ludo Looto.
//!
//! This crate owns:
//! - The record types (users, rooms, transactions, winner and withdrawal requests, admins)
//! - The redb-backed document store
//! - Every admin operation, each executed as a single write transaction
//!
//! There is no async and no network here. The HTTP surface lives in `apps/looto-admin`.
//!
//! ## Money
//!
//! All amounts are `i64` paise (1/100 rupee). Transaction amounts are always a
//! positive magnitude; the direction comes from the [`TransactionType`].

pub mod auth;
pub mod backoffice;
pub mod clock;
pub mod disputes;
pub mod error;
pub mod export;
pub mod intake;
pub mod ledger;
pub mod query;
pub mod records;
pub mod rooms;
pub mod stats;
pub mod storage;
pub mod transactions;
pub mod users;
pub mod views;
pub mod withdrawals;

pub use auth::{Actor, AdminProfile, Credentials, Permission, Permissions, Role, SessionGrant};
pub use backoffice::Backoffice;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{LootoError, Result};
pub use query::{Page, PageRequest, Pagination, SortOrder};
pub use records::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// Money in paise.
pub type Amount = i64;

/// Paise per rupee.
pub const PAISE_PER_RUPEE: Amount = 100;

/// Largest single amount accepted from an admin (1 crore rupees).
pub const MAX_ADMIN_AMOUNT: Amount = 10_000_000 * PAISE_PER_RUPEE;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Identifier of a player account.
    UserId
);
record_id!(
    /// Internal identifier of a room. Rooms are addressed publicly by code.
    RoomId
);
record_id!(
    /// Identifier of a ledger transaction.
    TransactionId
);
record_id!(WinnerRequestId);
record_id!(WithdrawalRequestId);
record_id!(
    /// Identifier of a back-office operator.
    AdminId
);
record_id!(SessionId);

/// Win rate as a rounded integer percentage.
#[must_use]
pub fn win_rate_percent(total_wins: u32, total_games: u32) -> u32 {
    if total_games == 0 {
        return 0;
    }
    let wins = u64::from(total_wins).saturating_mul(100);
    let games = u64::from(total_games);
    (wins.saturating_add(games / 2) / games) as u32
}
