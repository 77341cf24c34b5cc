//! # Storage Module
//!
//! Document storage for the back-office using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (every admin operation is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each collection is a `u64 -> postcard bytes` table. Unique lookups
//! (room code, user phone, admin username) are separate index tables.

mod redb_store;

pub use redb_store::{DocumentRead, ReadTx, Store, WriteTx};

use crate::auth::{Admin, Session};
use crate::records::{Room, Transaction, User, WinnerRequest, WithdrawalRequest};
use redb::TableDefinition;
use serde::Serialize;
use serde::de::DeserializeOwned;

// =============================================================================
// TABLE DEFINITIONS
// =============================================================================

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
pub(crate) const ROOMS: TableDefinition<u64, &[u8]> = TableDefinition::new("rooms");
pub(crate) const TRANSACTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("transactions");
pub(crate) const WINNER_REQUESTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("winner_requests");
pub(crate) const WITHDRAWAL_REQUESTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("withdrawal_requests");
pub(crate) const ADMINS: TableDefinition<u64, &[u8]> = TableDefinition::new("admins");
pub(crate) const SESSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("sessions");

/// Next id per collection, keyed by table name.
pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Unique secondary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    RoomCode,
    UserPhone,
    AdminUsername,
}

impl Index {
    pub(crate) fn definition(self) -> TableDefinition<'static, &'static str, u64> {
        match self {
            Self::RoomCode => TableDefinition::new("idx_room_code"),
            Self::UserPhone => TableDefinition::new("idx_user_phone"),
            Self::AdminUsername => TableDefinition::new("idx_admin_username"),
        }
    }

    pub(crate) const ALL: [Self; 3] = [Self::RoomCode, Self::UserPhone, Self::AdminUsername];
}

// =============================================================================
// DOCUMENT TRAIT
// =============================================================================

/// A record stored in its own collection table.
pub trait Document: Serialize + DeserializeOwned {
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;

    /// Human-readable name, used in "not found" errors.
    const KIND: &'static str;

    fn key(&self) -> u64;
}

macro_rules! document {
    ($ty:ty, $table:expr, $kind:literal) => {
        impl Document for $ty {
            const TABLE: TableDefinition<'static, u64, &'static [u8]> = $table;
            const KIND: &'static str = $kind;

            fn key(&self) -> u64 {
                self.id.0
            }
        }
    };
}

document!(User, USERS, "User");
document!(Room, ROOMS, "Room");
document!(Transaction, TRANSACTIONS, "Transaction");
document!(WinnerRequest, WINNER_REQUESTS, "Winner request");
document!(WithdrawalRequest, WITHDRAWAL_REQUESTS, "Withdrawal request");
document!(Admin, ADMINS, "Admin");
document!(Session, SESSIONS, "Session");

/// Document counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCounts {
    pub users: usize,
    pub rooms: usize,
    pub transactions: usize,
    pub winner_requests: usize,
    pub withdrawal_requests: usize,
    pub admins: usize,
}
