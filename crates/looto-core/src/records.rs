//! # Records
//!
//! The documents kept in the store.
//!
//! Records are encoded with postcard on disk and with serde_json (camelCase)
//! on the wire, so they avoid serde attributes that only work with
//! self-describing formats (`skip_serializing_if`, `flatten`, `untagged`).

use crate::error::LootoError;
use crate::{AdminId, Amount, RoomId, TransactionId, UserId, WinnerRequestId, WithdrawalRequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// WIRE ENUMS
// =============================================================================

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LootoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(LootoError::invalid_input(format!(
                        "Unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }
    };
}

wire_enum!(
    /// Lifecycle of a room. `Cancelled` is terminal; `Completed` only changes
    /// winner through an admin declaration.
    RoomStatus, "room status" {
        Waiting => "waiting",
        Playing => "playing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

wire_enum!(
    TransactionType, "transaction type" {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        GameEntry => "game_entry",
        GameWin => "game_win",
        Refund => "refund",
        PlatformFee => "platform_fee",
        AdminCredit => "admin_credit",
        AdminDebit => "admin_debit",
        AdminReversal => "admin_reversal",
    }
);

wire_enum!(
    TransactionStatus, "transaction status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

wire_enum!(
    WinnerRequestStatus, "winner request status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

wire_enum!(
    WithdrawalStatus, "withdrawal status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
);

/// Which way a transaction moves the user's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
    /// Recorded for revenue accounting only.
    Neutral,
}

impl TransactionType {
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Self::Deposit | Self::GameWin | Self::Refund | Self::AdminCredit => Direction::Credit,
            Self::Withdrawal | Self::GameEntry | Self::AdminDebit | Self::AdminReversal => {
                Direction::Debit
            }
            Self::PlatformFee => Direction::Neutral,
        }
    }
}

// =============================================================================
// USER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub blocked_by: AdminId,
}

/// A player account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub balance: Amount,
    pub total_games: u32,
    pub total_wins: u32,
    pub total_winnings: Amount,
    pub is_active: bool,
    pub block: Option<BlockInfo>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, name: String, phone: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            phone,
            balance: 0,
            total_games: 0,
            total_wins: 0,
            total_winnings: 0,
            is_active: true,
            block: None,
            created_at: now,
        }
    }

    #[must_use]
    pub fn win_rate(&self) -> u32 {
        crate::win_rate_percent(self.total_wins, self.total_games)
    }
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: AdminId,
    pub cancelled_at: DateTime<Utc>,
}

/// A single game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    /// Public room code, unique.
    pub code: String,
    pub game_type: String,
    pub entry_fee: Amount,
    pub max_players: u8,
    pub players: Vec<RoomPlayer>,
    pub status: RoomStatus,
    pub created_by: UserId,
    pub winner: Option<UserId>,
    pub winner_amount: Option<Amount>,
    pub admin_declared_winner: bool,
    pub admin_notes: Option<String>,
    pub processed_by: Option<AdminId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation: Option<Cancellation>,
}

impl Room {
    #[must_use]
    pub fn has_player(&self, user: UserId) -> bool {
        self.players.iter().any(|p| p.user_id == user)
    }

    /// True if the user created or played in this room.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.created_by == user || self.has_player(user)
    }

    #[must_use]
    pub fn prize_pool(&self) -> Amount {
        self.entry_fee.saturating_mul(self.players.len() as Amount)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, RoomStatus::Waiting | RoomStatus::Playing)
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundMarker {
    pub refunded_at: DateTime<Utc>,
    pub refunded_by: AdminId,
    pub reason: String,
    pub refund_transaction: TransactionId,
}

/// One ledger entry with a balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub room_id: Option<RoomId>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Positive magnitude.
    pub amount: Amount,
    pub status: TransactionStatus,
    pub description: String,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub processed_by: Option<AdminId>,
    pub related_transaction: Option<TransactionId>,
    pub refund: Option<RefundMarker>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    #[must_use]
    pub fn is_refunded(&self) -> bool {
        self.refund.is_some()
    }

    /// Signed effect of this entry on the user's balance.
    #[must_use]
    pub fn signed_amount(&self) -> Amount {
        match self.kind.direction() {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
            Direction::Neutral => 0,
        }
    }
}

// =============================================================================
// WINNER REQUEST
// =============================================================================

/// How a room's prize pool splits between the winner and the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeBreakdown {
    pub total_prize_pool: Amount,
    pub platform_fee: Amount,
    pub winner_amount: Amount,
}

impl PrizeBreakdown {
    /// Split a pool, keeping `fee_percent` for the platform (rounded down).
    pub fn from_pool(total_prize_pool: Amount, fee_percent: u8) -> crate::Result<Self> {
        if total_prize_pool <= 0 {
            return Err(LootoError::invalid_input("Prize pool must be positive"));
        }
        if fee_percent > 100 {
            return Err(LootoError::invalid_input(
                "Platform fee percent must be between 0 and 100",
            ));
        }
        let platform_fee = total_prize_pool.saturating_mul(Amount::from(fee_percent)) / 100;
        Ok(Self {
            total_prize_pool,
            platform_fee,
            winner_amount: total_prize_pool - platform_fee,
        })
    }

    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.platform_fee >= 0
            && self.winner_amount > 0
            && self.winner_amount.checked_add(self.platform_fee) == Some(self.total_prize_pool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub description: String,
    pub screenshots: Vec<String>,
}

/// A self-reported winner awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequest {
    pub id: WinnerRequestId,
    pub room_id: RoomId,
    pub room_code: String,
    pub declared_by: UserId,
    pub declared_winner: UserId,
    pub status: WinnerRequestStatus,
    pub total_prize_pool: Amount,
    pub platform_fee: Amount,
    pub winner_amount: Amount,
    pub evidence: Option<Evidence>,
    pub admin_notes: Option<String>,
    pub processed_by: Option<AdminId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WinnerRequest {
    #[must_use]
    pub fn prize(&self) -> PrizeBreakdown {
        PrizeBreakdown {
            total_prize_pool: self.total_prize_pool,
            platform_fee: self.platform_fee,
            winner_amount: self.winner_amount,
        }
    }
}

// =============================================================================
// WITHDRAWAL REQUEST
// =============================================================================

/// A payout to a UPI id. The balance is debited when the request is filed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: WithdrawalRequestId,
    pub user_id: UserId,
    pub transaction_id: TransactionId,
    pub amount: Amount,
    pub upi_id: String,
    pub status: WithdrawalStatus,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub payment_proof: Option<String>,
    pub processed_by: Option<AdminId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
}
