//! # Views
//!
//! Response shapes for the list and detail operations.
//!
//! Records reference each other by id; views resolve those ids into small
//! summaries (name and phone of a user, code of a room, username of an admin)
//! the way a dashboard table wants them. Views are JSON-only, never stored.

use crate::auth::Admin;
use crate::error::Result;
use crate::records::{Room, RoomStatus, Transaction, User, WinnerRequest, WithdrawalRequest};
use crate::storage::DocumentRead;
use crate::{AdminId, Amount, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub phone: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub code: String,
    pub game_type: String,
    pub entry_fee: Amount,
    pub status: RoomStatus,
    pub winner: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            code: room.code.clone(),
            game_type: room.game_type.clone(),
            entry_fee: room.entry_fee,
            status: room.status,
            winner: room.winner,
            created_at: room.created_at,
            completed_at: room.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    pub id: AdminId,
    pub username: String,
}

/// A user row with its win rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    #[serde(flatten)]
    pub user: User,
    pub win_rate: u32,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        let win_rate = user.win_rate();
        Self { user, win_rate }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub user: Option<UserSummary>,
    pub balance: Option<Amount>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    #[serde(flatten)]
    pub room: Room,
    pub creator: Option<UserSummary>,
    pub player_details: Vec<PlayerView>,
    pub winner_details: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub user: Option<UserSummary>,
    pub room: Option<RoomSummary>,
    pub processor: Option<AdminSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequestView {
    #[serde(flatten)]
    pub request: WinnerRequest,
    pub room: Option<RoomSummary>,
    pub declarer: Option<UserSummary>,
    pub winner: Option<UserSummary>,
    pub processor: Option<AdminSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalView {
    #[serde(flatten)]
    pub request: WithdrawalRequest,
    pub user: Option<UserSummary>,
    pub processor: Option<AdminSummary>,
}

/// Id lookups for one snapshot.
#[derive(Debug, Default)]
pub struct Directory {
    users: BTreeMap<UserId, User>,
    rooms: BTreeMap<RoomId, Room>,
    admins: BTreeMap<AdminId, String>,
}

impl Directory {
    pub fn load(tx: &impl DocumentRead) -> Result<Self> {
        let users = tx.scan::<User>()?.into_iter().map(|u| (u.id, u)).collect();
        let rooms = tx.scan::<Room>()?.into_iter().map(|r| (r.id, r)).collect();
        let admins = tx
            .scan::<Admin>()?
            .into_iter()
            .map(|a| (a.id, a.username))
            .collect();
        Ok(Self {
            users,
            rooms,
            admins,
        })
    }

    #[must_use]
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    fn user_summary(&self, id: UserId) -> Option<UserSummary> {
        self.user(id).map(UserSummary::from)
    }

    fn admin_summary(&self, id: Option<AdminId>) -> Option<AdminSummary> {
        let id = id?;
        self.admins.get(&id).map(|username| AdminSummary {
            id,
            username: username.clone(),
        })
    }

    #[must_use]
    pub fn room_view(&self, room: Room) -> RoomView {
        let player_details = room
            .players
            .iter()
            .map(|p| PlayerView {
                user_id: p.user_id,
                user: self.user_summary(p.user_id),
                balance: self.user(p.user_id).map(|u| u.balance),
                joined_at: p.joined_at,
            })
            .collect();
        RoomView {
            creator: self.user_summary(room.created_by),
            winner_details: room.winner.and_then(|w| self.user_summary(w)),
            player_details,
            room,
        }
    }

    #[must_use]
    pub fn transaction_view(&self, transaction: Transaction) -> TransactionView {
        TransactionView {
            user: self.user_summary(transaction.user_id),
            room: transaction
                .room_id
                .and_then(|r| self.room(r))
                .map(RoomSummary::from),
            processor: self.admin_summary(transaction.processed_by),
            transaction,
        }
    }

    #[must_use]
    pub fn winner_request_view(&self, request: WinnerRequest) -> WinnerRequestView {
        WinnerRequestView {
            room: self.room(request.room_id).map(RoomSummary::from),
            declarer: self.user_summary(request.declared_by),
            winner: self.user_summary(request.declared_winner),
            processor: self.admin_summary(request.processed_by),
            request,
        }
    }

    #[must_use]
    pub fn withdrawal_view(&self, request: WithdrawalRequest) -> WithdrawalView {
        WithdrawalView {
            user: self.user_summary(request.user_id),
            processor: self.admin_summary(request.processed_by),
            request,
        }
    }
}

/// Transactions of one room, newest first.
pub(crate) fn room_transactions(tx: &impl DocumentRead, room: RoomId) -> Result<Vec<Transaction>> {
    let mut list: Vec<Transaction> = tx
        .scan::<Transaction>()?
        .into_iter()
        .filter(|t| t.room_id == Some(room))
        .collect();
    newest_first(&mut list, |t| (t.created_at, t.id.0));
    Ok(list)
}

/// The ten most recent rooms a user created or played in.
pub(crate) fn recent_rooms(tx: &impl DocumentRead, user: UserId) -> Result<Vec<RoomSummary>> {
    let mut rooms: Vec<Room> = tx
        .scan::<Room>()?
        .into_iter()
        .filter(|r| r.involves(user))
        .collect();
    newest_first(&mut rooms, |r| (r.created_at, r.id.0));
    Ok(rooms.iter().take(RECENT_LIMIT).map(RoomSummary::from).collect())
}

/// Transactions of one user, newest first.
pub(crate) fn user_transactions(tx: &impl DocumentRead, user: UserId) -> Result<Vec<Transaction>> {
    let mut list: Vec<Transaction> = tx
        .scan::<Transaction>()?
        .into_iter()
        .filter(|t| t.user_id == user)
        .collect();
    newest_first(&mut list, |t| (t.created_at, t.id.0));
    Ok(list)
}

pub(crate) const RECENT_LIMIT: usize = 10;

/// Sort by a `(timestamp, id)` key, newest first. The id breaks ties between
/// records written in the same instant.
pub(crate) fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, u64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}
