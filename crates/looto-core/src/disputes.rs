//! # Disputes
//!
//! Review of self-reported winners. A pending [`WinnerRequest`] is either
//! approved (the room completes and the winner is paid) or rejected (the room
//! goes back to play). Either way the request leaves `pending` exactly once.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::query::{Page, PageRequest, SortOrder, matches_search, paginate};
use crate::records::{
    Room, RoomStatus, TransactionType, User, WinnerRequest, WinnerRequestStatus,
};
use crate::rooms::find_room;
use crate::storage::DocumentRead;
use crate::views::{self, Directory, RoomView, TransactionView, WinnerRequestView};
use crate::{AdminId, WinnerRequestId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum WinnerRequestSort {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "totalPrizePool")]
    TotalPrizePool,
    #[serde(rename = "winnerAmount")]
    WinnerAmount,
}

impl WinnerRequestSort {
    fn compare(self, a: &WinnerRequest, b: &WinnerRequest) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::TotalPrizePool => a.total_prize_pool.cmp(&b.total_prize_pool),
            Self::WinnerAmount => a.winner_amount.cmp(&b.winner_amount),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct WinnerRequestQuery {
    pub page: PageRequest,
    pub status: Option<WinnerRequestStatus>,
    pub search: Option<String>,
    pub sort_by: WinnerRequestSort,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequestDetails {
    pub request: WinnerRequestView,
    pub room: Option<RoomView>,
    pub room_transactions: Vec<TransactionView>,
}

fn ensure_pending(request: &WinnerRequest) -> Result<()> {
    if request.status == WinnerRequestStatus::Pending {
        Ok(())
    } else {
        Err(LootoError::invalid_state("Request has already been processed"))
    }
}

fn clean_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

impl Backoffice {
    pub fn list_winner_requests(&self, query: &WinnerRequestQuery) -> Result<Page<WinnerRequestView>> {
        self.store().read(|tx| {
            let directory = Directory::load(tx)?;
            let search = query.search.as_deref().unwrap_or_default();
            let mut requests: Vec<WinnerRequest> = tx.scan::<WinnerRequest>()?;
            requests.retain(|r| {
                query.status.is_none_or(|s| r.status == s) && matches_search(search, &[&r.room_code])
            });
            requests.sort_by(|a, b| query.sort_order.apply(query.sort_by.compare(a, b)));
            Ok(paginate(requests, query.page).map(|r| directory.winner_request_view(r)))
        })
    }

    pub fn winner_request_details(&self, id: WinnerRequestId) -> Result<WinnerRequestDetails> {
        self.store().read(|tx| {
            let request = tx.require::<WinnerRequest>(id.0)?;
            let directory = Directory::load(tx)?;
            let room = tx.get::<Room>(request.room_id.0)?;
            let room_transactions = views::room_transactions(tx, request.room_id)?
                .into_iter()
                .map(|t| directory.transaction_view(t))
                .collect();
            Ok(WinnerRequestDetails {
                room: room.map(|r| directory.room_view(r)),
                request: directory.winner_request_view(request),
                room_transactions,
            })
        })
    }

    /// Confirm the declared winner: complete the room, pay the winner and
    /// book the platform fee.
    pub fn approve_winner_request(
        &self,
        admin: AdminId,
        id: WinnerRequestId,
        notes: Option<&str>,
    ) -> Result<WinnerRequest> {
        let now = self.now();
        let request = self.store().write(|tx| {
            let mut request = tx.require::<WinnerRequest>(id.0)?;
            ensure_pending(&request)?;
            if !request.prize().is_balanced() {
                return Err(LootoError::invalid_state("Prize breakdown does not add up"));
            }
            let mut room = tx.require::<Room>(request.room_id.0)?;
            if !room.is_active() {
                return Err(LootoError::invalid_state(format!(
                    "Room is already {}",
                    room.status
                )));
            }
            let mut winner = tx.require::<User>(request.declared_winner.0)?;

            request.status = WinnerRequestStatus::Approved;
            request.admin_notes = clean_note(notes);
            request.processed_by = Some(admin);
            request.processed_at = Some(now);
            tx.put(&request)?;

            room.status = RoomStatus::Completed;
            room.winner = Some(request.declared_winner);
            room.winner_amount = Some(request.winner_amount);
            room.completed_at = Some(now);
            room.processed_by = Some(admin);
            tx.put(&room)?;

            winner.total_wins = winner.total_wins.saturating_add(1);
            winner.total_winnings = winner.total_winnings.saturating_add(request.winner_amount);
            ledger::post(
                tx,
                &mut winner,
                Entry::new(
                    TransactionType::GameWin,
                    request.winner_amount,
                    format!("Game win - Room {}", room.code),
                )
                .in_room(room.id)
                .by(admin),
                now,
            )?;
            if request.platform_fee > 0 {
                ledger::post(
                    tx,
                    &mut winner,
                    Entry::new(
                        TransactionType::PlatformFee,
                        request.platform_fee,
                        format!("Platform fee - Room {}", room.code),
                    )
                    .in_room(room.id)
                    .by(admin),
                    now,
                )?;
            }
            Ok(request)
        })?;

        tracing::info!(
            admin_id = %admin,
            request_id = %id,
            room = %request.room_code,
            winner = %request.declared_winner,
            winner_amount = request.winner_amount,
            platform_fee = request.platform_fee,
            "winner request approved"
        );
        Ok(request)
    }

    /// Dismiss the claim. The room returns to play with no winner.
    pub fn reject_winner_request(
        &self,
        admin: AdminId,
        id: WinnerRequestId,
        reason: Option<&str>,
    ) -> Result<WinnerRequest> {
        let now = self.now();
        let request = self.store().write(|tx| {
            let mut request = tx.require::<WinnerRequest>(id.0)?;
            ensure_pending(&request)?;
            let mut room = find_room(tx, &request.room_code)?;

            request.status = WinnerRequestStatus::Rejected;
            request.admin_notes = clean_note(reason);
            request.processed_by = Some(admin);
            request.processed_at = Some(now);
            tx.put(&request)?;

            if room.is_active() {
                room.status = RoomStatus::Playing;
                room.winner = None;
                room.winner_amount = None;
                tx.put(&room)?;
            }
            Ok(request)
        })?;

        tracing::info!(admin_id = %admin, request_id = %id, room = %request.room_code, "winner request rejected");
        Ok(request)
    }
}
