//! # Rooms
//!
//! Room listing plus the two corrective actions an admin can take on a game:
//! re-declaring the winner of a completed room, and cancelling a room that
//! has not finished.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::query::{Page, PageRequest, SortOrder, matches_search, paginate};
use crate::records::{
    Cancellation, RefundMarker, Room, RoomStatus, Transaction, TransactionStatus, TransactionType,
    User, WinnerRequest, WinnerRequestStatus,
};
use crate::storage::{DocumentRead, Index};
use crate::views::{self, Directory, RoomView, TransactionView};
use crate::{AdminId, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by admin";

/// Canonical form of a room code: trimmed, upper case, 3-16 letters or digits.
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if !(3..=16).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LootoError::invalid_input(format!("Invalid room code '{}'", code)));
    }
    Ok(code)
}

/// Resolve a room by its public code.
pub(crate) fn find_room(tx: &impl DocumentRead, code: &str) -> Result<Room> {
    let code = normalize_code(code).map_err(|_| LootoError::NotFound("Room"))?;
    let id = tx
        .lookup(Index::RoomCode, &code)?
        .ok_or(LootoError::NotFound("Room"))?;
    tx.require::<Room>(id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RoomSort {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "entryFee", alias = "amount")]
    EntryFee,
    #[serde(rename = "code", alias = "roomId")]
    Code,
    #[serde(rename = "players")]
    Players,
}

impl RoomSort {
    fn compare(self, a: &Room, b: &Room) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::EntryFee => a.entry_fee.cmp(&b.entry_fee),
            Self::Code => a.code.cmp(&b.code),
            Self::Players => a.players.len().cmp(&b.players.len()),
        };
        primary.then(a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomQuery {
    pub page: PageRequest,
    pub status: Option<RoomStatus>,
    pub game_type: Option<String>,
    pub search: Option<String>,
    pub sort_by: RoomSort,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    pub room: RoomView,
    pub transactions: Vec<TransactionView>,
}

impl Backoffice {
    pub fn list_rooms(&self, query: &RoomQuery) -> Result<Page<RoomView>> {
        self.store().read(|tx| {
            let directory = Directory::load(tx)?;
            let search = query.search.as_deref().unwrap_or_default();
            let game_type = query
                .game_type
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty() && *g != "all");

            let mut rooms: Vec<Room> = tx.scan::<Room>()?;
            rooms.retain(|r| {
                query.status.is_none_or(|s| r.status == s)
                    && game_type.is_none_or(|g| r.game_type.eq_ignore_ascii_case(g))
                    && matches_search(search, &[&r.code])
            });
            rooms.sort_by(|a, b| query.sort_order.apply(query.sort_by.compare(a, b)));
            Ok(paginate(rooms, query.page).map(|r| directory.room_view(r)))
        })
    }

    pub fn room_details(&self, code: &str) -> Result<RoomDetails> {
        self.store().read(|tx| {
            let room = find_room(tx, code)?;
            let directory = Directory::load(tx)?;
            let transactions = views::room_transactions(tx, room.id)?
                .into_iter()
                .map(|t| directory.transaction_view(t))
                .collect();
            Ok(RoomDetails {
                room: directory.room_view(room),
                transactions,
            })
        })
    }

    /// Move the prize of a completed room to a different player.
    ///
    /// The previous winner is debited with an `admin_reversal` (which may
    /// leave them negative) and the new winner credited with a `game_win`.
    pub fn declare_correct_winner(
        &self,
        admin: AdminId,
        code: &str,
        winner: UserId,
        reason: &str,
    ) -> Result<Room> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LootoError::invalid_input("Reason is required"));
        }
        let now = self.now();

        let (room, previous) = self.store().write(|tx| {
            let mut room = find_room(tx, code)?;
            if room.status != RoomStatus::Completed {
                return Err(LootoError::invalid_state(
                    "Can only declare winner for completed rooms",
                ));
            }
            let prize = room
                .winner_amount
                .ok_or_else(|| LootoError::invalid_state("Room has no recorded winner amount"))?;
            let mut new_winner = tx.require::<User>(winner.0)?;
            if !room.has_player(winner) {
                return Err(LootoError::invalid_input("Winner must be a player in the room"));
            }
            let previous = room.winner;
            if previous == Some(winner) {
                return Err(LootoError::invalid_state(
                    "User is already the declared winner",
                ));
            }

            if let Some(previous_id) = previous {
                if let Some(mut loser) = tx.get::<User>(previous_id.0)? {
                    loser.total_wins = loser.total_wins.saturating_sub(1);
                    loser.total_winnings = (loser.total_winnings - prize).max(0);
                    ledger::post(
                        tx,
                        &mut loser,
                        Entry::new(
                            TransactionType::AdminReversal,
                            prize,
                            format!("Winner declaration reversed by admin: {}", reason),
                        )
                        .in_room(room.id)
                        .by(admin),
                        now,
                    )?;
                }
            }

            new_winner.total_wins = new_winner.total_wins.saturating_add(1);
            new_winner.total_winnings = new_winner.total_winnings.saturating_add(prize);
            ledger::post(
                tx,
                &mut new_winner,
                Entry::new(
                    TransactionType::GameWin,
                    prize,
                    format!("Correct winner declared by admin: {}", reason),
                )
                .in_room(room.id)
                .by(admin),
                now,
            )?;

            room.winner = Some(winner);
            room.admin_declared_winner = true;
            room.admin_notes = Some(reason.to_string());
            room.processed_by = Some(admin);
            tx.put(&room)?;
            Ok((room, previous))
        })?;

        tracing::info!(
            admin_id = %admin,
            room = %room.code,
            previous_winner = ?previous.map(|p| p.0),
            new_winner = %winner,
            "winner re-declared"
        );
        Ok(room)
    }

    /// Cancel an unfinished room, refunding every player's entry fee.
    pub fn cancel_room(&self, admin: AdminId, code: &str, reason: Option<&str>) -> Result<Room> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_CANCEL_REASON)
            .to_string();
        let now = self.now();

        let (room, refunded) = self.store().write(|tx| {
            let mut room = find_room(tx, code)?;
            match room.status {
                RoomStatus::Cancelled => {
                    return Err(LootoError::invalid_state("Room is already cancelled"));
                }
                RoomStatus::Completed => {
                    return Err(LootoError::invalid_state("Cannot cancel completed room"));
                }
                RoomStatus::Waiting | RoomStatus::Playing => {}
            }

            let mut entries: Vec<Transaction> = tx
                .scan::<Transaction>()?
                .into_iter()
                .filter(|t| {
                    t.room_id == Some(room.id)
                        && t.kind == TransactionType::GameEntry
                        && t.status == TransactionStatus::Completed
                })
                .collect();

            let mut refunded = 0usize;
            for player in &room.players {
                let entry = entries.iter_mut().find(|t| t.user_id == player.user_id);
                // Entry fee already returned through an individual refund.
                if entry.as_ref().is_some_and(|t| t.is_refunded()) {
                    continue;
                }
                let Some(mut user) = tx.get::<User>(player.user_id.0)? else {
                    continue;
                };
                let mut refund = Entry::new(
                    TransactionType::Refund,
                    room.entry_fee,
                    format!("Room cancelled by admin: {}", reason),
                )
                .in_room(room.id)
                .by(admin);
                if let Some(entry) = entry.as_ref() {
                    refund = refund.related_to(entry.id);
                }
                let posted = ledger::post(tx, &mut user, refund, now)?;
                if let Some(entry) = entry {
                    entry.refund = Some(RefundMarker {
                        refunded_at: now,
                        refunded_by: admin,
                        reason: reason.clone(),
                        refund_transaction: posted.id,
                    });
                    tx.put(&*entry)?;
                }
                refunded += 1;
            }

            for mut request in tx.scan::<WinnerRequest>()? {
                if request.room_id == room.id && request.status == WinnerRequestStatus::Pending {
                    request.status = WinnerRequestStatus::Rejected;
                    request.admin_notes = Some(format!("Room cancelled: {}", reason));
                    request.processed_by = Some(admin);
                    request.processed_at = Some(now);
                    tx.put(&request)?;
                }
            }

            room.status = RoomStatus::Cancelled;
            room.cancellation = Some(Cancellation {
                reason: reason.clone(),
                cancelled_by: admin,
                cancelled_at: now,
            });
            room.processed_by = Some(admin);
            tx.put(&room)?;
            Ok((room, refunded))
        })?;

        tracing::info!(admin_id = %admin, room = %room.code, refunded, "room cancelled");
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::fixtures::world;
    use crate::records::TransactionStatus;

    #[test]
    fn list_filters_by_status_and_code() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        w.playing_room("LUDO3001", &[a, b])?;
        w.office.create_room("SNAKE01", "quick", 5_000, 2, a)?;

        let playing = w.office.list_rooms(&RoomQuery {
            status: Some(RoomStatus::Playing),
            ..RoomQuery::default()
        })?;
        assert_eq!(playing.pagination.total_items, 1);
        let row = &playing.items[0];
        assert_eq!(row.room.code, "LUDO3001");
        assert_eq!(row.player_details.len(), 2);
        assert_eq!(row.creator.as_ref().map(|c| c.name.as_str()), Some("Asha"));

        let search = w.office.list_rooms(&RoomQuery {
            search: Some("snake".into()),
            ..RoomQuery::default()
        })?;
        assert_eq!(search.items.len(), 1);

        let quick = w.office.list_rooms(&RoomQuery {
            game_type: Some("QUICK".into()),
            ..RoomQuery::default()
        })?;
        assert_eq!(quick.items.len(), 1);
        Ok(())
    }

    #[test]
    fn details_include_room_transactions() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        w.playing_room("LUDO3002", &[a, b])?;

        let details = w.office.room_details("ludo3002")?;
        assert_eq!(details.transactions.len(), 2);
        assert!(
            details
                .transactions
                .iter()
                .all(|t| t.transaction.kind == TransactionType::GameEntry)
        );
        assert!(matches!(
            w.office.room_details("NOPE99"),
            Err(LootoError::NotFound("Room"))
        ));
        Ok(())
    }

    #[test]
    fn redeclare_moves_prize_between_players() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        w.playing_room("LUDO3003", &[a, b])?;
        let request = w.claim("LUDO3003", a)?;
        w.office.approve_winner_request(w.admin, request, None)?;
        assert_eq!(w.balance(a)?, 90_000 + 18_000);

        let room = w
            .office
            .declare_correct_winner(w.admin, "LUDO3003", b, "Screenshot showed Bilal won")?;
        assert_eq!(room.winner, Some(b));
        assert!(room.admin_declared_winner);

        let asha = w.office.user(a)?;
        let bilal = w.office.user(b)?;
        assert_eq!(asha.balance, 90_000);
        assert_eq!((asha.total_wins, asha.total_winnings), (0, 0));
        assert_eq!(bilal.balance, 90_000 + 18_000);
        assert_eq!((bilal.total_wins, bilal.total_winnings), (1, 18_000));

        assert!(matches!(
            w.office
                .declare_correct_winner(w.admin, "LUDO3003", b, "again"),
            Err(LootoError::InvalidState(_))
        ));
        Ok(())
    }

    #[test]
    fn reversal_may_overdraw_previous_winner() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 10_000)?;
        let b = w.player("Bilal", "9000000002", 10_000)?;
        w.playing_room("LUDO3004", &[a, b])?;
        let request = w.claim("LUDO3004", a)?;
        w.office.approve_winner_request(w.admin, request, None)?;
        w.office
            .file_withdrawal(a, 18_000, "asha@upi")?;

        w.office
            .declare_correct_winner(w.admin, "LUDO3004", b, "Collusion")?;
        assert_eq!(w.balance(a)?, -18_000);
        Ok(())
    }

    #[test]
    fn redeclare_requires_completed_room_and_player() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        let outsider = w.player("Chetan", "9000000003", 0)?;
        w.playing_room("LUDO3005", &[a, b])?;

        assert!(matches!(
            w.office.declare_correct_winner(w.admin, "LUDO3005", b, "early"),
            Err(LootoError::InvalidState(_))
        ));

        let request = w.claim("LUDO3005", a)?;
        w.office.approve_winner_request(w.admin, request, None)?;
        assert!(matches!(
            w.office
                .declare_correct_winner(w.admin, "LUDO3005", outsider, "who?"),
            Err(LootoError::InvalidInput(_))
        ));
        Ok(())
    }

    #[test]
    fn cancel_refunds_players_and_rejects_pending_claim() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        w.playing_room("LUDO3006", &[a, b])?;
        let request = w.claim("LUDO3006", a)?;

        let room = w.office.cancel_room(w.admin, "LUDO3006", Some("Server crash"))?;
        assert_eq!(room.status, RoomStatus::Cancelled);
        assert_eq!(
            room.cancellation.map(|c| c.reason),
            Some("Server crash".to_string())
        );
        assert_eq!(w.balance(a)?, 100_000);
        assert_eq!(w.balance(b)?, 100_000);

        let claim = w.office.winner_request_details(request)?;
        assert_eq!(claim.request.request.status, WinnerRequestStatus::Rejected);

        let refunds = w.office.room_details("LUDO3006")?.transactions;
        let refund_count = refunds
            .iter()
            .filter(|t| {
                t.transaction.kind == TransactionType::Refund
                    && t.transaction.status == TransactionStatus::Completed
            })
            .count();
        assert_eq!(refund_count, 2);

        assert!(matches!(
            w.office.cancel_room(w.admin, "LUDO3006", None),
            Err(LootoError::InvalidState(_))
        ));
        Ok(())
    }

    fn entry_of(w: &crate::backoffice::fixtures::World, code: &str, user: UserId) -> Result<Transaction> {
        w.office
            .room_details(code)?
            .transactions
            .into_iter()
            .map(|t| t.transaction)
            .find(|t| t.kind == TransactionType::GameEntry && t.user_id == user)
            .ok_or(LootoError::NotFound("Transaction"))
    }

    #[test]
    fn cancel_skips_entry_fee_already_refunded() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let b = w.player("Bilal", "9000000002", 50_000)?;
        w.playing_room("LUDO3008", &[a, b])?;
        let entry = entry_of(&w, "LUDO3008", a)?;
        w.office.refund_transaction(w.admin, entry.id, Some("Lag"))?;
        assert_eq!(w.balance(a)?, 50_000);

        w.office.cancel_room(w.admin, "LUDO3008", None)?;
        assert_eq!(w.balance(a)?, 50_000);
        assert_eq!(w.balance(b)?, 50_000);

        let refunds = w
            .office
            .room_details("LUDO3008")?
            .transactions
            .into_iter()
            .filter(|t| t.transaction.kind == TransactionType::Refund)
            .count();
        assert_eq!(refunds, 2);
        Ok(())
    }

    #[test]
    fn cancel_marks_entries_refunded() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let b = w.player("Bilal", "9000000002", 50_000)?;
        w.playing_room("LUDO3009", &[a, b])?;
        w.office.cancel_room(w.admin, "LUDO3009", Some("Server crash"))?;

        let entry = entry_of(&w, "LUDO3009", b)?;
        let marker = entry.refund.clone().ok_or(LootoError::NotFound("Refund"))?;
        let refund = w.office.transaction(marker.refund_transaction)?.transaction;
        assert_eq!(refund.related_transaction, Some(entry.id));
        assert_eq!(refund.amount, 10_000);

        assert!(matches!(
            w.office.refund_transaction(w.admin, entry.id, None),
            Err(LootoError::InvalidState(_))
        ));
        assert_eq!(w.balance(b)?, 50_000);
        Ok(())
    }

    #[test]
    fn completed_room_cannot_be_cancelled() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 100_000)?;
        let b = w.player("Bilal", "9000000002", 100_000)?;
        w.playing_room("LUDO3007", &[a, b])?;
        let request = w.claim("LUDO3007", a)?;
        w.office.approve_winner_request(w.admin, request, None)?;

        let before = w.balance(b)?;
        assert!(w.office.cancel_room(w.admin, "LUDO3007", None).is_err());
        assert_eq!(w.balance(b)?, before);
        Ok(())
    }
}
