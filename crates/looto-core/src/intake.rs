//! # Intake
//!
//! The writes the player-facing game server performs: registering players,
//! deposits, rooms filling up and starting, self-reported winners and
//! withdrawal requests. The back-office only reviews these records, but the
//! import command and the tests need a way to create them that respects the
//! same ledger rules.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::ledger::{self, Entry};
use crate::records::{
    Evidence, PrizeBreakdown, Room, RoomPlayer, RoomStatus, Transaction, TransactionStatus,
    TransactionType, User, WinnerRequest, WinnerRequestStatus, WithdrawalRequest, WithdrawalStatus,
};
use crate::rooms::{find_room, normalize_code};
use crate::storage::{DocumentRead, Index};
use crate::{Amount, MAX_ADMIN_AMOUNT, RoomId, UserId, WinnerRequestId, WithdrawalRequestId};

pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 4;

fn validate_phone(phone: &str) -> Result<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !(6..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(LootoError::invalid_input(format!("Invalid phone number '{}'", phone)));
    }
    Ok(())
}

fn validate_amount(amount: Amount) -> Result<()> {
    if amount <= 0 || amount > MAX_ADMIN_AMOUNT {
        return Err(LootoError::invalid_input("Amount must be a positive number"));
    }
    Ok(())
}

fn ensure_active(user: &User) -> Result<()> {
    if user.is_active {
        Ok(())
    } else {
        Err(LootoError::invalid_state("User is blocked"))
    }
}

impl Backoffice {
    pub fn register_user(&self, name: &str, phone: &str) -> Result<User> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() {
            return Err(LootoError::invalid_input("Name is required"));
        }
        validate_phone(phone)?;
        let now = self.now();

        let user = self.store().write(|tx| {
            let id = UserId(tx.next_id::<User>()?);
            tx.claim(Index::UserPhone, phone, id.0)?;
            let user = User::new(id, name.to_string(), phone.to_string(), now);
            tx.put(&user)?;
            Ok(user)
        })?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub fn deposit(&self, user_id: UserId, amount: Amount) -> Result<Transaction> {
        validate_amount(amount)?;
        let now = self.now();
        self.store().write(|tx| {
            let mut user = tx.require::<User>(user_id.0)?;
            ensure_active(&user)?;
            ledger::post(
                tx,
                &mut user,
                Entry::new(TransactionType::Deposit, amount, "Wallet deposit"),
                now,
            )
        })
    }

    pub fn create_room(
        &self,
        code: &str,
        game_type: &str,
        entry_fee: Amount,
        max_players: u8,
        creator: UserId,
    ) -> Result<Room> {
        let code = normalize_code(code)?;
        let game_type = game_type.trim();
        if game_type.is_empty() {
            return Err(LootoError::invalid_input("Game type is required"));
        }
        validate_amount(entry_fee)?;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(LootoError::invalid_input(format!(
                "A room holds {} to {} players",
                MIN_PLAYERS, MAX_PLAYERS
            )));
        }
        let now = self.now();

        let room = self.store().write(|tx| {
            let owner = tx.require::<User>(creator.0)?;
            ensure_active(&owner)?;
            let id = RoomId(tx.next_id::<Room>()?);
            tx.claim(Index::RoomCode, &code, id.0)?;
            let room = Room {
                id,
                code: code.clone(),
                game_type: game_type.to_string(),
                entry_fee,
                max_players,
                players: Vec::new(),
                status: RoomStatus::Waiting,
                created_by: creator,
                winner: None,
                winner_amount: None,
                admin_declared_winner: false,
                admin_notes: None,
                processed_by: None,
                created_at: now,
                started_at: None,
                completed_at: None,
                cancellation: None,
            };
            tx.put(&room)?;
            Ok(room)
        })?;
        tracing::info!(room = %room.code, creator = %creator, entry_fee, "room created");
        Ok(room)
    }

    /// Seat a player, charging the entry fee.
    pub fn join_room(&self, code: &str, user_id: UserId) -> Result<Room> {
        let now = self.now();
        self.store().write(|tx| {
            let mut room = find_room(tx, code)?;
            if room.status != RoomStatus::Waiting {
                return Err(LootoError::invalid_state("Room is not accepting players"));
            }
            if room.has_player(user_id) {
                return Err(LootoError::Conflict("User already joined this room".into()));
            }
            if room.players.len() >= usize::from(room.max_players) {
                return Err(LootoError::invalid_state("Room is full"));
            }
            let mut user = tx.require::<User>(user_id.0)?;
            ensure_active(&user)?;

            user.total_games = user.total_games.saturating_add(1);
            ledger::post(
                tx,
                &mut user,
                Entry::new(
                    TransactionType::GameEntry,
                    room.entry_fee,
                    format!("Entry fee - Room {}", room.code),
                )
                .in_room(room.id),
                now,
            )?;

            room.players.push(RoomPlayer {
                user_id,
                joined_at: now,
            });
            tx.put(&room)?;
            Ok(room)
        })
    }

    pub fn start_room(&self, code: &str) -> Result<Room> {
        let now = self.now();
        self.store().write(|tx| {
            let mut room = find_room(tx, code)?;
            if room.status != RoomStatus::Waiting {
                return Err(LootoError::invalid_state("Only waiting rooms can start"));
            }
            if room.players.len() < usize::from(MIN_PLAYERS) {
                return Err(LootoError::invalid_state("Room needs at least two players"));
            }
            room.status = RoomStatus::Playing;
            room.started_at = Some(now);
            tx.put(&room)?;
            Ok(room)
        })
    }

    /// File a self-reported winner for admin review.
    pub fn file_winner_request(
        &self,
        code: &str,
        declared_by: UserId,
        winner: UserId,
        fee_percent: u8,
        evidence: Option<Evidence>,
    ) -> Result<WinnerRequest> {
        let now = self.now();
        let request = self.store().write(|tx| {
            let room = find_room(tx, code)?;
            if room.status != RoomStatus::Playing {
                return Err(LootoError::invalid_state(
                    "Winner can only be declared for a room in play",
                ));
            }
            if !room.has_player(declared_by) || !room.has_player(winner) {
                return Err(LootoError::invalid_input(
                    "Declarer and winner must be players in the room",
                ));
            }
            let already_pending = tx
                .scan::<WinnerRequest>()?
                .iter()
                .any(|r| r.room_id == room.id && r.status == WinnerRequestStatus::Pending);
            if already_pending {
                return Err(LootoError::Conflict(
                    "Room already has a pending winner request".into(),
                ));
            }

            let prize = PrizeBreakdown::from_pool(room.prize_pool(), fee_percent)?;
            let request = WinnerRequest {
                id: WinnerRequestId(tx.next_id::<WinnerRequest>()?),
                room_id: room.id,
                room_code: room.code.clone(),
                declared_by,
                declared_winner: winner,
                status: WinnerRequestStatus::Pending,
                total_prize_pool: prize.total_prize_pool,
                platform_fee: prize.platform_fee,
                winner_amount: prize.winner_amount,
                evidence,
                admin_notes: None,
                processed_by: None,
                processed_at: None,
                created_at: now,
            };
            tx.put(&request)?;
            Ok(request)
        })?;
        tracing::info!(request_id = %request.id, room = %request.room_code, winner = %winner, "winner request filed");
        Ok(request)
    }

    /// Request a payout. The amount leaves the balance immediately.
    pub fn file_withdrawal(
        &self,
        user_id: UserId,
        amount: Amount,
        upi_id: &str,
    ) -> Result<WithdrawalRequest> {
        validate_amount(amount)?;
        let upi_id = upi_id.trim();
        match upi_id.split_once('@') {
            Some((handle, provider)) if !handle.is_empty() && !provider.is_empty() => {}
            _ => return Err(LootoError::invalid_input(format!("Invalid UPI id '{}'", upi_id))),
        }
        let now = self.now();

        let request = self.store().write(|tx| {
            let mut user = tx.require::<User>(user_id.0)?;
            ensure_active(&user)?;
            let transaction = ledger::post(
                tx,
                &mut user,
                Entry::new(
                    TransactionType::Withdrawal,
                    amount,
                    format!("Withdrawal to {}", upi_id),
                )
                .with_status(TransactionStatus::Pending),
                now,
            )?;
            let request = WithdrawalRequest {
                id: WithdrawalRequestId(tx.next_id::<WithdrawalRequest>()?),
                user_id,
                transaction_id: transaction.id,
                amount,
                upi_id: upi_id.to_string(),
                status: WithdrawalStatus::Pending,
                admin_notes: None,
                rejection_reason: None,
                payment_proof: None,
                processed_by: None,
                processed_at: None,
                requested_at: now,
            };
            tx.put(&request)?;
            Ok(request)
        })?;
        tracing::info!(request_id = %request.id, user_id = %user_id, amount, "withdrawal filed");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::fixtures::world;

    #[test]
    fn phone_is_unique() -> Result<()> {
        let w = world()?;
        w.office.register_user("Asha", "9000000001")?;
        assert!(matches!(
            w.office.register_user("Asha Two", "9000000001"),
            Err(LootoError::Conflict(_))
        ));
        assert!(w.office.register_user("Bad", "12ab").is_err());
        Ok(())
    }

    #[test]
    fn joining_charges_entry_and_counts_game() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let b = w.player("Bilal", "9000000002", 50_000)?;
        w.playing_room("LUDO1001", &[a, b])?;

        let asha = w.office.user(a)?;
        assert_eq!(asha.balance, 40_000);
        assert_eq!(asha.total_games, 1);
        Ok(())
    }

    #[test]
    fn join_rejects_broke_blocked_and_duplicate_players() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let broke = w.player("Chetan", "9000000003", 0)?;
        w.office.create_room("LUDO1002", "classic", 10_000, 2, a)?;
        w.office.join_room("LUDO1002", a)?;

        assert!(matches!(
            w.office.join_room("ludo1002", a),
            Err(LootoError::Conflict(_))
        ));
        assert!(matches!(
            w.office.join_room("LUDO1002", broke),
            Err(LootoError::InsufficientBalance { .. })
        ));
        assert!(w.office.start_room("LUDO1002").is_err());
        Ok(())
    }

    #[test]
    fn room_code_is_unique_and_normalized() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 0)?;
        let room = w.office.create_room("ludo7", "classic", 500, 4, a)?;
        assert_eq!(room.code, "LUDO7");
        assert!(matches!(
            w.office.create_room("LUDO7", "classic", 500, 4, a),
            Err(LootoError::Conflict(_))
        ));
        assert!(w.office.create_room("LUDO8", "classic", 500, 7, a).is_err());
        Ok(())
    }

    #[test]
    fn one_pending_winner_request_per_room() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let b = w.player("Bilal", "9000000002", 50_000)?;
        w.playing_room("LUDO1003", &[a, b])?;

        let request = w.office.file_winner_request("LUDO1003", a, a, 10, None)?;
        assert_eq!(request.total_prize_pool, 20_000);
        assert_eq!(request.platform_fee, 2_000);
        assert_eq!(request.winner_amount, 18_000);
        assert!(request.prize().is_balanced());

        assert!(matches!(
            w.office.file_winner_request("LUDO1003", b, b, 10, None),
            Err(LootoError::Conflict(_))
        ));
        Ok(())
    }

    #[test]
    fn withdrawal_debits_with_pending_transaction() -> Result<()> {
        let w = world()?;
        let a = w.player("Asha", "9000000001", 50_000)?;
        let request = w.office.file_withdrawal(a, 20_000, "asha@upi")?;
        assert_eq!(w.balance(a)?, 30_000);

        let transaction = w.office.transaction(request.transaction_id)?;
        assert_eq!(transaction.transaction.status, TransactionStatus::Pending);
        assert_eq!(transaction.transaction.kind, TransactionType::Withdrawal);

        assert!(w.office.file_withdrawal(a, 100_000, "asha@upi").is_err());
        assert!(w.office.file_withdrawal(a, 100, "not-a-upi").is_err());
        Ok(())
    }
}
