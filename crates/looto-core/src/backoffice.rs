//! # Backoffice
//!
//! The facade every admin operation hangs off. The operations themselves are
//! spread over the topic modules (`users`, `rooms`, `disputes`, ...) as
//! `impl Backoffice` blocks.

use crate::clock::{Clock, SystemClock};
use crate::error::{LootoError, Result};
use crate::storage::Store;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Default lifetime of an admin session.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

pub struct Backoffice {
    store: Store,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    password_params: argon2::Params,
    started: Instant,
}

impl std::fmt::Debug for Backoffice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoffice")
            .field("store", &self.store)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl Backoffice {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            password_params: argon2::Params::default(),
            started: Instant::now(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Store::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Store::in_memory()?))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Argon2 cost for newly hashed passwords. Existing hashes keep the
    /// parameters they were created with.
    pub fn with_password_cost(mut self, memory_kib: u32, iterations: u32) -> Result<Self> {
        self.password_params = argon2::Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| LootoError::invalid_input(format!("Invalid password cost: {e}")))?;
        Ok(self)
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Time since this handle was created.
    #[must_use]
    pub fn uptime(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    pub(crate) fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub(crate) fn password_params(&self) -> &argon2::Params {
        &self.password_params
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared setup for the operation tests.

    use super::*;
    use crate::auth::Role;
    use crate::clock::FixedClock;
    use crate::records::Evidence;
    use crate::{AdminId, RoomId, UserId, WinnerRequestId};
    use chrono::TimeZone;

    pub struct World {
        pub office: Backoffice,
        pub clock: Arc<FixedClock>,
        pub admin: AdminId,
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn world() -> Result<World> {
        let clock = Arc::new(FixedClock::new(start()));
        let office = Backoffice::in_memory()?
            .with_clock(clock.clone())
            .with_password_cost(64, 1)?;
        let admin = office
            .create_admin("root", "correct horse battery", Role::SuperAdmin)?
            .id;
        Ok(World {
            office,
            clock,
            admin,
        })
    }

    impl World {
        /// A funded user.
        pub fn player(&self, name: &str, phone: &str, deposit: i64) -> Result<UserId> {
            let user = self.office.register_user(name, phone)?;
            if deposit > 0 {
                self.office.deposit(user.id, deposit)?;
            }
            Ok(user.id)
        }

        /// A playing room with the given players, entry fee 100 rupees.
        pub fn playing_room(&self, code: &str, players: &[UserId]) -> Result<RoomId> {
            let creator = players
                .first()
                .copied()
                .ok_or_else(|| crate::LootoError::invalid_input("need players"))?;
            let room = self.office.create_room(code, "classic", 10_000, 4, creator)?;
            for player in players {
                self.office.join_room(code, *player)?;
            }
            self.office.start_room(code)?;
            Ok(room.id)
        }

        /// A pending winner request with a 10% platform fee.
        pub fn claim(&self, code: &str, winner: UserId) -> Result<WinnerRequestId> {
            let request = self.office.file_winner_request(
                code,
                winner,
                winner,
                10,
                Some(Evidence {
                    description: "final board".into(),
                    screenshots: vec!["https://cdn.example/shot.png".into()],
                }),
            )?;
            Ok(request.id)
        }

        pub fn balance(&self, user: UserId) -> Result<i64> {
            Ok(self.office.user(user)?.balance)
        }
    }
}
