//! # Auth Module
//!
//! Back-office operators, their permissions and their sessions.
//!
//! - Passwords are stored as argon2 PHC strings.
//! - Five consecutive failed logins lock the account for two hours.
//! - A session token is `"{session_id}.{secret}"`. Only the sha256 digest of
//!   the secret is stored, and it is compared in constant time.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::storage::{DocumentRead, Index, WriteTx};
use crate::{AdminId, SessionId};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Version};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Failed attempts before the account locks.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// How long a locked account stays locked.
pub const LOCK_DURATION_HOURS: i64 = 2;

pub const MIN_PASSWORD_LEN: usize = 8;

const SECRET_LEN: usize = 32;

// =============================================================================
// ROLES & PERMISSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Moderator,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LootoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(LootoError::invalid_input(format!("Unknown role '{}'", other))),
        }
    }
}

/// A single capability checked by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    UsersView,
    UsersEdit,
    UsersBlock,
    RoomsView,
    RoomsDeclareWinner,
    RoomsCancel,
    TransactionsView,
    TransactionsRefund,
    WithdrawalsView,
    WithdrawalsApprove,
    DashboardView,
    DashboardAnalytics,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UsersView => "users.view",
            Self::UsersEdit => "users.edit",
            Self::UsersBlock => "users.block",
            Self::RoomsView => "rooms.view",
            Self::RoomsDeclareWinner => "rooms.declare_winner",
            Self::RoomsCancel => "rooms.cancel",
            Self::TransactionsView => "transactions.view",
            Self::TransactionsRefund => "transactions.refund",
            Self::WithdrawalsView => "withdrawals.view",
            Self::WithdrawalsApprove => "withdrawals.approve",
            Self::DashboardView => "dashboard.view",
            Self::DashboardAnalytics => "dashboard.analytics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissions {
    pub view: bool,
    pub edit: bool,
    pub block: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPermissions {
    pub view: bool,
    pub edit: bool,
    pub declare_winner: bool,
    pub cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPermissions {
    pub view: bool,
    pub edit: bool,
    pub refund: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPermissions {
    pub view: bool,
    pub approve: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPermissions {
    pub view: bool,
    pub analytics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub users: UserPermissions,
    pub rooms: RoomPermissions,
    pub transactions: TransactionPermissions,
    pub withdrawals: WithdrawalPermissions,
    pub dashboard: DashboardPermissions,
}

impl Permissions {
    /// The default grant for a role.
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        let full = !matches!(role, Role::Moderator);
        Self {
            users: UserPermissions {
                view: true,
                edit: full,
                block: full,
                delete: matches!(role, Role::SuperAdmin),
            },
            rooms: RoomPermissions {
                view: true,
                edit: full,
                declare_winner: full,
                cancel: full,
            },
            transactions: TransactionPermissions {
                view: true,
                edit: full,
                refund: full,
            },
            withdrawals: WithdrawalPermissions {
                view: true,
                approve: full,
            },
            dashboard: DashboardPermissions {
                view: true,
                analytics: full,
            },
        }
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::UsersView => self.users.view,
            Permission::UsersEdit => self.users.edit,
            Permission::UsersBlock => self.users.block,
            Permission::RoomsView => self.rooms.view,
            Permission::RoomsDeclareWinner => self.rooms.declare_winner,
            Permission::RoomsCancel => self.rooms.cancel,
            Permission::TransactionsView => self.transactions.view,
            Permission::TransactionsRefund => self.transactions.refund,
            Permission::WithdrawalsView => self.withdrawals.view,
            Permission::WithdrawalsApprove => self.withdrawals.approve,
            Permission::DashboardView => self.dashboard.view,
            Permission::DashboardAnalytics => self.dashboard.analytics,
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A back-office operator. Never serialized to clients; see [`AdminProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Permissions,
    pub is_active: bool,
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    #[must_use]
    pub fn profile(&self) -> AdminProfile {
        AdminProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            permissions: self.permissions,
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// What clients see of an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: AdminId,
    pub username: String,
    pub role: Role,
    pub permissions: Permissions,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub admin_id: AdminId,
    pub secret_digest: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub admin: AdminProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The admin behind a validated session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub admin_id: AdminId,
    pub username: String,
    pub role: Role,
    pub permissions: Permissions,
    pub session_id: SessionId,
}

impl Actor {
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.role == Role::SuperAdmin || self.permissions.allows(permission) {
            Ok(())
        } else {
            Err(LootoError::Forbidden(permission.as_str()))
        }
    }
}

// =============================================================================
// PASSWORDS & TOKENS
// =============================================================================

fn hash_password(password: &str, params: &argon2::Params) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| LootoError::PasswordHash(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LootoError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| LootoError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LootoError::invalid_input(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<()> {
    let valid_len = (3..=32).contains(&username.len());
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid_len || !valid_chars {
        return Err(LootoError::invalid_input(
            "Username must be 3-32 characters of letters, digits, '_' or '.'",
        ));
    }
    Ok(())
}

fn digest(secret: &[u8]) -> Vec<u8> {
    Sha256::digest(secret).to_vec()
}

/// Split a token into its session id and secret bytes.
fn parse_token(token: &str) -> Option<(SessionId, Vec<u8>)> {
    let (id, secret) = token.split_once('.')?;
    let id = id.parse::<u64>().ok()?;
    let secret = URL_SAFE_NO_PAD.decode(secret).ok()?;
    (secret.len() == SECRET_LEN).then_some((SessionId(id), secret))
}

fn issue_session(
    tx: &WriteTx,
    admin_id: AdminId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(Session, String)> {
    let mut secret = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    let session = Session {
        id: SessionId(tx.next_id::<Session>()?),
        admin_id,
        secret_digest: digest(&secret),
        created_at: now,
        expires_at: now + ttl,
    };
    tx.put(&session)?;
    let token = format!("{}.{}", session.id, URL_SAFE_NO_PAD.encode(secret));
    Ok((session, token))
}

fn purge_expired_sessions(tx: &WriteTx, now: DateTime<Utc>) -> Result<usize> {
    let expired: Vec<Session> = tx
        .scan::<Session>()?
        .into_iter()
        .filter(|s| s.expires_at <= now)
        .collect();
    for session in &expired {
        tx.remove::<Session>(session.id.0)?;
    }
    Ok(expired.len())
}

// =============================================================================
// OPERATIONS
// =============================================================================

enum LoginOutcome {
    Granted(SessionGrant),
    Denied(LootoError),
}

impl Backoffice {
    /// Create an operator account with the role's default permissions.
    pub fn create_admin(&self, username: &str, password: &str, role: Role) -> Result<AdminProfile> {
        let username = username.trim();
        validate_username(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password, self.password_params())?;
        let now = self.now();

        let admin = self.store().write(|tx| {
            let id = AdminId(tx.next_id::<Admin>()?);
            tx.claim(Index::AdminUsername, username, id.0)?;
            let admin = Admin {
                id,
                username: username.to_string(),
                password_hash,
                role,
                permissions: Permissions::for_role(role),
                is_active: true,
                login_attempts: 0,
                lock_until: None,
                last_login: None,
                created_at: now,
            };
            tx.put(&admin)?;
            Ok(admin)
        })?;

        tracing::info!(admin_id = %admin.id, username = %admin.username, role = %role, "admin created");
        Ok(admin.profile())
    }

    /// Verify credentials and open a session.
    pub fn login(&self, credentials: &Credentials) -> Result<SessionGrant> {
        let now = self.now();
        let ttl = self.session_ttl();

        let outcome = self.store().write(|tx| {
            purge_expired_sessions(tx, now)?;

            let Some(id) = tx.lookup(Index::AdminUsername, credentials.username.trim())? else {
                return Ok(LoginOutcome::Denied(LootoError::InvalidCredentials));
            };
            let mut admin = tx.require::<Admin>(id)?;
            if !admin.is_active {
                return Ok(LoginOutcome::Denied(LootoError::InvalidCredentials));
            }
            if admin.is_locked(now) {
                return Ok(LoginOutcome::Denied(LootoError::AccountLocked));
            }
            if admin.lock_until.is_some() {
                // Lock has expired; start counting afresh.
                admin.lock_until = None;
                admin.login_attempts = 0;
            }

            if !verify_password(&credentials.password, &admin.password_hash)? {
                admin.login_attempts = admin.login_attempts.saturating_add(1);
                if admin.login_attempts >= MAX_LOGIN_ATTEMPTS {
                    admin.lock_until = Some(now + Duration::hours(LOCK_DURATION_HOURS));
                    tracing::warn!(admin_id = %admin.id, "admin account locked");
                }
                tx.put(&admin)?;
                return Ok(LoginOutcome::Denied(LootoError::InvalidCredentials));
            }

            admin.login_attempts = 0;
            admin.last_login = Some(now);
            tx.put(&admin)?;

            let (session, token) = issue_session(tx, admin.id, now, ttl)?;
            Ok(LoginOutcome::Granted(SessionGrant {
                admin: admin.profile(),
                token,
                expires_at: session.expires_at,
            }))
        })?;

        match outcome {
            LoginOutcome::Granted(grant) => {
                tracing::info!(admin_id = %grant.admin.id, "admin logged in");
                Ok(grant)
            }
            LoginOutcome::Denied(err) => {
                tracing::warn!(username = %credentials.username, error = %err, "admin login rejected");
                Err(err)
            }
        }
    }

    /// Resolve a bearer token to the acting admin.
    pub fn authenticate(&self, token: &str) -> Result<Actor> {
        let (session_id, secret) = parse_token(token).ok_or(LootoError::Unauthorized)?;
        let now = self.now();

        self.store().read(|tx| {
            let session = tx
                .get::<Session>(session_id.0)?
                .ok_or(LootoError::Unauthorized)?;
            let matches: bool = digest(&secret)
                .as_slice()
                .ct_eq(session.secret_digest.as_slice())
                .into();
            if !matches || session.expires_at <= now {
                return Err(LootoError::Unauthorized);
            }
            let admin = tx
                .get::<Admin>(session.admin_id.0)?
                .ok_or(LootoError::Unauthorized)?;
            if !admin.is_active {
                return Err(LootoError::Unauthorized);
            }
            Ok(Actor {
                admin_id: admin.id,
                username: admin.username,
                role: admin.role,
                permissions: admin.permissions,
                session_id: session.id,
            })
        })
    }

    /// Revoke the actor's current session.
    pub fn logout(&self, actor: &Actor) -> Result<()> {
        self.store()
            .write(|tx| tx.remove::<Session>(actor.session_id.0))?;
        tracing::info!(admin_id = %actor.admin_id, "admin logged out");
        Ok(())
    }

    /// Change the actor's password and revoke their other sessions.
    pub fn change_password(&self, actor: &Actor, current: &str, new: &str) -> Result<()> {
        validate_password(new)?;
        let stored = self
            .store()
            .read(|tx| tx.require::<Admin>(actor.admin_id.0))?;
        if !verify_password(current, &stored.password_hash)? {
            return Err(LootoError::invalid_input("Current password is incorrect"));
        }
        let password_hash = hash_password(new, self.password_params())?;

        let revoked = self.store().write(|tx| {
            let mut admin = tx.require::<Admin>(actor.admin_id.0)?;
            admin.password_hash = password_hash;
            tx.put(&admin)?;

            let others: Vec<SessionId> = tx
                .scan::<Session>()?
                .into_iter()
                .filter(|s| s.admin_id == actor.admin_id && s.id != actor.session_id)
                .map(|s| s.id)
                .collect();
            for id in &others {
                tx.remove::<Session>(id.0)?;
            }
            Ok(others.len())
        })?;

        tracing::info!(admin_id = %actor.admin_id, revoked_sessions = revoked, "admin password changed");
        Ok(())
    }

    pub fn admin_profile(&self, id: AdminId) -> Result<AdminProfile> {
        let admin = self.store().read(|tx| tx.require::<Admin>(id.0))?;
        Ok(admin.profile())
    }
}

// =============================================================================
// TESTS
// =============================================================================
