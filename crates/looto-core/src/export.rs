//! # Export
//!
//! Full dumps of one collection, optionally restricted to records created in
//! a date window. Rows carry the same resolved summaries as the list views.

use crate::backoffice::Backoffice;
use crate::error::{LootoError, Result};
use crate::query::DateWindow;
use crate::records::{Room, Transaction, User};
use crate::storage::DocumentRead;
use crate::views::{Directory, RoomView, TransactionView, UserRow};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Users,
    Transactions,
    Rooms,
}

impl ExportKind {
    pub const ALL: [Self; 3] = [Self::Users, Self::Transactions, Self::Rooms];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Transactions => "transactions",
            Self::Rooms => "rooms",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = LootoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| LootoError::invalid_input("Invalid export type"))
    }
}

/// Exported rows, serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExportData {
    Users(Vec<UserRow>),
    Transactions(Vec<TransactionView>),
    Rooms(Vec<RoomView>),
}

impl ExportData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Users(rows) => rows.len(),
            Self::Transactions(rows) => rows.len(),
            Self::Rooms(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Backoffice {
    pub fn export(&self, kind: ExportKind, window: DateWindow) -> Result<ExportData> {
        let data = self.store().read(|tx| {
            Ok(match kind {
                ExportKind::Users => ExportData::Users(
                    tx.scan::<User>()?
                        .into_iter()
                        .filter(|u| window.contains(u.created_at))
                        .map(UserRow::from)
                        .collect(),
                ),
                ExportKind::Transactions => {
                    let directory = Directory::load(tx)?;
                    ExportData::Transactions(
                        tx.scan::<Transaction>()?
                            .into_iter()
                            .filter(|t| window.contains(t.created_at))
                            .map(|t| directory.transaction_view(t))
                            .collect(),
                    )
                }
                ExportKind::Rooms => {
                    let directory = Directory::load(tx)?;
                    ExportData::Rooms(
                        tx.scan::<Room>()?
                            .into_iter()
                            .filter(|r| window.contains(r.created_at))
                            .map(|r| directory.room_view(r))
                            .collect(),
                    )
                }
            })
        })?;
        tracing::info!(kind = %kind, rows = data.len(), "export prepared");
        Ok(data)
    }
}
