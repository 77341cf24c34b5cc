//! redb-backed document store.
//!
//! Operations never touch tables directly; they receive a [`ReadTx`] or a
//! [`WriteTx`] from [`Store::read`] / [`Store::write`]. A write closure that
//! returns `Err` aborts the whole transaction, so multi-record mutations are
//! all-or-nothing.

use super::{
    ADMINS, CollectionCounts, Document, Index, ROOMS, SESSIONS, SEQUENCES, TRANSACTIONS, USERS,
    WINNER_REQUESTS, WITHDRAWAL_REQUESTS,
};
use crate::auth::Admin;
use crate::error::{LootoError, Result};
use crate::records::{Room, Transaction, User, WinnerRequest, WithdrawalRequest};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, TableHandle, WriteTransaction,
};
use std::path::{Path, PathBuf};

// =============================================================================
// STORE
// =============================================================================

/// Handle to the back-office database.
pub struct Store {
    db: Database,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Open the database at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        let store = Self {
            db,
            path: Some(path.to_path_buf()),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self { db, path: None };
        store.ensure_tables()?;
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create every table so read transactions never see a missing one.
    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        for def in [
            USERS,
            ROOMS,
            TRANSACTIONS,
            WINNER_REQUESTS,
            WITHDRAWAL_REQUESTS,
            ADMINS,
            SESSIONS,
        ] {
            txn.open_table(def)?;
        }
        txn.open_table(SEQUENCES)?;
        for index in Index::ALL {
            txn.open_table(index.definition())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Run `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&ReadTx) -> Result<R>) -> Result<R> {
        let tx = ReadTx {
            txn: self.db.begin_read()?,
        };
        f(&tx)
    }

    /// Run `f` in a write transaction. Commits on `Ok`, aborts on `Err`.
    pub fn write<R>(&self, f: impl FnOnce(&WriteTx) -> Result<R>) -> Result<R> {
        let tx = WriteTx {
            txn: self.db.begin_write()?,
        };
        match f(&tx) {
            Ok(value) => {
                tx.txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = tx.txn.abort() {
                    tracing::warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(err)
            }
        }
    }

    pub fn counts(&self) -> Result<CollectionCounts> {
        self.read(|tx| {
            Ok(CollectionCounts {
                users: tx.count::<User>()?,
                rooms: tx.count::<Room>()?,
                transactions: tx.count::<Transaction>()?,
                winner_requests: tx.count::<WinnerRequest>()?,
                withdrawal_requests: tx.count::<WithdrawalRequest>()?,
                admins: tx.count::<Admin>()?,
            })
        })
    }
}

// =============================================================================
// READ ACCESS
// =============================================================================

/// Read operations shared by read and write transactions.
pub trait DocumentRead {
    fn get<T: Document>(&self, id: u64) -> Result<Option<T>>;

    /// Every document of the collection, in id order.
    fn scan<T: Document>(&self) -> Result<Vec<T>>;

    fn count<T: Document>(&self) -> Result<usize>;

    fn lookup(&self, index: Index, key: &str) -> Result<Option<u64>>;

    fn require<T: Document>(&self, id: u64) -> Result<T> {
        self.get(id)?.ok_or(LootoError::NotFound(T::KIND))
    }
}

fn decode_one<T: Document>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<T>> {
    match table.get(id)? {
        Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
        None => Ok(None),
    }
}

fn decode_all<T: Document>(table: &impl ReadableTable<u64, &'static [u8]>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(postcard::from_bytes(value.value())?);
    }
    Ok(out)
}

fn index_get(table: &impl ReadableTable<&'static str, u64>, key: &str) -> Result<Option<u64>> {
    Ok(table.get(key)?.map(|guard| guard.value()))
}

pub struct ReadTx {
    txn: ReadTransaction,
}

impl DocumentRead for ReadTx {
    fn get<T: Document>(&self, id: u64) -> Result<Option<T>> {
        let table = self.txn.open_table(T::TABLE)?;
        decode_one(&table, id)
    }

    fn scan<T: Document>(&self) -> Result<Vec<T>> {
        let table = self.txn.open_table(T::TABLE)?;
        decode_all(&table)
    }

    fn count<T: Document>(&self) -> Result<usize> {
        let table = self.txn.open_table(T::TABLE)?;
        Ok(table.len()? as usize)
    }

    fn lookup(&self, index: Index, key: &str) -> Result<Option<u64>> {
        let table = self.txn.open_table(index.definition())?;
        index_get(&table, key)
    }
}

// =============================================================================
// WRITE ACCESS
// =============================================================================

pub struct WriteTx {
    txn: WriteTransaction,
}

impl DocumentRead for WriteTx {
    fn get<T: Document>(&self, id: u64) -> Result<Option<T>> {
        let table = self.txn.open_table(T::TABLE)?;
        decode_one(&table, id)
    }

    fn scan<T: Document>(&self) -> Result<Vec<T>> {
        let table = self.txn.open_table(T::TABLE)?;
        decode_all(&table)
    }

    fn count<T: Document>(&self) -> Result<usize> {
        let table = self.txn.open_table(T::TABLE)?;
        Ok(table.len()? as usize)
    }

    fn lookup(&self, index: Index, key: &str) -> Result<Option<u64>> {
        let table = self.txn.open_table(index.definition())?;
        index_get(&table, key)
    }
}

impl WriteTx {
    /// Insert or replace a document.
    pub fn put<T: Document>(&self, doc: &T) -> Result<()> {
        let bytes = postcard::to_allocvec(doc)?;
        let mut table = self.txn.open_table(T::TABLE)?;
        table.insert(doc.key(), bytes.as_slice())?;
        Ok(())
    }

    pub fn remove<T: Document>(&self, id: u64) -> Result<bool> {
        let mut table = self.txn.open_table(T::TABLE)?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }

    /// Allocate the next id of a collection. Ids start at 1 and are never reused.
    pub fn next_id<T: Document>(&self) -> Result<u64> {
        next_in_sequence(&self.txn, T::TABLE)
    }

    /// Claim a unique key. Fails with `Conflict` if it is taken.
    pub fn claim(&self, index: Index, key: &str, id: u64) -> Result<()> {
        let mut table = self.txn.open_table(index.definition())?;
        if table.get(key)?.is_some() {
            return Err(LootoError::Conflict(format!("'{}' is already in use", key)));
        }
        table.insert(key, id)?;
        Ok(())
    }
}

fn next_in_sequence(
    txn: &WriteTransaction,
    table: TableDefinition<'static, u64, &'static [u8]>,
) -> Result<u64> {
    let mut seq = txn.open_table(SEQUENCES)?;
    let current = seq.get(table.name())?.map(|guard| guard.value()).unwrap_or(0);
    let next = current.saturating_add(1);
    seq.insert(table.name(), next)?;
    Ok(next)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;
    use chrono::{DateTime, Utc};

    fn user(id: u64, phone: &str) -> User {
        User::new(
            UserId(id),
            format!("user{id}"),
            phone.to_string(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    #[test]
    fn put_get_scan() -> Result<()> {
        let store = Store::in_memory()?;
        store.write(|tx| {
            tx.put(&user(2, "2"))?;
            tx.put(&user(1, "1"))?;
            Ok(())
        })?;

        let fetched: Option<User> = store.read(|tx| tx.get(1))?;
        assert_eq!(fetched.map(|u| u.phone), Some("1".to_string()));

        let all: Vec<User> = store.read(|tx| tx.scan())?;
        assert_eq!(all.iter().map(|u| u.id.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.counts()?.users, 2);
        Ok(())
    }

    #[test]
    fn failed_write_is_rolled_back() -> Result<()> {
        let store = Store::in_memory()?;
        let result: Result<()> = store.write(|tx| {
            tx.put(&user(1, "1"))?;
            Err(LootoError::invalid_input("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.counts()?.users, 0);
        Ok(())
    }

    #[test]
    fn sequences_are_per_collection() -> Result<()> {
        let store = Store::in_memory()?;
        let ids = store.write(|tx| {
            Ok((
                tx.next_id::<User>()?,
                tx.next_id::<User>()?,
                tx.next_id::<Room>()?,
            ))
        })?;
        assert_eq!(ids, (1, 2, 1));
        Ok(())
    }

    #[test]
    fn claim_rejects_duplicates() -> Result<()> {
        let store = Store::in_memory()?;
        store.write(|tx| tx.claim(Index::UserPhone, "9000000001", 1))?;
        let second = store.write(|tx| tx.claim(Index::UserPhone, "9000000001", 2));
        assert!(matches!(second, Err(LootoError::Conflict(_))));
        let found = store.read(|tx| tx.lookup(Index::UserPhone, "9000000001"))?;
        assert_eq!(found, Some(1));
        Ok(())
    }

    #[test]
    fn require_reports_kind() -> Result<()> {
        let store = Store::in_memory()?;
        let missing = store.read(|tx| tx.require::<Room>(42));
        assert!(matches!(missing, Err(LootoError::NotFound("Room"))));
        Ok(())
    }

    #[test]
    fn reopen_from_disk_keeps_documents() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| LootoError::invalid_input(e.to_string()))?;
        let path = dir.path().join("looto.redb");
        {
            let store = Store::open(&path)?;
            store.write(|tx| tx.put(&user(1, "1")))?;
        }
        let store = Store::open(&path)?;
        assert_eq!(store.counts()?.users, 1);
        Ok(())
    }
}
