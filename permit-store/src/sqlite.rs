// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for permit workflow records.
//!
//! Records are stored as CBOR blobs next to the columns needed for lookups and filters (stage,
//! status, owner and links between records).
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, migrate};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Default size of the connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Run all pending migrations of the permit tables on the given pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), SqliteError> {
    let migrator: Migrator = migrate!();
    migrator.run(pool).await?;
    Ok(())
}

/// Open the permit database file, creating it if it doesn't exist yet.
///
/// The database runs in WAL mode so readers can see committed records while a transaction writes.
pub struct SqliteStoreBuilder {
    options: SqliteConnectOptions,
    max_connections: u32,
}

impl SqliteStoreBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            options: SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Size of the connection pool. One connection serves the open transaction, so at least two
    /// are used.
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(2);
        self
    }

    /// Connect and bring the permit tables up to date.
    pub async fn build<'a>(self) -> Result<SqliteStore<'a>, SqliteError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(self.options)
            .await?;

        run_migrations(&pool).await?;
        debug!(max_connections = self.max_connections, "opened permit database");

        Ok(SqliteStore::new(pool))
    }
}

pub type Transaction<'a> = sqlx::Transaction<'a, Sqlite>;

/// Permit records in an SQLite database.
///
/// Clones share the connection pool and the open transaction. Only one transaction writes at a
/// time, beginning one hands out a `TransactionPermit` which is given back on commit or
/// rollback. The handle returned by `within` runs its queries inside the open transaction. Other
/// handles read committed records from pooled connections, each of their writes waits for the
/// permit and runs in a transaction of its own.
#[derive(Clone, Debug)]
pub struct SqliteStore<'a> {
    tx: Arc<Mutex<Option<Transaction<'a>>>>,
    pool: sqlx::SqlitePool,
    semaphore: Arc<Semaphore>,
    in_transaction: bool,
    #[cfg(any(test, feature = "test_utils"))]
    _temp_dir: Option<Arc<tempfile::TempDir>>,
}

impl<'a> SqliteStore<'a> {
    pub(crate) fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            tx: Arc::default(),
            pool,
            semaphore: Arc::new(Semaphore::new(1)),
            in_transaction: false,
            #[cfg(any(test, feature = "test_utils"))]
            _temp_dir: None,
        }
    }

    /// Store on a fresh database in a temporary directory, removed when the last clone is
    /// dropped.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temporary directory");
        let mut store = SqliteStoreBuilder::new(temp_dir.path().join("permits.sqlite"))
            .build()
            .await
            .expect("open temporary database");
        store._temp_dir = Some(Arc::new(temp_dir));
        store
    }

    /// Execute writes.
    pub async fn tx<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&mut Transaction) -> Result<R, SqliteError>,
    {
        if self.in_transaction {
            let mut tx_ref = self.tx.lock().await;
            if let Some(tx) = tx_ref.as_mut() {
                return f(tx).await;
            }
        }

        let _permit = self.acquire_permit().await;
        let mut tx = self.pool.begin().await?;
        let result = f(&mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Execute reads.
    pub async fn read<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&mut SqliteConnection) -> Result<R, SqliteError>,
    {
        if self.in_transaction {
            let mut tx_ref = self.tx.lock().await;
            if let Some(tx) = tx_ref.as_mut() {
                return f(&mut **tx).await;
            }
        }

        let mut connection = self.pool.acquire().await?;
        f(&mut *connection).await
    }

    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well")
    }
}

impl<'a> crate::traits::Transaction for SqliteStore<'a> {
    type Error = SqliteError;

    type Permit = TransactionPermit;

    /// Begins a transaction, waits as long as another process holds a permit.
    async fn begin(&self) -> Result<TransactionPermit, SqliteError> {
        let permit = self.acquire_permit().await;

        let mut tx_ref = self.tx.lock().await;
        assert!(
            tx_ref.is_none(),
            "can't have an already open transaction after a just-acquired permit"
        );
        tx_ref.replace(self.pool.begin().await?);

        Ok(TransactionPermit(permit))
    }

    fn within(&self, _permit: &TransactionPermit) -> Self {
        Self {
            in_transaction: true,
            ..self.clone()
        }
    }

    async fn rollback(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        self.finish(permit, false).await
    }

    async fn commit(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        self.finish(permit, true).await
    }
}

impl SqliteStore<'_> {
    async fn finish(&self, permit: TransactionPermit, commit: bool) -> Result<(), SqliteError> {
        let Some(tx) = self.tx.lock().await.take() else {
            panic!("can't have no transaction without dropping permit first")
        };

        let result = if commit {
            tx.commit().await
        } else {
            tx.rollback().await
        };

        // The permit is freed on success and on error.
        drop(permit);
        result.map_err(SqliteError::Sqlite)
    }
}

#[allow(unused)]
pub struct TransactionPermit(OwnedSemaphorePermit);

/// Encode a record before storing it.
pub(crate) fn encode<T: Serialize>(name: &str, value: &T) -> Result<Vec<u8>, SqliteError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|err| SqliteError::Encode(name.to_string(), err.to_string()))?;
    Ok(bytes)
}

/// Decode a record read from the database.
pub(crate) fn decode<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T, SqliteError> {
    ciborium::de::from_reader(bytes)
        .map_err(|err| SqliteError::Decode(name.to_string(), err.to_string()))
}

#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database and connection error.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),

    /// SQL table schema migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record could not be encoded before storing it. This is a critical error.
    #[error("failed encoding '{0}' value before storing to database: {1}")]
    Encode(String, String),

    /// Invalid, corrupted data was found in the database. This is a critical error.
    #[error("could not decode corrupted '{0}' value from database: {1}")]
    Decode(String, String),
}

#[cfg(test)]
mod tests {
    use std::task::Poll;

    use futures_test::task::noop_context;
    use sqlx::{query, query_as};
    use tokio::pin;

    use crate::sqlite::{SqliteError, SqliteStore};
    use crate::traits::Transaction;

    async fn insert_row(store: &SqliteStore<'_>, scope: &str) -> Result<(), SqliteError> {
        store
            .tx(async |tx| {
                query("INSERT INTO sequences_v1 (scope, value) VALUES (?, 7)")
                    .bind(scope)
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            })
            .await
    }

    async fn count_rows(store: &SqliteStore<'_>) -> i64 {
        let count: (i64,) = store
            .read(async |connection| {
                Ok(query_as("SELECT COUNT(*) FROM sequences_v1")
                    .fetch_one(&mut *connection)
                    .await?)
            })
            .await
            .unwrap();
        count.0
    }

    #[tokio::test]
    async fn transaction_provider() {
        let store = SqliteStore::temporary().await;

        // Writes without a transaction commit on their own.
        insert_row(&store, "standalone").await.unwrap();
        assert_eq!(count_rows(&store).await, 1);

        let permit = store.begin().await.expect("no error");

        assert!(matches!(
            {
                let fut = store.begin();
                let mut cx = noop_context();
                pin!(fut);
                fut.poll(&mut cx)
            },
            Poll::Pending
        ));

        // Writes of other handles wait for the transaction.
        assert!(matches!(
            {
                let fut = insert_row(&store, "waiting");
                let mut cx = noop_context();
                pin!(fut);
                fut.poll(&mut cx)
            },
            Poll::Pending
        ));

        let tx = store.within(&permit);
        insert_row(&tx, "joined").await.unwrap();
        assert_eq!(count_rows(&tx).await, 2);
        assert_eq!(count_rows(&store).await, 1);

        assert!(store.commit(permit).await.is_ok());
        assert_eq!(count_rows(&store).await, 2);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = SqliteStore::temporary().await;

        let permit = store.begin().await.unwrap();
        insert_row(&store.within(&permit), "discarded").await.unwrap();
        store.rollback(permit).await.unwrap();
        assert_eq!(count_rows(&store).await, 0);

        let permit = store.begin().await.unwrap();
        insert_row(&store.within(&permit), "kept").await.unwrap();
        store.commit(permit).await.unwrap();
        assert_eq!(count_rows(&store).await, 1);
    }
}
