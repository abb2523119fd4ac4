//! `DuckDB` connection pool management.
//!
//! Every pooled connection is cloned from one root connection, so all of
//! them share a single database instance and see each other's commits.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::Connection;

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Snapshot reads.
    ReadOnly,
    /// Snapshot uploads and migrations.
    ReadWrite,
}

#[derive(Default)]
struct IdleConnections {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl IdleConnections {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    root: Mutex<Option<Connection>>,
    idle: Mutex<IdleConnections>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Create a pool for the database at `path`.
    ///
    /// Nothing is opened until the first [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                root: Mutex::new(None),
                idle: Mutex::new(IdleConnections::default()),
            }),
        }
    }

    /// Take an idle connection for `mode`, or open a new one.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = lock(&self.inner.idle).slot(mode).pop();
        let connection = match reused {
            Some(connection) => connection,
            None => self.open_connection()?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    fn open_connection(&self) -> Result<Connection, ::duckdb::Error> {
        let mut root = lock(&self.inner.root);
        if root.is_none() {
            let connection = Connection::open(self.inner.db_path.as_path())?;
            connection.execute_batch("PRAGMA disable_progress_bar;")?;
            *root = Some(connection);
        }

        match root.as_ref() {
            Some(connection) => connection.try_clone(),
            None => Connection::open(self.inner.db_path.as_path()),
        }
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = lock(&self.pool.idle);
        let slot = idle.slot(self.mode);
        if slot.len() < self.pool.max_idle {
            slot.push(connection);
        }
    }
}
