//! SQLite driver over [`rusqlite`].
//!
//! rusqlite is synchronous and its rows borrow the prepared statement, so
//! [`SqliteConnection::open`] steps the statement to completion on tokio's
//! blocking pool and hands back a [`BufferedCursor`]. Dropping the `open`
//! future (which is what cancellation does) interrupts the running
//! statement through the connection's [`InterruptHandle`].
//!
//! ```
//! use tessera::sqlite::SqliteConnection;
//! use tessera::{CancellationToken, Db, Dialect};
//!
//! tessera::entity! {
//!     #[derive(Debug)]
//!     pub struct User in "users" {
//!         pub id: i64,
//!         pub name: String,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tessera::Result<()> {
//! let conn = SqliteConnection::open_in_memory()?;
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//!      INSERT INTO users (name) VALUES ('ann'), ('bob');",
//! )?;
//!
//! let db = Db::new(conn, Dialect::SQLite);
//! let cx = CancellationToken::new();
//! let users: Vec<User> = db.select(&db.from::<User>(), &cx).await?;
//! assert_eq!(users.len(), 2);
//! # Ok(())
//! # }
//! ```

use core::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{InterruptHandle, params_from_iter};
use tessera_core::row::column_names;
use tessera_core::{BufferedCursor, Connection, Result, Row, Statement, TesseraError, Value};

/// A rusqlite connection usable as a [`Connection`].
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(rusqlite::Connection::open_in_memory()?))
    }

    /// Runs one or more statements that return no rows (DDL, seed data).
    ///
    /// Blocks the calling thread.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        lock(&self.conn)?.execute_batch(sql)?;
        Ok(())
    }

    /// Runs a single data-modifying statement and returns the changed row count.
    ///
    /// Blocks the calling thread.
    pub fn execute(&self, stmt: &Statement) -> Result<usize> {
        let conn = lock(&self.conn)?;
        Ok(conn.execute(stmt.sql(), params_from_iter(stmt.params()))?)
    }

    /// Fails while an interrupted query is still unwinding on the blocking pool.
    pub fn into_inner(self) -> Result<rusqlite::Connection> {
        Arc::try_unwrap(self.conn)
            .map_err(|_| TesseraError::execution("sqlite connection is still in use"))?
            .into_inner()
            .map_err(|_| TesseraError::execution("sqlite connection lock poisoned"))
    }
}

fn lock(conn: &Mutex<rusqlite::Connection>) -> Result<MutexGuard<'_, rusqlite::Connection>> {
    conn.lock()
        .map_err(|_| TesseraError::execution("sqlite connection lock poisoned"))
}

/// Steps `stmt` to completion. Runs on the blocking pool.
fn query(
    conn: &Mutex<rusqlite::Connection>,
    stmt: &Statement,
    abandoned: &AtomicBool,
) -> Result<BufferedCursor> {
    let conn = lock(conn)?;
    let mut prepared = conn.prepare(stmt.sql())?;
    let columns = column_names(prepared.column_names());
    let width = columns.len();

    let mut rows = prepared.query(params_from_iter(stmt.params()))?;
    let mut buffered = Vec::new();
    while let Some(row) = rows.next()? {
        // An interrupt issued before the first step is lost.
        if abandoned.load(Ordering::Acquire) {
            return Err(TesseraError::Cancelled);
        }
        let values = (0..width)
            .map(|idx| row.get_ref(idx).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        buffered.push(Row::new(columns.clone(), values));
    }
    Ok(BufferedCursor::new(columns, buffered))
}

/// Interrupts the blocking query when the awaiting future is dropped early.
struct InterruptOnDrop {
    handle: Arc<InterruptHandle>,
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
            self.handle.interrupt();
        }
    }
}

impl From<rusqlite::Connection> for SqliteConnection {
    fn from(conn: rusqlite::Connection) -> Self {
        Self::new(conn)
    }
}

impl Connection for SqliteConnection {
    type Cursor = BufferedCursor;

    async fn open(&self, stmt: &Statement) -> Result<BufferedCursor> {
        let abandoned = Arc::new(AtomicBool::new(false));
        let mut guard = InterruptOnDrop {
            handle: Arc::clone(&self.interrupt),
            abandoned: Arc::clone(&abandoned),
            armed: true,
        };

        let conn = Arc::clone(&self.conn);
        let stmt = stmt.clone();
        let result = tokio::task::spawn_blocking(move || query(&conn, &stmt, &abandoned))
            .await
            .map_err(TesseraError::execution)?;
        guard.armed = false;
        result
    }
}
