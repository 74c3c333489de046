#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tessera::core::column_names;
use tessera::load::{HasMany, HasOne, HasRelations, Relation};
use tessera::{
    CancellationToken, Connection, Result, Row, RowCursor, Statement, TesseraError, Value,
};

// =============================================================================
// Entities
// =============================================================================

tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Customer in "customers" {
        pub id: i64,
        pub name: String,
        pub email: Option<String>,
    }
    with {
        pub orders: Vec<Order>,
        pub profile: Option<Profile>,
    }
}

tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Order in "orders" {
        pub id: i64,
        pub customer_id: i64,
        pub total: f64,
    }
    with {
        pub customer: Option<Customer>,
    }
}

tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Profile in "profiles" {
        pub id: i64,
        pub customer_id: i64,
        pub bio: String,
    }
}

// Narrow view over `customers`
tessera::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct CustomerName in "customer_names" {
        pub id: i64,
        pub name: String,
    }
    with {
        pub orders: Vec<Order>,
    }
}

pub static CUSTOMER_ORDERS: HasMany<Customer, Order> =
    HasMany::new("orders", "id", "customer_id", |c: &mut Customer, orders| {
        c.orders = orders
    });

pub static CUSTOMER_PROFILE: HasOne<Customer, Profile> =
    HasOne::new("profile", "id", "customer_id", |c: &mut Customer, profile| {
        c.profile = profile
    });

pub static ORDER_CUSTOMER: HasOne<Order, Customer> =
    HasOne::new("customer", "customer_id", "id", |o: &mut Order, customer| {
        o.customer = customer
    });

pub static NAME_ORDERS: HasMany<CustomerName, Order> =
    HasMany::new("orders", "id", "customer_id", |c: &mut CustomerName, orders| {
        c.orders = orders
    });

impl HasRelations for Customer {
    fn relations() -> &'static [&'static dyn Relation<Self>] {
        static ALL: [&dyn Relation<Customer>; 2] = [&CUSTOMER_ORDERS, &CUSTOMER_PROFILE];
        &ALL
    }
}

impl HasRelations for Order {
    fn relations() -> &'static [&'static dyn Relation<Self>] {
        static ALL: [&dyn Relation<Order>; 1] = [&ORDER_CUSTOMER];
        &ALL
    }
}

impl HasRelations for CustomerName {
    fn relations() -> &'static [&'static dyn Relation<Self>] {
        static ALL: [&dyn Relation<CustomerName>; 1] = [&NAME_ORDERS];
        &ALL
    }
}

// =============================================================================
// Scripted connection
// =============================================================================

/// One scripted result set, consumed by one `open` call.
#[derive(Debug, Clone, Default)]
pub struct Script {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    open_error: Option<String>,
    fetch_error_at: Option<usize>,
    close_error: bool,
    cancel_at: Option<(usize, CancellationToken)>,
}

impl Script {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }

    /// `open` fails with a driver error.
    pub fn fail_open(message: &str) -> Self {
        Self {
            open_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Fetching row `idx` fails with a driver error.
    pub fn fail_fetch_at(mut self, idx: usize) -> Self {
        self.fetch_error_at = Some(idx);
        self
    }

    /// `close` fails with a driver error.
    pub fn fail_close(mut self) -> Self {
        self.close_error = true;
        self
    }

    /// Fetching row `idx` fires `token` and never completes.
    pub fn cancel_at(mut self, idx: usize, token: &CancellationToken) -> Self {
        self.cancel_at = Some((idx, token.clone()));
        self
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fetched: AtomicUsize,
    statements: Mutex<Vec<Statement>>,
}

impl Stats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> String {
        self.statements()
            .last()
            .map(|s| s.sql().to_string())
            .unwrap_or_default()
    }
}

/// Connection that replays [`Script`]s in order and records what it sees.
#[derive(Debug, Default)]
pub struct MockConnection {
    scripts: Mutex<VecDeque<Script>>,
    pub stats: Arc<Stats>,
}

impl MockConnection {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            stats: Arc::default(),
        }
    }
}

#[derive(Debug)]
pub struct MockCursor {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<Value>>,
    served: usize,
    fetch_error_at: Option<usize>,
    close_error: bool,
    cancel_at: Option<(usize, CancellationToken)>,
    stats: Arc<Stats>,
}

impl RowCursor for MockCursor {
    fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    async fn next(&mut self) -> Result<Option<Row>> {
        if let Some((idx, token)) = &self.cancel_at
            && *idx == self.served
        {
            token.cancel();
            return std::future::pending().await;
        }
        if self.fetch_error_at == Some(self.served) {
            return Err(TesseraError::execution("connection reset"));
        }
        let Some(values) = self.rows.pop_front() else {
            return Ok(None);
        };
        self.served += 1;
        self.stats.fetched.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Row::new(Arc::clone(&self.columns), values)))
    }

    async fn close(&mut self) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        if self.close_error {
            return Err(TesseraError::execution("close failed"));
        }
        Ok(())
    }
}

impl Connection for MockConnection {
    type Cursor = MockCursor;

    async fn open(&self, stmt: &Statement) -> Result<MockCursor> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.statements.lock().unwrap().push(stmt.clone());
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        if let Some(message) = script.open_error {
            return Err(TesseraError::execution(message));
        }
        Ok(MockCursor {
            columns: column_names(script.columns),
            rows: script.rows.into(),
            served: 0,
            fetch_error_at: script.fetch_error_at,
            close_error: script.close_error,
            cancel_at: script.cancel_at,
            stats: Arc::clone(&self.stats),
        })
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn int(i: i64) -> Value {
    Value::Integer(i)
}

// =============================================================================
// SQLite fixtures
// =============================================================================

pub const SQLITE_SCHEMA: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        total REAL NOT NULL
    );
    CREATE TABLE profiles (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        bio TEXT NOT NULL
    );
    INSERT INTO customers (id, name, email) VALUES
        (1, 'alice', 'alice@example.com'),
        (2, 'bob', NULL),
        (3, 'carol', 'carol@example.com');
    INSERT INTO orders (id, customer_id, total) VALUES
        (10, 1, 12.5),
        (11, 1, 40),
        (12, 2, 7.25),
        (13, 1, 3);
    INSERT INTO profiles (id, customer_id, bio) VALUES
        (100, 1, 'first customer'),
        (101, 3, 'likes tea');
";

#[cfg(feature = "rusqlite")]
pub fn setup_sqlite() -> tessera::Db<tessera::sqlite::SqliteConnection> {
    let conn = tessera::sqlite::SqliteConnection::open_in_memory()
        .expect("Failed to create in-memory database");
    conn.execute_batch(SQLITE_SCHEMA)
        .expect("Failed to create tables");
    tessera::Db::new(conn, tessera::Dialect::SQLite)
}

pub fn mock_db(scripts: impl IntoIterator<Item = Script>) -> tessera::Db<MockConnection> {
    tessera::Db::new(MockConnection::new(scripts), tessera::Dialect::SQLite)
}

pub fn stats(db: &tessera::Db<MockConnection>) -> Arc<Stats> {
    Arc::clone(&db.connection().stats)
}
