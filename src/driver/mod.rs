//! Driver layer (C11, ambient)
//!
//! `SqlDriver` is the trait the facade dispatches to; `RusqliteDriver` is
//! the bundled implementation. Grounded directly on the teacher's
//! `DatabaseDriver` trait and `SqliteDriver` struct.

pub mod rusqlite_driver;

pub use rusqlite_driver::RusqliteDriver;

use async_trait::async_trait;

use crate::error::DbError;
use crate::sql::RawSql;
use crate::value::Row;

/// A transaction handle returned by `SqlDriver::begin_transaction`. Scoped
/// to a single commit-or-rollback lifetime.
#[async_trait]
pub trait TxDriver: Send + Sync {
    async fn run(&self, sql: &RawSql) -> Result<Vec<Row>, DbError>;
    async fn commit(self: Box<Self>) -> Result<(), DbError>;
    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}

/// The object-safe surface the facade dispatches every statement through.
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Executes one or more `;`-separated statements with no return value.
    /// Used for DDL (CREATE/ALTER/DROP TABLE).
    async fn exec(&self, sql_text: &str) -> Result<(), DbError>;

    /// Runs a single parameterized statement. SELECT returns its rows
    /// (column keys in DB casing); any other statement returns `[]`.
    async fn run(&self, sql: &RawSql) -> Result<Vec<Row>, DbError>;

    /// Begins a transaction; statements issued via the returned handle are
    /// serialized until `commit`/`rollback`.
    async fn begin_transaction(&self) -> Result<Box<dyn TxDriver>, DbError>;

    /// Runs every statement atomically; if any fails, none take effect.
    async fn batch(&self, statements: &[RawSql]) -> Result<Vec<Vec<Row>>, DbError>;
}
