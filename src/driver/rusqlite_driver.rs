//! Bundled SQLite driver (C11)
//!
//! Grounded directly on the teacher's `SqliteDriver`: a `rusqlite::Connection`
//! wrapped in `Arc<Mutex<Connection>>` (rusqlite is not `Send` across an
//! await point on its own), with `PRAGMA foreign_keys = ON` toggled at
//! connect time. Every call crosses a `tokio::task::spawn_blocking`
//! boundary so the async surface never blocks the executor.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};

use super::{SqlDriver, TxDriver};
use crate::error::DbError;
use crate::sql::RawSql;
use crate::value::{Row, Value};

pub struct RusqliteDriver {
    conn: Arc<StdMutex<Connection>>,
}

impl RusqliteDriver {
    /// Opens (creating if absent) the SQLite file at `path`.
    pub fn open(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| DbError::ConnectionError(format!("failed to open sqlite database: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| DbError::ConnectionError(format!("failed to enable foreign keys: {e}")))?;
        Ok(RusqliteDriver {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }

    /// Wraps an already-open connection, e.g. an in-memory database used by
    /// tests.
    pub fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| DbError::ConnectionError(format!("failed to enable foreign keys: {e}")))?;
        Ok(RusqliteDriver {
            conn: Arc::new(StdMutex::new(conn)),
        })
    }
}

fn value_to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(r) => rusqlite::types::Value::Real(*r),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

fn sql_to_value(v: rusqlite::types::ValueRef<'_>) -> Value {
    match v {
        rusqlite::types::ValueRef::Null => Value::Null,
        rusqlite::types::ValueRef::Integer(i) => Value::Integer(i),
        rusqlite::types::ValueRef::Real(r) => Value::Real(r),
        rusqlite::types::ValueRef::Text(t) => {
            Value::Text(String::from_utf8_lossy(t).into_owned())
        }
        rusqlite::types::ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

fn run_on_conn(conn: &Connection, raw: &RawSql) -> Result<Vec<Row>, DbError> {
    let mut stmt = conn
        .prepare(&raw.text)
        .map_err(|e| DbError::QueryError(format!("failed to prepare statement: {e}")))?;

    let params: Vec<rusqlite::types::Value> = raw.params.iter().map(value_to_sql).collect();
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

    let column_count = stmt.column_count();
    if column_count == 0 {
        stmt.execute(param_refs.as_slice())
            .map_err(|e| DbError::QueryError(format!("failed to execute statement: {e}")))?;
        return Ok(Vec::new());
    }

    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows_out = Vec::new();
    let mut query_rows = stmt
        .query(param_refs.as_slice())
        .map_err(|e| DbError::QueryError(format!("failed to execute query: {e}")))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| DbError::QueryError(format!("failed to fetch row: {e}")))?
    {
        let mut out: Row = Row::new();
        for (i, name) in column_names.iter().enumerate() {
            let value_ref = row
                .get_ref(i)
                .map_err(|e| DbError::QueryError(format!("failed to read column '{name}': {e}")))?;
            out.insert(name.clone(), sql_to_value(value_ref));
        }
        rows_out.push(out);
    }
    Ok(rows_out)
}

#[async_trait]
impl SqlDriver for RusqliteDriver {
    #[tracing::instrument(skip(self, sql_text))]
    async fn exec(&self, sql_text: &str) -> Result<(), DbError> {
        let conn = Arc::clone(&self.conn);
        let sql_text = sql_text.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute_batch(&sql_text)
                .map_err(|e| DbError::QueryError(format!("failed to execute batch: {e}")))
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }

    #[tracing::instrument(skip(self, raw))]
    async fn run(&self, raw: &RawSql) -> Result<Vec<Row>, DbError> {
        let conn = Arc::clone(&self.conn);
        let raw = raw.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            run_on_conn(&conn, &raw)
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }

    async fn begin_transaction(&self) -> Result<Box<dyn TxDriver>, DbError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let locked = conn.lock().unwrap();
            locked
                .execute_batch("BEGIN")
                .map_err(|e| DbError::QueryError(format!("failed to begin transaction: {e}")))
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))??;

        Ok(Box::new(RusqliteTx {
            conn: Arc::clone(&self.conn),
            finished: StdMutex::new(false),
        }))
    }

    #[tracing::instrument(skip(self, statements))]
    async fn batch(&self, statements: &[RawSql]) -> Result<Vec<Vec<Row>>, DbError> {
        let conn = Arc::clone(&self.conn);
        let statements = statements.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute_batch("BEGIN")
                .map_err(|e| DbError::QueryError(format!("failed to begin batch: {e}")))?;

            let mut results = Vec::new();
            for raw in &statements {
                match run_on_conn(&conn, raw) {
                    Ok(rows) => results.push(rows),
                    Err(err) => {
                        let _ = conn.execute_batch("ROLLBACK");
                        return Err(err);
                    }
                }
            }

            conn.execute_batch("COMMIT")
                .map_err(|e| DbError::QueryError(format!("failed to commit batch: {e}")))?;
            Ok(results)
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }
}

struct RusqliteTx {
    conn: Arc<StdMutex<Connection>>,
    finished: StdMutex<bool>,
}

#[async_trait]
impl TxDriver for RusqliteTx {
    async fn run(&self, raw: &RawSql) -> Result<Vec<Row>, DbError> {
        let conn = Arc::clone(&self.conn);
        let raw = raw.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            run_on_conn(&conn, &raw)
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        *self.finished.lock().unwrap() = true;
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute_batch("COMMIT")
                .map_err(|e| DbError::QueryError(format!("failed to commit transaction: {e}")))
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        *self.finished.lock().unwrap() = true;
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute_batch("ROLLBACK")
                .map_err(|e| DbError::QueryError(format!("failed to rollback transaction: {e}")))
        })
        .await
        .map_err(|e| DbError::QueryError(format!("driver task panicked: {e}")))?
    }
}

impl Drop for RusqliteTx {
    fn drop(&mut self) {
        if !*self.finished.lock().unwrap() {
            if let Ok(conn) = self.conn.lock() {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_driver() -> RusqliteDriver {
        RusqliteDriver::from_connection(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn exec_creates_table_and_run_inserts_and_selects() {
        let driver = memory_driver();
        driver
            .exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();

        let insert = RawSql::new(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            vec![Value::Integer(1), Value::Text("Ada".to_string())],
        );
        let rows = driver.run(&insert).await.unwrap();
        assert!(rows.is_empty());

        let select = RawSql::new("SELECT id, name FROM users WHERE id = ?", vec![Value::Integer(1)]);
        let rows = driver.run(&select).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("Ada".to_string())));
    }

    #[tokio::test]
    async fn blob_round_trips_as_real_bytes() {
        let driver = memory_driver();
        driver
            .exec("CREATE TABLE blobs (id INTEGER PRIMARY KEY, data BLOB)")
            .await
            .unwrap();
        let bytes = vec![0u8, 1, 2, 255];
        driver
            .run(&RawSql::new(
                "INSERT INTO blobs (id, data) VALUES (?, ?)",
                vec![Value::Integer(1), Value::Blob(bytes.clone())],
            ))
            .await
            .unwrap();
        let rows = driver
            .run(&RawSql::new("SELECT data FROM blobs WHERE id = ?", vec![Value::Integer(1)]))
            .await
            .unwrap();
        assert_eq!(rows[0].get("data"), Some(&Value::Blob(bytes)));
    }

    #[tokio::test]
    async fn transaction_commits() {
        let driver = memory_driver();
        driver
            .exec("CREATE TABLE counters (id INTEGER PRIMARY KEY, n INTEGER)")
            .await
            .unwrap();
        let tx = driver.begin_transaction().await.unwrap();
        tx.run(&RawSql::new(
            "INSERT INTO counters (id, n) VALUES (?, ?)",
            vec![Value::Integer(1), Value::Integer(10)],
        ))
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let rows = driver
            .run(&RawSql::new("SELECT n FROM counters WHERE id = ?", vec![Value::Integer(1)]))
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::Integer(10)));
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_drop() {
        let driver = memory_driver();
        driver
            .exec("CREATE TABLE counters (id INTEGER PRIMARY KEY, n INTEGER)")
            .await
            .unwrap();
        {
            let tx = driver.begin_transaction().await.unwrap();
            tx.run(&RawSql::new(
                "INSERT INTO counters (id, n) VALUES (?, ?)",
                vec![Value::Integer(1), Value::Integer(10)],
            ))
            .await
            .unwrap();
            drop(tx);
        }
        let rows = driver
            .run(&RawSql::new("SELECT n FROM counters", Vec::new()))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let driver = memory_driver();
        driver
            .exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();

        let statements = vec![
            RawSql::new(
                "INSERT INTO users (id, name) VALUES (?, ?)",
                vec![Value::Integer(1), Value::Text("Ada".to_string())],
            ),
            RawSql::new(
                "INSERT INTO users (id, name) VALUES (?, ?)",
                vec![Value::Integer(1), Value::Text("Duplicate".to_string())],
            ),
        ];
        assert!(driver.batch(&statements).await.is_err());

        let rows = driver
            .run(&RawSql::new("SELECT id FROM users", Vec::new()))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
