//! Database facade (C10)
//!
//! Holds the connected driver and current principal behind `RwLock`s
//! (mirroring the teacher's `Arc<StdMutex<..>>` convention for shared
//! connection state) and routes every statement through compose → parse →
//! analyze → authorize → dispatch, matching §4.10.

use std::collections::BTreeMap as Map;
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use futures_util::future::BoxFuture;

use crate::ddl::SqliteRenderer;
use crate::driver::{SqlDriver, TxDriver};
use crate::error::DbError;
use crate::ident::to_host_name;
use crate::migration::{build_snapshot, diff, Migration, TableSnapshot};
use crate::schema::Table;
use crate::security::{self, Principal, QueryContext};
use crate::sql::{parser, AccessedTable, Operation, QueryAnalysis, RawSql};
use crate::value::{DbRow, Row};

/// The result of `prepare_snapshot`: the freshly built snapshot, the
/// migration needed to reach it from `previous`, and a convenience flag.
pub struct PreparedSnapshot {
    pub snapshot: Vec<TableSnapshot>,
    pub migration: Migration,
    pub has_changes: bool,
}

/// Holds the connected driver and principal; exposes declared tables by
/// their host name.
pub struct Database {
    tables_by_host: Map<String, Arc<Table>>,
    tables_by_db: Map<String, Arc<Table>>,
    driver: RwLock<Option<Arc<dyn SqlDriver>>>,
    principal: RwLock<Option<Principal>>,
}

impl Database {
    pub fn new(tables: Vec<Table>) -> Self {
        let mut tables_by_host = Map::new();
        let mut tables_by_db = Map::new();
        for table in tables {
            let table = Arc::new(table);
            tables_by_host.insert(table.name.clone(), Arc::clone(&table));
            tables_by_db.insert(table.db_name.clone(), table);
        }
        Database {
            tables_by_host,
            tables_by_db,
            driver: RwLock::new(None),
            principal: RwLock::new(None),
        }
    }

    pub fn connect_driver(&self, driver: Arc<dyn SqlDriver>) {
        *self.driver.write().unwrap() = Some(driver);
    }

    pub fn connect_user(&self, principal: Principal) {
        *self.principal.write().unwrap() = Some(principal);
    }

    fn driver(&self) -> Result<Arc<dyn SqlDriver>, DbError> {
        self.driver
            .read()
            .unwrap()
            .clone()
            .ok_or(DbError::NoDriverConnected)
    }

    fn principal(&self) -> Principal {
        self.principal
            .read()
            .unwrap()
            .clone()
            .unwrap_or(serde_json::Value::Null)
    }

    /// Looks up a declared table by its host (camelCase) name.
    pub fn table(&self, name: &str) -> Result<BoundTable<'_>, DbError> {
        let table = self
            .tables_by_host
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::InvalidInput(format!("no table declared with name '{name}'")))?;
        Ok(BoundTable { db: self, table })
    }

    /// Runs every authorization check for every table a statement touches.
    async fn authorize(&self, analysis: &QueryAnalysis, data: Option<&Row>) -> Result<(), DbError> {
        let principal = self.principal();
        let ctx = QueryContext {
            operation: analysis.operation,
            analysis,
            data,
        };

        for accessed in &analysis.accessed_tables {
            let Some(table) = self.tables_by_db.get(&accessed.name) else {
                continue;
            };

            if matches!(analysis.operation, Operation::Update) {
                if let Some(data) = data {
                    security::check_immutable(&table.name, &table.immutable_rules, data)?;
                }
            }

            security::check_custom_rule(
                &table.name,
                analysis.operation,
                table.security_rule.as_ref(),
                &ctx,
                &principal,
            )
            .await?;

            security::check_where_predicates(
                &table.name,
                analysis.operation,
                &table.where_checks,
                Some(accessed),
                &principal,
            )?;
        }
        Ok(())
    }

    /// The shared pipeline: parse, analyze, authorize, dispatch. Returns
    /// raw DB-cased rows (empty for non-SELECT statements).
    #[tracing::instrument(skip(self, raw, data))]
    async fn dispatch(&self, raw: &RawSql, data: Option<&Row>) -> Result<Vec<DbRow>, DbError> {
        let driver = self.driver()?;
        let statement = parser::parse(raw)?;
        let analysis = crate::sql::analyzer::analyze(&statement, &raw.params)?;
        self.authorize(&analysis, data).await?;
        driver.run(raw).await
    }

    /// Runs a user-composed template (typically a SELECT) through the full
    /// pipeline and decodes the resulting rows back to host casing.
    pub async fn query(&self, raw: RawSql) -> Result<Vec<Row>, DbError> {
        let statement = parser::parse(&raw)?;
        let analysis = crate::sql::analyzer::analyze(&statement, &raw.params)?;
        self.authorize(&analysis, None).await?;
        let driver = self.driver()?;
        let db_rows = driver.run(&raw).await?;
        Ok(db_rows
            .into_iter()
            .map(|row| self.decode_row(&analysis.accessed_tables, row))
            .collect())
    }

    /// Decodes a single DB-cased row back to host casing. For a multi-table
    /// projection (a JOIN), each column is looked up against every accessed
    /// table in turn rather than stopping at the first, since a later table
    /// may be the one that actually owns that column and its codec.
    fn decode_row(&self, accessed: &[AccessedTable], db_row: DbRow) -> Row {
        let mut row = Row::new();
        for (db_key, value) in db_row {
            let owning_column = accessed.iter().find_map(|t| {
                self.tables_by_db
                    .get(&t.name)
                    .and_then(|table| table.columns().iter().find(|c| c.db_name == db_key))
            });
            let decoded = match owning_column {
                Some(col) => (col.name.clone(), col.decode(&value).unwrap_or_else(|_| value.clone())),
                None => (to_host_name(&db_key), value),
            };
            row.insert(decoded.0, decoded.1);
        }
        row
    }

    /// Concatenation of every declared table's rendered DDL (CREATE TABLE +
    /// indexes).
    pub fn schema_definition(&self) -> Result<String, DbError> {
        let renderer = SqliteRenderer;
        let tables: Vec<&Table> = self.tables_by_host.values().map(Arc::as_ref).collect();
        let snapshot = build_snapshot(&tables);
        let mut statements = Vec::new();
        for table in &snapshot {
            statements.extend(renderer.create_table_sql(table)?);
        }
        Ok(statements.join("\n\n"))
    }

    /// Builds the current snapshot and the migration required to reach it
    /// from `previous`. `timestamp` is the caller-supplied basic-ISO UTC
    /// stamp stamped onto the migration's file name; this facade never
    /// calls the clock itself.
    pub fn prepare_snapshot(
        &self,
        previous: &[TableSnapshot],
        timestamp: &str,
    ) -> Result<PreparedSnapshot, DbError> {
        let tables: Vec<&Table> = self.tables_by_host.values().map(Arc::as_ref).collect();
        let snapshot = build_snapshot(&tables);
        let migration = diff(previous, &snapshot, timestamp)?;
        let has_changes = migration.has_changes();
        Ok(PreparedSnapshot {
            snapshot,
            migration,
            has_changes,
        })
    }

    /// Disables FK checks, deletes every row from every declared table, and
    /// re-enables FK checks, mirroring the teacher's own `PRAGMA
    /// foreign_keys` toggling at connect time.
    pub async fn clear(&self) -> Result<(), DbError> {
        let driver = self.driver()?;
        driver.exec("PRAGMA foreign_keys = OFF;").await?;
        for table in self.tables_by_host.values() {
            driver
                .exec(&format!("DELETE FROM {};", table.db_name))
                .await?;
        }
        driver.exec("PRAGMA foreign_keys = ON;").await?;
        Ok(())
    }

    /// Begins a driver transaction, runs `f` against a tx-scoped view of
    /// the tables, and commits on success or rolls back on any error
    /// (including one returned by `f` itself).
    pub async fn transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: for<'tx> FnOnce(TxScope<'tx>) -> BoxFuture<'tx, Result<T, DbError>>,
    {
        let driver = self.driver()?;
        let tx = driver.begin_transaction().await?;
        let scope = TxScope { db: self, tx: tx.as_ref() };
        let result = f(scope).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    /// Collects every statement issued inside `f` without running them,
    /// then dispatches a single atomic driver batch. Reads inside a batch
    /// are structurally unavailable (`BatchScope` exposes no `query`).
    pub async fn batch<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: for<'b> FnOnce(&'b BatchScope<'b>) -> BoxFuture<'b, Result<T, DbError>>,
    {
        let driver = self.driver()?;
        let scope = BatchScope {
            db: self,
            queued: StdMutex::new(Vec::new()),
        };
        let result = f(&scope).await?;
        let statements = std::mem::take(&mut *scope.queued.lock().unwrap());
        if !statements.is_empty() {
            driver.batch(&statements).await?;
        }
        Ok(result)
    }
}

/// A table bound to a connected facade: the only place insert/update/delete
/// can actually reach a driver.
pub struct BoundTable<'a> {
    db: &'a Database,
    table: Arc<Table>,
}

impl<'a> BoundTable<'a> {
    pub async fn insert(&self, overrides: Row) -> Result<Row, DbError> {
        let (made, raw) = self.table.insert_statement(overrides)?;
        self.db.dispatch(&raw, Some(&made)).await?;
        Ok(made)
    }

    pub async fn insert_many(&self, rows: Vec<Row>) -> Result<Vec<Row>, DbError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(self.insert(row).await?);
        }
        Ok(inserted)
    }

    pub async fn update(&self, data: Row, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.update_statement(&data, where_clause)?;
        self.db.dispatch(&raw, Some(&data)).await?;
        Ok(())
    }

    pub async fn delete(&self, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.delete_statement(where_clause)?;
        self.db.dispatch(&raw, None).await?;
        Ok(())
    }
}

/// The tx-scoped view of the facade handed to a `Database::transaction`
/// closure. Every statement issued through it runs against the open
/// transaction instead of the bare driver.
pub struct TxScope<'a> {
    db: &'a Database,
    tx: &'a dyn TxDriver,
}

impl<'a> TxScope<'a> {
    pub async fn run(&self, raw: RawSql) -> Result<Vec<Row>, DbError> {
        let statement = parser::parse(&raw)?;
        let analysis = crate::sql::analyzer::analyze(&statement, &raw.params)?;
        self.db.authorize(&analysis, None).await?;
        let db_rows = self.tx.run(&raw).await?;
        Ok(db_rows
            .into_iter()
            .map(|row| self.db.decode_row(&analysis.accessed_tables, row))
            .collect())
    }

    pub fn table(&self, name: &str) -> Result<TxBoundTable<'_, 'a>, DbError> {
        let table = self
            .db
            .tables_by_host
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::InvalidInput(format!("no table declared with name '{name}'")))?;
        Ok(TxBoundTable { scope: self, table })
    }
}

pub struct TxBoundTable<'s, 'a> {
    scope: &'s TxScope<'a>,
    table: Arc<Table>,
}

impl TxBoundTable<'_, '_> {
    pub async fn insert(&self, overrides: Row) -> Result<Row, DbError> {
        let (made, raw) = self.table.insert_statement(overrides)?;
        self.scope.db.authorize(
            &crate::sql::analyzer::analyze(&parser::parse(&raw)?, &raw.params)?,
            Some(&made),
        )
        .await?;
        self.scope.tx.run(&raw).await?;
        Ok(made)
    }

    pub async fn update(&self, data: Row, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.update_statement(&data, where_clause)?;
        let analysis = crate::sql::analyzer::analyze(&parser::parse(&raw)?, &raw.params)?;
        self.scope.db.authorize(&analysis, Some(&data)).await?;
        self.scope.tx.run(&raw).await?;
        Ok(())
    }

    pub async fn delete(&self, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.delete_statement(where_clause)?;
        let analysis = crate::sql::analyzer::analyze(&parser::parse(&raw)?, &raw.params)?;
        self.scope.db.authorize(&analysis, None).await?;
        self.scope.tx.run(&raw).await?;
        Ok(())
    }
}

/// The batch-scoped view handed to a `Database::batch` closure. Statements
/// are authorized eagerly but queued rather than dispatched; the batch
/// commits atomically once the closure returns. Exposes no `query`, so
/// reads inside a batch are unreachable at the type level; `read` is kept
/// only to surface the named error for a caller that tries anyway via
/// `Database::query` sharing state with the batch (it never does today).
pub struct BatchScope<'a> {
    db: &'a Database,
    queued: StdMutex<Vec<RawSql>>,
}

impl<'a> BatchScope<'a> {
    pub fn table(&self, name: &str) -> Result<BatchBoundTable<'_, 'a>, DbError> {
        let table = self
            .db
            .tables_by_host
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::InvalidInput(format!("no table declared with name '{name}'")))?;
        Ok(BatchBoundTable { scope: self, table })
    }

    /// Reads are never allowed inside a batch.
    pub async fn query(&self, _raw: RawSql) -> Result<Vec<Row>, DbError> {
        Err(DbError::ReadDuringBatch)
    }

    async fn queue(&self, raw: RawSql, data: Option<&Row>) -> Result<(), DbError> {
        let statement = parser::parse(&raw)?;
        let analysis = crate::sql::analyzer::analyze(&statement, &raw.params)?;
        self.db.authorize(&analysis, data).await?;
        self.queued.lock().unwrap().push(raw);
        Ok(())
    }
}

pub struct BatchBoundTable<'s, 'a> {
    scope: &'s BatchScope<'a>,
    table: Arc<Table>,
}

impl BatchBoundTable<'_, '_> {
    pub async fn insert(&self, overrides: Row) -> Result<Row, DbError> {
        let (made, raw) = self.table.insert_statement(overrides)?;
        self.scope.queue(raw, Some(&made)).await?;
        Ok(made)
    }

    pub async fn update(&self, data: Row, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.update_statement(&data, where_clause)?;
        self.scope.queue(raw, Some(&data)).await
    }

    pub async fn delete(&self, where_clause: RawSql) -> Result<(), DbError> {
        let raw = self.table.delete_statement(where_clause)?;
        self.scope.queue(raw, None).await
    }
}
