//! Table model (C3)
//!
//! Holds the column registry, table-level constraints and indexes, and the
//! insert/update/delete statement builders. A `Table` attaches itself to
//! each of its columns (stamping `table_db_name`) when constructed, then is
//! frozen: every method below is `&self`.

use std::sync::Arc;

use crate::error::DbError;
use crate::ident::to_db_name;
use crate::schema::column::{Column, InsertType};
use crate::schema::index::{ConstraintDef, IndexDefinition};
use crate::security::{ImmutableRule, SecurityRule, WhereCheckFn};
use crate::sql::{RawSql, SqlBuilder};
use crate::value::{Row, Value};

/// Table metadata (C3), owned by the declaring program. Frozen after
/// `TableBuilder::build()`.
pub struct Table {
    pub name: String,
    pub db_name: String,
    pub(crate) columns: Vec<Column>,
    pub indexes: Vec<IndexDefinition>,
    pub constraints: Vec<ConstraintDef>,
    pub renamed_from: Option<String>,
    pub security_rule: Option<Arc<dyn SecurityRule>>,
    pub immutable_rules: Vec<ImmutableRule>,
    pub where_checks: Vec<WhereCheckFn>,
}

/// Builder for `Table`, mirroring the column builder's fluent-cloner style.
pub struct TableBuilder {
    name: String,
    db_name: String,
    columns: Vec<Column>,
    indexes: Vec<IndexDefinition>,
    constraints: Vec<ConstraintDef>,
    renamed_from: Option<String>,
    security_rule: Option<Arc<dyn SecurityRule>>,
    immutable_rules: Vec<ImmutableRule>,
    where_checks: Vec<WhereCheckFn>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let db_name = to_db_name(&name);
        TableBuilder {
            name,
            db_name,
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
            renamed_from: None,
            security_rule: None,
            immutable_rules: Vec::new(),
            where_checks: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
        self.renamed_from = Some(old_name.into());
        self
    }

    pub fn secure(mut self, rule: impl SecurityRule + 'static) -> Self {
        self.security_rule = Some(Arc::new(rule));
        self
    }

    pub fn add_immutable_rule(mut self, field_name: impl Into<String>) -> Self {
        self.immutable_rules.push(ImmutableRule {
            field_name: field_name.into(),
        });
        self
    }

    /// Registers a WHERE-clause predicate check the facade enforces on
    /// every select/update/delete against this table (inserts are exempt).
    pub fn require_where(mut self, check: WhereCheckFn) -> Self {
        self.where_checks.push(check);
        self
    }

    /// Freezes the table: validates dbName uniqueness, index/constraint
    /// column references, and attaches `table_db_name` to every column.
    pub fn build(mut self) -> Table {
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.db_name.clone()) {
                panic!("duplicate column dbName '{}' on table '{}'", col.db_name, self.name);
            }
        }

        for idx in &self.indexes {
            for c in &idx.columns {
                if !self.columns.iter().any(|col| &col.name == c || &col.db_name == c) {
                    panic!(
                        "index on table '{}' references unknown column '{}'",
                        self.name, c
                    );
                }
            }
        }
        for constraint in &self.constraints {
            if constraint.columns().is_empty() {
                panic!("constraint on table '{}' has no columns", self.name);
            }
        }

        for col in &mut self.columns {
            col.table_db_name = Some(self.db_name.clone());
        }

        Table {
            name: self.name,
            db_name: self.db_name,
            columns: self.columns,
            indexes: self.indexes,
            constraints: self.constraints,
            renamed_from: self.renamed_from,
            security_rule: self.security_rule,
            immutable_rules: self.immutable_rules,
            where_checks: self.where_checks,
        }
    }
}

impl Table {
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    pub fn column(&self, host_name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == host_name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn required_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| matches!(c.insert_type, InsertType::Required))
    }

    /// Builds a fully populated row for insert: overrides win, then
    /// `appDefault` thunks, then the column is left unset. Virtual columns
    /// are always omitted.
    pub fn make(&self, mut overrides: Row) -> Row {
        let mut row = Row::new();
        for col in &self.columns {
            if col.is_virtual() {
                overrides.remove(&col.name);
                continue;
            }
            if let Some(value) = overrides.remove(&col.name) {
                row.insert(col.name.clone(), value);
            } else if let Some(app_default) = &col.app_default {
                row.insert(col.name.clone(), app_default.resolve());
            }
        }
        row
    }

    /// Validates that every `required` column has a value and encodes each
    /// present value via its column's codec.
    fn prepare_row(&self, row: &Row) -> Result<Row, DbError> {
        let missing: Vec<String> = self
            .required_columns()
            .filter(|c| !row.contains_key(&c.name))
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(DbError::MissingRequiredColumns(missing));
        }

        let mut encoded = Row::new();
        for (name, value) in row {
            if let Some(col) = self.column(name) {
                encoded.insert(name.clone(), col.encode(value)?);
            } else {
                encoded.insert(name.clone(), value.clone());
            }
        }
        Ok(encoded)
    }

    /// Builds `INSERT INTO <db> (...) VALUES (?, ?, ...)` for a row already
    /// produced by `make`.
    pub fn insert_statement(&self, overrides: Row) -> Result<(Row, RawSql), DbError> {
        let made = self.make(overrides);
        let encoded = self.prepare_row(&made)?;

        let mut cols = Vec::new();
        let mut values = Vec::new();
        for (name, value) in &encoded {
            let col = self
                .column(name)
                .ok_or_else(|| DbError::InvalidTemplateValue(format!("unknown column '{name}'")))?;
            cols.push(col.db_name.clone());
            values.push(value.clone());
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let text = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.db_name,
            cols.join(", "),
            placeholders
        );
        Ok((made, RawSql::new(text, values)))
    }

    /// Builds `UPDATE <db> SET col = ?, ... WHERE <where>`.
    pub fn update_statement(&self, data: &Row, where_clause: RawSql) -> Result<RawSql, DbError> {
        if data.is_empty() {
            return Err(DbError::InvalidTemplateValue(
                "update requires at least one column".to_string(),
            ));
        }

        let mut builder = SqlBuilder::new().text(format!("UPDATE {} SET ", self.db_name));
        let mut first = true;
        let mut set_params: Vec<Value> = Vec::new();
        let mut set_text = String::new();
        for (name, value) in data {
            let col = self
                .column(name)
                .ok_or_else(|| DbError::InvalidTemplateValue(format!("unknown column '{name}'")))?;
            if col.is_virtual() {
                return Err(DbError::InvalidTemplateValue(format!(
                    "cannot update virtual column '{name}'"
                )));
            }
            if !first {
                set_text.push_str(", ");
            }
            first = false;
            set_text.push_str(&format!("{} = ?", col.db_name));
            set_params.push(col.encode(value)?);
        }
        builder = builder.raw(RawSql::new(set_text, set_params));
        builder = builder.text(" WHERE ").raw(where_clause);
        builder.build()
    }

    /// Builds `DELETE FROM <db> WHERE <where>`.
    pub fn delete_statement(&self, where_clause: RawSql) -> Result<RawSql, DbError> {
        SqlBuilder::new()
            .text(format!("DELETE FROM {} WHERE ", self.db_name))
            .raw(where_clause)
            .build()
    }
}
