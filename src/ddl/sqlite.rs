//! SQLite DDL renderer (C8)
//!
//! Renders a `TableSnapshot` to DDL. Column lines are `"<dbName> <STORAGE>"`
//! followed by at most one of `NOT NULL`/`PRIMARY KEY`/`UNIQUE`/`DEFAULT
//! <literal>`/`REFERENCES <t>(<c>)`/`GENERATED ALWAYS AS (<expr>) VIRTUAL`.
//! This generalizes the teacher's per-dialect `DdlGenerator` trait down to
//! its single SQLite implementation, since this crate's DDL surface is
//! SQLite-only. Identifiers are emitted bare, matching the exact spacing
//! the spec's literal `CREATE TABLE`/`ALTER TABLE` examples show; `dbName`s
//! are always derived from host casing so this never collides with a
//! SQLite keyword in practice.

use crate::error::DbError;
use crate::migration::snapshot::{SerColumn, SerConstraint, SerIndex, TableSnapshot};

pub struct SqliteRenderer;

impl SqliteRenderer {
    fn column_line(&self, col: &SerColumn) -> String {
        let mut parts = vec![col.db_name.clone(), col.storage_type.as_sql().to_string()];

        if col.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if col.not_null && !col.primary_key {
            parts.push("NOT NULL".to_string());
        }
        if col.unique && !col.primary_key {
            parts.push("UNIQUE".to_string());
        }
        if let Some(expr) = &col.generated_always_as {
            parts.push(format!("GENERATED ALWAYS AS ({expr}) VIRTUAL"));
        } else {
            if let Some(default) = &col.default {
                parts.push(format!("DEFAULT {}", default.as_sql()));
            }
            if let Some((table, column)) = &col.foreign_key {
                parts.push(format!("REFERENCES {table}({column})"));
            }
        }

        parts.join(" ")
    }

    fn constraint_line(&self, constraint: &SerConstraint) -> String {
        match constraint {
            SerConstraint::PrimaryKey { columns } => {
                format!("PRIMARY KEY ({})", columns.join(", "))
            }
            SerConstraint::Unique { columns } => format!("UNIQUE ({})", columns.join(", ")),
        }
    }

    /// `CREATE TABLE` for the table plus one `CREATE INDEX` per index.
    pub fn create_table_sql(&self, table: &TableSnapshot) -> Result<Vec<String>, DbError> {
        let mut lines: Vec<String> = table.columns.values().map(|c| self.column_line(c)).collect();
        lines.extend(table.constraints.iter().map(|c| self.constraint_line(c)));

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n  {}\n);",
            table.db_name,
            lines.join(",\n  ")
        )];

        for idx in &table.indexes {
            statements.push(self.create_index_sql(&table.db_name, idx));
        }

        Ok(statements)
    }

    pub fn drop_table_sql(&self, table_name: &str) -> String {
        format!("DROP TABLE {table_name};")
    }

    pub fn rename_table_sql(&self, old: &str, new: &str) -> String {
        format!("ALTER TABLE {old} RENAME TO {new};")
    }

    pub fn add_column_sql(&self, table: &str, col: &SerColumn) -> Result<String, DbError> {
        Ok(format!(
            "ALTER TABLE {table} ADD COLUMN {};",
            self.column_line(col)
        ))
    }

    pub fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {table} DROP COLUMN {column};")
    }

    pub fn rename_column_sql(&self, table: &str, old: &str, new: &str) -> String {
        format!("ALTER TABLE {table} RENAME COLUMN {old} TO {new};")
    }

    pub fn create_index_sql(&self, table: &str, idx: &SerIndex) -> String {
        let unique = if idx.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {unique}INDEX {} ON {table} ({});",
            idx.name,
            idx.columns.join(", ")
        )
    }

    pub fn drop_index_sql(&self, index_name: &str) -> String {
        format!("DROP INDEX {index_name};")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{index, Column, Literal, Table};

    #[test]
    fn create_table_renders_not_null_and_primary_key() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("email").unique().not_null())
            .build();
        let snapshot = crate::migration::snapshot::build_snapshot(&[&table]).remove(0);
        let statements = SqliteRenderer.create_table_sql(&snapshot).unwrap();
        assert!(statements[0].contains("id INTEGER PRIMARY KEY"));
        assert!(statements[0].contains("email TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn default_literal_is_quoted() {
        let table = Table::builder("posts")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("status").default_literal(Literal::Text("draft".to_string())))
            .build();
        let snapshot = crate::migration::snapshot::build_snapshot(&[&table]).remove(0);
        let statements = SqliteRenderer.create_table_sql(&snapshot).unwrap();
        assert!(statements[0].contains("DEFAULT 'draft'"));
    }

    #[test]
    fn generated_column_is_virtual_and_excludes_other_modifiers() {
        let table = Table::builder("people")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("full_name").generated_always_as("first || ' ' || last"))
            .build();
        let snapshot = crate::migration::snapshot::build_snapshot(&[&table]).remove(0);
        let statements = SqliteRenderer.create_table_sql(&snapshot).unwrap();
        assert!(statements[0].contains("GENERATED ALWAYS AS (first || ' ' || last) VIRTUAL"));
    }

    #[test]
    fn indexes_emit_as_separate_statements() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("email").not_null())
            .index(index::index().unique().on(&["email"]))
            .build();
        let snapshot = crate::migration::snapshot::build_snapshot(&[&table]).remove(0);
        let statements = SqliteRenderer.create_table_sql(&snapshot).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].starts_with("CREATE UNIQUE INDEX"));
    }

    #[test]
    fn matches_literal_schema_definition_from_the_spec() {
        let table = Table::builder("users")
            .column(Column::text("id").primary_key())
            .column(Column::text("name"))
            .column(Column::integer("age"))
            .build();
        let snapshot = crate::migration::snapshot::build_snapshot(&[&table]).remove(0);
        let statements = SqliteRenderer.create_table_sql(&snapshot).unwrap();
        assert_eq!(
            statements[0],
            "CREATE TABLE users (\n  id TEXT PRIMARY KEY,\n  name TEXT,\n  age INTEGER\n);"
        );
    }
}
