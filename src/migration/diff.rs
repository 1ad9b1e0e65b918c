//! Snapshot diff engine (C9)
//!
//! Compares a `previous` and `current` snapshot list and produces the DDL
//! statements that carry the database from one to the other, or fails fast
//! on a change this engine does not support performing online.

use crate::ddl::sqlite::SqliteRenderer;
use crate::error::DbError;
use crate::migration::snapshot::TableSnapshot;

/// `{name, sql}`: a ready-to-write migration file. `name` follows the
/// `YYYY_MM_DD_HH_MM_SS.sql` pattern (basic-ISO UTC, `-`/`:` replaced by
/// `_`); callers stamp the timestamp since this crate never calls the clock
/// internally — `diff` takes the already-formatted timestamp and appends
/// the `.sql` suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub name: String,
    pub statements: Vec<String>,
}

impl Migration {
    pub fn has_changes(&self) -> bool {
        !self.statements.is_empty()
    }

    pub fn sql(&self) -> String {
        self.statements.join("\n")
    }
}

/// Diffs `previous` against `current`, emitting statements in a fixed,
/// deterministic order: renamed/created tables and their column changes
/// first (in `current` order), then drops of tables no longer present.
/// `timestamp` is the caller-supplied basic-ISO UTC stamp (e.g.
/// `"2024_01_01_12_00_00"`) used verbatim as the migration file's name,
/// with `.sql` appended.
pub fn diff(
    previous: &[TableSnapshot],
    current: &[TableSnapshot],
    timestamp: &str,
) -> Result<Migration, DbError> {
    let renderer = SqliteRenderer;
    let mut statements = Vec::new();
    let mut matched_previous: Vec<bool> = vec![false; previous.len()];

    for curr in current {
        let prev_index = previous.iter().position(|p| p.db_name == curr.db_name).or_else(|| {
            curr.renamed_from
                .as_ref()
                .and_then(|old| previous.iter().position(|p| p.db_name == *old))
        });

        match prev_index {
            None => {
                let created = renderer.create_table_sql(curr)?;
                statements.extend(created);
            }
            Some(idx) => {
                matched_previous[idx] = true;
                let prev = &previous[idx];
                if prev.db_name != curr.db_name {
                    statements.push(renderer.rename_table_sql(&prev.db_name, &curr.db_name));
                }
                diff_columns(prev, curr, &renderer, &mut statements)?;
                diff_indexes(prev, curr, &renderer, &mut statements);
                diff_constraints(prev, curr)?;
            }
        }
    }

    for (idx, prev) in previous.iter().enumerate() {
        if !matched_previous[idx] {
            statements.push(renderer.drop_table_sql(&prev.db_name));
        }
    }

    Ok(Migration {
        name: format!("{timestamp}.sql"),
        statements,
    })
}

fn diff_columns(
    prev: &TableSnapshot,
    curr: &TableSnapshot,
    renderer: &SqliteRenderer,
    statements: &mut Vec<String>,
) -> Result<(), DbError> {
    let mut matched_prev_cols: Vec<String> = Vec::new();

    for (curr_name, curr_col) in &curr.columns {
        let prev_match = prev
            .columns
            .get(curr_name)
            .map(|c| (curr_name.clone(), c))
            .or_else(|| {
                curr_col
                    .renamed_from
                    .as_ref()
                    .and_then(|old| prev.columns.get(old).map(|c| (old.clone(), c)))
            });

        match prev_match {
            None => {
                statements.push(renderer.add_column_sql(&curr.db_name, curr_col)?);
            }
            Some((prev_name, prev_col)) => {
                matched_prev_cols.push(prev_name.clone());
                if prev_name != *curr_name {
                    statements.push(renderer.rename_column_sql(&curr.db_name, &prev_name, curr_name));
                }
                if !prev_col.same_shape_as(curr_col) {
                    return Err(DbError::ColumnMutationNotSupported {
                        table: curr.db_name.clone(),
                        column: curr_name.clone(),
                    });
                }
            }
        }
    }

    for prev_name in prev.columns.keys() {
        if !matched_prev_cols.contains(prev_name) {
            statements.push(renderer.drop_column_sql(&curr.db_name, prev_name));
        }
    }

    Ok(())
}

fn diff_indexes(
    prev: &TableSnapshot,
    curr: &TableSnapshot,
    renderer: &SqliteRenderer,
    statements: &mut Vec<String>,
) {
    for curr_idx in &curr.indexes {
        match prev.indexes.iter().find(|i| i.name == curr_idx.name) {
            None => statements.push(renderer.create_index_sql(&curr.db_name, curr_idx)),
            Some(prev_idx) if prev_idx != curr_idx => {
                statements.push(renderer.drop_index_sql(&prev_idx.name));
                statements.push(renderer.create_index_sql(&curr.db_name, curr_idx));
            }
            Some(_) => {}
        }
    }
    for prev_idx in &prev.indexes {
        if !curr.indexes.iter().any(|i| i.name == prev_idx.name) {
            statements.push(renderer.drop_index_sql(&prev_idx.name));
        }
    }
}

fn diff_constraints(prev: &TableSnapshot, curr: &TableSnapshot) -> Result<(), DbError> {
    if prev.constraints != curr.constraints {
        return Err(DbError::ConstraintChangeNotSupported {
            table: curr.db_name.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{index, Column, Table};

    const TS: &str = "2024_01_01_12_00_00";

    fn snap(table: &Table) -> TableSnapshot {
        crate::migration::snapshot::build_snapshot(&[table]).remove(0)
    }

    #[test]
    fn new_table_emits_create_statements() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .build();
        let migration = diff(&[], &[snap(&table)], TS).unwrap();
        assert!(migration.has_changes());
        assert!(migration.sql().contains("CREATE TABLE"));
    }

    #[test]
    fn migration_name_is_the_supplied_timestamp_plus_sql_suffix() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .build();
        let migration = diff(&[], &[snap(&table)], TS).unwrap();
        assert_eq!(migration.name, "2024_01_01_12_00_00.sql");
    }

    #[test]
    fn idempotent_diff_produces_no_statements() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .index(index::index().on(&["id"]))
            .build();
        let snapshot = snap(&table);
        let migration = diff(&[snapshot.clone()], &[snapshot], TS).unwrap();
        assert!(!migration.has_changes());
    }

    #[test]
    fn removed_table_emits_drop() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .build();
        let migration = diff(&[snap(&table)], &[], TS).unwrap();
        assert!(migration.sql().contains("DROP TABLE"));
    }

    #[test]
    fn renamed_table_emits_rename_not_create_and_drop() {
        let old = Table::builder("people")
            .column(Column::integer("id").primary_key().not_null())
            .build();
        let new = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .renamed_from("people")
            .build();
        let migration = diff(&[snap(&old)], &[snap(&new)], TS).unwrap();
        assert_eq!(migration.statements.len(), 1);
        assert!(migration.statements[0].contains("RENAME TO"));
    }

    #[test]
    fn added_and_dropped_columns_are_detected() {
        let before = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("legacy_field"))
            .build();
        let after = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("email").not_null())
            .build();
        let migration = diff(&[snap(&before)], &[snap(&after)], TS).unwrap();
        assert!(migration.sql().contains("ADD COLUMN"));
        assert!(migration.sql().contains("DROP COLUMN"));
    }

    #[test]
    fn incompatible_column_mutation_fails() {
        let before = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("age"))
            .build();
        let after = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::integer("age"))
            .build();
        let err = diff(&[snap(&before)], &[snap(&after)], TS).unwrap_err();
        assert!(matches!(err, DbError::ColumnMutationNotSupported { .. }));
    }

    #[test]
    fn constraint_change_fails() {
        let before = Table::builder("users")
            .column(Column::integer("id").not_null())
            .column(Column::text("email").not_null())
            .constraint(index::primary_key(&["id"]))
            .build();
        let after = Table::builder("users")
            .column(Column::integer("id").not_null())
            .column(Column::text("email").not_null())
            .constraint(index::primary_key(&["id", "email"]))
            .build();
        let err = diff(&[snap(&before)], &[snap(&after)], TS).unwrap_err();
        assert!(matches!(err, DbError::ConstraintChangeNotSupported { .. }));
    }
}
