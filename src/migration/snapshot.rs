//! Schema snapshot (C9)
//!
//! A `TableSnapshot` is the serializable projection of a `Table` used as the
//! source of truth between migrations: no codecs, no thunks, no validator
//! references, just the attributes that affect generated DDL.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::index::{ConstraintDef, IndexDefinition};
use crate::schema::table::Table;
use crate::schema::{Column, Literal, StorageType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SerStorageType {
    Integer,
    Real,
    Text,
    Blob,
}

impl From<StorageType> for SerStorageType {
    fn from(t: StorageType) -> Self {
        match t {
            StorageType::Integer => SerStorageType::Integer,
            StorageType::Real => SerStorageType::Real,
            StorageType::Text => SerStorageType::Text,
            StorageType::Blob => SerStorageType::Blob,
        }
    }
}

impl SerStorageType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SerStorageType::Integer => "INTEGER",
            SerStorageType::Real => "REAL",
            SerStorageType::Text => "TEXT",
            SerStorageType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerLiteral {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&Literal> for SerLiteral {
    fn from(l: &Literal) -> Self {
        match l {
            Literal::Null => SerLiteral::Null,
            Literal::Integer(n) => SerLiteral::Integer(*n),
            Literal::Real(r) => SerLiteral::Real(*r),
            Literal::Text(s) => SerLiteral::Text(s.clone()),
        }
    }
}

impl SerLiteral {
    /// Renders the literal the way `4.8` requires: strings single-quoted
    /// with embedded `'` doubled, numbers stringified, null as `NULL`.
    pub fn as_sql(&self) -> String {
        match self {
            SerLiteral::Null => "NULL".to_string(),
            SerLiteral::Integer(n) => n.to_string(),
            SerLiteral::Real(r) => r.to_string(),
            SerLiteral::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerColumn {
    pub db_name: String,
    pub storage_type: SerStorageType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub foreign_key: Option<(String, String)>,
    pub default: Option<SerLiteral>,
    pub generated_always_as: Option<String>,
    pub renamed_from: Option<String>,
}

impl SerColumn {
    fn from_column(col: &Column) -> Self {
        SerColumn {
            db_name: col.db_name.clone(),
            storage_type: col.storage_type.into(),
            not_null: col.not_null,
            primary_key: col.primary_key,
            unique: col.unique,
            foreign_key: col.foreign_key.as_ref().and_then(|f| f()),
            default: col.default.as_ref().map(SerLiteral::from),
            generated_always_as: col.generated_always_as.clone(),
            renamed_from: col.renamed_from.clone(),
        }
    }

    /// Equality ignoring `dbName`/`renamedFrom`, used by the diff engine to
    /// decide whether a matched column changed shape.
    pub fn same_shape_as(&self, other: &SerColumn) -> bool {
        self.storage_type == other.storage_type
            && self.not_null == other.not_null
            && self.primary_key == other.primary_key
            && self.unique == other.unique
            && self.foreign_key == other.foreign_key
            && self.default == other.default
            && self.generated_always_as == other.generated_always_as
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerIndex {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SerConstraint {
    PrimaryKey { columns: Vec<String> },
    Unique { columns: Vec<String> },
}

impl From<&ConstraintDef> for SerConstraint {
    fn from(c: &ConstraintDef) -> Self {
        match c {
            ConstraintDef::PrimaryKey(cols) => SerConstraint::PrimaryKey { columns: cols.clone() },
            ConstraintDef::Unique(cols) => SerConstraint::Unique { columns: cols.clone() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub name: String,
    pub db_name: String,
    /// Declaration order, not alphabetical: `render(snapshot(T))` must
    /// reproduce the declared column order (§8).
    pub columns: IndexMap<String, SerColumn>,
    pub indexes: Vec<SerIndex>,
    pub constraints: Vec<SerConstraint>,
    pub renamed_from: Option<String>,
}

impl TableSnapshot {
    fn from_table(table: &Table) -> Self {
        let columns: IndexMap<String, SerColumn> = table
            .columns()
            .iter()
            .map(|c| (c.db_name.clone(), SerColumn::from_column(c)))
            .collect();

        let mut indexes: Vec<SerIndex> = table
            .indexes
            .iter()
            .map(|idx: &IndexDefinition| SerIndex {
                name: idx.canonical_name(&table.db_name),
                columns: idx.columns.clone(),
                unique: idx.unique,
            })
            .collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        let constraints: Vec<SerConstraint> = table.constraints.iter().map(SerConstraint::from).collect();

        TableSnapshot {
            name: table.name.clone(),
            db_name: table.db_name.clone(),
            columns,
            indexes,
            constraints,
            renamed_from: table.renamed_from.clone(),
        }
    }
}

/// Builds the full snapshot, sorted by `dbName`, from the declared tables.
pub fn build_snapshot(tables: &[&Table]) -> Vec<TableSnapshot> {
    let mut snapshots: Vec<TableSnapshot> = tables.iter().map(|t| TableSnapshot::from_table(t)).collect();
    snapshots.sort_by(|a, b| a.db_name.cmp(&b.db_name));
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{index, Column, Table};

    #[test]
    fn snapshot_is_sorted_by_db_name_and_strips_runtime_fields() {
        let b_table = Table::builder("bravo")
            .column(Column::integer("id").primary_key().not_null())
            .build();
        let a_table = Table::builder("alpha")
            .column(Column::integer("id").primary_key().not_null())
            .index(index::index().on(&["id"]))
            .build();

        let snapshot = build_snapshot(&[&b_table, &a_table]);
        assert_eq!(snapshot[0].db_name, "alpha");
        assert_eq!(snapshot[1].db_name, "bravo");
        assert_eq!(snapshot[0].indexes[0].name, "alpha_id_idx");
    }

    #[test]
    fn serializes_as_json_array_round_trip() {
        let table = Table::builder("users")
            .column(Column::integer("id").primary_key().not_null())
            .column(Column::text("email").unique().not_null())
            .build();
        let snapshot = build_snapshot(&[&table]);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Vec<TableSnapshot> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn literal_default_renders_quoted_text() {
        let lit = SerLiteral::Text("O'Brien".to_string());
        assert_eq!(lit.as_sql(), "'O''Brien'");
    }
}
