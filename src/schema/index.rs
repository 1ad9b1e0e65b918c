//! Index & constraint builders (C3 helper)
//!
//! `index()` / `primary_key()` / `unique()` build the declarative values a
//! `Table` stores in its `indexes`/`constraints` lists. Both constraint
//! builders fail fast (panic) on zero columns or duplicate column names,
//! since these are programmer errors caught at declaration time.

use crate::ident::canonical_index_name;

/// `{name?, columns, unique?}`. If `name` is omitted the canonical name is
/// `"<tableDb>_<col1>_<col2>..._idx"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn canonical_name(&self, table_db_name: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| canonical_index_name(table_db_name, &self.columns))
    }
}

/// A table-level constraint tuple: `['primaryKey', ...cols]` or
/// `['unique', ...cols]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintDef {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
}

impl ConstraintDef {
    pub fn columns(&self) -> &[String] {
        match self {
            ConstraintDef::PrimaryKey(cols) => cols,
            ConstraintDef::Unique(cols) => cols,
        }
    }
}

/// Builder returned by `index()`.
pub struct IndexBuilder {
    name: Option<String>,
    unique: bool,
    columns: Vec<String>,
}

impl IndexBuilder {
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn on(mut self, columns: &[&str]) -> IndexDefinition {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        if self.columns.is_empty() {
            panic!("index() requires at least one column");
        }
        let mut sorted = self.columns.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != self.columns.len() {
            panic!("index() columns must be unique");
        }
        IndexDefinition {
            name: self.name,
            columns: self.columns,
            unique: self.unique,
        }
    }
}

pub fn index() -> IndexBuilder {
    IndexBuilder {
        name: None,
        unique: false,
        columns: Vec::new(),
    }
}

pub fn named_index(name: impl Into<String>) -> IndexBuilder {
    IndexBuilder {
        name: Some(name.into()),
        unique: false,
        columns: Vec::new(),
    }
}

fn validate_constraint_columns(columns: &[&str]) {
    if columns.is_empty() {
        panic!("constraint requires at least one column");
    }
    let mut sorted: Vec<&str> = columns.to_vec();
    sorted.sort();
    sorted.dedup();
    if sorted.len() != columns.len() {
        panic!("constraint columns must be unique");
    }
}

pub fn primary_key(columns: &[&str]) -> ConstraintDef {
    validate_constraint_columns(columns);
    ConstraintDef::PrimaryKey(columns.iter().map(|c| c.to_string()).collect())
}

pub fn unique(columns: &[&str]) -> ConstraintDef {
    validate_constraint_columns(columns);
    ConstraintDef::Unique(columns.iter().map(|c| c.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_derived_when_absent() {
        let idx = index().on(&["email"]);
        assert_eq!(idx.canonical_name("users"), "users_email_idx");
    }

    #[test]
    fn explicit_name_is_kept() {
        let idx = named_index("idx_email").on(&["email"]);
        assert_eq!(idx.canonical_name("users"), "idx_email");
    }

    #[test]
    #[should_panic(expected = "at least one column")]
    fn index_with_zero_columns_panics() {
        index().on(&[]);
    }

    #[test]
    #[should_panic(expected = "unique")]
    fn index_with_duplicate_columns_panics() {
        index().on(&["a", "a"]);
    }

    #[test]
    #[should_panic(expected = "at least one column")]
    fn primary_key_with_zero_columns_panics() {
        primary_key(&[]);
    }

    #[test]
    fn unique_constraint_records_columns() {
        let c = unique(&["tenant_id", "slug"]);
        assert_eq!(c.columns(), &["tenant_id".to_string(), "slug".to_string()]);
    }
}
