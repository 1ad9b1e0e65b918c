//! SQL value types and the template composer (C4), SQL parser adapter (C5)
//! and query analyzer (C6).

pub mod analyzer;
pub mod parser;
pub mod template;

pub use analyzer::{AccessedTable, FilterTriple, Operation, QueryAnalysis};
pub use template::{RawSql, SqlBuilder, SqlFragment};

use crate::error::DbError;
use crate::value::Value;

/// A reference to a column, as carried by `FilterObject`/`OrderObject` and
/// produced by an attached `Column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// `None` when the column has not yet been attached to a table; the
    /// composer refuses to serialize such a reference.
    pub table_db_name: Option<String>,
    pub column_db_name: String,
    /// Set only for `generatedAlwaysAs` columns interpolated with an alias
    /// form: the composer emits `"<expr> AS <alias>"` instead of a plain
    /// qualified reference.
    pub generated_expr: Option<String>,
}

impl ColumnRef {
    pub fn unattached(column_db_name: impl Into<String>) -> Self {
        ColumnRef {
            table_db_name: None,
            column_db_name: column_db_name.into(),
            generated_expr: None,
        }
    }

    pub fn qualified(&self) -> Result<String, DbError> {
        let table = self.table_db_name.as_ref().ok_or_else(|| {
            DbError::InvalidTemplateValue(format!(
                "column '{}' is not attached to a table",
                self.column_db_name
            ))
        })?;
        if let Some(expr) = &self.generated_expr {
            Ok(format!("{expr} AS {}", self.column_db_name))
        } else {
            Ok(format!("{table}.{}", self.column_db_name))
        }
    }
}

/// Comparison/membership operators a `FilterObject` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
                | Operator::Like
                | Operator::NotLike
        )
    }
}

/// The right-hand side of a `FilterObject`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    None,
    Scalar(Value),
    Pair(Value, Value),
    List(Vec<Value>),
}

/// A `{operator, left, right}` filter value, built by a `Column`'s filter
/// constructors (`eq`, `between`, `in_array`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterObject {
    pub operator: Operator,
    pub left: ColumnRef,
    pub right: FilterValue,
}

/// Sort direction carried by an `OrderObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A `{column, direction}` order-by value.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderObject {
    pub column: ColumnRef,
    pub direction: Direction,
}
