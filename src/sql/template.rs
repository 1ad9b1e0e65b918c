//! SQL template composer (C4)
//!
//! Interpolates literal text chunks and value fragments (columns, filters,
//! order-by, nested raw SQL, or bare scalars) into a single `RawSql`
//! `{text, params}` pair. The composer never interpolates string values
//! directly into the text; only `?` placeholders and pre-validated
//! identifiers.

use crate::error::DbError;
use crate::sql::{ColumnRef, Direction, FilterObject, FilterValue, OrderObject};
use crate::value::Value;

/// `{text, params}`: `?` placeholders in `text` correspond positionally to
/// `params`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSql {
    pub text: String,
    pub params: Vec<Value>,
}

impl RawSql {
    pub fn new(text: impl Into<String>, params: Vec<Value>) -> Self {
        RawSql {
            text: text.into(),
            params,
        }
    }

    pub fn placeholder_count(&self) -> usize {
        self.text.matches('?').count()
    }
}

/// A single piece of a template: either literal text or an interpolated
/// value. Produced by `SqlBuilder`'s chained calls rather than a host
/// tagged-template literal.
pub enum SqlFragment {
    Text(String),
    Column(ColumnRef),
    Filter(FilterObject),
    Order(OrderObject),
    Raw(RawSql),
    Scalar(Value),
}

/// Builds a `RawSql` from a sequence of literal chunks and interpolated
/// fragments, in source order: `literal, value, literal, value, ..., literal`.
#[derive(Default)]
pub struct SqlBuilder {
    fragments: Vec<SqlFragment>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        SqlBuilder {
            fragments: Vec::new(),
        }
    }

    pub fn text(mut self, chunk: impl Into<String>) -> Self {
        self.fragments.push(SqlFragment::Text(chunk.into()));
        self
    }

    pub fn column(mut self, col: ColumnRef) -> Self {
        self.fragments.push(SqlFragment::Column(col));
        self
    }

    pub fn filter(mut self, filter: FilterObject) -> Self {
        self.fragments.push(SqlFragment::Filter(filter));
        self
    }

    pub fn order(mut self, order: OrderObject) -> Self {
        self.fragments.push(SqlFragment::Order(order));
        self
    }

    pub fn raw(mut self, raw: RawSql) -> Self {
        self.fragments.push(SqlFragment::Raw(raw));
        self
    }

    pub fn scalar(mut self, value: impl Into<Value>) -> Self {
        self.fragments.push(SqlFragment::Scalar(value.into()));
        self
    }

    pub fn build(self) -> Result<RawSql, DbError> {
        let mut text = String::new();
        let mut params = Vec::new();

        for fragment in self.fragments {
            match fragment {
                SqlFragment::Text(chunk) => text.push_str(&chunk),
                SqlFragment::Column(col) => text.push_str(&col.qualified()?),
                SqlFragment::Order(order) => {
                    text.push_str(&order.column.qualified()?);
                    text.push(' ');
                    text.push_str(match order.direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    });
                }
                SqlFragment::Raw(raw) => {
                    text.push_str(&raw.text);
                    params.extend(raw.params);
                }
                SqlFragment::Scalar(value) => {
                    text.push('?');
                    params.push(value);
                }
                SqlFragment::Filter(filter) => {
                    render_filter(&filter, &mut text, &mut params)?;
                }
            }
        }

        Ok(RawSql { text, params })
    }
}

fn render_filter(
    filter: &FilterObject,
    text: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), DbError> {
    let col = filter.left.qualified()?;

    match &filter.right {
        FilterValue::None => {
            text.push_str(&format!("{col} {}", filter.operator.as_sql()));
        }
        FilterValue::Scalar(value) => {
            text.push_str(&format!("{col} {} ?", filter.operator.as_sql()));
            params.push(value.clone());
        }
        FilterValue::Pair(a, b) => {
            text.push_str(&format!("{col} {} ? AND ?", filter.operator.as_sql()));
            params.push(a.clone());
            params.push(b.clone());
        }
        FilterValue::List(values) => {
            if values.is_empty() {
                return Err(DbError::InvalidTemplateValue(
                    "IN/NOT IN filter requires at least one value".to_string(),
                ));
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            text.push_str(&format!(
                "{col} {} ({placeholders})",
                filter.operator.as_sql()
            ));
            params.extend(values.iter().cloned());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Operator;

    fn col(name: &str) -> ColumnRef {
        ColumnRef {
            table_db_name: Some("users".to_string()),
            column_db_name: name.to_string(),
            generated_expr: None,
        }
    }

    #[test]
    fn composes_text_and_column() {
        let sql = SqlBuilder::new()
            .text("SELECT * FROM users WHERE ")
            .column(col("id"))
            .text(" = 1")
            .build()
            .unwrap();
        assert_eq!(sql.text, "SELECT * FROM users WHERE users.id = 1");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn eq_filter_emits_one_param() {
        let filter = FilterObject {
            operator: Operator::Eq,
            left: col("age"),
            right: FilterValue::Scalar(Value::Integer(30)),
        };
        let sql = SqlBuilder::new().filter(filter).build().unwrap();
        assert_eq!(sql.text, "users.age = ?");
        assert_eq!(sql.params, vec![Value::Integer(30)]);
        assert_eq!(sql.placeholder_count(), sql.params.len());
    }

    #[test]
    fn between_filter_emits_two_params() {
        let filter = FilterObject {
            operator: Operator::Between,
            left: col("age"),
            right: FilterValue::Pair(Value::Integer(18), Value::Integer(65)),
        };
        let sql = SqlBuilder::new().filter(filter).build().unwrap();
        assert_eq!(sql.text, "users.age BETWEEN ? AND ?");
        assert_eq!(sql.params.len(), 2);
        assert_eq!(sql.placeholder_count(), 2);
    }

    #[test]
    fn in_filter_emits_one_param_per_element() {
        let filter = FilterObject {
            operator: Operator::In,
            left: col("id"),
            right: FilterValue::List(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]),
        };
        let sql = SqlBuilder::new().filter(filter).build().unwrap();
        assert_eq!(sql.text, "users.id IN (?, ?, ?)");
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn is_null_filter_emits_no_params() {
        let filter = FilterObject {
            operator: Operator::IsNull,
            left: col("deleted_at"),
            right: FilterValue::None,
        };
        let sql = SqlBuilder::new().filter(filter).build().unwrap();
        assert_eq!(sql.text, "users.deleted_at IS NULL");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn unattached_column_is_a_fatal_error() {
        let builder = SqlBuilder::new().column(ColumnRef::unattached("id"));
        assert!(matches!(
            builder.build(),
            Err(DbError::InvalidTemplateValue(_))
        ));
    }

    #[test]
    fn nested_raw_sql_splices_text_and_params() {
        let inner = RawSql::new("age > ?", vec![Value::Integer(18)]);
        let sql = SqlBuilder::new()
            .text("SELECT * FROM users WHERE ")
            .raw(inner)
            .build()
            .unwrap();
        assert_eq!(sql.text, "SELECT * FROM users WHERE age > ?");
        assert_eq!(sql.params, vec![Value::Integer(18)]);
    }
}
