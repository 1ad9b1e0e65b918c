//! SQL parser adapter (C5)
//!
//! Wraps a SQLite-dialect parser to produce a typed tree covering SELECT
//! (optionally compound), INSERT, UPDATE, DELETE, WITH, joins, subqueries
//! and the usual expression/clause surface. `?` placeholders are already
//! tokenized as first-class parameter markers by `sqlparser`'s lexer, which
//! preserves their exact positional mapping against the original `params`
//! array without any sentinel-substitution pass.

use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::DbError;
use crate::sql::RawSql;

/// Parses a composed `RawSql`'s text into a single normalized statement.
pub fn parse(raw: &RawSql) -> Result<Statement, DbError> {
    let dialect = SQLiteDialect {};
    let mut statements = Parser::parse_sql(&dialect, &raw.text)
        .map_err(|e| DbError::ParseError(format!("{e} (in: {})", raw.text)))?;

    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(DbError::ParseError(format!(
            "no statement found in: {}",
            raw.text
        ))),
        n => Err(DbError::ParseError(format!(
            "expected exactly one statement, found {n} in: {}",
            raw.text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_select() {
        let raw = RawSql::new("SELECT id FROM users WHERE age > ?", vec![]);
        let stmt = parse(&raw).unwrap();
        assert!(matches!(stmt, Statement::Query(_)));
    }

    #[test]
    fn rejects_multiple_statements() {
        let raw = RawSql::new("SELECT 1; SELECT 2;", vec![]);
        assert!(parse(&raw).is_err());
    }

    #[test]
    fn rejects_invalid_sql() {
        let raw = RawSql::new("SELEKT * FORM users", vec![]);
        assert!(parse(&raw).is_err());
    }
}
