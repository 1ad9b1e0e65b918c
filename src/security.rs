//! Security engine (C7)
//!
//! Three checks run, in order, for every table a query accesses:
//! immutable-field rules (update only), a table's custom security rule,
//! and any WHERE-clause predicate checks the table requires. The first
//! check to deny wins; the driver is never reached on a denial.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DbError;
use crate::sql::{AccessedTable, FilterTriple, FilterValue, Operation, Operator, QueryAnalysis};
use crate::value::{Row, Value};

/// The application-level user object attached to a facade, passed
/// unchanged to security rules.
pub type Principal = serde_json::Value;

/// `{type, accessedTables, data?, analysis}` — the context a custom
/// security rule is evaluated against.
pub struct QueryContext<'a> {
    pub operation: Operation,
    pub analysis: &'a QueryAnalysis,
    pub data: Option<&'a Row>,
}

/// A table's custom security rule. Returning `false` denies the operation;
/// rules are `async` and awaited, matching the rest of this crate's
/// `async_trait` seams (the driver trait, the migration applier).
#[async_trait]
pub trait SecurityRule: Send + Sync {
    async fn check(&self, ctx: &QueryContext<'_>, principal: &Principal) -> bool;
}

/// Wraps a plain synchronous closure as a `SecurityRule`, for the common
/// case of `(q, u) => q.data.owner == u.id`-shaped rules that need no
/// awaiting of their own.
pub struct FnRule<F>(F);

#[async_trait]
impl<F> SecurityRule for FnRule<F>
where
    F: Fn(&QueryContext<'_>, &Principal) -> bool + Send + Sync,
{
    async fn check(&self, ctx: &QueryContext<'_>, principal: &Principal) -> bool {
        (self.0)(ctx, principal)
    }
}

pub fn rule_fn<F>(f: F) -> FnRule<F>
where
    F: Fn(&QueryContext<'_>, &Principal) -> bool + Send + Sync,
{
    FnRule(f)
}

/// `{tableName, fieldName}`: an update whose `data` contains this key is
/// rejected outright, independent of value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutableRule {
    pub field_name: String,
}

/// Derives the `{columnName, operator, value}` a query must satisfy from
/// the current principal. Returns `None` when the check does not apply
/// (e.g. the principal is exempt).
pub type WhereCheckFn = Arc<dyn Fn(&Principal) -> Option<(String, Operator, Value)> + Send + Sync>;

/// Runs the immutable-field check for an update.
pub fn check_immutable(
    table_name: &str,
    rules: &[ImmutableRule],
    data: &Row,
) -> Result<(), DbError> {
    for rule in rules {
        if data.contains_key(&rule.field_name) {
            tracing::warn!(table = table_name, field = %rule.field_name, "immutable field violation");
            return Err(DbError::ImmutableFieldViolation {
                table: table_name.to_string(),
                operation: "update".to_string(),
            });
        }
    }
    Ok(())
}

/// Runs a table's custom security rule, if it has one.
pub async fn check_custom_rule(
    table_name: &str,
    operation: Operation,
    rule: Option<&Arc<dyn SecurityRule>>,
    ctx: &QueryContext<'_>,
    principal: &Principal,
) -> Result<(), DbError> {
    if let Some(rule) = rule {
        if !rule.check(ctx, principal).await {
            tracing::warn!(table = table_name, operation = operation.as_str(), "security rule denied");
            return Err(DbError::SecurityDenied {
                table: table_name.to_string(),
                operation: operation.as_str().to_string(),
            });
        }
    }
    Ok(())
}

/// Runs every WHERE-clause predicate check a table requires against the
/// analyzed DNF for that table. INSERT is always exempt (it has no WHERE).
pub fn check_where_predicates(
    table_name: &str,
    operation: Operation,
    checks: &[WhereCheckFn],
    accessed: Option<&AccessedTable>,
    principal: &Principal,
) -> Result<(), DbError> {
    if matches!(operation, Operation::Insert) {
        return Ok(());
    }

    for check in checks {
        let Some((column, operator, value)) = check(principal) else {
            continue;
        };

        let branches = accessed.map(|t| t.filter_branches.as_slice()).unwrap_or(&[]);
        let satisfied = !branches.is_empty()
            && branches
                .iter()
                .all(|branch| branch_matches(branch, &column, operator, &value));

        if !satisfied {
            tracing::warn!(
                table = table_name,
                operation = operation.as_str(),
                column = %column,
                "where-clause predicate not satisfied"
            );
            return Err(DbError::SecurityDenied {
                table: table_name.to_string(),
                operation: operation.as_str().to_string(),
            });
        }
    }
    Ok(())
}

fn branch_matches(
    branch: &[FilterTriple],
    column: &str,
    operator: Operator,
    value: &Value,
) -> bool {
    branch.iter().any(|triple| {
        triple.column == column
            && triple.operator == operator
            && matches!(&triple.value, FilterValue::Scalar(v) if v == value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{AccessedTable as AT, FilterTriple as FT};

    fn branch(col: &str, op: Operator, value: Value) -> Vec<FT> {
        vec![FT {
            column: col.to_string(),
            operator: op,
            value: FilterValue::Scalar(value),
        }]
    }

    #[test]
    fn immutable_rule_rejects_on_key_presence() {
        let rules = vec![ImmutableRule {
            field_name: "id".to_string(),
        }];
        let mut data = Row::new();
        data.insert("id".to_string(), Value::Text("u1".to_string()));
        assert!(check_immutable("users", &rules, &data).is_err());
    }

    #[test]
    fn immutable_rule_allows_when_key_absent() {
        let rules = vec![ImmutableRule {
            field_name: "id".to_string(),
        }];
        let mut data = Row::new();
        data.insert("name".to_string(), Value::Text("Alice".to_string()));
        assert!(check_immutable("users", &rules, &data).is_ok());
    }

    #[test]
    fn where_predicate_passes_for_and_fails_for_or() {
        let check: WhereCheckFn = Arc::new(|_: &Principal| {
            Some(("user_id".to_string(), Operator::Eq, Value::Integer(123)))
        });

        let and_table = AT {
            name: "posts".to_string(),
            columns: vec![],
            filter_branches: vec![{
                let mut b = branch("user_id", Operator::Eq, Value::Integer(123));
                b.extend(branch("status", Operator::Eq, Value::Text("x".to_string())));
                b
            }],
        };
        assert!(check_where_predicates(
            "posts",
            Operation::Select,
            &[check.clone()],
            Some(&and_table),
            &serde_json::json!({}),
        )
        .is_ok());

        let or_table = AT {
            name: "posts".to_string(),
            columns: vec![],
            filter_branches: vec![
                branch("user_id", Operator::Eq, Value::Integer(123)),
                branch("status", Operator::Eq, Value::Text("x".to_string())),
            ],
        };
        assert!(check_where_predicates(
            "posts",
            Operation::Select,
            &[check.clone()],
            Some(&or_table),
            &serde_json::json!({}),
        )
        .is_err());

        let both_branches_table = AT {
            name: "posts".to_string(),
            columns: vec![],
            filter_branches: vec![
                {
                    let mut b = branch("user_id", Operator::Eq, Value::Integer(123));
                    b.extend(branch("a", Operator::Eq, Value::Integer(1)));
                    b
                },
                {
                    let mut b = branch("user_id", Operator::Eq, Value::Integer(123));
                    b.extend(branch("b", Operator::Eq, Value::Integer(2)));
                    b
                },
            ],
        };
        assert!(check_where_predicates(
            "posts",
            Operation::Select,
            &[check],
            Some(&both_branches_table),
            &serde_json::json!({}),
        )
        .is_ok());
    }

    #[test]
    fn insert_is_exempt_from_where_predicate_checks() {
        let check: WhereCheckFn =
            Arc::new(|_: &Principal| Some(("user_id".to_string(), Operator::Eq, Value::Integer(123))));
        assert!(check_where_predicates("posts", Operation::Insert, &[check], None, &serde_json::json!({})).is_ok());
    }
}
