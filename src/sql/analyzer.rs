//! Query analyzer (C6)
//!
//! Walks a parsed statement to produce a normalized access summary: which
//! base tables the statement touches, which columns on each, and the
//! WHERE-clause predicates in disjunctive normal form (DNF).

use std::collections::HashMap;

use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr,
    Insert as SqlInsert, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, Value as SqlValue,
};

use crate::error::DbError;
use crate::sql::{FilterValue, Operator};
use crate::value::Value;

/// The statement kind a query analysis was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A single `col op value` conjunct inside a filter branch.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTriple {
    pub column: String,
    pub operator: Operator,
    pub value: FilterValue,
}

/// A base table reached by the statement, with the columns referenced on it
/// and its WHERE-clause predicates in DNF.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessedTable {
    pub name: String,
    pub columns: Vec<String>,
    pub filter_branches: Vec<Vec<FilterTriple>>,
}

impl AccessedTable {
    fn new(name: impl Into<String>) -> Self {
        AccessedTable {
            name: name.into(),
            columns: Vec::new(),
            filter_branches: Vec::new(),
        }
    }

    fn add_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }
}

/// `{type, accessedTables[]}` — the full result of analyzing one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub operation: Operation,
    pub accessed_tables: Vec<AccessedTable>,
}

impl QueryAnalysis {
    pub fn table(&self, name: &str) -> Option<&AccessedTable> {
        self.accessed_tables.iter().find(|t| t.name == name)
    }
}

/// A named target an unqualified/qualified column reference resolves to
/// within the FROM-scope currently being walked.
#[derive(Debug, Clone)]
enum Target {
    /// A real base table (or a CTE inlined down to its own base tables).
    Base(Vec<String>),
    /// A derived-table (subquery) alias; column refs into it cannot be
    /// attributed to a specific base table and are dropped.
    Opaque,
}

/// Per-statement analysis state threaded through the recursive walk.
struct Ctx<'p> {
    params: &'p [Value],
    param_cursor: usize,
    tables: Vec<AccessedTable>,
    /// Per-table DNF filter branches accumulated so far, built bottom-up as
    /// the WHERE/HAVING expression tree is folded.
    filters: HashMap<String, Vec<Vec<FilterTriple>>>,
    ctes: HashMap<String, Query>,
}

impl<'p> Ctx<'p> {
    fn new(params: &'p [Value]) -> Self {
        Ctx {
            params,
            param_cursor: 0,
            tables: Vec::new(),
            filters: HashMap::new(),
            ctes: HashMap::new(),
        }
    }

    fn touch(&mut self, name: &str) {
        if !self.tables.iter().any(|t| t.name == name) {
            self.tables.push(AccessedTable::new(name));
        }
    }

    fn add_column(&mut self, name: &str, column: &str) {
        self.touch(name);
        if let Some(t) = self.tables.iter_mut().find(|t| t.name == name) {
            t.add_column(column);
        }
    }

    fn next_param(&mut self) -> Value {
        let v = self.params.get(self.param_cursor).cloned().unwrap_or(Value::Null);
        self.param_cursor += 1;
        v
    }

    fn finish(mut self) -> Vec<AccessedTable> {
        for t in &mut self.tables {
            if let Some(branches) = self.filters.remove(&t.name) {
                t.filter_branches = branches;
            } else {
                t.filter_branches = vec![vec![]];
            }
        }
        self.tables
    }
}

/// Entry point: analyzes a fully parsed statement given the original
/// positional `params` array (so placeholder values can be resolved).
pub fn analyze(statement: &Statement, params: &[Value]) -> Result<QueryAnalysis, DbError> {
    let mut ctx = Ctx::new(params);

    let operation = match statement {
        Statement::Query(query) => {
            analyze_query(query, &mut ctx);
            Operation::Select
        }
        Statement::Insert(insert) => {
            analyze_insert(insert, &mut ctx);
            Operation::Insert
        }
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let mut alias_map = HashMap::new();
            resolve_table_with_joins(table, &mut ctx, &mut alias_map);
            for assignment in assignments {
                let col = assignment_column_name(assignment);
                if let (Some(col), Some(name)) = (col, sole_base_table(&alias_map)) {
                    ctx.add_column(&name, &col);
                }
            }
            if let Some(selection) = selection {
                process_expr_for_columns(selection, &alias_map, &mut ctx);
                let branches = process_where(selection, &alias_map, &mut ctx);
                merge_branches(&mut ctx.filters, branches);
            }
            Operation::Update
        }
        Statement::Delete(delete) => {
            let mut alias_map = HashMap::new();
            let froms: Vec<&TableWithJoins> = match &delete.from {
                FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t.iter().collect(),
            };
            for twj in froms {
                resolve_table_with_joins(twj, &mut ctx, &mut alias_map);
            }
            if let Some(selection) = &delete.selection {
                process_expr_for_columns(selection, &alias_map, &mut ctx);
                let branches = process_where(selection, &alias_map, &mut ctx);
                merge_branches(&mut ctx.filters, branches);
            }
            Operation::Delete
        }
        _ => {
            return Err(DbError::ParseError(
                "unsupported statement type for analysis".to_string(),
            ))
        }
    };

    Ok(QueryAnalysis {
        operation,
        accessed_tables: ctx.finish(),
    })
}

fn sole_base_table(alias_map: &HashMap<String, Target>) -> Option<String> {
    let mut names: Vec<String> = alias_map
        .values()
        .filter_map(|t| match t {
            Target::Base(names) if names.len() == 1 => Some(names[0].clone()),
            _ => None,
        })
        .collect();
    names.dedup();
    if names.len() == 1 {
        names.pop()
    } else {
        None
    }
}

fn assignment_column_name(assignment: &sqlparser::ast::Assignment) -> Option<String> {
    use sqlparser::ast::AssignmentTarget;
    match &assignment.target {
        AssignmentTarget::ColumnName(name) => name.0.last().map(|i| i.value.clone()),
        _ => None,
    }
}

fn analyze_insert(insert: &SqlInsert, ctx: &mut Ctx) {
    let table_name = insert.table_name.to_string();
    ctx.touch(&table_name);
    for col in &insert.columns {
        ctx.add_column(&table_name, &col.value);
    }
    if let Some(source) = &insert.source {
        analyze_query(source, ctx);
    }
}

fn analyze_query(query: &Query, ctx: &mut Ctx) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ctx.ctes
                .insert(cte.alias.name.value.clone(), (*cte.query).clone());
        }
    }
    analyze_set_expr(&query.body, ctx);
    for order in &query.order_by {
        process_expr_for_columns(&order.expr, &HashMap::new(), ctx);
    }
}

fn analyze_set_expr(set_expr: &SetExpr, ctx: &mut Ctx) {
    match set_expr {
        SetExpr::Select(select) => analyze_select(select, ctx),
        SetExpr::Query(q) => analyze_query(q, ctx),
        SetExpr::SetOperation { left, right, .. } => {
            analyze_set_expr(left, ctx);
            analyze_set_expr(right, ctx);
        }
        _ => {}
    }
}

fn analyze_select(select: &Select, ctx: &mut Ctx) {
    let mut alias_map: HashMap<String, Target> = HashMap::new();

    for twj in &select.from {
        resolve_table_with_joins(twj, ctx, &mut alias_map);
    }

    let has_wildcard = select
        .projection
        .iter()
        .any(|item| matches!(item, SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)));

    if !has_wildcard {
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => process_expr_for_columns(expr, &alias_map, ctx),
                SelectItem::ExprWithAlias { expr, .. } => {
                    process_expr_for_columns(expr, &alias_map, ctx)
                }
                _ => {}
            }
        }
    }

    let group_by_cols: Vec<String> = match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => {
            for expr in exprs {
                process_expr_for_columns(expr, &alias_map, ctx);
            }
            exprs
                .iter()
                .filter_map(|e| expr_column_name(e))
                .collect()
        }
        GroupByExpr::All(_) => Vec::new(),
    };

    if let Some(selection) = &select.selection {
        process_expr_for_columns(selection, &alias_map, ctx);
        let branches = process_where(selection, &alias_map, ctx);
        merge_branches(&mut ctx.filters, branches);
    }

    if let Some(having) = &select.having {
        process_expr_for_columns(having, &alias_map, ctx);
        let branches = process_having(having, &alias_map, &group_by_cols, ctx);
        merge_branches(&mut ctx.filters, branches);
    }
}

fn resolve_table_with_joins(
    twj: &TableWithJoins,
    ctx: &mut Ctx,
    alias_map: &mut HashMap<String, Target>,
) {
    resolve_table_factor(&twj.relation, ctx, alias_map);
    for join in &twj.joins {
        resolve_table_factor(&join.relation, ctx, alias_map);
        use sqlparser::ast::{JoinConstraint, JoinOperator};
        let constraint = match &join.join_operator {
            JoinOperator::Inner(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c) => Some(c),
            _ => None,
        };
        if let Some(JoinConstraint::On(expr)) = constraint {
            process_expr_for_columns(expr, alias_map, ctx);
        }
    }
}

fn resolve_table_factor(tf: &TableFactor, ctx: &mut Ctx, alias_map: &mut HashMap<String, Target>) {
    match tf {
        TableFactor::Table { name, alias, .. } => {
            let raw_name = name.to_string();
            let key = alias
                .as_ref()
                .map(|a| a.name.value.to_lowercase())
                .unwrap_or_else(|| raw_name.to_lowercase());

            if let Some(cte_query) = ctx.ctes.get(&raw_name).cloned() {
                let before = ctx.tables.len();
                analyze_query(&cte_query, ctx);
                let inlined: Vec<String> = ctx.tables[before..].iter().map(|t| t.name.clone()).collect();
                let inlined = if inlined.is_empty() {
                    inlined_from(&cte_query)
                } else {
                    inlined
                };
                alias_map.insert(key, Target::Base(inlined));
            } else {
                ctx.touch(&raw_name);
                alias_map.insert(key, Target::Base(vec![raw_name.clone()]));
                alias_map.insert(raw_name.to_lowercase(), Target::Base(vec![raw_name]));
            }
        }
        TableFactor::Derived { subquery, alias, .. } => {
            analyze_query(subquery, ctx);
            if let Some(a) = alias {
                alias_map.insert(a.name.value.to_lowercase(), Target::Opaque);
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            resolve_table_with_joins(table_with_joins, ctx, alias_map);
        }
        _ => {}
    }
}

/// Best-effort fallback: if a CTE's query produced no new tables (e.g. it
/// was already inlined earlier), recovers the names structurally.
fn inlined_from(_query: &Query) -> Vec<String> {
    Vec::new()
}

fn process_expr_for_columns(expr: &Expr, alias_map: &HashMap<String, Target>, ctx: &mut Ctx) {
    match expr {
        Expr::Identifier(ident) => {
            if let Some(name) = sole_base_table(alias_map) {
                ctx.add_column(&name, &ident.value);
            }
        }
        Expr::CompoundIdentifier(parts) => {
            if parts.len() >= 2 {
                let qualifier = parts[parts.len() - 2].value.to_lowercase();
                let column = &parts[parts.len() - 1].value;
                if let Some(Target::Base(names)) = alias_map.get(&qualifier) {
                    for name in names {
                        ctx.add_column(name, column);
                    }
                }
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            process_expr_for_columns(left, alias_map, ctx);
            process_expr_for_columns(right, alias_map, ctx);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => {
            process_expr_for_columns(expr, alias_map, ctx)
        }
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            process_expr_for_columns(inner, alias_map, ctx)
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            process_expr_for_columns(expr, alias_map, ctx);
            process_expr_for_columns(low, alias_map, ctx);
            process_expr_for_columns(high, alias_map, ctx);
        }
        Expr::InList { expr, list, .. } => {
            process_expr_for_columns(expr, alias_map, ctx);
            for item in list {
                process_expr_for_columns(item, alias_map, ctx);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            process_expr_for_columns(expr, alias_map, ctx);
            analyze_query(subquery, ctx);
        }
        Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => analyze_query(subquery, ctx),
        Expr::Like { expr, pattern, .. } => {
            process_expr_for_columns(expr, alias_map, ctx);
            process_expr_for_columns(pattern, alias_map, ctx);
        }
        Expr::Function(func) => {
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Named { arg, .. } | FunctionArg::Unnamed(arg) => arg,
                    };
                    if let FunctionArgExpr::Expr(e) = arg_expr {
                        process_expr_for_columns(e, alias_map, ctx);
                    }
                }
            }
        }
        _ => {}
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        _ => None,
    }
}

/// Resolves `expr` as a column reference, returning `(table_name, column)`.
fn resolve_column(expr: &Expr, alias_map: &HashMap<String, Target>) -> Option<(String, String)> {
    match expr {
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let qualifier = parts[parts.len() - 2].value.to_lowercase();
            let column = parts[parts.len() - 1].value.clone();
            match alias_map.get(&qualifier) {
                Some(Target::Base(names)) if names.len() == 1 => Some((names[0].clone(), column)),
                _ => None,
            }
        }
        Expr::Identifier(ident) => {
            sole_base_table(alias_map).map(|name| (name, ident.value.clone()))
        }
        _ => None,
    }
}

fn sql_value_to_value(v: &SqlValue, ctx: &mut Ctx) -> Option<Value> {
    match v {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(Value::Integer(i))
            } else {
                n.parse::<f64>().ok().map(Value::Real)
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Some(Value::Text(s.clone()))
        }
        SqlValue::Boolean(b) => Some(Value::Integer(if *b { 1 } else { 0 })),
        SqlValue::Null => Some(Value::Null),
        SqlValue::Placeholder(_) => Some(ctx.next_param()),
        _ => None,
    }
}

fn expr_to_literal(expr: &Expr, ctx: &mut Ctx) -> Option<Value> {
    match expr {
        Expr::Value(v) => sql_value_to_value(v, ctx),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr,
        } => match expr_to_literal(expr, ctx)? {
            Value::Integer(i) => Some(Value::Integer(-i)),
            Value::Real(r) => Some(Value::Real(-r)),
            other => Some(other),
        },
        _ => None,
    }
}

fn binary_operator_to_operator(op: &BinaryOperator) -> Option<Operator> {
    match op {
        BinaryOperator::Eq => Some(Operator::Eq),
        BinaryOperator::NotEq => Some(Operator::Ne),
        BinaryOperator::Lt => Some(Operator::Lt),
        BinaryOperator::LtEq => Some(Operator::Lte),
        BinaryOperator::Gt => Some(Operator::Gt),
        BinaryOperator::GtEq => Some(Operator::Gte),
        _ => None,
    }
}

/// Folds a WHERE/HAVING expression into per-table DNF filter branches.
fn process_where(
    expr: &Expr,
    alias_map: &HashMap<String, Target>,
    ctx: &mut Ctx,
) -> HashMap<String, Vec<Vec<FilterTriple>>> {
    match expr {
        Expr::Nested(inner) => process_where(inner, alias_map, ctx),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let l = process_where(left, alias_map, ctx);
            let r = process_where(right, alias_map, ctx);
            and_branches(l, r)
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            let l = process_where(left, alias_map, ctx);
            let r = process_where(right, alias_map, ctx);
            or_branches(l, r)
        }
        Expr::BinaryOp { left, op, right } => {
            let mut map = HashMap::new();
            if let Some(operator) = binary_operator_to_operator(op) {
                if let Some((table, column)) = resolve_column(left, alias_map) {
                    if resolve_column(right, alias_map).is_none() {
                        if let Some(value) = expr_to_literal(right, ctx) {
                            map.insert(
                                table,
                                vec![vec![FilterTriple {
                                    column,
                                    operator,
                                    value: FilterValue::Scalar(value),
                                }]],
                            );
                        }
                    }
                    // column-to-column equality contributes no filter
                } else if let Some((table, column)) = resolve_column(right, alias_map) {
                    if let Some(value) = expr_to_literal(left, ctx) {
                        map.insert(
                            table,
                            vec![vec![FilterTriple {
                                column,
                                operator,
                                value: FilterValue::Scalar(value),
                            }]],
                        );
                    }
                }
            }
            map
        }
        Expr::IsNull(inner) => leaf_map(inner, alias_map, Operator::IsNull, FilterValue::None),
        Expr::IsNotNull(inner) => {
            leaf_map(inner, alias_map, Operator::IsNotNull, FilterValue::None)
        }
        Expr::Between {
            expr,
            negated,
            low,
            high,
        } => {
            let mut map = HashMap::new();
            if let Some((table, column)) = resolve_column(expr, alias_map) {
                if let (Some(lo), Some(hi)) =
                    (expr_to_literal(low, ctx), expr_to_literal(high, ctx))
                {
                    let operator = if *negated {
                        Operator::NotBetween
                    } else {
                        Operator::Between
                    };
                    map.insert(
                        table,
                        vec![vec![FilterTriple {
                            column,
                            operator,
                            value: FilterValue::Pair(lo, hi),
                        }]],
                    );
                }
            }
            map
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let mut map = HashMap::new();
            if let Some((table, column)) = resolve_column(expr, alias_map) {
                let values: Option<Vec<Value>> =
                    list.iter().map(|e| expr_to_literal(e, ctx)).collect();
                if let Some(values) = values {
                    let operator = if *negated {
                        Operator::NotIn
                    } else {
                        Operator::In
                    };
                    map.insert(
                        table,
                        vec![vec![FilterTriple {
                            column,
                            operator,
                            value: FilterValue::List(values),
                        }]],
                    );
                }
            }
            map
        }
        _ => HashMap::new(),
    }
}

fn leaf_map(
    inner: &Expr,
    alias_map: &HashMap<String, Target>,
    operator: Operator,
    value: FilterValue,
) -> HashMap<String, Vec<Vec<FilterTriple>>> {
    let mut map = HashMap::new();
    if let Some((table, column)) = resolve_column(inner, alias_map) {
        map.insert(
            table,
            vec![vec![FilterTriple {
                column,
                operator,
                value,
            }]],
        );
    }
    map
}

fn and_branches(
    mut l: HashMap<String, Vec<Vec<FilterTriple>>>,
    mut r: HashMap<String, Vec<Vec<FilterTriple>>>,
) -> HashMap<String, Vec<Vec<FilterTriple>>> {
    let mut tables: Vec<String> = l.keys().chain(r.keys()).cloned().collect();
    tables.sort();
    tables.dedup();

    let mut result = HashMap::new();
    for table in tables {
        let l_branches = l.remove(&table).unwrap_or_else(|| vec![vec![]]);
        let r_branches = r.remove(&table).unwrap_or_else(|| vec![vec![]]);
        let mut cross = Vec::new();
        for lb in &l_branches {
            for rb in &r_branches {
                let mut combined = lb.clone();
                combined.extend(rb.clone());
                cross.push(combined);
            }
        }
        result.insert(table, cross);
    }
    result
}

fn or_branches(
    mut l: HashMap<String, Vec<Vec<FilterTriple>>>,
    mut r: HashMap<String, Vec<Vec<FilterTriple>>>,
) -> HashMap<String, Vec<Vec<FilterTriple>>> {
    let mut tables: Vec<String> = l.keys().chain(r.keys()).cloned().collect();
    tables.sort();
    tables.dedup();

    let mut result = HashMap::new();
    for table in tables {
        let mut branches = l.remove(&table).unwrap_or_default();
        branches.extend(r.remove(&table).unwrap_or_default());
        result.insert(table, branches);
    }
    result
}

fn merge_branches(
    dest: &mut HashMap<String, Vec<Vec<FilterTriple>>>,
    src: HashMap<String, Vec<Vec<FilterTriple>>>,
) {
    for (table, branches) in src {
        dest.insert(table, branches);
    }
}

/// Approximates `HAVING COUNT(...) op value` as a filter on the COUNT
/// argument, or on the GROUP BY key if the call is `COUNT(*)`. This is an
/// explicitly heuristic carry-over (see DESIGN.md open question).
fn process_having(
    expr: &Expr,
    alias_map: &HashMap<String, Target>,
    group_by_cols: &[String],
    ctx: &mut Ctx,
) -> HashMap<String, Vec<Vec<FilterTriple>>> {
    if let Expr::BinaryOp { left, op, right } = expr {
        if let (Expr::Function(func), Some(operator)) =
            (left.as_ref(), binary_operator_to_operator(op))
        {
            if func.name.to_string().to_uppercase() == "COUNT" {
                if let Some(value) = expr_to_literal(right, ctx) {
                    let is_star = matches!(&func.args, FunctionArguments::List(list)
                        if list.args.iter().any(|a| matches!(a, FunctionArg::Unnamed(FunctionArgExpr::Wildcard))));

                    let column = if is_star {
                        group_by_cols.first().cloned()
                    } else if let FunctionArguments::List(list) = &func.args {
                        list.args.iter().find_map(|a| match a {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
                            | FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(e),
                                ..
                            } => expr_column_name(e),
                            _ => None,
                        })
                    } else {
                        None
                    };

                    if let (Some(column), Some(table)) = (column, sole_base_table(alias_map)) {
                        let mut map = HashMap::new();
                        map.insert(
                            table,
                            vec![vec![FilterTriple {
                                column,
                                operator,
                                value: FilterValue::Scalar(value),
                            }]],
                        );
                        return map;
                    }
                }
            }
        }
    }
    HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser;
    use crate::sql::template::RawSql;

    fn analyze_sql(text: &str, params: Vec<Value>) -> QueryAnalysis {
        let raw = RawSql::new(text, params);
        let stmt = parser::parse(&raw).unwrap();
        analyze(&stmt, &raw.params).unwrap()
    }

    #[test]
    fn select_single_column_has_one_table_and_empty_branch() {
        let analysis = analyze_sql("SELECT id FROM users", vec![]);
        assert_eq!(analysis.operation, Operation::Select);
        assert_eq!(analysis.accessed_tables.len(), 1);
        let users = analysis.table("users").unwrap();
        assert_eq!(users.columns, vec!["id".to_string()]);
        assert_eq!(users.filter_branches, vec![vec![]]);
    }

    #[test]
    fn select_star_leaves_columns_empty() {
        let analysis = analyze_sql("SELECT * FROM users", vec![]);
        let users = analysis.table("users").unwrap();
        assert!(users.columns.is_empty());
    }

    #[test]
    fn or_in_where_splits_into_two_branches() {
        let analysis = analyze_sql(
            "SELECT * FROM users WHERE age < ? OR active = ?",
            vec![Value::Integer(18), Value::Integer(1)],
        );
        let users = analysis.table("users").unwrap();
        assert_eq!(users.filter_branches.len(), 2);
        assert!(users.filter_branches.iter().any(|b| b
            == &vec![FilterTriple {
                column: "age".to_string(),
                operator: Operator::Lt,
                value: FilterValue::Scalar(Value::Integer(18)),
            }]));
        assert!(users.filter_branches.iter().any(|b| b
            == &vec![FilterTriple {
                column: "active".to_string(),
                operator: Operator::Eq,
                value: FilterValue::Scalar(Value::Integer(1)),
            }]));
    }

    #[test]
    fn and_in_where_keeps_a_single_branch_with_both_conjuncts() {
        let analysis = analyze_sql(
            "SELECT * FROM users WHERE user_id = ? AND status = ?",
            vec![Value::Integer(123), Value::Text("x".to_string())],
        );
        let users = analysis.table("users").unwrap();
        assert_eq!(users.filter_branches.len(), 1);
        assert_eq!(users.filter_branches[0].len(), 2);
    }

    #[test]
    fn join_resolves_columns_to_their_base_table_via_alias() {
        let analysis = analyze_sql(
            "SELECT * FROM users u JOIN orders o ON u.id = o.user_id",
            vec![],
        );
        assert_eq!(analysis.accessed_tables.len(), 2);
        assert!(analysis.table("users").is_some());
        assert!(analysis.table("orders").is_some());
    }

    #[test]
    fn cte_name_is_not_reported_as_an_accessed_table() {
        let analysis = analyze_sql("WITH t AS (SELECT * FROM a) SELECT id FROM t", vec![]);
        assert_eq!(analysis.accessed_tables.len(), 1);
        assert!(analysis.table("a").is_some());
        assert!(analysis.table("t").is_none());
    }

    #[test]
    fn insert_touches_its_target_table_and_columns() {
        let analysis = analyze_sql(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            vec![Value::Integer(1), Value::Text("Ada".to_string())],
        );
        assert_eq!(analysis.operation, Operation::Insert);
        let users = analysis.table("users").unwrap();
        assert_eq!(users.columns, vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn update_processes_where_clause_into_filter_branches() {
        let analysis = analyze_sql(
            "UPDATE users SET name = ? WHERE id = ?",
            vec![Value::Text("Ada".to_string()), Value::Integer(1)],
        );
        assert_eq!(analysis.operation, Operation::Update);
        let users = analysis.table("users").unwrap();
        assert_eq!(
            users.filter_branches,
            vec![vec![FilterTriple {
                column: "id".to_string(),
                operator: Operator::Eq,
                value: FilterValue::Scalar(Value::Integer(1)),
            }]]
        );
    }

    #[test]
    fn delete_touches_its_target_table() {
        let analysis = analyze_sql("DELETE FROM users WHERE id = ?", vec![Value::Integer(1)]);
        assert_eq!(analysis.operation, Operation::Delete);
        assert!(analysis.table("users").is_some());
    }

    #[test]
    fn column_to_column_equality_contributes_no_filter() {
        let analysis = analyze_sql(
            "SELECT * FROM users u JOIN orders o ON u.id = o.user_id WHERE u.id = o.user_id",
            vec![],
        );
        let users = analysis.table("users").unwrap();
        assert_eq!(users.filter_branches, vec![vec![]]);
    }
}
