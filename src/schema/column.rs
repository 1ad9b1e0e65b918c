//! Column model (C2)
//!
//! A `Column` is an immutable value; every modifier is a fluent cloner that
//! returns a new column carrying updated metadata, matching the rest of the
//! schema layer's preference for plain data over interior mutability.

use std::fmt;
use std::sync::Arc;

use crate::error::DbError;
use crate::ident::to_db_name;
use crate::sql::{ColumnRef, FilterObject, FilterValue, Operator};
use crate::value::Value;

/// The physical SQLite storage class a column is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Text => "TEXT",
            StorageType::Blob => "BLOB",
        }
    }
}

/// The application-level representation a column's storage value decodes
/// to/from, beyond the raw storage type.
#[derive(Debug, Clone, PartialEq)]
pub enum AppType {
    Date,
    Boolean,
    Enum(Vec<String>),
    /// A JSON column references an opaque validator capability rather than
    /// a concrete schema representation.
    Json(Arc<dyn JsonSchema>),
    Id,
}

/// The capability interface JSON columns validate against. The core never
/// bundles a concrete validator; callers supply one.
pub trait JsonSchema: Send + Sync {
    fn parse(&self, value: &Value) -> Result<Value, DbError>;
    fn default(&self) -> Value;
}

impl fmt::Debug for dyn JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<json schema>")
    }
}

/// How a column participates in `Table::make`/`insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertType {
    Required,
    Optional,
    WithDefault,
    Virtual,
}

/// A literal DB-level default, as opposed to an application-level
/// `AppDefault` thunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// An application-level default: either a fixed value or a thunk invoked at
/// insert time (e.g. `uuid::new_v4`, `chrono::Utc::now`).
#[derive(Clone)]
pub enum AppDefault {
    Value(Value),
    Thunk(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl AppDefault {
    pub fn resolve(&self) -> Value {
        match self {
            AppDefault::Value(v) => v.clone(),
            AppDefault::Thunk(f) => f(),
        }
    }
}

impl fmt::Debug for AppDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppDefault::Value(v) => write!(f, "AppDefault::Value({v:?})"),
            AppDefault::Thunk(_) => write!(f, "AppDefault::Thunk(..)"),
        }
    }
}

/// The application<->storage codec pair. Both directions must be present
/// together whenever a column's `appType` stores via a non-trivial
/// representation.
#[derive(Clone)]
pub struct Codec {
    pub encode: Arc<dyn Fn(&Value) -> Result<Value, DbError> + Send + Sync>,
    pub decode: Arc<dyn Fn(&Value) -> Result<Value, DbError> + Send + Sync>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<codec>")
    }
}

/// Lazily resolves a `references(|| other_col)` forward reference to
/// `(table_db_name, column_db_name)`. Returns `None` if the referenced
/// column is not (yet, or ever) attached to a table: an unresolved forward
/// reference yields an fk-less column, not an error.
pub type ForeignKeyRef = Arc<dyn Fn() -> Option<(String, String)> + Send + Sync>;

/// A column's on-update thunk, invoked by the table's update path.
pub type OnUpdateFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Column metadata (C2), owned by its declaring `Table`.
#[derive(Clone)]
pub struct Column {
    pub name: String,
    pub db_name: String,
    pub storage_type: StorageType,
    pub app_type: Option<AppType>,
    pub insert_type: InsertType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKeyRef>,
    pub default: Option<Literal>,
    pub generated_always_as: Option<String>,
    pub renamed_from: Option<String>,
    pub app_default: Option<AppDefault>,
    pub on_update: Option<OnUpdateFn>,
    pub codec: Option<Codec>,
    /// Set once the column is registered on a `Table`.
    pub(crate) table_db_name: Option<String>,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("db_name", &self.db_name)
            .field("storage_type", &self.storage_type)
            .field("insert_type", &self.insert_type)
            .field("not_null", &self.not_null)
            .field("primary_key", &self.primary_key)
            .field("unique", &self.unique)
            .finish()
    }
}

impl Column {
    /// Declares a new column with the given host name and storage type.
    /// `insertType` starts `optional` unless later transitioned by a
    /// modifier.
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        let name = name.into();
        let db_name = to_db_name(&name);
        Column {
            name,
            db_name,
            storage_type,
            app_type: None,
            insert_type: InsertType::Optional,
            not_null: false,
            primary_key: false,
            unique: false,
            foreign_key: None,
            default: None,
            generated_always_as: None,
            renamed_from: None,
            app_default: None,
            on_update: None,
            codec: None,
            table_db_name: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Column::new(name, StorageType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Column::new(name, StorageType::Text)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Column::new(name, StorageType::Real)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Column::new(name, StorageType::Blob)
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        if !matches!(self.insert_type, InsertType::WithDefault) {
            self.insert_type = InsertType::Required;
        }
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_literal(mut self, literal: Literal) -> Self {
        self.default = Some(literal);
        self.insert_type = InsertType::WithDefault;
        self
    }

    /// `$defaultFn`: an application-level default thunk. No DB-level
    /// default is emitted.
    pub fn default_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.app_default = Some(AppDefault::Thunk(Arc::new(f)));
        self.insert_type = InsertType::WithDefault;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.app_default = Some(AppDefault::Value(value.into()));
        self.insert_type = InsertType::WithDefault;
        self
    }

    /// `$onUpdateFn`: a thunk consulted by the update path.
    pub fn on_update_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Records a lazy `foreignKey = "<table>.<column>"` reference. The
    /// closure is evaluated at snapshot/DDL-render time so tables may cycle
    /// declarationally.
    pub fn references(mut self, resolver: impl Fn() -> Option<(String, String)> + Send + Sync + 'static) -> Self {
        self.foreign_key = Some(Arc::new(resolver));
        self
    }

    pub fn generated_always_as(mut self, expr: impl Into<String>) -> Self {
        self.generated_always_as = Some(expr.into());
        self.insert_type = InsertType::Virtual;
        self
    }

    pub fn renamed_from(mut self, old_name: impl Into<String>) -> Self {
        self.renamed_from = Some(old_name.into());
        self
    }

    pub fn app_type(mut self, app_type: AppType) -> Self {
        self.app_type = Some(app_type);
        self
    }

    pub fn codec(
        mut self,
        encode: impl Fn(&Value) -> Result<Value, DbError> + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Result<Value, DbError> + Send + Sync + 'static,
    ) -> Self {
        self.codec = Some(Codec {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        });
        self
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.insert_type, InsertType::Virtual)
    }

    pub fn encode(&self, value: &Value) -> Result<Value, DbError> {
        match &self.codec {
            Some(codec) => (codec.encode)(value),
            None => Ok(value.clone()),
        }
    }

    pub fn decode(&self, value: &Value) -> Result<Value, DbError> {
        match &self.codec {
            Some(codec) => (codec.decode)(value),
            None => Ok(value.clone()),
        }
    }

    /// Builds this column's `ColumnRef`, for use in a template or filter.
    /// Unattached columns still produce a reference; the composer is what
    /// refuses to serialize it.
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef {
            table_db_name: self.table_db_name.clone(),
            column_db_name: self.db_name.clone(),
            generated_expr: None,
        }
    }

    fn filter(&self, operator: Operator, right: FilterValue) -> FilterObject {
        FilterObject {
            operator,
            left: self.column_ref(),
            right,
        }
    }

    /// Encodes a filter's scalar operand via this column's codec. A failing
    /// encode (e.g. `codecs::date_encode`/`boolean_encode` rejecting a
    /// malformed input) propagates as a `DbError` rather than silently
    /// becoming a `NULL` operand.
    fn encode_scalar(&self, value: impl Into<Value>) -> Result<Value, DbError> {
        self.encode(&value.into())
    }

    pub fn eq(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Eq, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn ne(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Ne, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn gt(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Gt, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn gte(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Gte, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn lt(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Lt, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn lte(&self, value: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(Operator::Lte, FilterValue::Scalar(self.encode_scalar(value)?)))
    }

    pub fn like(&self, pattern: impl Into<String>) -> FilterObject {
        self.filter(Operator::Like, FilterValue::Scalar(Value::Text(pattern.into())))
    }

    pub fn not_like(&self, pattern: impl Into<String>) -> FilterObject {
        self.filter(
            Operator::NotLike,
            FilterValue::Scalar(Value::Text(pattern.into())),
        )
    }

    pub fn between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(
            Operator::Between,
            FilterValue::Pair(self.encode_scalar(low)?, self.encode_scalar(high)?),
        ))
    }

    pub fn not_between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Result<FilterObject, DbError> {
        Ok(self.filter(
            Operator::NotBetween,
            FilterValue::Pair(self.encode_scalar(low)?, self.encode_scalar(high)?),
        ))
    }

    pub fn is_null(&self) -> FilterObject {
        self.filter(Operator::IsNull, FilterValue::None)
    }

    pub fn is_not_null(&self) -> FilterObject {
        self.filter(Operator::IsNotNull, FilterValue::None)
    }

    pub fn in_array(&self, values: Vec<impl Into<Value>>) -> Result<FilterObject, DbError> {
        let values = values
            .into_iter()
            .map(|v| self.encode_scalar(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.filter(Operator::In, FilterValue::List(values)))
    }

    pub fn not_in_array(&self, values: Vec<impl Into<Value>>) -> Result<FilterObject, DbError> {
        let values = values
            .into_iter()
            .map(|v| self.encode_scalar(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.filter(Operator::NotIn, FilterValue::List(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_null_transitions_insert_type_to_required() {
        let col = Column::text("name").not_null();
        assert_eq!(col.insert_type, InsertType::Required);
        assert!(col.not_null);
    }

    #[test]
    fn default_transitions_insert_type_to_with_default() {
        let col = Column::integer("age").not_null().default_literal(Literal::Integer(0));
        assert_eq!(col.insert_type, InsertType::WithDefault);
    }

    #[test]
    fn generated_always_as_marks_virtual() {
        let col = Column::text("full_name").generated_always_as("first || ' ' || last");
        assert!(col.is_virtual());
        assert_eq!(col.insert_type, InsertType::Virtual);
    }

    #[test]
    fn unattached_column_ref_has_no_table() {
        let col = Column::text("email");
        let r = col.column_ref();
        assert!(r.table_db_name.is_none());
        assert!(r.qualified().is_err());
    }

    #[test]
    fn filter_constructors_build_expected_shapes() {
        let col = Column::integer("age");
        let f = col.between(18, 65).unwrap();
        assert_eq!(f.operator, Operator::Between);
        assert!(matches!(f.right, FilterValue::Pair(_, _)));

        let f = col.is_null();
        assert_eq!(f.operator, Operator::IsNull);
        assert!(matches!(f.right, FilterValue::None));

        let f = col.in_array(vec![1, 2, 3]).unwrap();
        assert_eq!(f.operator, Operator::In);
        assert!(matches!(f.right, FilterValue::List(ref v) if v.len() == 3));
    }

    #[test]
    fn eq_propagates_a_codec_encode_failure_instead_of_filtering_on_null() {
        let col = Column::integer("created_at").codec(
            |_| Err(DbError::InvalidTemplateValue("always rejects".to_string())),
            |v| Ok(v.clone()),
        );
        let err = col.eq(1).unwrap_err();
        assert!(matches!(err, DbError::InvalidTemplateValue(_)));
    }

    #[test]
    fn unresolved_foreign_key_reference_is_not_an_error() {
        let col = Column::text("user_id").references(|| None);
        assert!(col.foreign_key.is_some());
        assert_eq!((col.foreign_key.as_ref().unwrap())(), None);
    }
}
