//! Ready-made `$defaultFn` thunks for the two application-level defaults
//! every declared schema reaches for: a random id and the current
//! timestamp. Grounded on the teacher's own `models::history` convention
//! (`uuid::Uuid::new_v4().to_string()` for row ids, `chrono::Utc::now()`
//! for timestamps) rather than inventing a new one.

use crate::value::Value;

/// A `uuid`-appType default: a v4 UUID rendered as its canonical string
/// form, matching `HistoryEntry::new`'s `id` field in the teacher codebase.
pub fn uuid_v4() -> Value {
    Value::Text(uuid::Uuid::new_v4().to_string())
}

/// A `date`-appType default: the current UTC instant as epoch
/// milliseconds, the storage representation `appType = date` columns
/// round-trip through (see `ColumnCodecs::date`).
pub fn now_millis() -> Value {
    Value::Integer(chrono::Utc::now().timestamp_millis())
}

/// The codec pair for `appType = date` columns: storage is epoch
/// milliseconds (`Value::Integer`), encode/decode both pass the integer
/// through unchanged since the host-level representation of a date in this
/// value-map API *is* the epoch millisecond integer (see the design note on
/// host-driven type inference — a real binding layer narrows this to a
/// native date type at the code-generation boundary).
pub mod codecs {
    use crate::error::DbError;
    use crate::value::Value;

    pub fn date_encode(value: &Value) -> Result<Value, DbError> {
        match value {
            Value::Integer(_) => Ok(value.clone()),
            other => Err(DbError::InvalidTemplateValue(format!(
                "date column expects an epoch-millisecond integer, got {other:?}"
            ))),
        }
    }

    pub fn date_decode(value: &Value) -> Result<Value, DbError> {
        Ok(value.clone())
    }

    /// The codec pair for `appType = boolean` columns: storage is `0`/`1`.
    pub fn boolean_encode(value: &Value) -> Result<Value, DbError> {
        match value {
            Value::Integer(0) | Value::Integer(1) => Ok(value.clone()),
            other => Err(DbError::InvalidTemplateValue(format!(
                "boolean column expects 0 or 1, got {other:?}"
            ))),
        }
    }

    pub fn boolean_decode(value: &Value) -> Result<Value, DbError> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_default_produces_distinct_text_values() {
        let a = uuid_v4();
        let b = uuid_v4();
        assert_ne!(a, b);
        assert!(matches!(a, Value::Text(_)));
    }

    #[test]
    fn now_millis_produces_a_plausible_epoch_integer() {
        let v = now_millis();
        let Value::Integer(ms) = v else { panic!("expected integer") };
        assert!(ms > 1_700_000_000_000);
    }
}
