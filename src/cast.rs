use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use sea_query::Value;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Storage format of timestamps inside the attribute map.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Boolean,
    DateTime,
    Integer,
    Float,
    String,
    Json,
}

impl Cast {
    /// Coerces an attribute value. Values that cannot be coerced are kept as
    /// they are.
    pub fn apply(self, value: JsonValue) -> JsonValue {
        if value.is_null() {
            return value;
        }
        let coerced = match (self, &value) {
            (Cast::Boolean, JsonValue::Bool(_)) => Some(value.clone()),
            (Cast::Boolean, JsonValue::Number(n)) => {
                n.as_f64().map(|f| JsonValue::Bool(f != 0.0))
            }
            (Cast::Boolean, JsonValue::String(s)) => match s.trim() {
                "1" | "true" => Some(JsonValue::Bool(true)),
                "" | "0" | "false" => Some(JsonValue::Bool(false)),
                _ => None,
            },
            (Cast::DateTime, JsonValue::String(s)) => {
                parse_timestamp(s).map(|t| JsonValue::String(from_date_time(&t)))
            }
            (Cast::DateTime, JsonValue::Number(n)) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|t| JsonValue::String(from_date_time(&t.naive_utc()))),
            (Cast::Integer, JsonValue::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(JsonValue::from),
            (Cast::Integer, JsonValue::String(s)) => {
                s.trim().parse::<i64>().ok().map(JsonValue::from)
            }
            (Cast::Integer, JsonValue::Bool(b)) => Some(JsonValue::from(i64::from(*b))),
            (Cast::Float, JsonValue::Number(n)) => n.as_f64().map(JsonValue::from),
            (Cast::Float, JsonValue::String(s)) => {
                s.trim().parse::<f64>().ok().map(JsonValue::from)
            }
            (Cast::String, JsonValue::String(_)) => Some(value.clone()),
            (Cast::String, JsonValue::Number(n)) => Some(JsonValue::String(n.to_string())),
            (Cast::String, JsonValue::Bool(b)) => Some(JsonValue::String(b.to_string())),
            (Cast::Json, JsonValue::String(s)) => serde_json::from_str(s).ok(),
            (Cast::Json, _) => Some(value.clone()),
            _ => None,
        };

        coerced.unwrap_or_else(|| {
            warn!("Cannot cast {} to {:?}, keeping it as is", value, self);
            value
        })
    }
}

/// Attribute name to cast mapping of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastTable {
    casts: HashMap<String, Cast>,
}

impl CastTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, cast: Cast) -> Self {
        self.insert(column, cast);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, cast: Cast) {
        self.casts.insert(column.into(), cast);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.casts.contains_key(column)
    }

    pub fn get(&self, column: &str) -> Option<Cast> {
        self.casts.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.casts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    pub fn cast(&self, column: &str, value: JsonValue) -> JsonValue {
        match self.get(column) {
            Some(cast) => cast.apply(value),
            None => value,
        }
    }

    pub fn to_db_value(&self, column: &str, value: &JsonValue) -> Value {
        to_db_value(self.get(column), value)
    }
}

/// Converts an attribute value into a value bound to a statement.
pub fn to_db_value(cast: Option<Cast>, value: &JsonValue) -> Value {
    match (cast, value) {
        (Some(Cast::DateTime), JsonValue::String(s)) => match parse_timestamp(s) {
            Some(t) => Value::from(t),
            None => Value::from(s.as_str()),
        },
        (Some(Cast::DateTime), JsonValue::Null) => Value::ChronoDateTime(None),
        (Some(Cast::Boolean), JsonValue::Null) => Value::Bool(None),
        (Some(Cast::Integer), JsonValue::Null) => Value::BigInt(None),
        (Some(Cast::Float), JsonValue::Null) => Value::Double(None),
        (Some(Cast::Json), JsonValue::Null) => Value::Json(None),
        (Some(Cast::Json), v) => Value::from(v.clone()),
        (_, JsonValue::Null) => Value::String(None),
        (_, JsonValue::Bool(b)) => Value::from(*b),
        (_, JsonValue::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(f) = n.as_f64() {
                Value::from(f)
            } else {
                Value::from(n.to_string())
            }
        }
        (_, JsonValue::String(s)) => Value::from(s.as_str()),
        (_, v) => Value::from(v.clone()),
    }
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.naive_utc())
        })
}

/// Current time, cut to whole seconds so that the stored and the in-memory
/// value are identical.
pub fn fresh_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn fresh_timestamp_string() -> String {
    from_date_time(&fresh_timestamp())
}

pub fn from_date_time(t: &NaiveDateTime) -> String {
    t.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn boolean_cast_accepts_storage_integers() {
        assert_eq!(Cast::Boolean.apply(json!(1)), json!(true));
        assert_eq!(Cast::Boolean.apply(json!(0)), json!(false));
        assert_eq!(Cast::Boolean.apply(json!("0")), json!(false));
        assert_eq!(Cast::Boolean.apply(json!(true)), json!(true));
        assert_eq!(Cast::Boolean.apply(JsonValue::Null), JsonValue::Null);
    }

    #[test]
    fn boolean_cast_keeps_garbage() {
        assert_eq!(Cast::Boolean.apply(json!("maybe")), json!("maybe"));
    }

    #[test]
    fn datetime_cast_normalizes_formats() {
        // Arrange
        let inputs = [
            json!("2024-03-05 10:11:12"),
            json!("2024-03-05 10:11:12.345678"),
            json!("2024-03-05T10:11:12"),
            json!("2024-03-05T10:11:12+00:00"),
        ];

        for input in inputs {
            // Act
            let v = Cast::DateTime.apply(input.clone());

            // Assert
            assert_eq!(v, json!("2024-03-05 10:11:12"), "input {input}");
        }
    }

    #[test]
    fn datetime_cast_from_unix_seconds() {
        assert_eq!(
            Cast::DateTime.apply(json!(0)),
            json!("1970-01-01 00:00:00")
        );
    }

    #[test]
    fn cast_table_leaves_unknown_columns_alone() {
        // Arrange
        let casts = CastTable::new().with("flag", Cast::Boolean);

        // Act
        let known = casts.cast("flag", json!(1));
        let unknown = casts.cast("other", json!(1));

        // Assert
        assert_eq!(known, json!(true));
        assert_eq!(unknown, json!(1));
    }

    #[test]
    fn db_values_follow_casts() {
        let casts = CastTable::new()
            .with("deleted_at", Cast::DateTime)
            .with("deleted_flag", Cast::Boolean);

        assert_eq!(
            casts.to_db_value("deleted_at", &json!("2024-03-05 10:11:12")),
            Value::from(
                NaiveDateTime::parse_from_str("2024-03-05 10:11:12", DATE_FORMAT).unwrap()
            )
        );
        assert_eq!(
            casts.to_db_value("deleted_at", &JsonValue::Null),
            Value::ChronoDateTime(None)
        );
        assert_eq!(
            casts.to_db_value("deleted_flag", &json!(true)),
            Value::Bool(Some(true))
        );
        assert_eq!(casts.to_db_value("title", &json!("x")), Value::from("x"));
        assert_eq!(casts.to_db_value("count", &json!(3)), Value::from(3i64));
    }

    #[test]
    fn fresh_timestamp_has_no_fraction() {
        let t = fresh_timestamp();
        assert_eq!(parse_timestamp(&from_date_time(&t)), Some(t));
    }
}
