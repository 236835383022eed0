//! Helpers for reading raw platform payloads.
//!
//! Platforms omit fields freely and disagree on whether numbers are sent as
//! numbers or strings. [`RawObject`] reads fields leniently: a missing or
//! `null` field yields the caller's default, numeric strings are accepted, and
//! only a structurally wrong value (an object where a number belongs, say)
//! fails, with a [`FetchError::Transformation`] naming the full field path.

use serde_json::{Map, Value};
use tallybar_fetch::FetchError;

/// Unwraps the `{success, message, data}` envelope most platforms use.
///
/// Payloads without an envelope are returned unchanged.
///
/// # Errors
///
/// Returns [`FetchError::Transport`] when `success` is false.
pub fn unwrap_envelope(value: Value) -> Result<Value, FetchError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    if !map.contains_key("success") {
        return Ok(Value::Object(map));
    }
    if map.get("success").and_then(Value::as_bool) == Some(false) {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("platform reported failure")
            .to_string();
        return Err(FetchError::Transport {
            status: None,
            message,
            body: Some(Value::Object(map).to_string()),
        });
    }
    Ok(map.remove("data").unwrap_or(Value::Null))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Raw Object
// ============================================================================

/// A JSON object together with its path, for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    map: &'a Map<String, Value>,
    path: &'a str,
}

/// An owned-path variant used for array items.
#[derive(Debug, Clone)]
pub struct RawItem<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl RawItem<'_> {
    /// Borrows this item as a [`RawObject`].
    pub fn fields(&self) -> RawObject<'_> {
        RawObject {
            map: self.map,
            path: &self.path,
        }
    }
}

impl<'a> RawObject<'a> {
    /// Reads `value` as an object. `null` is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns a transformation error if `value` is not an object.
    pub fn new(value: &'a Value, path: &'a str) -> Result<Self, FetchError> {
        static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            Value::Null => Ok(Self {
                map: EMPTY.get_or_init(Map::new),
                path,
            }),
            other => Err(FetchError::transformation(
                path,
                format!("expected object, got {}", kind(other)),
            )),
        }
    }

    /// The path this object was read from.
    pub fn path(&self) -> &'a str {
        self.path
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    /// Returns true if `key` is present and not `null`.
    pub fn has(&self, key: &str) -> bool {
        self.present(key).is_some()
    }

    /// Reads an optional number.
    ///
    /// # Errors
    ///
    /// Fails if the field is neither a number nor a numeric string, or if it
    /// spells a non-finite value such as `"NaN"` or `"inf"`.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, FetchError> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_finite() => Ok(Some(v)),
            Some(v) => Err(FetchError::transformation(
                self.field_path(key),
                format!("expected finite number, got {v}"),
            )),
            None => Err(FetchError::transformation(
                self.field_path(key),
                format!("expected number, got {}", kind(value)),
            )),
        }
    }

    /// Reads a number, defaulting when absent.
    ///
    /// # Errors
    ///
    /// See [`RawObject::opt_f64`].
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, FetchError> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    /// Reads a non-negative count, defaulting to 0 when absent.
    ///
    /// # Errors
    ///
    /// See [`RawObject::opt_f64`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self, key: &str) -> Result<u64, FetchError> {
        Ok(self.opt_f64(key)?.map_or(0, |v| v.max(0.0).round() as u64))
    }

    /// Reads an optional integer timestamp. `0` is treated as absent.
    ///
    /// # Errors
    ///
    /// See [`RawObject::opt_f64`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn opt_timestamp(&self, key: &str) -> Result<Option<i64>, FetchError> {
        Ok(self
            .opt_f64(key)?
            .map(|v| v as i64)
            .filter(|ts| *ts > 0))
    }

    /// Reads an optional string. Numbers are stringified.
    ///
    /// # Errors
    ///
    /// Fails for booleans, arrays and objects.
    pub fn opt_str(&self, key: &str) -> Result<Option<String>, FetchError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(FetchError::transformation(
                self.field_path(key),
                format!("expected string, got {}", kind(other)),
            )),
        }
    }

    /// Reads a string, defaulting when absent.
    ///
    /// # Errors
    ///
    /// See [`RawObject::opt_str`].
    pub fn str_or(&self, key: &str, default: &str) -> Result<String, FetchError> {
        Ok(self.opt_str(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Reads an optional boolean. `0`/`1` are accepted.
    ///
    /// # Errors
    ///
    /// Fails for any other type.
    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, FetchError> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
            Some(other) => Err(FetchError::transformation(
                self.field_path(key),
                format!("expected boolean, got {}", kind(other)),
            )),
        }
    }

    /// Returns the raw value of `key`, if present.
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.present(key)
    }

    /// Reads the items of an optional array of objects.
    ///
    /// # Errors
    ///
    /// Fails if the field is not an array or an item is not an object.
    pub fn items(&self, key: &str) -> Result<Vec<RawItem<'a>>, FetchError> {
        let path = self.field_path(key);
        match self.present(key) {
            None => Ok(Vec::new()),
            Some(value) => items_at(value, &path),
        }
    }

    /// Reads an optional array of strings.
    ///
    /// # Errors
    ///
    /// Fails if the field is not an array of strings.
    pub fn strings(&self, key: &str) -> Result<Vec<String>, FetchError> {
        let path = self.field_path(key);
        let Some(value) = self.present(key) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(FetchError::transformation(
                path,
                format!("expected array, got {}", kind(value)),
            ));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(FetchError::transformation(
                    format!("{path}[{i}]"),
                    format!("expected string, got {}", kind(other)),
                )),
            })
            .collect()
    }

    /// Reads this object as a map of named objects.
    ///
    /// # Errors
    ///
    /// Fails if an entry is not an object.
    pub fn entries(&self) -> Result<Vec<(&'a String, RawItem<'a>)>, FetchError> {
        self.map
            .iter()
            .map(|(name, value)| {
                let path = self.field_path(name);
                match value {
                    Value::Object(map) => Ok((name, RawItem { map, path })),
                    other => Err(FetchError::transformation(
                        path,
                        format!("expected object, got {}", kind(other)),
                    )),
                }
            })
            .collect()
    }
}

/// Reads `value` as an array of objects.
///
/// # Errors
///
/// Fails if `value` is not an array (`null` is empty) or an item is not an
/// object.
pub fn items_at<'a>(value: &'a Value, path: &str) -> Result<Vec<RawItem<'a>>, FetchError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(RawItem {
                    map,
                    path: format!("{path}[{i}]"),
                }),
                other => Err(FetchError::transformation(
                    format!("{path}[{i}]"),
                    format!("expected object, got {}", kind(other)),
                )),
            })
            .collect(),
        other => Err(FetchError::transformation(
            path,
            format!("expected array, got {}", kind(other)),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unwrap_envelope() {
        let data = unwrap_envelope(json!({"success": true, "message": "", "data": {"quota": 1}}))
            .unwrap();
        assert_eq!(data, json!({"quota": 1}));

        let bare = unwrap_envelope(json!([1, 2])).unwrap();
        assert_eq!(bare, json!([1, 2]));

        let err = unwrap_envelope(json!({"success": false, "message": "no auth"})).unwrap_err();
        assert_eq!(err.user_message().as_deref(), Some("no auth"));
    }

    #[test]
    fn test_lenient_numbers() {
        let value = json!({"a": 1.5, "b": "2", "c": null, "d": ""});
        let obj = RawObject::new(&value, "x").unwrap();
        assert_eq!(obj.f64_or("a", 0.0).unwrap(), 1.5);
        assert_eq!(obj.f64_or("b", 0.0).unwrap(), 2.0);
        assert_eq!(obj.f64_or("c", 7.0).unwrap(), 7.0);
        assert_eq!(obj.f64_or("d", 7.0).unwrap(), 7.0);
        assert_eq!(obj.f64_or("missing", 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_wrong_type_names_field() {
        let value = json!({"data": {"quota": {"nested": true}}});
        let obj = RawObject::new(&value, "balance").unwrap();
        let data = obj.value("data").unwrap();
        let inner = RawObject::new(data, "balance.data").unwrap();
        match inner.f64_or("quota", 0.0).unwrap_err() {
            FetchError::Transformation { field, .. } => assert_eq!(field, "balance.data.quota"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        let value = json!({"quota": "NaN", "used": " inf ", "left": "-Infinity"});
        let obj = RawObject::new(&value, "balance").unwrap();
        for key in ["quota", "used", "left"] {
            match obj.opt_f64(key).unwrap_err() {
                FetchError::Transformation { field, .. } => assert_eq!(field, format!("balance.{key}")),
                other => panic!("unexpected error: {other}"),
            }
        }
        assert!(obj.count("quota").is_err());
        assert!(obj.opt_timestamp("used").is_err());
    }

    #[test]
    fn test_items_paths() {
        let value = json!([{"a": 1}, 5]);
        match items_at(&value, "logs").unwrap_err() {
            FetchError::Transformation { field, .. } => assert_eq!(field, "logs[1]"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(items_at(&Value::Null, "logs").unwrap().is_empty());
    }

    #[test]
    fn test_zero_timestamp_is_absent() {
        let value = json!({"t": 0, "u": 1_700_000_000});
        let obj = RawObject::new(&value, "").unwrap();
        assert_eq!(obj.opt_timestamp("t").unwrap(), None);
        assert_eq!(obj.opt_timestamp("u").unwrap(), Some(1_700_000_000));
    }
}
