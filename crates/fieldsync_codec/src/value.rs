//! Dynamic field value type.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::temporal;

/// The fields of a record, keyed by field name.
///
/// A `BTreeMap` so iteration order is deterministic regardless of how the
/// map was built.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A dynamic field value.
///
/// This type represents any field a synchronized record can carry, on
/// either side of the wire. Temporal instants have three representations:
/// epoch-millisecond [`FieldValue::Integer`]s (the local relational form),
/// native wire [`FieldValue::Timestamp`]s, and rich local
/// [`FieldValue::DateTime`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Native wire temporal: seconds since the epoch plus a sub-second
    /// nanosecond component in `[0, 1_000_000_000)`.
    Timestamp {
        /// Whole seconds since the Unix epoch (may be negative).
        seconds: i64,
        /// Sub-second nanoseconds, always non-negative.
        nanos: u32,
    },
    /// Rich local temporal (naive UTC date-time).
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Create a wire timestamp from an epoch-millisecond instant.
    pub fn from_epoch_millis(millis: i64) -> Self {
        let (seconds, nanos) = temporal::split_epoch_millis(millis);
        FieldValue::Timestamp { seconds, nanos }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Check if this value carries a temporal instant in any representation.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldValue::Timestamp { .. } | FieldValue::DateTime(_)
        )
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce this value to an epoch-millisecond instant.
    ///
    /// Integers are taken as already millisecond-valued; wire timestamps
    /// and local date-times are converted. Other variants yield `None`.
    pub fn as_epoch_millis(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Timestamp { seconds, nanos } => {
                Some(temporal::join_epoch_millis(*seconds, *nanos))
            }
            FieldValue::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Integer(i64::from(n))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(dt: NaiveDateTime) -> Self {
        FieldValue::DateTime(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_accessors() {
        assert!(FieldValue::Null.is_null());
        assert!(!FieldValue::Bool(true).is_null());

        assert_eq!(FieldValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Integer(42).as_bool(), None);

        assert_eq!(FieldValue::Integer(42).as_integer(), Some(42));
        assert_eq!(FieldValue::Text("42".to_string()).as_integer(), None);

        assert_eq!(FieldValue::Text("hello".to_string()).as_text(), Some("hello"));
        assert_eq!(FieldValue::Float(1.5).as_float(), Some(1.5));
    }

    #[test]
    fn epoch_millis_coercion() {
        assert_eq!(
            FieldValue::Integer(1_700_000_000_000).as_epoch_millis(),
            Some(1_700_000_000_000)
        );
        assert_eq!(
            FieldValue::Timestamp {
                seconds: 1_700_000_000,
                nanos: 250_000_000,
            }
            .as_epoch_millis(),
            Some(1_700_000_000_250)
        );
        assert_eq!(FieldValue::Text("soon".to_string()).as_epoch_millis(), None);
    }

    #[test]
    fn from_epoch_millis_splits_subseconds() {
        assert_eq!(
            FieldValue::from_epoch_millis(1_700_000_000_123),
            FieldValue::Timestamp {
                seconds: 1_700_000_000,
                nanos: 123_000_000,
            }
        );
    }

    #[test]
    fn temporal_detection() {
        assert!(FieldValue::from_epoch_millis(0).is_temporal());
        assert!(!FieldValue::Integer(0).is_temporal());
        assert!(!FieldValue::Text("2024-01-01".to_string()).is_temporal());
    }

    #[test]
    fn from_impls() {
        assert_eq!(FieldValue::from(true), FieldValue::Bool(true));
        assert_eq!(FieldValue::from(42i64), FieldValue::Integer(42));
        assert_eq!(FieldValue::from(42i32), FieldValue::Integer(42));
        assert_eq!(FieldValue::from(2.5f64), FieldValue::Float(2.5));
        assert_eq!(
            FieldValue::from("hello"),
            FieldValue::Text("hello".to_string())
        );
    }

    #[test]
    fn serde_roundtrip() {
        let value = FieldValue::Timestamp {
            seconds: 1_700_000_000,
            nanos: 500_000_000,
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }
}
