//! Row and parameter value model shared by every switchboard component.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// A single column value, as fetched from (or bound into) the relational
/// store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Fixed-point decimal in the driver's textual form, e.g. `"12.50"`.
    Decimal(String),
    Str(String),
    /// Raw bytes that are not valid UTF-8.
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    List(Vec<SqlValue>),
    Map(BTreeMap<String, SqlValue>),
}

/// One fetched row: column name to value.
pub type Row = BTreeMap<String, SqlValue>;

/// Parameter set bound to a query or command invocation.
///
/// Named parameters live in a `BTreeMap`, so their stable encoding is
/// key-sorted by construction: two logically identical sets derive the
/// same cache key regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<SqlValue>),
    Named(BTreeMap<String, SqlValue>),
}

impl Params {
    /// Build a positional parameter set.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Build a named parameter set.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Params::None)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::UInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Str(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Str(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_params_from_primitives() {
        let params = Params::positional([SqlValue::Int(1), SqlValue::from("bob")]);
        assert_eq!(
            params,
            Params::Positional(vec![SqlValue::Int(1), SqlValue::Str("bob".to_string())])
        );
    }

    #[test]
    fn test_named_params_are_key_sorted() {
        let params = Params::named([("zeta", 1i64), ("alpha", 2i64)]);
        match params {
            Params::Named(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["alpha", "zeta"]);
            }
            other => panic!("expected named params, got {:?}", other),
        }
    }

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(7i64)), SqlValue::Int(7));
    }

    #[test]
    fn test_default_params_is_none() {
        assert!(Params::default().is_none());
        assert!(!Params::positional([1i64]).is_none());
    }
}
