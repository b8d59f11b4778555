//! Cross-type value normalization for cache serialization.
//!
//! Raw column values are heterogeneous (dates, decimals, blobs); the side
//! cache stores JSON text. `encode_value` maps a [`SqlValue`] into a
//! JSON-representable form, recursively for containers, and `decode_value`
//! attempts the inverse for values pulled back out of the cache.
//!
//! Both directions are total: an unrecognized shape degrades to the
//! closest representable value instead of failing the surrounding query.
//! Fixed-point decimals become floating-point numbers (precision loss is
//! accepted), date-times become epoch-seconds numbers, and dates become
//! ISO-8601 strings.

use crate::value::{Row, SqlValue};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value as Json};

/// Convert a column value into its JSON-representable form.
pub fn encode_value(value: &SqlValue) -> Json {
    match value {
        SqlValue::Null => Json::Null,
        SqlValue::Bool(b) => Json::Bool(*b),
        SqlValue::Int(i) => Json::from(*i),
        SqlValue::UInt(u) => Json::from(*u),
        SqlValue::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        SqlValue::Decimal(text) => match text.parse::<f64>() {
            Ok(f) => Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(text.clone())),
            Err(_) => Json::String(text.clone()),
        },
        SqlValue::Str(s) => Json::String(s.clone()),
        SqlValue::Bytes(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
        SqlValue::DateTime(dt) => {
            let micros = dt.and_utc().timestamp_micros();
            Number::from_f64(micros as f64 / 1_000_000.0)
                .map(Json::Number)
                .unwrap_or(Json::Null)
        }
        SqlValue::Date(d) => Json::String(d.to_string()),
        SqlValue::List(items) => Json::Array(items.iter().map(encode_value).collect()),
        SqlValue::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
    }
}

/// Recover a column value from its JSON form.
///
/// Strings get a revival pass: embedded JSON is decoded
/// recursively, an ISO-8601 string with a `T` separator becomes a
/// date-time, a bare ISO-8601 date becomes a date, and anything else stays
/// a string. Numbers stay numbers, so an encoded date-time decodes to its
/// epoch value rather than back to a calendar type.
pub fn decode_value(value: &Json) -> SqlValue {
    match value {
        Json::Null => SqlValue::Null,
        Json::Bool(b) => SqlValue::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                SqlValue::UInt(u)
            } else {
                SqlValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => decode_string(s),
        Json::Array(items) => SqlValue::List(items.iter().map(decode_value).collect()),
        Json::Object(entries) => SqlValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), decode_value(v)))
                .collect(),
        ),
    }
}

fn decode_string(s: &str) -> SqlValue {
    if let Ok(parsed) = serde_json::from_str::<Json>(s) {
        // Recursion terminates: a quoted string strictly shrinks.
        if !matches!(&parsed, Json::String(inner) if inner.as_str() == s) {
            return decode_value(&parsed);
        }
    }
    if s.contains('T') {
        if let Ok(dt) = s.parse::<NaiveDateTime>() {
            return SqlValue::DateTime(dt);
        }
    } else if let Ok(d) = s.parse::<NaiveDate>() {
        return SqlValue::Date(d);
    }
    SqlValue::Str(s.to_string())
}

/// Encode a fetched row set as a JSON array of objects.
pub fn encode_rows(rows: &[Row]) -> Json {
    Json::Array(
        rows.iter()
            .map(|row| {
                Json::Object(
                    row.iter()
                        .map(|(name, value)| (name.clone(), encode_value(value)))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Decode a cached row set. Elements that are not objects are dropped.
pub fn decode_rows(json: &Json) -> Vec<Row> {
    match json {
        Json::Array(items) => items
            .iter()
            .filter_map(Json::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(name, value)| (name.clone(), decode_value(value)))
                    .collect()
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl Serialize for SqlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        encode_value(self).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn roundtrip(value: &SqlValue) -> SqlValue {
        decode_value(&encode_value(value))
    }

    #[test]
    fn test_scalars_roundtrip_unchanged() {
        assert_eq!(roundtrip(&SqlValue::Null), SqlValue::Null);
        assert_eq!(roundtrip(&SqlValue::Bool(true)), SqlValue::Bool(true));
        assert_eq!(roundtrip(&SqlValue::Int(42)), SqlValue::Int(42));
        assert_eq!(roundtrip(&SqlValue::Float(3.5)), SqlValue::Float(3.5));
        assert_eq!(
            roundtrip(&SqlValue::Str("hello world".to_string())),
            SqlValue::Str("hello world".to_string())
        );
    }

    #[test]
    fn test_decimal_becomes_float() {
        let encoded = encode_value(&SqlValue::Decimal("12.50".to_string()));
        assert_eq!(encoded, Json::from(12.5));
        assert_eq!(decode_value(&encoded), SqlValue::Float(12.5));
    }

    #[test]
    fn test_unparseable_decimal_degrades_to_string() {
        let encoded = encode_value(&SqlValue::Decimal("not a number".to_string()));
        assert_eq!(encoded, Json::String("not a number".to_string()));
    }

    #[test]
    fn test_datetime_encodes_to_epoch_seconds() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let encoded = encode_value(&SqlValue::DateTime(dt));
        let epoch = dt.and_utc().timestamp() as f64;
        assert_eq!(encoded, Json::from(epoch));
    }

    #[test]
    fn test_date_roundtrips_through_iso_string() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let encoded = encode_value(&SqlValue::Date(d));
        assert_eq!(encoded, Json::String("2024-01-15".to_string()));
        assert_eq!(decode_value(&encoded), SqlValue::Date(d));
    }

    #[test]
    fn test_iso_datetime_string_revives_as_datetime() {
        let decoded = decode_string("2024-01-15T10:30:00");
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(decoded, SqlValue::DateTime(expected));
    }

    #[test]
    fn test_embedded_json_string_is_decoded() {
        assert_eq!(
            decode_string("[1, 2]"),
            SqlValue::List(vec![SqlValue::Int(1), SqlValue::Int(2)])
        );
        assert_eq!(decode_string("123"), SqlValue::Int(123));
    }

    #[test]
    fn test_plain_string_stays_a_string() {
        assert_eq!(
            decode_string("Tower of London"),
            SqlValue::Str("Tower of London".to_string())
        );
    }

    #[test]
    fn test_nested_containers_roundtrip() {
        let mut inner = BTreeMap::new();
        inner.insert("count".to_string(), SqlValue::Int(3));
        inner.insert("label".to_string(), SqlValue::Str("a b".to_string()));
        let value = SqlValue::List(vec![SqlValue::Map(inner.clone()), SqlValue::Null]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_invalid_utf8_bytes_degrade_lossily() {
        let encoded = encode_value(&SqlValue::Bytes(vec![0xff, 0x61]));
        match encoded {
            Json::String(s) => assert!(s.ends_with('a')),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_row_set_roundtrip() {
        let mut row = Row::new();
        row.insert("id".to_string(), SqlValue::Int(1));
        row.insert("name".to_string(), SqlValue::Str("alice of arendale".to_string()));
        row.insert("joined".to_string(), SqlValue::Date(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()));
        let rows = vec![row.clone()];

        let decoded = decode_rows(&encode_rows(&rows));
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_decode_rows_tolerates_garbage() {
        assert!(decode_rows(&Json::String("nope".to_string())).is_empty());
        assert!(decode_rows(&Json::Array(vec![Json::from(1)])).is_empty());
    }

    proptest! {
        #[test]
        fn prop_int_roundtrip(i in any::<i64>()) {
            prop_assert_eq!(roundtrip(&SqlValue::Int(i)), SqlValue::Int(i));
        }

        #[test]
        fn prop_bool_roundtrip(b in any::<bool>()) {
            prop_assert_eq!(roundtrip(&SqlValue::Bool(b)), SqlValue::Bool(b));
        }

        #[test]
        fn prop_encode_never_panics(s in ".*") {
            let _ = encode_value(&SqlValue::Str(s.clone()));
            let _ = decode_string(&s);
        }
    }
}
