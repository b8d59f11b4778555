//! The uniform result envelope returned by every operation.
//!
//! Callers inspect a value; ordinary operational failures never surface
//! as errors or panics. The envelope serializes to the shape the web
//! layer hands to its templates: `{ success, message, result }`, where
//! `result` is a row set, a single row (or null), an id, a count, or an
//! empty list.

use serde::{Serialize, Serializer};
use switchboard_core::Row;

/// Operation payload: rows for reads, identifiers and counts for writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Id(u64),
    Count(u64),
    Empty,
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Payload::Rows(rows) => rows.serialize(serializer),
            Payload::Row(Some(row)) => row.serialize(serializer),
            Payload::Row(None) => serializer.serialize_unit(),
            Payload::Id(id) => id.serialize(serializer),
            Payload::Count(count) => count.serialize(serializer),
            Payload::Empty => Vec::<Row>::new().serialize(serializer),
        }
    }
}

/// Uniform response shape for every read or write operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub message: String,
    pub result: Payload,
}

impl QueryOutcome {
    pub fn ok(message: impl Into<String>, result: Payload) -> Self {
        Self {
            success: true,
            message: message.into(),
            result,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            result: Payload::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::SqlValue;

    #[test]
    fn test_failure_envelope_has_empty_result() {
        let outcome = QueryOutcome::fail("boom");
        assert!(!outcome.success);
        assert_eq!(outcome.result, Payload::Empty);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["result"], serde_json::json!([]));
    }

    #[test]
    fn test_rows_serialize_as_array_of_objects() {
        let mut row = Row::new();
        row.insert("id".to_string(), SqlValue::Int(1));
        let outcome = QueryOutcome::ok("done", Payload::Rows(vec![row]));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], serde_json::json!([{"id": 1}]));
    }

    #[test]
    fn test_missing_row_serializes_as_null() {
        let outcome = QueryOutcome::ok("done", Payload::Row(None));
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["result"].is_null());
    }

    #[test]
    fn test_id_and_count_serialize_as_numbers() {
        let json = serde_json::to_value(QueryOutcome::ok("done", Payload::Id(17))).unwrap();
        assert_eq!(json["result"], serde_json::json!(17));

        let json = serde_json::to_value(QueryOutcome::ok("done", Payload::Count(3))).unwrap();
        assert_eq!(json["result"], serde_json::json!(3));
    }
}
