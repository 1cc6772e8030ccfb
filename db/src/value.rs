//! JSON-safe normalization of decoded SQL values

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use uuid::Uuid;

/// A decoded SQL value, one variant per column kind the executor produces.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Array(Vec<SqlValue>),
    Record(Vec<(String, SqlValue)>),
    Json(Value),
}

impl SqlValue {
    /// Serialize into a JSON-safe value.
    ///
    /// Dates and times become formatted strings, NUMERIC becomes the
    /// nearest binary double, arrays and records recurse entry by entry,
    /// and values that already are JSON pass through unchanged. Non-finite
    /// floats have no JSON representation and become null.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => json!(v),
            SqlValue::Int(v) => json!(v),
            SqlValue::Float(v) => Value::from(v),
            SqlValue::Decimal(v) => v.to_f64().map_or(Value::Null, Value::from),
            SqlValue::Text(v) => json!(v),
            SqlValue::Uuid(v) => json!(v.to_string()),
            SqlValue::Date(v) => json!(v.format("%Y-%m-%d").to_string()),
            SqlValue::Time(v) => json!(v.format("%H:%M:%S").to_string()),
            SqlValue::Timestamp(v) => json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            SqlValue::TimestampTz(v) => json!(v.to_rfc3339()),
            SqlValue::Array(items) => {
                Value::Array(items.into_iter().map(SqlValue::into_json).collect())
            }
            SqlValue::Record(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, value.into_json()))
                    .collect(),
            ),
            SqlValue::Json(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn json_columns_pass_through_unchanged() {
        let nested = json!({"tags": [1, "x", {"active": null}], "count": 3});
        assert_eq!(SqlValue::Json(nested.clone()).into_json(), nested);
    }

    #[test]
    fn numeric_becomes_the_nearest_double() {
        let value = SqlValue::Decimal("12.50".parse::<Decimal>().unwrap());
        assert_eq!(value.into_json(), json!(12.5));
    }

    #[test]
    fn dates_format_as_iso_days() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(SqlValue::Date(date).into_json(), json!("2024-03-01"));
    }

    #[test]
    fn times_drop_subsecond_precision() {
        let time = NaiveTime::from_hms_milli_opt(14, 5, 9, 123).unwrap();
        assert_eq!(SqlValue::Time(time).into_json(), json!("14:05:09"));
    }

    #[test]
    fn timestamps_keep_fractional_seconds_only_when_nonzero() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let whole = date.and_hms_opt(14, 5, 9).unwrap();
        let fractional = date.and_hms_milli_opt(14, 5, 9, 123).unwrap();

        assert_eq!(
            SqlValue::Timestamp(whole).into_json(),
            json!("2024-03-01T14:05:09")
        );
        assert_eq!(
            SqlValue::Timestamp(fractional).into_json(),
            json!("2024-03-01T14:05:09.123")
        );
    }

    #[test]
    fn timestamptz_formats_as_rfc3339() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(
            SqlValue::TimestampTz(instant).into_json(),
            json!("2024-03-01T14:05:09+00:00")
        );
    }

    #[test]
    fn uuids_become_hyphenated_strings() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            SqlValue::Uuid(id).into_json(),
            json!("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn arrays_recurse_and_keep_order() {
        let value = SqlValue::Array(vec![
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            SqlValue::Null,
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()),
        ]);
        assert_eq!(value.into_json(), json!(["2024-03-01", null, "2024-03-02"]));
    }

    #[test]
    fn records_recurse_into_every_value() {
        let value = SqlValue::Record(vec![
            (
                "audit_dates".to_string(),
                SqlValue::Array(vec![
                    SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                    SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()),
                ]),
            ),
            ("label".to_string(), SqlValue::Text("q1".to_string())),
            ("reviewed".to_string(), SqlValue::Null),
        ]);
        assert_eq!(
            value.into_json(),
            json!({
                "audit_dates": ["2024-03-01", "2024-03-02"],
                "label": "q1",
                "reviewed": null,
            })
        );
    }

    #[test]
    fn nulls_and_scalars_map_directly() {
        assert_eq!(SqlValue::Null.into_json(), Value::Null);
        assert_eq!(SqlValue::Bool(true).into_json(), json!(true));
        assert_eq!(SqlValue::Int(-7).into_json(), json!(-7));
        assert_eq!(SqlValue::Text("ok".to_string()).into_json(), json!("ok"));
    }

    #[test]
    fn non_finite_floats_degrade_to_null() {
        assert_eq!(SqlValue::Float(f64::NAN).into_json(), Value::Null);
        assert_eq!(SqlValue::Float(f64::INFINITY).into_json(), Value::Null);
        assert_eq!(SqlValue::Float(2.25).into_json(), json!(2.25));
    }
}
