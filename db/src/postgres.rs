use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgRow, types::{Oid, PgHstore, PgTimeTz}};
use sqlx::{
    Column, Connection, Executor, PgConnection, Postgres, Row, Statement, Transaction, TypeInfo,
    ValueRef,
};
use uuid::Uuid;

use crate::value::SqlValue;
use crate::{Database, QueryResult};

/// Executor backed by a single Postgres connection. Every statement runs
/// in its own transaction, committed on success and rolled back on error.
pub struct PostgresDatabase {
    connection: PgConnection,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase").finish_non_exhaustive()
    }
}

impl PostgresDatabase {
    pub async fn connect(url: impl Display) -> Result<Self, sqlx::Error> {
        let connection = PgConnection::connect(&url.to_string()).await?;
        Ok(Self { connection })
    }

    async fn run(&mut self, query: &str) -> Result<QueryResult, String> {
        let mut tx = self
            .connection
            .begin()
            .await
            .map_err(|e| e.to_string())?;

        match run_statement(&mut tx, query).await {
            Ok(result) => {
                tx.commit().await.map_err(|e| e.to_string())?;
                Ok(result)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(error = %rollback_error, "rollback failed");
                }
                Err(error)
            }
        }
    }
}

#[async_trait::async_trait]
impl Database for PostgresDatabase {
    async fn execute(&mut self, query: &str) -> QueryResult {
        let started = Instant::now();
        match self.run(query).await {
            Ok(result) => {
                tracing::debug!(elapsed = ?started.elapsed(), "query finished");
                result
            }
            Err(error) => {
                tracing::warn!(%error, "error executing query");
                QueryResult::error(error)
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), String> {
        self.connection.close().await.map_err(|e| e.to_string())
    }
}

/// Statement metadata decides the result kind: statements that produce a
/// result set return it in full, statements without one are acknowledged.
async fn run_statement(
    tx: &mut Transaction<'_, Postgres>,
    query: &str,
) -> Result<QueryResult, String> {
    let statement = (&mut **tx).prepare(query).await.map_err(|e| e.to_string())?;

    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    if columns.is_empty() {
        statement
            .query()
            .execute(&mut **tx)
            .await
            .map_err(|e| e.to_string())?;
        tracing::debug!("statement acknowledged");
        return Ok(QueryResult::ack());
    }

    let rows = statement
        .query()
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| e.to_string())?;

    let mut results = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut data = Vec::with_capacity(columns.len());
        for (index, column) in row.columns().iter().enumerate() {
            let value = decode_cell(row, index, column.type_info().name())
                .map_err(|e| format!("column \"{}\": {e}", column.name()))?;
            data.push(value.into_json());
        }
        results.push(data);
    }

    tracing::debug!(rows = results.len(), "statement returned rows");
    Ok(QueryResult::table(columns, results))
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue, String> {
    match type_name {
        "BOOL" => scalar(row.try_get::<Option<bool>, _>(index), SqlValue::Bool),

        "INT2" => scalar(row.try_get::<Option<i16>, _>(index), |v| {
            SqlValue::Int(i64::from(v))
        }),

        "INT4" => scalar(row.try_get::<Option<i32>, _>(index), |v| {
            SqlValue::Int(i64::from(v))
        }),

        "INT8" => scalar(row.try_get::<Option<i64>, _>(index), SqlValue::Int),

        "OID" => scalar(row.try_get::<Option<Oid>, _>(index), |v| {
            SqlValue::Int(i64::from(v.0))
        }),

        "FLOAT4" => scalar(row.try_get::<Option<f32>, _>(index), |v| {
            SqlValue::Float(f64::from(v))
        }),

        "FLOAT8" => scalar(row.try_get::<Option<f64>, _>(index), SqlValue::Float),

        "NUMERIC" => scalar(row.try_get::<Option<Decimal>, _>(index), SqlValue::Decimal),

        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            scalar(row.try_get::<Option<String>, _>(index), SqlValue::Text)
        }

        "UUID" => scalar(row.try_get::<Option<Uuid>, _>(index), SqlValue::Uuid),

        "DATE" => scalar(row.try_get::<Option<NaiveDate>, _>(index), SqlValue::Date),

        "TIME" => scalar(row.try_get::<Option<NaiveTime>, _>(index), SqlValue::Time),

        "TIMETZ" => scalar(
            row.try_get::<Option<PgTimeTz<NaiveTime, FixedOffset>>, _>(index),
            time_of_day,
        ),

        "TIMESTAMP" => scalar(
            row.try_get::<Option<NaiveDateTime>, _>(index),
            SqlValue::Timestamp,
        ),

        "TIMESTAMPTZ" => scalar(
            row.try_get::<Option<DateTime<Utc>>, _>(index),
            SqlValue::TimestampTz,
        ),

        "JSON" | "JSONB" => scalar(row.try_get::<Option<Value>, _>(index), SqlValue::Json),

        // hstore keeps pg_type casing since it comes from an extension
        "hstore" => scalar(row.try_get::<Option<PgHstore>, _>(index), |v| {
            SqlValue::Record(
                v.0.into_iter()
                    .map(|(key, value)| (key, value.map_or(SqlValue::Null, SqlValue::Text)))
                    .collect(),
            )
        }),

        "BOOL[]" => array(row.try_get::<Option<Vec<Option<bool>>>, _>(index), SqlValue::Bool),

        "INT2[]" => array(row.try_get::<Option<Vec<Option<i16>>>, _>(index), |v| {
            SqlValue::Int(i64::from(v))
        }),

        "INT4[]" => array(row.try_get::<Option<Vec<Option<i32>>>, _>(index), |v| {
            SqlValue::Int(i64::from(v))
        }),

        "INT8[]" => array(row.try_get::<Option<Vec<Option<i64>>>, _>(index), SqlValue::Int),

        "FLOAT4[]" => array(row.try_get::<Option<Vec<Option<f32>>>, _>(index), |v| {
            SqlValue::Float(f64::from(v))
        }),

        "FLOAT8[]" => array(
            row.try_get::<Option<Vec<Option<f64>>>, _>(index),
            SqlValue::Float,
        ),

        "NUMERIC[]" => array(
            row.try_get::<Option<Vec<Option<Decimal>>>, _>(index),
            SqlValue::Decimal,
        ),

        "TEXT[]" | "VARCHAR[]" => array(
            row.try_get::<Option<Vec<Option<String>>>, _>(index),
            SqlValue::Text,
        ),

        "UUID[]" => array(row.try_get::<Option<Vec<Option<Uuid>>>, _>(index), SqlValue::Uuid),

        "DATE[]" => array(
            row.try_get::<Option<Vec<Option<NaiveDate>>>, _>(index),
            SqlValue::Date,
        ),

        "TIME[]" => array(
            row.try_get::<Option<Vec<Option<NaiveTime>>>, _>(index),
            SqlValue::Time,
        ),

        "TIMESTAMP[]" => array(
            row.try_get::<Option<Vec<Option<NaiveDateTime>>>, _>(index),
            SqlValue::Timestamp,
        ),

        "TIMESTAMPTZ[]" => array(
            row.try_get::<Option<Vec<Option<DateTime<Utc>>>>, _>(index),
            SqlValue::TimestampTz,
        ),

        // Anything else passes through only when its wire form reads as
        // text, enum labels for instance. Binary kinds are refused even
        // when their bytes happen to be valid UTF-8.
        _ => match row.try_get_raw(index) {
            Ok(raw) => {
                if raw.is_null() {
                    return Ok(SqlValue::Null);
                }
                match raw.as_bytes() {
                    Ok(bytes) => decode_unrecognized(bytes, type_name),
                    Err(_) => Err(format!("unsupported column type {type_name}")),
                }
            }
            Err(e) => Err(e.to_string()),
        },
    }
}

/// Fallback for kinds without a dedicated arm. Postgres text never
/// contains NUL or other control bytes; a payload carrying them is a
/// binary encoding that happens to be valid UTF-8 (interval, money).
fn decode_unrecognized(bytes: &[u8], type_name: &str) -> Result<SqlValue, String> {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(|c| c.is_control() && !c.is_whitespace()) => {
            Ok(SqlValue::Text(text.to_string()))
        }
        _ => Err(format!("unsupported column type {type_name}")),
    }
}

/// Keeps only the local time of day; the zone offset is dropped.
fn time_of_day(value: PgTimeTz<NaiveTime, FixedOffset>) -> SqlValue {
    SqlValue::Time(value.time)
}

fn scalar<T>(
    value: Result<Option<T>, sqlx::Error>,
    wrap: impl FnOnce(T) -> SqlValue,
) -> Result<SqlValue, String> {
    value
        .map(|v| v.map_or(SqlValue::Null, wrap))
        .map_err(|e| e.to_string())
}

fn array<T>(
    value: Result<Option<Vec<Option<T>>>, sqlx::Error>,
    wrap: impl Fn(T) -> SqlValue,
) -> Result<SqlValue, String> {
    value
        .map(|v| {
            v.map_or(SqlValue::Null, |items| {
                SqlValue::Array(
                    items
                        .into_iter()
                        .map(|item| item.map_or(SqlValue::Null, &wrap))
                        .collect(),
                )
            })
        })
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrecognized_text_kinds_pass_through() {
        assert_eq!(
            decode_unrecognized(b"pending", "mood"),
            Ok(SqlValue::Text("pending".to_string()))
        );
        assert_eq!(
            decode_unrecognized(b"line one\nline two", "citext"),
            Ok(SqlValue::Text("line one\nline two".to_string()))
        );
    }

    #[test]
    fn utf8_valid_binary_payloads_are_refused() {
        // interval '5 days' on the wire: zero microseconds, then days, then months
        let five_days = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0, 0];
        assert_eq!(
            decode_unrecognized(&five_days, "INTERVAL"),
            Err("unsupported column type INTERVAL".to_string())
        );

        // money at zero is eight NUL bytes
        assert_eq!(
            decode_unrecognized(&[0; 8], "MONEY"),
            Err("unsupported column type MONEY".to_string())
        );
    }

    #[test]
    fn invalid_utf8_payloads_are_refused() {
        assert_eq!(
            decode_unrecognized(&[0xC3, 0x28], "BYTEA"),
            Err("unsupported column type BYTEA".to_string())
        );
    }

    #[test]
    fn time_with_zone_keeps_only_the_local_time() {
        let value = PgTimeTz {
            time: NaiveTime::from_hms_milli_opt(14, 5, 9, 123).unwrap(),
            offset: FixedOffset::east_opt(2 * 3600).unwrap(),
        };
        assert_eq!(time_of_day(value).into_json(), json!("14:05:09"));
    }
}
