use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::ErrorCode;

/// Fixed-width UTC text (`2024-01-01T10:00:00.000Z`), so comparing the stored
/// strings in SQL orders them chronologically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value
        .trunc_subsecs(3)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

/// Message of the first SQLite constraint failure in the error chain, such as
/// `UNIQUE constraint failed: moments.name, moments.user_id`.
pub fn constraint_violation(err: &anyhow::Error) -> Option<&str> {
    err.chain()
        .find_map(|cause| match cause.downcast_ref::<rusqlite::Error>() {
            Some(rusqlite::Error::SqliteFailure(failure, message))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Some(message.as_deref().unwrap_or_default())
            }
            _ => None,
        })
}
