//! Append-only call and problem ledgers on SQLite
//!
//! Both tables are insert-only. Timestamps are Unix milliseconds (UTC) and
//! are clamped on insert so they never decrease in insertion order.

mod calls;
mod problems;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::classifier::ProblemType;
use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Call about to be appended; id and timestamp are assigned by the ledger
#[derive(Debug, Clone)]
pub struct NewCall {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u64,
}

/// One proxied upstream call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub id: i64,
    pub method: String,
    pub path: String,
    #[serde(rename = "response")]
    pub status: u16,
    #[serde(rename = "response_time")]
    pub latency_ms: u64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A detected problem joined with the call it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemRecord {
    pub id: i64,
    pub request_id: i64,
    pub problem_type: ProblemType,
    pub description: String,
    pub threshold_ms: u64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,

    // Joined from api_requests
    pub method: String,
    pub path: String,
    #[serde(rename = "response")]
    pub status: u16,
    #[serde(rename = "response_time")]
    pub latency_ms: u64,
}

/// RFC 3339, UTC, whole seconds: `2024-01-15T10:30:00Z`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn serialize_timestamp<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

/// Ledger store handle, cheap to clone
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Open (creating if needed) the database file and run migrations
    pub async fn open(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.migrate().await?;
        Ok(ledger)
    }

    /// Private in-memory database with migrations applied
    ///
    /// Pinned to a single connection that is never recycled, since every
    /// SQLite `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.migrate().await?;
        Ok(ledger)
    }

    async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("Ledger migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap liveness probe for readiness checks
    pub async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn decode_timestamp(id: i64, millis: i64) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| LedgerError::Corrupt {
        id,
        reason: format!("created_at out of range: {}", millis),
    })
}

pub(crate) fn decode_status(id: i64, status: i64) -> Result<u16, LedgerError> {
    u16::try_from(status).map_err(|_| LedgerError::Corrupt {
        id,
        reason: format!("response_status out of range: {}", status),
    })
}

pub(crate) fn decode_latency(id: i64, latency: i64) -> Result<u64, LedgerError> {
    u64::try_from(latency).map_err(|_| LedgerError::Corrupt {
        id,
        reason: format!("negative millisecond value: {}", latency),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::classifier::DetectedProblem;
    use crate::gateway::PROXY_METHOD;

    pub async fn ledger() -> Ledger {
        Ledger::in_memory().await.unwrap()
    }

    pub async fn seed_call(
        ledger: &Ledger,
        method: &str,
        path: &str,
        status: u16,
        latency_ms: u64,
    ) -> i64 {
        ledger
            .insert_call(&NewCall {
                method: method.to_string(),
                path: path.to_string(),
                status,
                latency_ms,
            })
            .await
            .unwrap()
    }

    pub async fn seed_get(ledger: &Ledger, path: &str, status: u16, latency_ms: u64) -> i64 {
        seed_call(ledger, PROXY_METHOD, path, status, latency_ms).await
    }

    pub async fn seed_problem(
        ledger: &Ledger,
        request_id: i64,
        problem_type: ProblemType,
        description: &str,
        threshold_ms: u64,
    ) -> i64 {
        ledger
            .insert_problem(
                request_id,
                &DetectedProblem {
                    problem_type,
                    description: description.to_string(),
                    threshold_ms,
                },
            )
            .await
            .unwrap()
    }

    /// Rewrite a call's timestamp, for date filter tests
    pub async fn backdate_call(ledger: &Ledger, id: i64, at: DateTime<Utc>) {
        sqlx::query("UPDATE api_requests SET created_at = ? WHERE id = ?")
            .bind(at.timestamp_millis())
            .bind(id)
            .execute(ledger.pool())
            .await
            .unwrap();
    }

    pub async fn backdate_problem(ledger: &Ledger, id: i64, at: DateTime<Utc>) {
        sqlx::query("UPDATE problems SET created_at = ? WHERE id = ?")
            .bind(at.timestamp_millis())
            .bind(id)
            .execute(ledger.pool())
            .await
            .unwrap();
    }
}
