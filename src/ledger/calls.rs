use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_latency, decode_status, decode_timestamp, now_millis, to_sql_int};
use super::{CallRecord, Ledger, LedgerError, NewCall};
use crate::query::{QueryFilters, CALL_COLUMNS};

const SELECT_CALLS: &str =
    "SELECT id, method, path, response_status, response_time_ms, created_at FROM api_requests";

impl Ledger {
    /// Append a call and return its id
    pub async fn insert_call(&self, call: &NewCall) -> Result<i64, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_requests (method, path, response_status, response_time_ms, created_at)
            VALUES (?, ?, ?, ?, MAX(?, (SELECT COALESCE(MAX(created_at), 0) FROM api_requests)))
            "#,
        )
        .bind(&call.method)
        .bind(&call.path)
        .bind(i64::from(call.status))
        .bind(to_sql_int(call.latency_ms))
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_call(&self, id: i64) -> Result<Option<CallRecord>, LedgerError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CALLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(call_from_row).transpose()
    }

    pub async fn list_calls(&self, filters: &QueryFilters) -> Result<Vec<CallRecord>, LedgerError> {
        let mut qb = filters.compose(SELECT_CALLS, &CALL_COLUMNS);
        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter().map(call_from_row).collect()
    }
}

fn call_from_row(row: &SqliteRow) -> Result<CallRecord, LedgerError> {
    let id: i64 = row.try_get("id")?;
    Ok(CallRecord {
        id,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        status: decode_status(id, row.try_get("response_status")?)?,
        latency_ms: decode_latency(id, row.try_get("response_time_ms")?)?,
        created_at: decode_timestamp(id, row.try_get("created_at")?)?,
    })
}
