use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_latency, decode_status, decode_timestamp, now_millis, to_sql_int};
use super::{Ledger, LedgerError, ProblemRecord};
use crate::classifier::{DetectedProblem, ProblemType};
use crate::query::{QueryFilters, PROBLEM_COLUMNS};

const SELECT_PROBLEMS: &str = r#"
    SELECT
        p.id AS id,
        p.request_id AS request_id,
        p.problem_type AS problem_type,
        p.description AS description,
        p.threshold_ms AS threshold_ms,
        p.created_at AS created_at,
        r.method AS method,
        r.path AS path,
        r.response_status AS response_status,
        r.response_time_ms AS response_time_ms
    FROM problems p
    JOIN api_requests r ON r.id = p.request_id"#;

impl Ledger {
    /// Append a problem for an existing call and return its id
    ///
    /// Fails if `request_id` does not exist or already has a problem.
    pub async fn insert_problem(
        &self,
        request_id: i64,
        problem: &DetectedProblem,
    ) -> Result<i64, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO problems (request_id, problem_type, description, threshold_ms, created_at)
            VALUES (?, ?, ?, ?, MAX(?, (SELECT COALESCE(MAX(created_at), 0) FROM problems)))
            "#,
        )
        .bind(request_id)
        .bind(problem.problem_type.as_str())
        .bind(&problem.description)
        .bind(to_sql_int(problem.threshold_ms))
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_problems(
        &self,
        filters: &QueryFilters,
    ) -> Result<Vec<ProblemRecord>, LedgerError> {
        let mut qb = filters.compose(SELECT_PROBLEMS, &PROBLEM_COLUMNS);
        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.iter().map(problem_from_row).collect()
    }
}

fn problem_from_row(row: &SqliteRow) -> Result<ProblemRecord, LedgerError> {
    let id: i64 = row.try_get("id")?;
    let raw_type: String = row.try_get("problem_type")?;
    let problem_type = raw_type
        .parse::<ProblemType>()
        .map_err(|reason| LedgerError::Corrupt { id, reason })?;

    Ok(ProblemRecord {
        id,
        request_id: row.try_get("request_id")?,
        problem_type,
        description: row.try_get("description")?,
        threshold_ms: decode_latency(id, row.try_get("threshold_ms")?)?,
        created_at: decode_timestamp(id, row.try_get("created_at")?)?,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        status: decode_status(id, row.try_get("response_status")?)?,
        latency_ms: decode_latency(id, row.try_get("response_time_ms")?)?,
    })
}
