use sqlx::{QueryBuilder, Sqlite};

use super::{Page, SortKey};

/// Physical columns behind each filterable field of a listing
///
/// Problem listings filter on the joined call, except for timestamps which
/// belong to the problem itself.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
    pub id: &'static str,
    pub method: &'static str,
    pub status: &'static str,
    pub latency: &'static str,
    pub path: &'static str,
    pub created_at: &'static str,
}

pub const CALL_COLUMNS: Columns = Columns {
    id: "id",
    method: "method",
    status: "response_status",
    latency: "response_time_ms",
    path: "path",
    created_at: "created_at",
};

pub const PROBLEM_COLUMNS: Columns = Columns {
    id: "p.id",
    method: "r.method",
    status: "r.response_status",
    latency: "r.response_time_ms",
    path: "r.path",
    created_at: "p.created_at",
};

/// A single filter condition; a listing matches when all of its predicates hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    MethodIs(String),
    StatusIs(u16),
    LatencyAtLeast(u64),
    LatencyAtMost(u64),
    /// Unix milliseconds, inclusive
    CreatedFrom(i64),
    /// Unix milliseconds, exclusive
    CreatedUntil(i64),
    /// Case-insensitive substring of the stored path
    PathContains(String),
}

impl Predicate {
    fn push_to(&self, qb: &mut QueryBuilder<'static, Sqlite>, cols: &Columns) {
        match self {
            Self::MethodIs(method) => {
                qb.push(cols.method).push(" = ").push_bind(method.clone());
            }
            Self::StatusIs(status) => {
                qb.push(cols.status).push(" = ").push_bind(i64::from(*status));
            }
            Self::LatencyAtLeast(ms) => {
                qb.push(cols.latency).push(" >= ").push_bind(to_i64(*ms));
            }
            Self::LatencyAtMost(ms) => {
                qb.push(cols.latency).push(" <= ").push_bind(to_i64(*ms));
            }
            Self::CreatedFrom(ms) => {
                qb.push(cols.created_at).push(" >= ").push_bind(*ms);
            }
            Self::CreatedUntil(ms) => {
                qb.push(cols.created_at).push(" < ").push_bind(*ms);
            }
            Self::PathContains(needle) => {
                qb.push(cols.path)
                    .push(" LIKE ")
                    .push_bind(format!("%{}%", escape_like(needle)))
                    .push(" ESCAPE '\\'");
            }
        }
    }
}

/// Build `base WHERE ... ORDER BY ... LIMIT ? OFFSET ?`
///
/// Every value is bound, never spliced. Ordering is always descending with the
/// row id as a tie-break, so equal sort keys page deterministically.
pub fn compose(
    base: &str,
    cols: &Columns,
    predicates: &[Predicate],
    sort: SortKey,
    page: Page,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(base);

    for (i, predicate) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        predicate.push_to(&mut qb, cols);
    }

    let sort_column = match sort {
        SortKey::CreatedAt => cols.created_at,
        SortKey::ResponseTime => cols.latency,
    };
    qb.push(" ORDER BY ")
        .push(sort_column)
        .push(" DESC, ")
        .push(cols.id)
        .push(" DESC");

    qb.push(" LIMIT ").push_bind(i64::from(page.limit));
    qb.push(" OFFSET ").push_bind(to_i64(page.offset));

    qb
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: Page = Page { limit: 100, offset: 0 };

    #[test]
    fn test_compose_without_predicates() {
        let qb = compose(
            "SELECT * FROM api_requests",
            &CALL_COLUMNS,
            &[],
            SortKey::CreatedAt,
            PAGE,
        );
        assert_eq!(
            qb.sql(),
            "SELECT * FROM api_requests ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn test_compose_joins_predicates_with_and() {
        let predicates = [
            Predicate::MethodIs("GET".to_string()),
            Predicate::LatencyAtLeast(100),
            Predicate::PathContains("anime".to_string()),
        ];
        let qb = compose(
            "SELECT * FROM api_requests",
            &CALL_COLUMNS,
            &predicates,
            SortKey::ResponseTime,
            PAGE,
        );
        assert_eq!(
            qb.sql(),
            "SELECT * FROM api_requests WHERE method = ? AND response_time_ms >= ? \
             AND path LIKE ? ESCAPE '\\' ORDER BY response_time_ms DESC, id DESC LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn test_problem_columns_split_between_tables() {
        let predicates = [Predicate::StatusIs(404), Predicate::CreatedUntil(1_000)];
        let qb = compose("SELECT 1", &PROBLEM_COLUMNS, &predicates, SortKey::CreatedAt, PAGE);
        let sql = qb.sql();
        assert!(sql.contains("r.response_status = ?"));
        assert!(sql.contains("p.created_at < ?"));
        assert!(sql.ends_with("ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_injection_attempt_is_bound_not_spliced() {
        let predicates = [Predicate::MethodIs("GET'; DROP TABLE api_requests; --".to_string())];
        let qb = compose("SELECT 1", &CALL_COLUMNS, &predicates, SortKey::CreatedAt, PAGE);
        assert!(!qb.sql().contains("DROP"));
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("anime"), "anime");
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
