//! Filtering, sorting and pagination over the ledgers
//!
//! Query strings are coerced loosely: a parameter that fails to parse is
//! dropped and the filter is simply not applied. Nothing here ever rejects a
//! request.

mod predicate;
pub mod render;

pub use predicate::{compose, Columns, Predicate, CALL_COLUMNS, PROBLEM_COLUMNS};

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::QueryConfig;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    ResponseTime,
    #[default]
    CreatedAt,
}

impl SortKey {
    /// Unrecognized keys fall back to newest first
    pub fn parse(raw: &str) -> Self {
        match raw {
            "response_time" => Self::ResponseTime,
            _ => Self::CreatedAt,
        }
    }
}

/// One window of a listing; an offset past the end yields an empty page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

/// Parsed listing parameters; `None` means "not filtered"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilters {
    pub method: Option<String>,
    pub status: Option<u16>,
    pub min_latency_ms: Option<u64>,
    pub max_latency_ms: Option<u64>,
    pub created_after: Option<NaiveDate>,
    pub created_before: Option<NaiveDate>,
    pub search: Option<String>,
    pub sort: SortKey,
    pub page: Page,
}

impl QueryFilters {
    /// No filters, default ordering, first page
    pub fn unfiltered(limits: &QueryConfig) -> Self {
        Self {
            method: None,
            status: None,
            min_latency_ms: None,
            max_latency_ms: None,
            created_after: None,
            created_before: None,
            search: None,
            sort: SortKey::default(),
            page: Page {
                limit: limits.default_limit,
                offset: 0,
            },
        }
    }

    pub fn from_params(params: &HashMap<String, String>, limits: &QueryConfig) -> Self {
        let text = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
        let parsed = |key: &str| params.get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let date = |key: &str| {
            params
                .get(key)
                .and_then(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok())
        };

        let limit = parsed("limit")
            .filter(|v| *v > 0)
            .map(|v| u32::try_from(v).map_or(limits.max_limit, |v| v.min(limits.max_limit)))
            .unwrap_or(limits.default_limit);
        let offset = parsed("offset").unwrap_or(0);

        Self {
            method: text("method"),
            status: params.get("response").and_then(|v| v.trim().parse::<u16>().ok()),
            min_latency_ms: parsed("min_time"),
            max_latency_ms: parsed("max_time"),
            created_after: date("created_after"),
            created_before: date("created_before"),
            search: text("search"),
            sort: params
                .get("sort")
                .map(|v| SortKey::parse(v))
                .unwrap_or_default(),
            page: Page { limit, offset },
        }
    }

    /// The active filters as predicates, in a fixed order
    ///
    /// Date bounds are whole UTC days: `created_before=2024-01-15` admits
    /// everything up to, but not including, midnight of the 16th.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if let Some(method) = &self.method {
            predicates.push(Predicate::MethodIs(method.clone()));
        }
        if let Some(status) = self.status {
            predicates.push(Predicate::StatusIs(status));
        }
        if let Some(ms) = self.min_latency_ms {
            predicates.push(Predicate::LatencyAtLeast(ms));
        }
        if let Some(ms) = self.max_latency_ms {
            predicates.push(Predicate::LatencyAtMost(ms));
        }
        if let Some(start) = self.created_after.and_then(midnight_millis) {
            predicates.push(Predicate::CreatedFrom(start));
        }
        if let Some(end) = self
            .created_before
            .and_then(|d| d.succ_opt())
            .and_then(midnight_millis)
        {
            predicates.push(Predicate::CreatedUntil(end));
        }
        if let Some(search) = &self.search {
            predicates.push(Predicate::PathContains(search.clone()));
        }

        predicates
    }

    pub(crate) fn compose(
        &self,
        base: &str,
        cols: &Columns,
    ) -> sqlx::QueryBuilder<'static, sqlx::Sqlite> {
        compose(base, cols, &self.predicates(), self.sort, self.page)
    }
}

fn midnight_millis(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> QueryConfig {
        QueryConfig {
            default_limit: 100,
            max_limit: 1000,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_params_are_unfiltered() {
        let filters = QueryFilters::from_params(&HashMap::new(), &limits());
        assert_eq!(filters, QueryFilters::unfiltered(&limits()));
        assert!(filters.predicates().is_empty());
        assert_eq!(filters.page, Page { limit: 100, offset: 0 });
    }

    #[test]
    fn test_all_params_parsed() {
        let filters = QueryFilters::from_params(
            &params(&[
                ("method", "GET"),
                ("response", "404"),
                ("min_time", "100"),
                ("max_time", "900"),
                ("created_after", "2024-01-01"),
                ("created_before", "2024-01-31"),
                ("search", "anime"),
                ("sort", "response_time"),
                ("limit", "10"),
                ("offset", "20"),
            ]),
            &limits(),
        );

        assert_eq!(filters.method.as_deref(), Some("GET"));
        assert_eq!(filters.status, Some(404));
        assert_eq!(filters.min_latency_ms, Some(100));
        assert_eq!(filters.max_latency_ms, Some(900));
        assert_eq!(filters.created_after, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filters.created_before, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(filters.search.as_deref(), Some("anime"));
        assert_eq!(filters.sort, SortKey::ResponseTime);
        assert_eq!(filters.page, Page { limit: 10, offset: 20 });
        assert_eq!(filters.predicates().len(), 7);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let filters = QueryFilters::from_params(
            &params(&[
                ("method", ""),
                ("response", "abc"),
                ("min_time", "-5"),
                ("max_time", "fast"),
                ("created_after", "yesterday"),
                ("created_before", "2024-13-01"),
                ("search", ""),
                ("sort", "vibes"),
                ("limit", "0"),
                ("offset", "-1"),
            ]),
            &limits(),
        );

        assert!(filters.predicates().is_empty());
        assert_eq!(filters.sort, SortKey::CreatedAt);
        assert_eq!(filters.page, Page { limit: 100, offset: 0 });
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let filters = QueryFilters::from_params(&params(&[("limit", "50000")]), &limits());
        assert_eq!(filters.page.limit, 1000);
    }

    #[test]
    fn test_limit_beyond_u32_still_clamped() {
        let filters = QueryFilters::from_params(&params(&[("limit", "99999999999")]), &limits());
        assert_eq!(filters.page.limit, 1000);
    }

    #[test]
    fn test_large_offset_kept_as_given() {
        let filters = QueryFilters::from_params(&params(&[("offset", "5000000000")]), &limits());
        assert_eq!(
            filters.page,
            Page {
                limit: 100,
                offset: 5_000_000_000
            }
        );
    }

    #[test]
    fn test_status_zero_is_a_valid_filter() {
        let filters = QueryFilters::from_params(&params(&[("response", "0")]), &limits());
        assert_eq!(filters.predicates(), vec![Predicate::StatusIs(0)]);
    }

    #[test]
    fn test_date_bounds_cover_whole_days() {
        let filters = QueryFilters::from_params(
            &params(&[("created_after", "2024-01-15"), ("created_before", "2024-01-15")]),
            &limits(),
        );
        // 2024-01-15T00:00:00Z and 2024-01-16T00:00:00Z
        assert_eq!(
            filters.predicates(),
            vec![
                Predicate::CreatedFrom(1_705_276_800_000),
                Predicate::CreatedUntil(1_705_363_200_000),
            ]
        );
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("response_time"), SortKey::ResponseTime);
        assert_eq!(SortKey::parse("created_at"), SortKey::CreatedAt);
        assert_eq!(SortKey::parse("RESPONSE_TIME"), SortKey::CreatedAt);
    }
}
