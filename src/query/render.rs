//! List, table and CSV renderings of ledger records
//!
//! Table rows and CSV lines come from the same [`Tabular::cells`], so the two
//! exports always agree on column order and content.

use serde::Serialize;
use std::fmt;

use super::Page;
use crate::ledger::{format_timestamp, CallRecord, ProblemRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
        }
    }
}

fn int(value: u64) -> Cell {
    Cell::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

pub trait Tabular {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Cell>;
}

impl Tabular for CallRecord {
    const COLUMNS: &'static [&'static str] =
        &["method", "response", "path", "response_time", "created_at"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.method.clone()),
            Cell::Int(i64::from(self.status)),
            Cell::Text(self.path.clone()),
            int(self.latency_ms),
            Cell::Text(format_timestamp(&self.created_at)),
        ]
    }
}

impl Tabular for ProblemRecord {
    const COLUMNS: &'static [&'static str] = &[
        "problem_type",
        "description",
        "method",
        "response",
        "path",
        "response_time",
        "threshold_ms",
        "created_at",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.problem_type.to_string()),
            Cell::Text(self.description.clone()),
            Cell::Text(self.method.clone()),
            Cell::Int(i64::from(self.status)),
            Cell::Text(self.path.clone()),
            int(self.latency_ms),
            int(self.threshold_ms),
            Cell::Text(format_timestamp(&self.created_at)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub count: usize,
    pub limit: u32,
    pub offset: u64,
}

impl Meta {
    fn new(count: usize, page: Page) -> Self {
        Self {
            count,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListView<T> {
    pub data: Vec<T>,
    pub meta: Meta,
}

pub fn list<T: Serialize>(data: Vec<T>, page: Page) -> ListView<T> {
    let meta = Meta::new(data.len(), page);
    ListView { data, meta }
}

#[derive(Debug, Serialize)]
pub struct TableView {
    pub columns: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
    pub meta: Meta,
}

pub fn table<T: Tabular>(records: &[T], page: Page) -> TableView {
    TableView {
        columns: T::COLUMNS,
        rows: records.iter().map(Tabular::cells).collect(),
        meta: Meta::new(records.len(), page),
    }
}

/// Header line plus one line per record
pub fn to_csv<T: Tabular>(records: &[T]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(T::COLUMNS)?;
    for record in records {
        writer.write_record(record.cells().iter().map(Cell::to_string))?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}
