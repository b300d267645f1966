//! Problem classification
//!
//! Pure decision over a call's status and latency. Status rules are checked in
//! table order and win over the latency rule, so a slow 404 is reported once,
//! as `not_found`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    BadRequest,
    Forbidden,
    NotFound,
    ImATeapot,
    SlowResponse,
}

impl ProblemType {
    pub const ALL: [ProblemType; 5] = [
        ProblemType::BadRequest,
        ProblemType::Forbidden,
        ProblemType::NotFound,
        ProblemType::ImATeapot,
        ProblemType::SlowResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ImATeapot => "im_a_teapot",
            Self::SlowResponse => "slow_response",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown problem type: {}", s))
    }
}

/// Status codes that always constitute a problem, checked top to bottom
const STATUS_RULES: [(u16, ProblemType, &str); 4] = [
    (400, ProblemType::BadRequest, "The request was malformed or invalid."),
    (403, ProblemType::Forbidden, "Access to the requested resource is forbidden."),
    (404, ProblemType::NotFound, "The requested resource could not be found."),
    (418, ProblemType::ImATeapot, "The server refuses to brew coffee because it is a teapot."),
];

/// A problem worth recording, before it is tied to a call id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedProblem {
    pub problem_type: ProblemType,
    pub description: String,
    /// Latency threshold that triggered it, 0 for status-based problems
    pub threshold_ms: u64,
}

/// Classification policy, parameterized by the slow-response threshold
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    slow_threshold_ms: u64,
}

impl Classifier {
    pub fn new(slow_threshold_ms: u64) -> Self {
        Self { slow_threshold_ms }
    }

    pub fn classify(&self, status: u16, latency_ms: u64) -> Option<DetectedProblem> {
        if let Some((_, problem_type, description)) =
            STATUS_RULES.iter().find(|(code, _, _)| *code == status)
        {
            return Some(DetectedProblem {
                problem_type: *problem_type,
                description: (*description).to_string(),
                threshold_ms: 0,
            });
        }

        if latency_ms >= self.slow_threshold_ms {
            return Some(DetectedProblem {
                problem_type: ProblemType::SlowResponse,
                description: format!(
                    "Response time ({}ms) exceeded threshold ({}ms)",
                    latency_ms, self.slow_threshold_ms
                ),
                threshold_ms: self.slow_threshold_ms,
            });
        }

        None
    }
}
