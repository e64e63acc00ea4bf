use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::verdict::{FinalVerdict, VerdictResult};

/// A submitted claim together with the AI verdict and the optional human one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub score: i32,
    pub verdict: String,
    pub justification: String,
    pub final_verdict: Option<FinalVerdict>,
}

impl ClaimReport {
    /// A report is pending until a reviewer has set a final verdict.
    pub fn is_pending(&self) -> bool {
        self.final_verdict.is_none()
    }
}

/// Fields supplied by the submission workflow; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub text: String,
    pub score: i32,
    pub verdict: String,
    pub justification: String,
}

impl NewReport {
    pub fn from_verdict(text: impl Into<String>, result: &VerdictResult) -> Self {
        Self {
            text: text.into(),
            score: result.score,
            verdict: result.verdict.clone(),
            justification: result.justification.clone(),
        }
    }
}
