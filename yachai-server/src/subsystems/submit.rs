//! Submission workflow: validate a claim, score it, persist it.
//!
//! Only successfully scored claims reach the store; a failed AI call leaves no
//! trace besides the log line.

use serde::Serialize;
use thiserror::Error;
use yachai_core::{
    ClaimClassifier, ClassifyError, NewReport, ReportStore, Severity, StoreError, VerdictResult,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("claim text is empty")]
    Empty,

    #[error("claim text is {len} characters, maximum is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("rejected: {0}")]
    Rejected(#[from] InputError),

    #[error("AI service unavailable: {0}")]
    Unavailable(#[from] ClassifyError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl SubmitError {
    /// Message shown to the citizen. Internal detail stays in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmitError::Rejected(InputError::Empty) => "অনুগ্রহ করে টেক্সট লিখুন।",
            SubmitError::Rejected(InputError::TooLong { .. }) => "টেক্সটটি অনেক বড়!",
            SubmitError::Unavailable(_) => {
                "AI সেবাটি এই মুহূর্তে পাওয়া যাচ্ছে না। কিছুক্ষণ পর চেষ্টা করুন।"
            }
            SubmitError::Storage(_) => "তথ্য সংরক্ষণ করা যায়নি। আবার চেষ্টা করুন।",
        }
    }
}

/// A scored and stored claim.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: i64,
    #[serde(flatten)]
    pub result: VerdictResult,
    pub severity: Severity,
    pub indicator: &'static str,
}

/// Reject empty (whitespace-only) text and text over `max_len` characters.
pub fn validate_claim(text: &str, max_len: usize) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }
    let len = text.chars().count();
    if len > max_len {
        return Err(InputError::TooLong { len, max: max_len });
    }
    Ok(())
}

/// Run one citizen submission end to end.
///
/// `classifier` is `None` when the AI service was never configured; that is
/// reported the same way as an unreachable service.
pub async fn submit_claim(
    text: &str,
    max_len: usize,
    classifier: Option<&dyn ClaimClassifier>,
    store: &dyn ReportStore,
) -> Result<Submission, SubmitError> {
    if let Err(e) = validate_claim(text, max_len) {
        tracing::debug!(reason = %e, "Claim rejected");
        return Err(e.into());
    }

    let classifier = classifier.ok_or(ClassifyError::MissingApiKey)?;
    let result = match classifier.classify(text).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(backend = classifier.name(), error = %e, "Claim classification failed");
            return Err(e.into());
        }
    };

    let severity = Severity::classify(result.score);
    let id = store.insert(NewReport::from_verdict(text, &result)).await?;

    tracing::info!(id, score = result.score, severity = ?severity, "Claim stored");

    Ok(Submission {
        id,
        result,
        severity,
        indicator: severity.indicator(),
    })
}
