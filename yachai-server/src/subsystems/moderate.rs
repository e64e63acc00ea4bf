//! Moderation workflow: human review of stored claims.
//!
//! A report is pending until an operator records a final verdict. Resolving
//! as False may escalate to the Telegram channel: automatically when the
//! operator enabled auto-send and the AI score meets the threshold, otherwise
//! through an explicit manual send. Alerts are not deduplicated; every manual
//! send is one message.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use yachai_core::config::AlertConfig;
use yachai_core::telegram::escape_html;
use yachai_core::{ClaimReport, FinalVerdict, Notifier, NotifyError, ReportStore, StoreError};

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("report {0} not found")]
    NotFound(i64),

    #[error("report {0} is not resolved as false; no alert to send")]
    NotEligible(i64),

    #[error("alert threshold must be within 0..=100, got {0}")]
    InvalidThreshold(u16),

    #[error("storage failure: {0}")]
    Storage(StoreError),

    #[error("alert delivery failed: {0}")]
    Notify(#[from] NotifyError),
}

impl From<StoreError> for ModerationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ModerationError::NotFound(id),
            other => ModerationError::Storage(other),
        }
    }
}

/// Operator-adjustable escalation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub threshold: u8,
    pub auto_send: bool,
}

impl From<&AlertConfig> for AlertSettings {
    fn from(config: &AlertConfig) -> Self {
        Self {
            threshold: config.threshold,
            auto_send: config.auto_send,
        }
    }
}

/// Partial update from the operator. Threshold arrives wide so out-of-range
/// values are rejected rather than wrapped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub threshold: Option<u16>,
    pub auto_send: Option<bool>,
}

impl AlertSettings {
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), ModerationError> {
        let threshold = match update.threshold {
            Some(t) if t > 100 => return Err(ModerationError::InvalidThreshold(t)),
            Some(t) => t as u8,
            None => self.threshold,
        };
        self.threshold = threshold;
        if let Some(auto_send) = update.auto_send {
            self.auto_send = auto_send;
        }
        Ok(())
    }

    pub fn should_auto_send(&self, score: i32) -> bool {
        self.auto_send && score >= i32::from(self.threshold)
    }
}

/// What happened on the alert path after a verdict was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Final verdict is True or Misleading.
    NotApplicable,
    /// False, but auto-send is off or the score is under the threshold.
    ManualAvailable,
    Sent,
    Failed { reason: String },
}

impl AlertOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, AlertOutcome::Sent)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub report: ClaimReport,
    pub alert: AlertOutcome,
}

pub async fn pending(store: &dyn ReportStore) -> Result<Vec<ClaimReport>, ModerationError> {
    Ok(store.list_pending().await?)
}

/// Record an operator's final verdict, then run the alert path.
///
/// The verdict is committed before any alert is attempted; a failed alert is
/// reported in the outcome and does not undo it.
pub async fn resolve(
    store: &dyn ReportStore,
    notifier: &dyn Notifier,
    settings: AlertSettings,
    id: i64,
    verdict: FinalVerdict,
) -> Result<Resolution, ModerationError> {
    let mut report = store.get(id).await?.ok_or(ModerationError::NotFound(id))?;
    store.update_final_verdict(id, verdict).await?;
    report.final_verdict = Some(verdict);

    tracing::info!(id, verdict = %verdict, score = report.score, "Final verdict recorded");

    let alert = match verdict {
        FinalVerdict::True | FinalVerdict::Misleading => AlertOutcome::NotApplicable,
        FinalVerdict::False if settings.should_auto_send(report.score) => {
            match notifier.send(&format_alert(&report)).await {
                Ok(()) => AlertOutcome::Sent,
                Err(e) => {
                    tracing::warn!(id, error = %e, "Automatic alert failed");
                    AlertOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        }
        FinalVerdict::False => AlertOutcome::ManualAvailable,
    };

    Ok(Resolution { report, alert })
}

/// Operator-triggered alert for a report resolved as False. Sends once per call.
pub async fn send_manual_alert(
    store: &dyn ReportStore,
    notifier: &dyn Notifier,
    id: i64,
) -> Result<ClaimReport, ModerationError> {
    let report = store.get(id).await?.ok_or(ModerationError::NotFound(id))?;
    if report.final_verdict != Some(FinalVerdict::False) {
        return Err(ModerationError::NotEligible(id));
    }

    notifier.send(&format_alert(&report)).await?;
    tracing::info!(id, "Manual alert sent");
    Ok(report)
}

/// Telegram HTML body for an escalation alert.
pub fn format_alert(report: &ClaimReport) -> String {
    let final_verdict = report
        .final_verdict
        .map(|v| v.label())
        .unwrap_or("অপেক্ষমাণ");

    format!(
        "🚨 <b>যাচাই সতর্কতা: মিথ্যা তথ্য নিশ্চিত</b>\n\n\
         <b>দাবি:</b> {}\n\
         <b>AI স্কোর:</b> {}%\n\
         <b>AI ভার্ডিক্ট:</b> {}\n\
         <b>চূড়ান্ত ভার্ডিক্ট:</b> {}\n\
         <b>রিপোর্ট:</b> #{} ({})",
        escape_html(&report.text),
        report.score,
        escape_html(&report.verdict),
        final_verdict,
        report.id,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
