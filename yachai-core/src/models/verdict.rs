use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed label set the AI is instructed to answer with, in prompt order.
pub const AI_VERDICT_LABELS: [&str; 5] = [
    "সত্য",
    "সম্ভবত সত্য",
    "বিভ্রান্তিকর",
    "সম্ভবত মিথ্যা",
    "মিথ্যা",
];

/// Normalized AI answer. `verdict` is not validated against [`AI_VERDICT_LABELS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictResult {
    pub score: i32,
    pub verdict: String,
    pub justification: String,
}

/// Human-assigned label. Smaller than the AI label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalVerdict {
    #[serde(rename = "সত্য", alias = "true", alias = "True")]
    True,
    #[serde(rename = "বিভ্রান্তিকর", alias = "misleading", alias = "Misleading")]
    Misleading,
    #[serde(rename = "মিথ্যা", alias = "false", alias = "False")]
    False,
}

impl FinalVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            FinalVerdict::True => "সত্য",
            FinalVerdict::Misleading => "বিভ্রান্তিকর",
            FinalVerdict::False => "মিথ্যা",
        }
    }
}

impl fmt::Display for FinalVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown final verdict label: {0}")]
pub struct ParseVerdictError(pub String);

impl FromStr for FinalVerdict {
    type Err = ParseVerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "সত্য" => return Ok(FinalVerdict::True),
            "বিভ্রান্তিকর" => return Ok(FinalVerdict::Misleading),
            "মিথ্যা" => return Ok(FinalVerdict::False),
            _ => {}
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(FinalVerdict::True),
            "misleading" => Ok(FinalVerdict::Misleading),
            "false" => Ok(FinalVerdict::False),
            _ => Err(ParseVerdictError(s.to_string())),
        }
    }
}

/// Display bucket derived from the suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    const HIGH_ABOVE: i32 = 75;
    const MEDIUM_ABOVE: i32 = 50;

    pub fn classify(score: i32) -> Self {
        if score > Self::HIGH_ABOVE {
            Severity::High
        } else if score > Self::MEDIUM_ABOVE {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Indicator shown next to the verdict: blocking, cautionary or clear.
    pub fn indicator(&self) -> &'static str {
        match self {
            Severity::High => "❌",
            Severity::Medium => "⚠️",
            Severity::Low => "✅",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_boundaries() {
        assert_eq!(Severity::classify(75), Severity::Medium);
        assert_eq!(Severity::classify(76), Severity::High);
        assert_eq!(Severity::classify(50), Severity::Low);
        assert_eq!(Severity::classify(51), Severity::Medium);
        assert_eq!(Severity::classify(0), Severity::Low);
        assert_eq!(Severity::classify(100), Severity::High);
    }

    #[test]
    fn final_verdict_parses_bengali_and_english() {
        assert_eq!("মিথ্যা".parse::<FinalVerdict>().unwrap(), FinalVerdict::False);
        assert_eq!(" সত্য ".parse::<FinalVerdict>().unwrap(), FinalVerdict::True);
        assert_eq!("Misleading".parse::<FinalVerdict>().unwrap(), FinalVerdict::Misleading);
        assert_eq!("FALSE".parse::<FinalVerdict>().unwrap(), FinalVerdict::False);
        assert!("সম্ভবত মিথ্যা".parse::<FinalVerdict>().is_err());
    }

    #[test]
    fn final_verdict_serializes_as_label() {
        let json = serde_json::to_string(&FinalVerdict::False).unwrap();
        assert_eq!(json, "\"মিথ্যা\"");
        let back: FinalVerdict = serde_json::from_str("\"misleading\"").unwrap();
        assert_eq!(back, FinalVerdict::Misleading);
    }
}
