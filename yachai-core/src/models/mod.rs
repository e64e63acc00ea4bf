pub mod report;
pub mod verdict;

pub use report::{ClaimReport, NewReport};
pub use verdict::{FinalVerdict, ParseVerdictError, Severity, VerdictResult, AI_VERDICT_LABELS};
