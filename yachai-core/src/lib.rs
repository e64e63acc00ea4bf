pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod models;
pub mod normalizer;
pub mod store;
pub mod telegram;

pub use config::YachaiConfig;
pub use error::YachaiError;
pub use gemini::{ClaimClassifier, ClassifyError, GeminiClassifier};
pub use models::{ClaimReport, FinalVerdict, NewReport, Severity, VerdictResult};
pub use normalizer::{normalize, NormalizeError};
pub use store::{open_store, CachedReportStore, JsonlReportStore, PgReportStore, ReportStore, StoreError};
pub use telegram::{Notifier, NotifyError, TelegramClient, TelegramNotifier};
