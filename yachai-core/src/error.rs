use thiserror::Error;

use crate::store::StoreError;
use crate::telegram::NotifyError;

/// Startup failures surfaced by the server binary.
#[derive(Error, Debug)]
pub enum YachaiError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}
