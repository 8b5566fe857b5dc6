use std::sync::Arc;

use crate::Category;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("System is shutting down. Not accepting new events.")]
    Rejected,

    #[error("Unsupported event category: {0}")]
    UnsupportedCategory(Category),

    #[error("Callback attempt failed: {0}")]
    Delivery(Arc<str>),

    #[error("Callback not delivered after {attempts} attempts")]
    DeliveryExhausted { attempts: u32 },

    #[error("Pipeline must be started from within a Tokio runtime")]
    NoRuntime,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn delivery(msg: impl Into<Arc<str>>) -> Self {
        Error::Delivery(msg.into())
    }

    /// Whether the error is an admission-time refusal visible to the submitter.
    pub fn is_admission(&self) -> bool {
        matches!(self, Error::Rejected | Error::UnsupportedCategory(_))
    }
}
