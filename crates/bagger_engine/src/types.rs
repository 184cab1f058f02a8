use thiserror::Error;

use crate::archive::ArchiveError;
use crate::bag::BagError;

/// Network-level outcome taxonomy shared by record fetches and document
/// downloads. Every HTTP status outside 200-399 maps onto exactly one of
/// these variants.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("access is forbidden for {0}")]
    Authentication(String),
    #[error("no content found for {0}")]
    NoContent(String),
    #[error("server is blocking further requests due to rate limits")]
    RateLimitExceeded,
    #[error("service failure: {0}")]
    Service(String),
    #[error("server returned unexpected code {code} for {url}")]
    Internal { code: u16, url: String },
}

impl NetError {
    /// Whether missing-ok mode may swallow this failure for one record or
    /// document. Some servers answer "forbidden" or 5xx for individual
    /// records; when the caller opted in, those are logged and skipped.
    pub fn tolerable_when_missing_ok(&self) -> bool {
        matches!(
            self,
            NetError::NoContent(_) | NetError::Authentication(_) | NetError::Service(_)
        )
    }
}

/// Top-level error for the pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("cannot parse server response: {0}")]
    Parse(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persist(#[from] crate::persist::PersistError),
    #[error(transparent)]
    Bag(#[from] BagError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Progress/messaging sink injected into the pipeline instead of a global
/// message singleton.
pub trait Reporter: Send + Sync {
    /// Routine progress messages.
    fn inform(&self, text: &str);
    /// Conditions worth noticing but not fatal.
    fn warn(&self, text: &str);
    /// Failures, including ones tolerated in missing-ok mode.
    fn alert(&self, text: &str);
}

/// Default reporter that forwards to the `log` facade.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn inform(&self, text: &str) {
        log::info!("{text}");
    }

    fn warn(&self, text: &str) {
        log::warn!("{text}");
    }

    fn alert(&self, text: &str) {
        log::error!("{text}");
    }
}
