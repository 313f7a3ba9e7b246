//! Decision providers: the sources a classifier asks for a file's policy.
//!
//! A provider hands back the raw answer it received; validating it is the
//! caller's job. Invalid answers are reported back through [`DecisionProvider::reject`]
//! and the caller asks again.

use std::path::Path;
use thiserror::Error;

pub mod fixed;
pub mod prompt;
pub mod scripted;

pub use fixed::FixedProvider;
pub use prompt::PromptProvider;
pub use scripted::ScriptedProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The source will never answer again (end of input, script exhausted).
    #[error("decision source closed")]
    Closed,
    #[error("decision source io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Asks for a classification of `path` and returns the raw answer.
    async fn request_classification(&self, path: &Path) -> Result<String, ProviderError>;

    /// Tells the source that `answer` was not one of the accepted choices.
    async fn reject(&self, _path: &Path, _answer: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Acknowledges that choice `code` (described by `label`) was stored.
    async fn accepted(&self, _path: &Path, _code: i64, _label: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Tells the source that a valid decision could not be stored.
    async fn not_saved(&self, _path: &Path, _reason: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}
