use crate::{DecisionProvider, ProviderError};
use std::path::Path;

/// Answers every request with the same configured choice.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    choice: String,
}

impl FixedProvider {
    pub fn new(choice: impl ToString) -> Self {
        Self {
            choice: choice.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl DecisionProvider for FixedProvider {
    async fn request_classification(&self, path: &Path) -> Result<String, ProviderError> {
        tracing::debug!(path = %path.display(), choice = %self.choice, "fixed decision");
        Ok(self.choice.clone())
    }
}
