use crate::{DecisionProvider, ProviderError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Replays a fixed list of answers, then reports itself closed.
///
/// Every request and rejection is recorded so callers can assert on them.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<PathBuf>>,
    rejected: Mutex<Vec<String>>,
    acknowledged: Mutex<Vec<(PathBuf, i64)>>,
    unsaved: Mutex<Vec<PathBuf>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Paths asked about, in order, one entry per attempt.
    pub fn asked(&self) -> Vec<PathBuf> {
        lock(&self.asked).clone()
    }

    /// Answers that were rejected as invalid.
    pub fn rejections(&self) -> Vec<String> {
        lock(&self.rejected).clone()
    }

    /// Decisions reported as stored, with their codes.
    pub fn acknowledged(&self) -> Vec<(PathBuf, i64)> {
        lock(&self.acknowledged).clone()
    }

    /// Paths whose decision was reported as not stored.
    pub fn unsaved(&self) -> Vec<PathBuf> {
        lock(&self.unsaved).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.answers).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn request_classification(&self, path: &Path) -> Result<String, ProviderError> {
        lock(&self.asked).push(path.to_path_buf());
        lock(&self.answers).pop_front().ok_or(ProviderError::Closed)
    }

    async fn reject(&self, _path: &Path, answer: &str) -> Result<(), ProviderError> {
        lock(&self.rejected).push(answer.to_string());
        Ok(())
    }

    async fn accepted(&self, path: &Path, code: i64, _label: &str) -> Result<(), ProviderError> {
        lock(&self.acknowledged).push((path.to_path_buf(), code));
        Ok(())
    }

    async fn not_saved(&self, path: &Path, _reason: &str) -> Result<(), ProviderError> {
        lock(&self.unsaved).push(path.to_path_buf());
        Ok(())
    }
}
