//! Single consumer that asks a decision provider about each dispatched path.

use crate::dispatch::DispatchReceiver;
use crate::models::Classification;
use crate::store::PathStore;
use anyhow::Context;
use chrono::Utc;
use providers::DecisionProvider;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Classifier {
    store: PathStore,
    provider: Arc<dyn DecisionProvider>,
}

impl Classifier {
    pub fn new(store: PathStore, provider: Arc<dyn DecisionProvider>) -> Self {
        Self { store, provider }
    }

    /// Asks the provider until it gives one of the three policy choices.
    ///
    /// Invalid answers are rejected back to the provider and the same path
    /// is asked again, without limit.
    pub async fn resolve(&self, path: &Path) -> anyhow::Result<Classification> {
        loop {
            let answer = self
                .provider
                .request_classification(path)
                .await
                .with_context(|| format!("no decision for {}", path.display()))?;
            match Classification::parse_choice(&answer) {
                Ok(classification) => return Ok(classification),
                Err(err) => {
                    warn!(path = %path.display(), %err, "rejected decision");
                    if let Err(err) = self.provider.reject(path, &answer).await {
                        warn!(path = %path.display(), %err, "could not report rejection");
                    }
                }
            }
        }
    }

    /// Resolves `path` and stores the decision.
    pub async fn classify(&self, path: &Path) -> anyhow::Result<Classification> {
        let classification = self.resolve(path).await?;
        self.persist(path, classification).await?;
        Ok(classification)
    }

    /// Stores `classification` and tells the provider whether it stuck.
    async fn persist(&self, path: &Path, classification: Classification) -> anyhow::Result<()> {
        match self
            .store
            .upsert_classification(path, classification, Utc::now())
            .await
        {
            Ok(()) => {
                if let Err(err) = self
                    .provider
                    .accepted(path, classification.code(), classification.label())
                    .await
                {
                    warn!(path = %path.display(), %err, "could not acknowledge decision");
                }
                Ok(())
            }
            Err(err) => {
                let reason = format!("{err:#}");
                if let Err(notify) = self.provider.not_saved(path, &reason).await {
                    warn!(path = %path.display(), err = %notify, "could not report lost decision");
                }
                Err(err)
            }
        }
    }

    /// True when the store already holds a policy for `path`. A lookup
    /// failure counts as not decided so the question is still asked.
    async fn already_decided(&self, path: &Path) -> bool {
        match self.store.get(path).await {
            Ok(Some(record)) => record.classification.is_policy(),
            Ok(None) => false,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "lookup before asking failed");
                false
            }
        }
    }

    /// Drains `receiver` one path at a time until the queue is closed.
    ///
    /// Paths that were classified after being queued are dropped without
    /// asking. A decision that cannot be stored is logged and dropped; the
    /// path stays unclassified and is dispatched again by a later scan.
    /// Returns the number of decisions stored.
    pub async fn run(&self, mut receiver: DispatchReceiver) -> anyhow::Result<u64> {
        let mut stored = 0u64;
        while let Some(item) = receiver.recv().await {
            let path = item.path();
            if self.already_decided(path).await {
                debug!(path = %path.display(), "already classified, skipping");
                continue;
            }
            let classification = self.resolve(path).await?;
            match self.persist(path, classification).await {
                Ok(()) => {
                    stored += 1;
                    info!(path = %path.display(), classification = classification.label(), "classified");
                }
                Err(err) => {
                    error!(path = %path.display(), error = %format!("{err:#}"), "decision lost, not persisted");
                }
            }
            drop(item);
        }
        Ok(stored)
    }
}
