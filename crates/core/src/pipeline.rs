use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::dispatch::{self, DispatchError, DispatchReceiver, Dispatcher};
use crate::models::Classification;
use crate::scanner::{ScanReport, Scanner};
use crate::store::PathStore;
use anyhow::Context;
use providers::{DecisionProvider, FixedProvider, PromptProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scanner, dispatch queue and classifier over one store.
pub struct Pipeline {
    store: PathStore,
    scanner: Scanner,
    dispatcher: Dispatcher,
    receiver: DispatchReceiver,
    classifier: Classifier,
    interval: Duration,
}

impl Pipeline {
    pub async fn open(
        config: &AppConfig,
        provider: Arc<dyn DecisionProvider>,
    ) -> anyhow::Result<Self> {
        let store = PathStore::open(&config.database_location()?).await?;
        Self::with_store(config, store, provider)
    }

    pub fn with_store(
        config: &AppConfig,
        store: PathStore,
        provider: Arc<dyn DecisionProvider>,
    ) -> anyhow::Result<Self> {
        let scanner = Scanner::new(config.scan_root()?, &config.scan.exclude, store.clone())?;
        let (dispatcher, receiver) = dispatch::channel(config.dispatch.capacity)?;
        let classifier = Classifier::new(store.clone(), provider);
        Ok(Self {
            store,
            scanner,
            dispatcher,
            receiver,
            classifier,
            interval: config.scan_interval(),
        })
    }

    pub fn store(&self) -> &PathStore {
        &self.store
    }

    /// Runs until the classifier stops, which only happens when the
    /// decision provider fails or closes.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            scanner,
            dispatcher,
            receiver,
            classifier,
            interval,
            ..
        } = self;
        info!(root = %scanner.root().display(), ?interval, "watching");

        let watcher = tokio::spawn(watch_loop(scanner, dispatcher, interval));
        let outcome = classifier.run(receiver).await;
        watcher.abort();

        let stored = outcome?;
        info!(stored, "classifier stopped");
        Ok(())
    }
}

/// Scans forever, queueing every unclassified path that is not already
/// pending. Ends only once the queue is closed.
pub async fn watch_loop(scanner: Scanner, dispatcher: Dispatcher, interval: Duration) {
    loop {
        match scanner.scan().await {
            Ok(report) => {
                if let Err(DispatchError::Closed) = dispatch_pending(&report, &dispatcher).await {
                    debug!("dispatch queue closed, watch loop exiting");
                    return;
                }
            }
            Err(err) => warn!(error = %format!("{err:#}"), "scan failed"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Queues the report's unclassified paths. Returns how many were queued.
pub async fn dispatch_pending(
    report: &ScanReport,
    dispatcher: &Dispatcher,
) -> Result<usize, DispatchError> {
    let mut queued = 0;
    for path in report.pending() {
        if dispatcher.enqueue(path.to_path_buf()).await? {
            queued += 1;
        }
    }
    if queued > 0 {
        debug!(queued, in_flight = dispatcher.in_flight_len(), "dispatched");
    }
    Ok(queued)
}

/// One scan pass with no classification.
pub async fn scan_once(config: &AppConfig) -> anyhow::Result<ScanReport> {
    let store = PathStore::open(&config.database_location()?).await?;
    let scanner = Scanner::new(config.scan_root()?, &config.scan.exclude, store)?;
    scanner.scan().await
}

pub fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn DecisionProvider>> {
    match config.decision.provider.as_str() {
        "prompt" => Ok(Arc::new(PromptProvider::stdio())),
        "fixed" => {
            let choice = config
                .decision
                .choice
                .context("decision.choice is required for the fixed provider")?;
            let classification = Classification::from_choice(choice)?;
            Ok(Arc::new(FixedProvider::new(classification.code())))
        }
        other => anyhow::bail!("unknown decision provider: {other}"),
    }
}
