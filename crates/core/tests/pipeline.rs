use chrono::{DateTime, Utc};
use lifecycle_core::classifier::Classifier;
use lifecycle_core::config::{AppConfig, DatabaseConfig, DecisionConfig, DispatchConfig, ScanConfig};
use lifecycle_core::dispatch;
use lifecycle_core::models::Classification;
use lifecycle_core::pipeline::{self, dispatch_pending, Pipeline};
use lifecycle_core::scanner::Scanner;
use lifecycle_core::store::PathStore;
use providers::{DecisionProvider, ProviderError, ScriptedProvider};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::{tempdir, TempDir};

struct Env {
    _temp: TempDir,
    root: PathBuf,
    db: PathBuf,
}

fn env() -> Env {
    let temp = tempdir().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(&root).unwrap();
    let root = fs::canonicalize(root).unwrap();
    let db = temp.path().join(".downloads_lifecycle").join("classifications.db");
    Env {
        _temp: temp,
        root,
        db,
    }
}

fn config(env: &Env, provider: &str) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: env.db.to_string_lossy().into_owned(),
        },
        scan: ScanConfig {
            root: env.root.to_string_lossy().into_owned(),
            interval_secs: 1,
            exclude: vec![],
        },
        dispatch: DispatchConfig { capacity: 100 },
        decision: DecisionConfig {
            provider: provider.to_string(),
            choice: Some(2),
        },
    }
}

fn write_with_mtime(path: &Path, secs: u64) -> DateTime<Utc> {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"data").unwrap();
    let mtime = UNIX_EPOCH + Duration::from_secs(secs);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
    DateTime::<Utc>::from(mtime)
}

#[tokio::test]
async fn scan_dispatch_classify_rescan() {
    let env = env();
    let a = env.root.join("a.txt");
    let t1 = write_with_mtime(&a, 1_700_000_000);
    write_with_mtime(&env.root.join(".cache/b.txt"), 1_700_000_000);

    let store = PathStore::open(env.db.to_str().unwrap()).await.unwrap();
    let scanner = Scanner::new(env.root.clone(), &[], store.clone()).unwrap();

    // First pass: exactly one unclassified record.
    let report = scanner.scan().await.unwrap();
    let records = store.list(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, a.to_string_lossy());
    assert_eq!(records[0].classification, Classification::Unclassified);
    assert_eq!(records[0].classified_at, None);
    assert_eq!(records[0].last_modified, Some(t1));

    let (dispatcher, receiver) = dispatch::channel(100).unwrap();
    assert_eq!(dispatch_pending(&report, &dispatcher).await.unwrap(), 1);
    // A rescan while the decision is pending queues nothing new.
    let again = scanner.scan().await.unwrap();
    assert_eq!(dispatch_pending(&again, &dispatcher).await.unwrap(), 0);
    drop(dispatcher);

    let provider = Arc::new(ScriptedProvider::new(["2"]));
    let classifier = Classifier::new(store.clone(), provider.clone());
    let before = Utc::now();
    let stored = classifier.run(receiver).await.unwrap();
    let after = Utc::now();
    assert_eq!(stored, 1);
    assert_eq!(provider.asked(), vec![a.clone()]);

    let record = store.get(&a).await.unwrap().unwrap();
    assert_eq!(record.classification, Classification::ArchiveAfter60Days);
    let classified_at = record.classified_at.unwrap();
    assert!(before <= classified_at && classified_at <= after);

    // Second pass over the unchanged file.
    let report = scanner.scan().await.unwrap();
    assert_eq!(report.pending().count(), 0);
    let record = store.get(&a).await.unwrap().unwrap();
    assert_eq!(record.classification, Classification::ArchiveAfter60Days);
    assert_eq!(record.classified_at, Some(classified_at));
    assert_eq!(record.last_modified, Some(t1));
    assert_eq!(store.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_answers_are_rejected_and_asked_again() {
    let env = env();
    let store = PathStore::open(env.db.to_str().unwrap()).await.unwrap();
    let provider = Arc::new(ScriptedProvider::new(["abc", "0", "4", "-1", "", "3"]));
    let classifier = Classifier::new(store.clone(), provider.clone());
    let path = env.root.join("setup.exe");

    let classification = classifier.classify(&path).await.unwrap();

    assert_eq!(classification, Classification::DeleteAfter60Days);
    assert_eq!(provider.rejections(), vec!["abc", "0", "4", "-1", ""]);
    assert_eq!(provider.asked().len(), 6);
    let record = store.get(&path).await.unwrap().unwrap();
    assert_eq!(record.classification, Classification::DeleteAfter60Days);
    assert!(record.classified_at.is_some());
}

#[tokio::test]
async fn lost_decision_leaves_path_unclassified_and_loop_continues() {
    let env = env();
    let store = PathStore::open(env.db.to_str().unwrap()).await.unwrap();
    let locked = env.root.join("locked.txt");
    let free = env.root.join("free.txt");
    store.upsert_seen(&locked, None).await.unwrap();
    store.upsert_seen(&free, None).await.unwrap();
    sqlx::query(
        "CREATE TRIGGER refuse_locked BEFORE UPDATE OF classification ON files \
         WHEN old.path LIKE '%locked.txt' BEGIN SELECT RAISE(ABORT, 'locked'); END",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let (dispatcher, receiver) = dispatch::channel(4).unwrap();
    dispatcher.enqueue(locked.clone()).await.unwrap();
    dispatcher.enqueue(free.clone()).await.unwrap();
    drop(dispatcher);

    let provider = Arc::new(ScriptedProvider::new(["1", "1"]));
    let stored = Classifier::new(store.clone(), provider.clone())
        .run(receiver)
        .await
        .unwrap();

    assert_eq!(stored, 1);
    let locked_record = store.get(&locked).await.unwrap().unwrap();
    assert_eq!(locked_record.classification, Classification::Unclassified);
    assert_eq!(locked_record.classified_at, None);
    let free_record = store.get(&free).await.unwrap().unwrap();
    assert_eq!(free_record.classification, Classification::NeverArchive);
    // Only the stored decision is acknowledged; the lost one is reported.
    assert_eq!(provider.acknowledged(), vec![(free.clone(), 1)]);
    assert_eq!(provider.unsaved(), vec![locked.clone()]);
}

#[tokio::test]
async fn pipeline_stops_when_the_provider_closes() {
    let env = env();
    write_with_mtime(&env.root.join("one.pdf"), 1_700_000_000);
    write_with_mtime(&env.root.join("two.pdf"), 1_700_000_000);
    let cfg = config(&env, "prompt");

    let provider = Arc::new(ScriptedProvider::new(["1"]));
    let pipeline = Pipeline::open(&cfg, provider.clone()).await.unwrap();
    let store = pipeline.store().clone();

    let err = tokio::time::timeout(Duration::from_secs(10), pipeline.run())
        .await
        .expect("pipeline should stop once the provider closes")
        .unwrap_err();
    assert!(format!("{err:#}").contains("decision source closed"));

    let summary = store.summary().await.unwrap();
    assert_eq!(
        summary,
        vec![
            (Classification::Unclassified, 1),
            (Classification::NeverArchive, 1)
        ]
    );
    assert!(env.db.exists());
}

#[tokio::test]
async fn scan_once_reports_pending_files() {
    let env = env();
    write_with_mtime(&env.root.join("a.txt"), 1_700_000_000);
    write_with_mtime(&env.root.join("b/c.txt"), 1_700_000_000);
    let report = pipeline::scan_once(&config(&env, "prompt")).await.unwrap();
    assert_eq!(report.seen.len(), 2);
    assert_eq!(report.pending().count(), 2);
}

#[tokio::test]
async fn fixed_provider_needs_a_valid_choice() {
    let env = env();
    let mut cfg = config(&env, "fixed");
    assert!(pipeline::build_provider(&cfg).is_ok());

    cfg.decision.choice = Some(5);
    assert!(pipeline::build_provider(&cfg).is_err());
    cfg.decision.choice = None;
    assert!(pipeline::build_provider(&cfg).is_err());
    cfg.decision.provider = "oracle".to_string();
    assert!(pipeline::build_provider(&cfg).is_err());
}

#[tokio::test]
async fn stale_scan_report_does_not_ask_twice() {
    let env = env();
    let a = env.root.join("a.txt");
    write_with_mtime(&a, 1_700_000_000);

    let store = PathStore::open(env.db.to_str().unwrap()).await.unwrap();
    let scanner = Scanner::new(env.root.clone(), &[], store.clone()).unwrap();
    let first = scanner.scan().await.unwrap();
    // Taken while the first dispatch is still undecided.
    let stale = scanner.scan().await.unwrap();
    assert_eq!(stale.pending().count(), 1);

    let (dispatcher, receiver) = dispatch::channel(100).unwrap();
    let provider = Arc::new(ScriptedProvider::new(["2", "1"]));
    let classifier = Classifier::new(store.clone(), provider.clone());
    let consumer = tokio::spawn(async move { classifier.run(receiver).await });

    assert_eq!(dispatch_pending(&first, &dispatcher).await.unwrap(), 1);
    tokio::time::timeout(Duration::from_secs(10), async {
        while dispatcher.in_flight_len() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first decision should be resolved");

    // The stale report still lists the path, so it is queued again.
    dispatch_pending(&stale, &dispatcher).await.unwrap();
    drop(dispatcher);

    let stored = consumer.await.unwrap().unwrap();
    assert_eq!(stored, 1);
    assert_eq!(provider.asked(), vec![a.clone()]);
    assert_eq!(provider.remaining(), 1);
    let record = store.get(&a).await.unwrap().unwrap();
    assert_eq!(record.classification, Classification::ArchiveAfter60Days);
}

/// Answers from a list but cannot show anything to the user.
struct MuteProvider {
    answers: Mutex<VecDeque<String>>,
}

fn terminal_gone() -> ProviderError {
    ProviderError::Io(std::io::Error::other("terminal gone"))
}

#[async_trait::async_trait]
impl DecisionProvider for MuteProvider {
    async fn request_classification(&self, _path: &Path) -> Result<String, ProviderError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ProviderError::Closed)
    }

    async fn reject(&self, _path: &Path, _answer: &str) -> Result<(), ProviderError> {
        Err(terminal_gone())
    }

    async fn accepted(&self, _path: &Path, _code: i64, _label: &str) -> Result<(), ProviderError> {
        Err(terminal_gone())
    }

    async fn not_saved(&self, _path: &Path, _reason: &str) -> Result<(), ProviderError> {
        Err(terminal_gone())
    }
}

#[tokio::test]
async fn failed_notifications_do_not_stop_the_loop() {
    let env = env();
    let store = PathStore::open(env.db.to_str().unwrap()).await.unwrap();
    let a = env.root.join("a.txt");
    let b = env.root.join("b.txt");

    let (dispatcher, receiver) = dispatch::channel(4).unwrap();
    dispatcher.enqueue(a.clone()).await.unwrap();
    dispatcher.enqueue(b.clone()).await.unwrap();
    drop(dispatcher);

    let provider = Arc::new(MuteProvider {
        answers: Mutex::new(["nope", "3", "1"].into_iter().map(String::from).collect()),
    });
    let stored = Classifier::new(store.clone(), provider)
        .run(receiver)
        .await
        .unwrap();

    assert_eq!(stored, 2);
    let a_record = store.get(&a).await.unwrap().unwrap();
    assert_eq!(a_record.classification, Classification::DeleteAfter60Days);
    let b_record = store.get(&b).await.unwrap().unwrap();
    assert_eq!(b_record.classification, Classification::NeverArchive);
}
