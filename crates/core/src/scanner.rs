//! Walks the watched tree and marks every visible regular file as seen.

use crate::models::Classification;
use crate::store::PathStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenFile {
    pub path: PathBuf,
    /// Classification stored for the path after this pass upserted it.
    pub classification: Classification,
}

/// An entry the walk could not process. The rest of the pass continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: Option<PathBuf>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub seen: Vec<SeenFile>,
    pub skipped: Vec<SkippedEntry>,
}

impl ScanReport {
    /// Seen paths still waiting for a decision.
    pub fn pending(&self) -> impl Iterator<Item = &Path> {
        self.seen
            .iter()
            .filter(|f| !f.classification.is_policy())
            .map(|f| f.path.as_path())
    }
}

#[derive(Debug)]
enum Found {
    File {
        path: PathBuf,
        modified: Option<DateTime<Utc>>,
    },
    Skipped(SkippedEntry),
}

#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    excludes: GlobSet,
    store: PathStore,
}

impl Scanner {
    pub fn new(root: PathBuf, excludes: &[String], store: PathStore) -> anyhow::Result<Self> {
        Ok(Self {
            root,
            excludes: build_globset(excludes)?,
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs one pass over the tree.
    ///
    /// Fails only when the root itself cannot be walked; per-entry problems
    /// end up in [`ScanReport::skipped`].
    pub async fn scan(&self) -> anyhow::Result<ScanReport> {
        let root = fs::canonicalize(&self.root)
            .with_context(|| format!("scan root unavailable: {}", self.root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("scan root is not a directory: {}", root.display());
        }
        info!(root = %root.display(), "scanning");

        let (tx, mut rx) = mpsc::channel(100);
        let excludes = self.excludes.clone();

        // Walker task
        let walker_handle = task::spawn_blocking(move || walk(&root, &excludes, &tx));

        let mut report = ScanReport::default();
        while let Some(found) = rx.recv().await {
            match found {
                Found::File { path, modified } => {
                    match self.store.upsert_seen(&path, modified).await {
                        Ok(classification) => report.seen.push(SeenFile {
                            path,
                            classification,
                        }),
                        Err(err) => {
                            warn!(path = %path.display(), error = %format!("{err:#}"), "upsert failed");
                            report.skipped.push(SkippedEntry {
                                path: Some(path),
                                reason: format!("{err:#}"),
                            });
                        }
                    }
                }
                Found::Skipped(entry) => {
                    debug!(path = ?entry.path, reason = %entry.reason, "skipped entry");
                    report.skipped.push(entry);
                }
            }
        }

        walker_handle.await?;
        info!(
            seen = report.seen.len(),
            pending = report.pending().count(),
            skipped = report.skipped.len(),
            "scan complete"
        );
        Ok(report)
    }
}

fn walk(root: &Path, excludes: &GlobSet, tx: &mpsc::Sender<Found>) {
    let entries = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || should_descend(e, excludes));

    for entry in entries {
        let found = match entry {
            Ok(entry) => match inspect(&entry) {
                Some(found) => found,
                None => continue,
            },
            Err(err) => Found::Skipped(SkippedEntry {
                path: err.path().map(Path::to_path_buf),
                reason: err.to_string(),
            }),
        };
        if tx.blocking_send(found).is_err() {
            // Receiver dropped, stop walking.
            break;
        }
    }
}

/// Returns the file to upsert, a skipped entry, or `None` for directories.
fn inspect(entry: &DirEntry) -> Option<Found> {
    if entry.file_type().is_dir() {
        return None;
    }
    let path = entry.path();
    // Follows symlinks so a link reports its target.
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(err) => {
            return Some(Found::Skipped(SkippedEntry {
                path: Some(path.to_path_buf()),
                reason: err.to_string(),
            }))
        }
    };
    if !meta.is_file() {
        return None;
    }
    if path.to_str().is_none() {
        return Some(Found::Skipped(SkippedEntry {
            path: Some(path.to_path_buf()),
            reason: "path is not valid UTF-8".to_string(),
        }));
    }
    let modified = meta.modified().ok().map(DateTime::<Utc>::from);
    Some(Found::File {
        path: path.to_path_buf(),
        modified,
    })
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid exclude pattern {pat:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn should_descend(entry: &DirEntry, excludes: &GlobSet) -> bool {
    !is_hidden(entry) && !excludes.is_match(entry.path())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().starts_with(b".")
}
