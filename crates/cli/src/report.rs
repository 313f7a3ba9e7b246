use lifecycle_core::models::{Classification, FileRecord};
use lifecycle_core::scanner::ScanReport;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct RecordView {
    pub path: String,
    pub classification: Classification,
    pub code: i64,
    pub classified_at: Option<String>,
    pub last_modified: Option<String>,
}

impl From<&FileRecord> for RecordView {
    fn from(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            classification: record.classification,
            code: record.classification.code(),
            classified_at: record.classified_at.map(|t| t.to_rfc3339()),
            last_modified: record.last_modified.map(|t| t.to_rfc3339()),
        }
    }
}

pub fn scan_json(report: &ScanReport) -> Value {
    json!({
        "status": "ok",
        "seen": report.seen.len(),
        "pending": report.pending().count(),
        "skipped": report.skipped.iter().map(|s| json!({
            "path": s.path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            "reason": s.reason,
        })).collect::<Vec<_>>(),
    })
}

pub fn scan_line(report: &ScanReport) -> String {
    format!(
        "scan: seen {}, pending {}, skipped {}",
        report.seen.len(),
        report.pending().count(),
        report.skipped.len()
    )
}

pub fn record_line(record: &FileRecord) -> String {
    let when = record
        .classified_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "[{}] {:<22} {:<16} {}",
        record.classification.code(),
        record.classification.label(),
        when,
        record.path
    )
}

pub fn summary_json(counts: &[(Classification, i64)]) -> Value {
    let mut map = serde_json::Map::new();
    for c in std::iter::once(Classification::Unclassified).chain(Classification::POLICIES) {
        let n = counts.iter().find(|(k, _)| *k == c).map(|(_, n)| *n).unwrap_or(0);
        map.insert(c.label().replace(' ', "_"), json!(n));
    }
    Value::Object(map)
}
