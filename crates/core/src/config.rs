use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scan: ScanConfig,
    pub dispatch: DispatchConfig,
    pub decision: DecisionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// File path (a leading `~` is expanded) or `sqlite:` URL.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub root: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// `prompt` or `fixed`.
    pub provider: String,
    /// Answer given by the `fixed` provider.
    #[serde(default)]
    pub choice: Option<i64>,
}

impl AppConfig {
    pub fn database_location(&self) -> anyhow::Result<String> {
        if self.database.path.starts_with("sqlite:") {
            return Ok(self.database.path.clone());
        }
        Ok(expand_home(&self.database.path)?
            .to_string_lossy()
            .into_owned())
    }

    pub fn scan_root(&self) -> anyhow::Result<PathBuf> {
        expand_home(&self.scan.root)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan.interval_secs)
    }
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_home(path: &str) -> anyhow::Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return Ok(PathBuf::from(path)),
    };
    let home = dirs::home_dir().context("home directory not found")?;
    let rest = rest.trim_start_matches(['/', '\\']);
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder()
        .set_default("database.path", "~/.downloads_lifecycle/classifications.db")?
        .set_default("scan.root", "~/Downloads")?
        .set_default("scan.interval_secs", 10)?
        .set_default("dispatch.capacity", 100)?
        .set_default("decision.provider", "prompt")?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("LIFECYCLE")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
