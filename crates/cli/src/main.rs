use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cli::report::{self, RecordView};
use lifecycle_core::config::{self, AppConfig};
use lifecycle_core::models::Classification;
use lifecycle_core::pipeline::{self, Pipeline};
use lifecycle_core::store::PathStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(cfg).await,
        Commands::Scan { json } => run_scan(cfg, json).await,
        Commands::List { status, json } => run_list(cfg, status.map(Into::into), json).await,
        Commands::Classify { path, choice } => run_classify(cfg, path, &choice).await,
        Commands::Summary { json } => run_summary(cfg, json).await,
    }
}

#[derive(Parser)]
#[command(name = "downloads-lifecycle")]
#[command(about = "Assigns a lifecycle policy to every file in a watched folder", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan on an interval and ask for a policy for every new file (default)
    Watch,
    /// Run a single scan pass without asking for decisions
    Scan {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// List known files
    List {
        /// Only files with this classification
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a decision for a path: 1 never archive, 2 archive after 60 days, 3 delete after 60 days
    Classify { path: PathBuf, choice: String },
    /// Count files per classification
    Summary {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Unclassified,
    NeverArchive,
    #[value(name = "archive-after-60-days")]
    ArchiveAfter60Days,
    #[value(name = "delete-after-60-days")]
    DeleteAfter60Days,
}

impl From<StatusArg> for Classification {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Unclassified => Classification::Unclassified,
            StatusArg::NeverArchive => Classification::NeverArchive,
            StatusArg::ArchiveAfter60Days => Classification::ArchiveAfter60Days,
            StatusArg::DeleteAfter60Days => Classification::DeleteAfter60Days,
        }
    }
}

async fn open_store(cfg: &AppConfig) -> Result<PathStore> {
    PathStore::open(&cfg.database_location()?).await
}

async fn run_watch(cfg: AppConfig) -> Result<()> {
    let provider = pipeline::build_provider(&cfg)?;
    let pipeline = Pipeline::open(&cfg, provider).await?;
    println!(
        "Watching {} (Ctrl+C to stop)",
        cfg.scan_root()?.display()
    );
    pipeline.run().await
}

async fn run_scan(cfg: AppConfig, json: bool) -> Result<()> {
    let scan = pipeline::scan_once(&cfg).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report::scan_json(&scan))?);
    } else {
        println!("{}", report::scan_line(&scan));
        for skipped in &scan.skipped {
            let path = skipped
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  skipped {path}: {}", skipped.reason);
        }
    }
    Ok(())
}

async fn run_list(cfg: AppConfig, status: Option<Classification>, json: bool) -> Result<()> {
    let store = open_store(&cfg).await?;
    let records = store.list(status).await?;
    if json {
        let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for record in &records {
            println!("{}", report::record_line(record));
        }
        println!("{} file(s)", records.len());
    }
    Ok(())
}

async fn run_classify(cfg: AppConfig, path: PathBuf, choice: &str) -> Result<()> {
    let classification = Classification::parse_choice(choice)?;
    let path = std::fs::canonicalize(&path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    let store = open_store(&cfg).await?;
    store
        .upsert_classification(&path, classification, chrono::Utc::now())
        .await?;
    tracing::info!(path = %path.display(), classification = classification.label(), "classified manually");
    println!(
        "File '{}' classified as {} ({})",
        path.display(),
        classification.code(),
        classification.label()
    );
    Ok(())
}

async fn run_summary(cfg: AppConfig, json: bool) -> Result<()> {
    let store = open_store(&cfg).await?;
    let counts = store.summary().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report::summary_json(&counts))?);
    } else {
        for (classification, count) in &counts {
            println!("{:<22} {count}", classification.label());
        }
    }
    Ok(())
}
