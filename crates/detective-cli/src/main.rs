//! Open Detective CLI
//!
//! - `ask`: full pipeline (resolve, query, repair, analyze, narrate, compose)
//! - `resolve`: show how a question maps onto the catalog
//! - `validate`: run the read-only gate on a SQL string
//! - `init-db`: create the metrics table, optionally with demo data

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use detective_engine::{Answer, AnswerStatus, Detective, EngineConfig};
use detective_model::{add_months, MetricCatalog, MetricKind};
use detective_narrator::ChatMessage;
use detective_query::{check, resolve, synthesize, SqliteStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "detective")]
#[command(author, version, about = "Open Detective: ask questions about open-source project metrics")]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about tracked projects.
    Ask {
        /// The question (words are joined with spaces).
        #[arg(required = true)]
        question: Vec<String>,
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite metrics database (overrides config).
        #[arg(long)]
        db: Option<PathBuf>,
        /// Catalog JSON file (overrides config).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Print the full answer record as JSON.
        #[arg(long)]
        json: bool,
        /// JSON array of prior `{role, content}` turns.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Resolve a question and print the synthesized SQL.
    Resolve {
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Check whether a SQL statement would be allowed to run.
    Validate {
        sql: String,
    },

    /// Create the `metric_series` table.
    InitDb {
        #[arg(long)]
        db: PathBuf,
        /// Seed a deterministic demo series for every catalog project.
        #[arg(long)]
        demo: bool,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Ask {
            question,
            config,
            db,
            catalog,
            json,
            history,
        } => cmd_ask(
            &question.join(" "),
            config.as_deref(),
            db,
            catalog,
            json,
            history.as_deref(),
        ),
        Commands::Resolve {
            text,
            config,
            catalog,
        } => cmd_resolve(&text.join(" "), config.as_deref(), catalog),
        Commands::Validate { sql } => cmd_validate(&sql),
        Commands::InitDb {
            db,
            demo,
            catalog,
            config,
        } => cmd_init_db(&db, demo, config.as_deref(), catalog),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(path).context("failed to load configuration")
}

fn load_catalog(path: &Path) -> Result<MetricCatalog> {
    MetricCatalog::load(path).with_context(|| format!("failed to load catalog {}", path.display()))
}

fn load_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read history {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid history {}", path.display()))
}

// ============================================================================
// ask
// ============================================================================

fn cmd_ask(
    question: &str,
    config: Option<&Path>,
    db: Option<PathBuf>,
    catalog: Option<PathBuf>,
    json: bool,
    history: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(db) = db {
        config.database_path = db;
    }
    if let Some(catalog) = catalog {
        config.catalog_path = catalog;
    }
    let history = match history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };

    let detective = Detective::from_config(&config).with_context(|| {
        format!(
            "cannot start (create the database with `detective init-db --db {} --demo`)",
            config.database_path.display()
        )
    })?;
    let answer = detective.answer(question, &history);

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    let label = match answer.status {
        AnswerStatus::Answered => "answered".green().bold(),
        AnswerStatus::NoEvidence => "no evidence".yellow().bold(),
        AnswerStatus::Unresolved => "unresolved".yellow().bold(),
        AnswerStatus::Failed => "failed".red().bold(),
    };
    println!("{} {}", label, answer.request_id.to_string().dimmed());
    println!();
    println!("{}", answer.text);

    if let Some(sql) = &answer.sql {
        println!();
        let source = answer
            .query_source
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_default();
        println!("{} ({source}, {} attempt(s))", "SQL".bold(), answer.attempts);
        println!("  {sql}");
    }
    if !answer.repair_log.is_empty() {
        println!("{}", "Repair log".bold());
        for line in &answer.repair_log {
            println!("  - {line}");
        }
    }
    if !answer.rows.is_empty() {
        println!(
            "{} {} rows, {} forecast",
            "Evidence".bold(),
            answer.rows.len(),
            answer.forecast.len()
        );
        for row in &answer.forecast {
            println!(
                "  {} {} {:.2} {}",
                row.time_bucket,
                row.project_id,
                row.value,
                "(forecast)".dimmed()
            );
        }
    }
}

// ============================================================================
// resolve / validate
// ============================================================================

fn cmd_resolve(text: &str, config: Option<&Path>, catalog: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let path = catalog.unwrap_or(config.catalog_path);
    let catalog = load_catalog(&path)?;

    let intent = resolve(text, &catalog).map_err(|e| anyhow!("{e}"))?;
    println!("{} {}", "metric".bold(), intent.metric.as_str());
    if !intent.metric_explicit {
        println!("  {}", "(default, no metric keyword found)".dimmed());
    }
    for m in &intent.matches {
        println!("{} {} via {:?} ({:?})", "project".bold(), m.project, m.via, m.kind);
    }
    println!("{} {}", "sql".bold(), synthesize(&intent).sql);
    Ok(())
}

fn cmd_validate(sql: &str) -> Result<()> {
    match check(sql) {
        Ok(()) => {
            println!("{}", "accepted".green().bold());
            Ok(())
        }
        Err(rejection) => {
            println!("{} {}", "rejected".red().bold(), rejection);
            Err(anyhow!("query rejected: {rejection}"))
        }
    }
}

// ============================================================================
// init-db
// ============================================================================

const DEMO_START: &str = "2023-01";
const DEMO_MONTHS: u32 = 12;

fn cmd_init_db(
    db: &Path,
    demo: bool,
    config: Option<&Path>,
    catalog: Option<PathBuf>,
) -> Result<()> {
    if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = SqliteStore::open(db).with_context(|| format!("failed to open {}", db.display()))?;
    store.create_schema()?;
    eprintln!("{} {}", "created".green().bold(), db.display());

    if !demo {
        return Ok(());
    }

    let config = load_config(config)?;
    let path = catalog.unwrap_or(config.catalog_path);
    let catalog = load_catalog(&path)?;

    let mut inserted = 0;
    for (index, project) in catalog.projects().iter().enumerate() {
        for (offset, metric) in MetricKind::ALL.iter().enumerate() {
            let series = demo_series(index + offset, *metric)?;
            let points: Vec<(&str, f64)> = series.iter().map(|(b, v)| (b.as_str(), *v)).collect();
            inserted += store.insert_series(project, *metric, &points)?;
        }
        tracing::info!(project = %project, "seeded demo series");
    }
    eprintln!(
        "{} {} rows for {} projects",
        "seeded".green().bold(),
        inserted,
        catalog.len()
    );
    Ok(())
}

/// Steady growth with one spike month whose position depends on `seed`.
fn demo_series(seed: usize, metric: MetricKind) -> Result<Vec<(String, f64)>> {
    let base = match metric {
        MetricKind::Stars => 1000.0,
        MetricKind::OpenRank => 50.0,
        _ => 200.0,
    } * (1 + seed % 5) as f64;
    let growth = 0.02 + (seed % 3) as f64 * 0.01;
    let spike_month = 3 + (seed % 7) as u32;

    (0..DEMO_MONTHS)
        .map(|m| -> Result<(String, f64)> {
            let bucket = add_months(DEMO_START, m)?;
            let mut value = base * (1.0 + growth).powi(m as i32);
            if m == spike_month {
                value *= 1.8;
            }
            Ok((bucket, (value * 100.0).round() / 100.0))
        })
        .collect()
}
