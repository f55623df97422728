//! eCFR Analyzer command line interface
//!
//! Browse and search the corpus from a terminal, either against Postgres or
//! against a JSON snapshot.
//!
//! # Usage
//!
//! ```bash
//! # List titles
//! ecfr_cli titles
//!
//! # Print three levels of the tree below a node
//! ecfr_cli tree --parent us/federal/ecfr/title=4 --levels 3
//!
//! # Search title 4 only, offline
//! ecfr_cli --snapshot corpus.json search "bid protest" --title 4
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use ecfr_analyzer::analytics::{AgencyAnalytics, CorrectionAnalytics, TOP_N};
use ecfr_analyzer::config::DatabaseConfig;
use ecfr_analyzer::database::DatabaseManager;
use ecfr_analyzer::models::CorrectionFilter;
use ecfr_analyzer::navigation::{load_forest, NavNode};
use ecfr_analyzer::search::{run_search, SearchQuery};
use ecfr_analyzer::store::{MemoryStore, RegulationStore};

#[derive(Parser)]
#[command(name = "ecfr_cli")]
#[command(version)]
#[command(about = "Browse, search and analyse the Code of Federal Regulations")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Read the corpus from a JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// List every title, ordered by number
    Titles,

    /// Print the navigation tree
    Tree {
        /// Node id to start below (the roots when omitted)
        #[arg(long)]
        parent: Option<String>,

        /// Levels to load, 1 to 3
        #[arg(long, default_value_t = 1)]
        levels: usize,
    },

    /// Search regulation text and citations
    Search {
        query: String,

        /// Restrict to a title number (repeatable)
        #[arg(long = "title")]
        titles: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List corrections in a date range
    Corrections {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Restrict to an agency id (repeatable)
        #[arg(long = "agency")]
        agencies: Vec<String>,

        #[arg(long)]
        title: Option<String>,
    },

    /// Agency and correction analytics
    Analytics,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ecfr_analyzer=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn RegulationStore>> {
    if let Some(path) = &cli.snapshot {
        let store = MemoryStore::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        return Ok(Arc::new(store));
    }

    let config = match &cli.database_url {
        Some(url) => DatabaseConfig::with_url(url.clone()),
        None => DatabaseConfig::default(),
    };
    let db = DatabaseManager::new(config)
        .await
        .context("Failed to connect to database")?;
    Ok(Arc::new(db.regulation_store()))
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tree(nodes: &[NavNode], indent: usize) {
    for node in nodes {
        let marker = if node.children.is_empty() { "-" } else { "+" };
        println!("{}{} {}", "  ".repeat(indent), marker, node.display_label());
        print_tree(&node.children, indent + 1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli).await?;
    let store = store.as_ref();
    let json = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Titles => {
            let titles = store.titles().await?;
            if json {
                return emit(&titles);
            }
            for title in titles {
                println!("Title {:>3}  {}", title.number, title.node_name);
            }
        }

        Commands::Tree { parent, levels } => {
            let (forest, report) = load_forest(store, parent.as_deref(), levels).await?;
            if json {
                return emit(&forest);
            }
            print_tree(&forest, 0);
            if !report.promoted.is_empty() {
                eprintln!("{} orphaned node(s) shown at the top level", report.promoted.len());
            }
        }

        Commands::Search {
            query,
            titles,
            limit,
        } => {
            let query = SearchQuery::new(Some(&query), titles, limit)?;
            let response = run_search(store, &query).await?;
            if json {
                return emit(&response);
            }
            for hit in &response.results {
                println!("{}  {}", hit.section.citation, hit.section.name);
                if !hit.content.is_empty() {
                    let preview: String = hit.content.chars().take(120).collect();
                    println!("    {}", preview.replace('\n', " "));
                }
            }
            println!(
                "{} result(s){}",
                response.total,
                if response.truncated { " (truncated)" } else { "" }
            );
        }

        Commands::Corrections {
            start,
            end,
            agencies,
            title,
        } => {
            let filter =
                CorrectionFilter::parse(Some(&start), Some(&end), agencies, title.as_deref())?;
            let corrections = store.corrections_between(&filter).await?;
            if json {
                return emit(&corrections);
            }
            for c in &corrections {
                println!(
                    "{}  {}  {}",
                    c.error_occurred,
                    c.citation.as_deref().unwrap_or(&c.node_id),
                    c.agency_name.as_deref().unwrap_or("-")
                );
            }
            println!("{} correction(s)", corrections.len());
        }

        Commands::Analytics => {
            let (agencies, top_nodes, corrections) = tokio::try_join!(
                store.all_agencies(),
                store.top_nodes_by_corrections(TOP_N),
                store.all_corrections(),
            )?;
            let agency_analytics = AgencyAnalytics::compute(&agencies);
            let correction_analytics =
                CorrectionAnalytics::compute(&agencies, top_nodes, &corrections);
            emit(&serde_json::json!({
                "agencies": agency_analytics,
                "corrections": correction_analytics,
            }))?;
        }
    }

    Ok(())
}
