use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod correlation;
mod db;
mod enrich;
mod error;
mod filter;
mod jira;
mod models;
mod patterns;
mod report;
mod resolution;
mod scoring;
mod text;

use filter::{Bounds, PopulationFilter, DEFAULT_MAX_FIELD_WORDS, DEFAULT_MAX_RESOLUTION_HOURS};
use models::{Analysis, ScoreKind};
use patterns::Detectors;
use resolution::ClosurePolicy;
use scoring::{HttpScorer, Scorer};

#[derive(Parser)]
#[command(name = "ticket-insights")]
#[command(about = "Correlates issue-tracker ticket signals with time-to-resolve", long_about = None)]
struct Cli {
    /// Log at debug level unless TICKET_INSIGHTS_LOG says otherwise
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Copy)]
struct BoundsArgs {
    /// Tickets taking longer than this to close are treated as outliers
    #[arg(long, default_value_t = DEFAULT_MAX_RESOLUTION_HOURS)]
    max_hours: f64,
    /// Keep outliers in every analysis
    #[arg(long, conflicts_with = "max_hours")]
    no_outlier_bound: bool,
    /// Upper bound on summary + description words for fields complexity
    #[arg(long, default_value_t = DEFAULT_MAX_FIELD_WORDS)]
    max_field_words: usize,
}

impl From<BoundsArgs> for Bounds {
    fn from(args: BoundsArgs) -> Self {
        Bounds {
            max_resolution_hours: (!args.no_outlier_bound).then_some(args.max_hours),
            max_field_words: args.max_field_words,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import Jira issues from a REST search export
    Import {
        #[arg(long)]
        json: PathBuf,
        #[arg(long, value_enum, default_value_t = ClosurePolicy::First)]
        closure: ClosurePolicy,
    },
    /// Recompute derived fields and optionally score tickets
    Analyze {
        #[arg(long)]
        sentiment: bool,
        #[arg(long)]
        grammar: bool,
        /// Maximum scoring calls in flight
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        #[arg(long, value_enum, default_value_t = ClosurePolicy::First)]
        closure: ClosurePolicy,
    },
    /// Generate a markdown report of every analysis
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
    /// Export one analysis as aligned CSV series
    Export {
        /// e.g. wordiness:description, attachments, sentiment, stack_traces
        #[arg(long)]
        analysis: Analysis,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("TICKET_INSIGHTS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

fn scorers_from_env(sentiment: bool, grammar: bool) -> anyhow::Result<Vec<Arc<dyn Scorer>>> {
    let api_key = std::env::var("SCORER_API_KEY").ok();
    let mut scorers: Vec<Arc<dyn Scorer>> = Vec::new();

    if sentiment {
        let endpoint = std::env::var("SENTIMENT_ENDPOINT")
            .context("SENTIMENT_ENDPOINT must be set to score sentiment")?;
        scorers.push(Arc::new(HttpScorer::new(
            ScoreKind::Sentiment,
            endpoint,
            api_key.clone(),
        )));
    }
    if grammar {
        let endpoint = std::env::var("GRAMMAR_ENDPOINT")
            .context("GRAMMAR_ENDPOINT must be set to score grammar")?;
        scorers.push(Arc::new(HttpScorer::new(ScoreKind::Grammar, endpoint, api_key)));
    }

    Ok(scorers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("could not load .env file");
        }
    }
    init_tracing(cli.verbose)?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { json, closure } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("could not read {}", json.display()))?;
            let jira::ImportBatch {
                mut tickets,
                skipped,
            } = jira::parse_issues(&raw)?;
            let detectors = Detectors::new()?;
            let summary = enrich::enrich(&mut tickets, &detectors, closure);
            info!(?summary, "import enriched");

            let keys: Vec<String> = tickets.iter().map(|ticket| ticket.key.clone()).collect();
            let stored = db::fetch_tickets_by_keys(&pool, &keys).await?;
            let carried = enrich::carry_scores(&mut tickets, &stored);

            let written = db::upsert_tickets(&pool, &tickets).await?;
            println!(
                "Imported {written} tickets from {} ({} resolved, {} unresolved).",
                json.display(),
                summary.resolved,
                summary.unresolved
            );
            if carried > 0 {
                println!("Kept stored scores for {carried} tickets with unchanged text.");
            }
            if skipped > 0 {
                println!("Skipped {skipped} unreadable issues; see the log for keys.");
            }
        }
        Commands::Analyze {
            sentiment,
            grammar,
            concurrency,
            closure,
        } => {
            let scorers = scorers_from_env(sentiment, grammar)?;
            let detectors = Detectors::new()?;
            let mut tickets = db::fetch_tickets(&pool).await?;
            if tickets.is_empty() {
                println!("No tickets stored; run import first.");
                return Ok(());
            }

            let summary = enrich::enrich(&mut tickets, &detectors, closure);
            println!(
                "Derived fields for {} tickets: {} resolved, {} closed without Open -> Closed, {} reopened.",
                tickets.len(),
                summary.resolved,
                summary.closed_indirectly,
                summary.reopened
            );
            println!(
                "Steps to reproduce in {}, stack traces in {}.",
                summary.with_steps_to_reproduce, summary.with_stack_trace
            );

            if !scorers.is_empty() {
                let cancel = CancellationToken::new();
                let scoring =
                    scoring::score_population(&mut tickets, &scorers, concurrency, &cancel);
                tokio::pin!(scoring);

                // Ctrl-C only cancels scoring; partial results are still written.
                let summaries = tokio::select! {
                    summaries = &mut scoring => summaries,
                    Ok(()) = tokio::signal::ctrl_c() => {
                        warn!("interrupt received, cancelling scoring");
                        cancel.cancel();
                        (&mut scoring).await
                    }
                };
                for summary in &summaries {
                    println!(
                        "- {}: {} scored, {} skipped (no score), {} failed",
                        summary.kind,
                        summary.scored,
                        summary.skipped(),
                        summary.failed
                    );
                }
            }

            let written = db::upsert_tickets(&pool, &tickets).await?;
            println!("Wrote {written} tickets back.");
        }
        Commands::Report { out, bounds } => {
            let tickets = db::fetch_tickets(&pool).await?;
            let report = report::build_report(&tickets, bounds.into());
            std::fs::write(&out, report)
                .with_context(|| format!("could not write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            analysis,
            out,
            bounds,
        } => {
            let tickets = db::fetch_tickets(&pool).await?;
            let filter = PopulationFilter::new(bounds.into());
            let correlation = correlation::run(analysis, &tickets, &filter);
            report::write_series_csv(&out, &correlation.series)?;

            println!(
                "Exported {} paired samples for {} to {}.",
                correlation.series.len(),
                analysis.title(),
                out.display()
            );
            if correlation.series.skipped_no_score > 0 {
                println!(
                    "Skipped {} eligible tickets with no score.",
                    correlation.series.skipped_no_score
                );
            }
            if let Some(means) = &correlation.means {
                for (label, stats) in means.iter() {
                    match stats.mean() {
                        Some(hours) => println!("- {label}: {hours:.1}h over {} tickets", stats.count),
                        None => println!("- {label}: undefined (no tickets)"),
                    }
                }
            }
        }
    }

    Ok(())
}
