use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod export;
mod insights;
mod models;
mod normalize;
mod report;
mod scoring;
mod server;
mod survey;

use config::Config;
use insights::{FunctionsClient, Insight};
use models::{PulseScore, SurveyQuestion, SurveyResponse};
use scoring::UnassessedThemes;

#[derive(Parser)]
#[command(name = "pulseplace")]
#[command(about = "PulseScore culture scoring for PulsePlace.ai", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Themes,
    Responses,
}

#[derive(clap::Args)]
struct Scope {
    #[arg(long, default_value = survey::DEFAULT_SURVEY_ID)]
    survey: String,
    #[arg(long, default_value_t = 30)]
    since_days: i64,
    /// Restrict to a single respondent
    #[arg(long)]
    respondent: Option<String>,
    /// Average unanswered themes into categories as 0 instead of skipping them
    #[arg(long)]
    count_unassessed_as_zero: bool,
}

impl Scope {
    fn policy(&self) -> UnassessedThemes {
        if self.count_unassessed_as_zero {
            UnassessedThemes::CountAsZero
        } else {
            UnassessedThemes::Exclude
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the built-in survey and sample responses
    Seed,
    /// Import survey responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = survey::DEFAULT_SURVEY_ID)]
        survey: String,
    },
    /// Compute the PulseScore for a survey
    Score {
        #[command(flatten)]
        scope: Scope,
        /// Store the result as a score snapshot
        #[arg(long)]
        save: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value = "pulse-report.md")]
        out: PathBuf,
        /// Include an AI insight section from the generate-insights function
        #[arg(long)]
        with_insights: bool,
    },
    /// Export theme scores or raw responses as CSV
    Export {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, value_enum, default_value = "themes")]
        kind: ExportKind,
        #[arg(long, default_value = "pulse-export.csv")]
        out: PathBuf,
    },
    /// Ask the generate-insights function for a narrative summary
    Insights {
        #[command(flatten)]
        scope: Scope,
    },
    /// Send a question to PulseBot
    Ask { message: String },
    /// List stored score snapshots
    History {
        #[arg(long, default_value = survey::DEFAULT_SURVEY_ID)]
        survey: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Serve the webhook and scoring endpoints
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

struct Scored {
    questions: Vec<SurveyQuestion>,
    responses: Vec<SurveyResponse>,
    score: PulseScore,
}

async fn score_scope(pool: &PgPool, scope: &Scope) -> anyhow::Result<Scored> {
    let since_date = scoring::cutoff_date(scope.since_days);
    let questions = db::fetch_questions(pool, &scope.survey).await?;
    let responses =
        db::fetch_responses(pool, &scope.survey, since_date, scope.respondent.as_deref()).await?;
    let score = scoring::compute_pulse_score(&questions, &responses, scope.policy(), Utc::now());
    tracing::debug!(
        survey = %scope.survey,
        responses = responses.len(),
        overall = score.overall,
        "scored"
    );
    Ok(Scored {
        questions,
        responses,
        score,
    })
}

fn quotes(scored: &Scored) -> Vec<String> {
    report::recent_comments(&scored.questions, &scored.responses)
        .into_iter()
        .map(|r| r.value.to_string())
        .collect()
}

async fn fetch_insight(config: &Config, scored: &Scored) -> anyhow::Result<Insight> {
    let (url, key) = config.functions()?;
    let client = FunctionsClient::new(url, key);
    let insight = insights::generate_insight(&client, &scored.score, &quotes(scored))
        .await
        .context("generate-insights call failed")?;
    Ok(insight)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} responses).");
        }
        Commands::Import { csv, survey } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &survey, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::Score { scope, save, json } => {
            let pool = connect(&config).await?;
            let scored = score_scope(&pool, &scope).await?;
            let score = &scored.score;

            if save {
                let id = db::save_score(&pool, &scope.survey, score).await?;
                tracing::info!(%id, "score snapshot saved");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(score)?);
                return Ok(());
            }

            if score.scored_responses == 0 {
                println!("No responses found for this window.");
                return Ok(());
            }

            println!(
                "PulseScore {:.1} ({}) from {} responses",
                score.overall,
                score.tier.label(),
                score.scored_responses
            );
            for category in &score.categories {
                println!("- {}: {:.1}", category.category.label(), category.score);
            }
            if score.skipped_responses > 0 {
                println!("{} responses skipped as invalid.", score.skipped_responses);
            }
        }
        Commands::Report {
            scope,
            out,
            with_insights,
        } => {
            let pool = connect(&config).await?;
            let scored = score_scope(&pool, &scope).await?;
            let insight = if with_insights {
                Some(fetch_insight(&config, &scored).await?)
            } else {
                None
            };
            let report = report::build_report(
                &scope.survey,
                scoring::cutoff_date(scope.since_days),
                &scored.score,
                &scored.questions,
                &scored.responses,
                insight.as_ref(),
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { scope, kind, out } => {
            let pool = connect(&config).await?;
            let scored = score_scope(&pool, &scope).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            match kind {
                ExportKind::Themes => export::write_theme_scores(file, &scored.score)?,
                ExportKind::Responses => {
                    export::write_responses(file, &scored.questions, &scored.responses)?
                }
            }
            println!("Export written to {}.", out.display());
        }
        Commands::Insights { scope } => {
            let pool = connect(&config).await?;
            let scored = score_scope(&pool, &scope).await?;
            let insight = fetch_insight(&config, &scored).await?;
            println!("{}", insight.summary);
            for (heading, items) in [
                ("Strengths", &insight.strengths),
                ("Opportunities", &insight.opportunities),
                ("Action items", &insight.action_items),
            ] {
                if !items.is_empty() {
                    println!("\n{heading}:");
                    for item in items {
                        println!("- {item}");
                    }
                }
            }
        }
        Commands::Ask { message } => {
            let (url, key) = config.functions()?;
            let reply = FunctionsClient::new(url, key)
                .ask(&message)
                .await
                .context("ask-pulsebot call failed")?;
            println!("{reply}");
        }
        Commands::History { survey, limit } => {
            let pool = connect(&config).await?;
            let snapshots = db::fetch_score_history(&pool, &survey, limit.max(1)).await?;
            if snapshots.is_empty() {
                println!("No saved scores for {survey}.");
                return Ok(());
            }
            for snapshot in snapshots {
                println!(
                    "- {} {}: {:.1} ({}) from {} responses",
                    snapshot.computed_at.format("%Y-%m-%d %H:%M"),
                    snapshot.survey_id,
                    snapshot.overall,
                    snapshot.tier.label(),
                    snapshot.response_count
                );
            }
        }
        Commands::Serve { bind } => {
            let pool = connect(&config).await?;
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let state = Arc::new(server::AppState::new(
                Arc::new(pool),
                UnassessedThemes::default(),
            ));
            server::serve(&bind, state).await?;
        }
    }

    Ok(())
}
