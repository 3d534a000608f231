use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use call_pulse::achievements::AchievementMap;
use call_pulse::config::DashboardConfig;
use call_pulse::dashboard::{DashboardState, RecomputeContext};
use call_pulse::duration::{format_duration, parse_duration};
use call_pulse::filter::{filter_by_range, parse_record_date};
use call_pulse::models::{DateRange, Goal, GoalMetric, RawRecord};
use call_pulse::ranking::{conversion_rate, rank, RankMetric};
use call_pulse::root_cause::{analyze_collaborator, team_averages};
use call_pulse::{db, ingest, report};

#[derive(Parser)]
#[command(name = "call-pulse")]
#[command(about = "Sales and call-center performance dashboard", long_about = None)]
struct Cli {
    /// Read records from a CSV or JSON export instead of the database
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// Read individual goals from a JSON file instead of the database
    #[arg(long, global = true)]
    goals: Option<PathBuf>,
    /// JSON file overriding heuristic thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample records and goals
    Seed,
    /// Import records from a CSV or JSON export
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Manage individual goals
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Print totals and a leaderboard for a period
    Summary {
        #[arg(long, value_parser = parse_day)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_day)]
        to: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "total-sales")]
        rank_by: RankMetric,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, value_parser = parse_day)]
        from: NaiveDate,
        #[arg(long, value_parser = parse_day)]
        to: Option<NaiveDate>,
        /// Pin "today" for pace calculations
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,
        /// Goal deadline, defaults to the end of the current month
        #[arg(long, value_parser = parse_day)]
        deadline: Option<NaiveDate>,
        /// Two-column key,value team goal sheet
        #[arg(long)]
        team_goals: Option<PathBuf>,
        /// Achievement snapshot from the previous run; rewritten afterwards
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Drill into one collaborator's conversion by shift and weekday
    Analyze {
        #[arg(long)]
        collaborator: String,
        #[arg(long, value_parser = parse_day)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_day, requires = "from")]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum GoalAction {
    /// Create or replace a goal
    Set {
        #[arg(long)]
        collaborator: String,
        #[arg(long, value_parser = parse_metric)]
        metric: GoalMetric,
        /// A number, or HH:MM:SS for talk-time goals
        #[arg(long)]
        target: String,
        #[arg(long)]
        id: Option<String>,
    },
    /// Remove a goal by id
    Delete {
        #[arg(long)]
        id: String,
    },
    /// List stored goals
    List,
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    parse_record_date(value).ok_or_else(|| format!("expected dd/mm/yyyy, got {value:?}"))
}

fn parse_metric(value: &str) -> Result<GoalMetric, String> {
    GoalMetric::parse(value).ok_or_else(|| format!("expected sales, totalCalls or talkTime, got {value:?}"))
}

fn parse_target(metric: GoalMetric, value: &str) -> anyhow::Result<f64> {
    if metric == GoalMetric::TalkTime && value.contains(':') {
        return Ok(parse_duration(value) as f64);
    }
    value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid goal target {value:?}"))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when --input/--goals are not given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_records(cli: &Cli, range: Option<&DateRange>) -> anyhow::Result<Vec<RawRecord>> {
    match &cli.input {
        Some(path) => Ok(ingest::load_records(path)?),
        None => db::fetch_records(&connect().await?, range).await,
    }
}

async fn load_goals(cli: &Cli) -> anyhow::Result<Vec<Goal>> {
    match &cli.goals {
        Some(path) => Ok(ingest::load_goals(path)?),
        None if cli.input.is_some() => Ok(Vec::new()),
        None => db::fetch_goals(&connect().await?).await,
    }
}

fn read_snapshot(path: &Path) -> anyhow::Result<AchievementMap> {
    if !path.exists() {
        return Ok(AchievementMap::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid snapshot {}", path.display()))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::load_or_default(cli.config.as_deref())?;

    match &cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&connect().await?).await?;
            println!("Seed data inserted ({inserted} records).");
        }
        Commands::Import { file } => {
            let records = ingest::load_records(file)?;
            let source = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("import");
            let outcome = db::import_records(&connect().await?, &records, source).await?;
            println!(
                "Inserted {} records from {} (replaced {} from the previous import).",
                outcome.inserted,
                file.display(),
                outcome.replaced
            );
        }
        Commands::Goal { action } => {
            let pool = connect().await?;
            match action {
                GoalAction::Set {
                    collaborator,
                    metric,
                    target,
                    id,
                } => {
                    let goal = Goal {
                        id: id.clone().unwrap_or_else(|| format!("goal-{}", Uuid::new_v4())),
                        collaborator: collaborator.clone(),
                        metric: *metric,
                        target: parse_target(*metric, target)?,
                    };
                    db::save_goal(&pool, &goal).await?;
                    println!("Saved goal {} for {}.", goal.id, goal.collaborator);
                }
                GoalAction::Delete { id } => {
                    if db::delete_goal(&pool, id).await? {
                        println!("Deleted goal {id}.");
                    } else {
                        println!("No goal with id {id}.");
                    }
                }
                GoalAction::List => {
                    let goals = db::fetch_goals(&pool).await?;
                    if goals.is_empty() {
                        println!("No goals defined.");
                    }
                    for goal in goals {
                        let target = match goal.metric {
                            GoalMetric::TalkTime => format_duration(goal.target as u64),
                            _ => format!("{:.0}", goal.target),
                        };
                        println!("- {} {} {}: {}", goal.id, goal.collaborator, goal.metric.as_str(), target);
                    }
                }
            }
        }
        Commands::Summary {
            from,
            to,
            rank_by,
            limit,
        } => {
            let range = DateRange::new(*from, *to);
            let records = load_records(&cli, Some(&range)).await?;
            let state = DashboardState {
                raw_records: records,
                date_range: Some(range),
                ..DashboardState::default()
            };
            let mut ctx = RecomputeContext::new(today());
            ctx.config = config;
            let view = state.recompute(&ctx);

            if view.aggregates.is_empty() {
                println!("No activity found for {range}.");
                return Ok(());
            }

            let totals = &view.totals;
            println!(
                "{range}: {} collaborators, {} calls, {} sales ({} call / {} WhatsApp), {} talk time",
                totals.collaborators,
                totals.total_calls,
                totals.total_sales,
                totals.sales_by_call,
                totals.sales_by_alt_channel,
                totals.talk_time()
            );
            println!("Top collaborators by {}:", rank_by.label());
            for aggregate in rank(&view.aggregates, *rank_by, *limit) {
                println!(
                    "- {}: {} sales, {} calls, {:.1}% conversion, {}",
                    aggregate.collaborator,
                    aggregate.total_sales,
                    aggregate.total_calls,
                    conversion_rate(aggregate),
                    aggregate.talk_time()
                );
            }
            for insight in &view.insights {
                println!("[{}] {}", report::insight_marker(insight.kind), insight.message);
            }
        }
        Commands::Report {
            from,
            to,
            today: pinned_today,
            deadline,
            team_goals,
            snapshot,
            out,
        } => {
            let range = DateRange::new(*from, *to);
            let records = load_records(&cli, Some(&range)).await?;
            let goals = load_goals(&cli).await?;
            let previous = match snapshot {
                Some(path) => read_snapshot(path)?,
                None => AchievementMap::new(),
            };

            let ctx = RecomputeContext {
                today: pinned_today.unwrap_or_else(today),
                deadline: *deadline,
                team_goals: team_goals
                    .as_deref()
                    .map(ingest::load_team_goals)
                    .transpose()?,
                config,
            };
            let state = DashboardState {
                raw_records: records,
                date_range: Some(range),
                goals,
                previous_achievements: previous,
            };
            let view = state.recompute(&ctx);

            for event in &view.newly_unlocked {
                info!(collaborator = %event.collaborator, achievement = %event.achievement_id, "achievement unlocked");
            }

            std::fs::write(out, report::build_report(&view, ctx.today))
                .with_context(|| format!("failed to write {}", out.display()))?;
            if let Some(path) = snapshot {
                std::fs::write(path, serde_json::to_string_pretty(&view.achievements)?)
                    .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            }
            println!("Report written to {}.", out.display());
        }
        Commands::Analyze {
            collaborator,
            from,
            to,
        } => {
            let range = from.map(|from| DateRange::new(from, *to));
            let mut records = load_records(&cli, range.as_ref()).await?;
            if let Some(range) = &range {
                records = filter_by_range(&records, Some(range));
            }

            let team = team_averages(&records);
            match analyze_collaborator(&records, collaborator, &team, &config.root_cause) {
                Some(analysis) => print!("{}", report::build_root_cause(&analysis, &team)),
                None => println!("No records found for {collaborator}."),
            }
        }
    }

    Ok(())
}
