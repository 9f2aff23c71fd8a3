//! # CLI
//!
//! `taskboard [--db PATH] [--backend memory|redb] <command>`
//!
//! Each `cmd_*` function does the work and returns data; [`run`] prints it.
//! Commands other than `serve` need a persistent backend.

use crate::config::{
    Backend, BoxedStore, ConfigError, DEFAULT_BODY_LIMIT, DEFAULT_PORT, ServerConfig, open_store,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use taskboard_core::analytics::{
    self, CourseAnalytics, PerformanceReport, SystemStats, UserActivity,
};
use taskboard_core::normalize::{NormalizeError, normalize_batch};
use taskboard_core::seed::{demo_tasks, seed_tasks};
use taskboard_core::{RedbStore, StoreError, Task, TaskFilter, TaskStore, UserId};
use thiserror::Error;

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "taskboard", version, about = "University assignment tracker")]
pub struct Cli {
    /// Database file.
    #[arg(long, global = true, env = "TASKBOARD_DB", default_value = "taskboard.redb")]
    pub db: PathBuf,

    /// Storage backend.
    #[arg(long, global = true, value_enum, env = "TASKBOARD_BACKEND", default_value = "redb")]
    pub backend: Backend,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API until Ctrl-C.
    Serve(ServeArgs),

    /// Create the database file.
    Init {
        /// Replace an existing database.
        #[arg(long)]
        force: bool,
    },

    /// Insert the bootstrap tasks.
    Seed {
        /// Insert the demo course data instead.
        #[arg(long)]
        demo: bool,
    },

    /// Print tasks, newest first.
    List {
        /// Only tasks owned by this user.
        #[arg(long)]
        user: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Import a JSON dump of tasks in any known layout.
    Import {
        file: PathBuf,
    },

    /// Print system, course, user and weekly statistics.
    Stats {
        #[arg(long)]
        json: bool,

        /// Weeks of performance history.
        #[arg(long, default_value_t = analytics::DEFAULT_PERFORMANCE_PERIODS)]
        weeks: usize,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "TASKBOARD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Allowed CORS origin. Repeat or comma-separate; none means any origin.
    #[arg(long = "cors-origin", env = "TASKBOARD_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Requests per second across all clients. 0 disables the limit.
    #[arg(long, env = "TASKBOARD_RATE_LIMIT", default_value_t = 0)]
    pub rate_limit: u32,

    /// Insert the bootstrap tasks if the store is empty.
    #[arg(long)]
    pub seed: bool,
}

impl ServeArgs {
    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            rate_limit_per_second: self.rate_limit,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error("database already exists: {} (use --force to replace it)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("`{0}` needs a persistent backend; use --backend redb")]
    MemoryBackend(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("nothing imported: all {rejected} records were rejected")]
    NothingImported { rejected: usize },
}

fn persistent(backend: Backend, command: &'static str) -> Result<(), CliError> {
    match backend {
        Backend::Memory => Err(CliError::MemoryBackend(command)),
        Backend::Redb => Ok(()),
    }
}

fn open_persistent(
    db: &Path,
    backend: Backend,
    command: &'static str,
) -> Result<BoxedStore, CliError> {
    persistent(backend, command)?;
    Ok(open_store(backend, db)?)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create the database. Refuses to touch an existing file unless `force`.
pub fn cmd_init(db: &Path, backend: Backend, force: bool) -> Result<(), CliError> {
    persistent(backend, "init")?;
    if db.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db.to_path_buf()));
        }
        std::fs::remove_file(db)?;
    }
    RedbStore::create(db)?;
    tracing::info!(path = %db.display(), "database initialized");
    Ok(())
}

/// Insert the bootstrap tasks, or the demo data set. Returns the stored tasks.
pub fn cmd_seed(db: &Path, backend: Backend, demo: bool) -> Result<Vec<Task>, CliError> {
    let mut store = open_persistent(db, backend, "seed")?;
    let stored = if demo {
        demo_tasks()
            .into_iter()
            .map(|task| store.import(task))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        seed_store(store.as_mut())?
    };
    tracing::info!(count = stored.len(), demo, "seeded tasks");
    Ok(stored)
}

fn seed_store(store: &mut (dyn TaskStore + Send + Sync)) -> Result<Vec<Task>, StoreError> {
    let now = Utc::now();
    seed_tasks(now)
        .into_iter()
        .map(|draft| store.insert(draft, now))
        .collect()
}

/// Tasks in API order, optionally for one owner.
pub fn cmd_list(db: &Path, backend: Backend, user: Option<u64>) -> Result<Vec<Task>, CliError> {
    let store = open_persistent(db, backend, "list")?;
    let filter = match user {
        Some(user) => TaskFilter::new().with_user(UserId(user)),
        None => TaskFilter::new(),
    };
    Ok(store.list(&filter)?)
}

/// Outcome of an import.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub imported: Vec<Task>,
    /// Position in the dump and why the record was dropped.
    pub rejected: Vec<(usize, NormalizeError)>,
}

/// Normalize every record in `file` and import the ones that survive.
pub fn cmd_import(db: &Path, backend: Backend, file: &Path) -> Result<ImportSummary, CliError> {
    persistent(backend, "import")?;
    let raw = std::fs::read_to_string(file)?;
    let dump: serde_json::Value = serde_json::from_str(&raw)?;
    let records = normalize_batch(&dump, Utc::now())?;

    let mut store = open_store(backend, db)?;
    let mut summary = ImportSummary::default();
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Ok(task) => summary.imported.push(store.import(task)?),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping record");
                summary.rejected.push((index, e));
            }
        }
    }

    if summary.imported.is_empty() && !summary.rejected.is_empty() {
        return Err(CliError::NothingImported {
            rejected: summary.rejected.len(),
        });
    }
    Ok(summary)
}

/// Everything the admin dashboard shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub system: SystemStats,
    pub courses: Vec<CourseAnalytics>,
    pub users: Vec<UserActivity>,
    pub pending_grading: Vec<Task>,
    pub performance: PerformanceReport,
}

pub fn cmd_stats(db: &Path, backend: Backend, weeks: usize) -> Result<StatsReport, CliError> {
    let store = open_persistent(db, backend, "stats")?;
    let tasks = store.all()?;
    let now = Utc::now();
    Ok(StatsReport {
        system: analytics::system_stats(&tasks, now),
        courses: analytics::course_analytics(&tasks),
        users: analytics::user_activity(&tasks),
        pending_grading: analytics::pending_grading(&tasks).into_iter().cloned().collect(),
        performance: analytics::weekly_performance(&tasks, now, weeks),
    })
}

/// Open the store, optionally seed it, and serve until Ctrl-C.
pub async fn cmd_serve(db: &Path, backend: Backend, args: &ServeArgs) -> Result<(), CliError> {
    let config = args.config();
    config.validate()?;

    let mut store = open_store(backend, db)?;
    if args.seed && store.is_empty()? {
        let seeded = seed_store(store.as_mut())?;
        tracing::info!(count = seeded.len(), "seeded empty store");
    }
    tracing::info!(?backend, path = %db.display(), tasks = store.len()?, "store opened");

    crate::api::serve(&config, store).await?;
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "#{:<4} [{}] {:<6} {}",
        task.id, task.status, task.priority, task.title
    );
    if let Some(course) = &task.course {
        line.push_str(&format!(" ({})", course));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    line
}

fn print_stats(report: &StatsReport) {
    let system = &report.system;
    println!("Tasks:      {}", system.total_tasks);
    println!("Completed:  {} ({}%)", system.completed_tasks, system.completion_rate_percent);
    println!("Pending:    {}", system.pending_tasks);
    println!("Overdue:    {}", system.overdue_tasks);
    println!("Students:   {}", system.total_users);

    println!("Ungraded:   {}", report.pending_grading.len());

    if !report.courses.is_empty() {
        println!();
        println!("{:<10} {:>5} {:>5} {:>6} {:>5}", "COURSE", "TASKS", "DONE", "AVG", "SUB%");
        for row in &report.courses {
            println!(
                "{:<10} {:>5} {:>5} {:>6} {:>5}",
                row.course,
                row.total_tasks,
                row.completed_tasks,
                grade_cell(row.average_grade),
                row.submission_rate_percent
            );
        }
    }

    if !report.users.is_empty() {
        println!();
        println!("{:<8} {:>5} {:>5} {:>6}  LAST ACTIVE", "USER", "TASKS", "DONE", "AVG");
        for row in &report.users {
            println!(
                "{:<8} {:>5} {:>5} {:>6}  {}",
                row.user_id.0,
                row.tasks_assigned,
                row.tasks_completed,
                grade_cell(row.average_grade),
                row.last_active.format("%Y-%m-%d")
            );
        }
    }

    let performance = &report.performance;
    if !performance.periods.is_empty() {
        println!();
        println!("{:<12} {:>7} {:>5} {:>6} {:>6}", "WEEK ENDING", "CREATED", "DONE", "AVG", "USERS");
        for period in &performance.periods {
            println!(
                "{:<12} {:>7} {:>5} {:>6} {:>6}",
                period.period_end.format("%Y-%m-%d").to_string(),
                period.tasks_created,
                period.tasks_completed,
                grade_cell(period.average_grade),
                period.active_users
            );
        }
        println!(
            "Growth:     created {:+}%, completed {:+}%",
            performance.created_growth_percent, performance.completed_growth_percent
        );
    }
}

fn grade_cell(grade: Option<u8>) -> String {
    grade.map_or_else(|| "-".to_string(), |g| g.to_string())
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        db,
        backend,
        command,
    } = cli;

    match command {
        Command::Serve(args) => cmd_serve(&db, backend, &args).await?,
        Command::Init { force } => {
            cmd_init(&db, backend, force)?;
            println!("Initialized {}", db.display());
        }
        Command::Seed { demo } => {
            let stored = cmd_seed(&db, backend, demo)?;
            println!("Seeded {} tasks", stored.len());
        }
        Command::List { user, json } => {
            let tasks = cmd_list(&db, backend, user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks");
            } else {
                for task in &tasks {
                    println!("{}", task_line(task));
                }
            }
        }
        Command::Import { file } => {
            let summary = cmd_import(&db, backend, &file)?;
            println!(
                "Imported {} tasks, rejected {}",
                summary.imported.len(),
                summary.rejected.len()
            );
            for (index, reason) in &summary.rejected {
                println!("  record {}: {}", index, reason);
            }
        }
        Command::Stats { json, weeks } => {
            let report = cmd_stats(&db, backend, weeks)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_stats(&report);
            }
        }
    }
    Ok(())
}
