//! Command-line surface: `run`, `version`, and one-shot `admin` operations.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "arcana-server", version, about = "Arcana distributed job queue runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file; falls back to defaults and environment overrides.
    #[arg(long, global = true, env = "ARCANA_JOBS_CONFIG_PATH")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the job queue in the given role until shut down.
    Run {
        #[arg(long, value_enum, default_value_t = Role::All)]
        role: Role,
    },
    /// Print version information and exit.
    Version,
    /// One-shot administrative operations run directly against the store,
    /// without starting the HTTP surface or background metrics updater.
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Reserves and processes jobs; does not accept new enqueues itself.
    Worker,
    /// Keeps the admin surface and scheduler running without a worker pool.
    Producer,
    /// Scheduler, reaper, worker pool, and admin surface all in one process.
    All,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Dashboard stats: queue lengths, dead-letter count, active workers.
    Stats,
    /// List ready jobs in a queue.
    Queue {
        queue: String,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Look up a single job by id.
    Job { queue: String, id: String },
    /// Worker registry snapshot: liveness and processing depth.
    Workers,
    /// Move a dead-lettered job back onto a ready list.
    Requeue {
        job_id: String,
        #[arg(long)]
        target_queue: Option<String>,
    },
    /// Purge the dead letter queue. Requires interactive confirmation unless `--yes`.
    PurgeDlq {
        /// Audit trail: why this purge is happening. At least 10 characters.
        #[arg(long)]
        reason: String,
        /// Skip the interactive confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Purge every configured queue, or a subset given with `--queue`.
    PurgeAll {
        #[arg(long)]
        reason: String,
        #[arg(long)]
        yes: bool,
        #[arg(long = "queue")]
        queues: Vec<String>,
    },
}
