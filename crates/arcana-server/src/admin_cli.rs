//! One-shot admin operations: connects straight to the store and registry,
//! without starting the HTTP surface or background metrics updater.

use crate::cli::AdminCommand;
use arcana_core::validation::rules::valid_audit_reason;
use arcana_core::{ArcanaError, ArcanaResult, CursorRequest, JobId};
use arcana_jobs::{JobsConfig, Runtime, Store};
use std::io::{self, Write};
use tracing::info;

pub async fn execute(config: JobsConfig, command: AdminCommand) -> ArcanaResult<()> {
    let runtime = Runtime::connect(config).await?;

    match command {
        AdminCommand::Stats => {
            let stats = runtime.status.dashboard_stats(&runtime.queues()).await?;
            print_json(&stats)?;
        }
        AdminCommand::Queue { queue, cursor, limit } => {
            let page = runtime.status.list_ready(&queue, CursorRequest::new(cursor, limit)).await?;
            print_json(&page)?;
        }
        AdminCommand::Job { queue, id } => {
            let job_id = parse_job_id(&id)?;
            match runtime.status.peek(&queue, &job_id).await? {
                Some(job) => print_json(&job)?,
                None => return Err(ArcanaError::not_found("job", id)),
            }
        }
        AdminCommand::Workers => {
            let workers = runtime.status.worker_health().await?;
            print_json(&workers)?;
        }
        AdminCommand::Requeue { job_id, target_queue } => {
            let job_id = parse_job_id(&job_id)?;
            let requeued = runtime.store.requeue_from_dead_letter(&job_id, target_queue.as_deref()).await?;
            println!("{}", serde_json::json!({ "requeued": requeued }));
        }
        AdminCommand::PurgeDlq { reason, yes } => {
            require_reason(&reason)?;
            confirm("This permanently deletes every job in the dead letter queue.", yes)?;
            let purged = runtime.store.purge_dead_letter().await?;
            info!(target: "audit", reason = %reason, purged, "purged dead letter queue via cli");
            println!("{}", serde_json::json!({ "purged": purged }));
        }
        AdminCommand::PurgeAll { reason, yes, queues } => {
            require_reason(&reason)?;
            let queues = if queues.is_empty() { runtime.queues() } else { queues };
            confirm(&format!("This permanently deletes every job in: {}.", queues.join(", ")), yes)?;
            let purged = runtime.store.purge_all(&queues).await?;
            info!(target: "audit", reason = %reason, queues = ?queues, purged, "purged all queues via cli");
            println!("{}", serde_json::json!({ "purged": purged }));
        }
    }

    Ok(())
}

fn parse_job_id(raw: &str) -> ArcanaResult<JobId> {
    JobId::parse(raw).map_err(|e| ArcanaError::validation(format!("invalid job id: {e}")))
}

fn require_reason(reason: &str) -> ArcanaResult<()> {
    valid_audit_reason(reason).map_err(|_| ArcanaError::validation("reason must be at least 10 characters"))
}

/// Destructive subcommands need both an explicit `--yes` for non-interactive
/// use and, absent that, a typed confirmation on the controlling terminal.
fn confirm(prompt: &str, yes: bool) -> ArcanaResult<()> {
    if yes {
        return Ok(());
    }

    print!("{prompt} Type \"yes\" to continue: ");
    io::stdout().flush().map_err(|e| ArcanaError::Internal(e.to_string()))?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(|e| ArcanaError::Internal(e.to_string()))?;

    if input.trim() == "yes" {
        Ok(())
    } else {
        Err(ArcanaError::conflict("confirmation declined"))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ArcanaResult<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reason_is_rejected() {
        assert!(require_reason("too short").is_err());
    }

    #[test]
    fn detailed_reason_is_accepted() {
        assert!(require_reason("operator cleanup after incident #42").is_ok());
    }

    #[test]
    fn yes_flag_skips_the_prompt() {
        assert!(confirm("anything", true).is_ok());
    }
}
