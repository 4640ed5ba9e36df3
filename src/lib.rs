// src/lib.rs

pub mod capture;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod record;
pub mod remote;
pub mod runner;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::record::ExecutionRecord;
use crate::remote::SshShell;
use crate::runner::{
    CommandRunner, InterruptHandle, RunOutcome, TracingFollowUp, build_command, fail_and_interrupt,
};
use crate::store::{JsonDirRepository, Repository};
use crate::types::ExecStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the JSON record store
/// - the ssh transport and runner
/// - Ctrl-C handling as an operator interrupt
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let repository: Arc<dyn Repository> = Arc::new(JsonDirRepository::new(cfg.store.dir.clone()));
    debug!(store = %cfg.store.dir.display(), "using json record store");

    if args.dry_run {
        return print_dry_run(repository.as_ref(), &args.record_id);
    }

    let runner = CommandRunner::new(
        Arc::clone(&repository),
        SshShell::new(),
        Arc::new(TracingFollowUp),
        cfg.runner_settings(),
    );

    let interrupt = InterruptHandle::new();

    // Ctrl-C → fail the record and stop waiting on the agent.
    {
        let repository = Arc::clone(&repository);
        let handle = interrupt.clone();
        let record_id = args.record_id.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!(record_id = %record_id, "Ctrl+C received; interrupting execution");
            fail_and_interrupt(repository.as_ref(), &record_id, "interrupted by operator", &handle);
        });
    }

    match runner.execute(&args.record_id, &interrupt).await {
        RunOutcome::Finished(ExecStatus::Succeeded) => Ok(()),
        RunOutcome::Finished(status) => bail!("record {} finished as {status}", args.record_id),
        RunOutcome::Interrupted(status) => {
            bail!("record {} was interrupted (stored status {status})", args.record_id)
        }
        RunOutcome::StaleDispatch => bail!("record {} is already past its deadline", args.record_id),
        RunOutcome::NotDispatchable(status) => {
            bail!("record {} is {status}, not PENDING", args.record_id)
        }
        RunOutcome::Unloadable => bail!("record {} could not be loaded", args.record_id),
    }
}

/// Print the command a record would submit, without connecting or writing.
fn print_dry_run(repository: &dyn Repository, record_id: &str) -> Result<()> {
    let mut record = repository
        .load_record(record_id)
        .with_context(|| format!("loading record {record_id}"))?;
    record.apply_default_timeout();

    let script_id = record
        .script_id
        .clone()
        .with_context(|| format!("record {record_id} has no script"))?;
    let script = repository
        .load_script(&script_id)
        .with_context(|| format!("loading script {script_id}"))?;
    let scheduled = match record.scheduling_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => repository.load_scheduling(id).is_ok(),
        None => false,
    };

    println!("remoterun dry-run");
    print_record_summary(&record);
    println!("  script: {} ({:?})", script.id, script.script_type);
    println!("  scheduled: {scheduled}");
    println!();
    println!("{}", build_command(&record, &script, scheduled, Utc::now()));

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_record_summary(record: &ExecutionRecord) {
    println!("  record: {}", record.id);
    println!("  status: {}", record.status);
    println!("  timeout: {} min", record.effective_timeout_minutes());
    println!("  deadline: {}", record.deadline());
    if let Some(agent) = &record.agent_id {
        println!("  agent: {agent}");
    }
    if let Some(cluster) = &record.cluster_id {
        println!("  cluster: {cluster}");
    }
}
