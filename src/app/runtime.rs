use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Result, anyhow};
use clap::Parser;
use copier_core::{CopyOrchestrator, LocalFileSystemProvider};
use tracing::{debug, info, warn};

use crate::app::{config_manager, exit_handler, progress_manager, terminal};
use crate::cli::Args;
use crate::{ProcessExit, output};

pub(crate) async fn run_copier() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    terminal::init_tracing(terminal::resolve_default_log_level(args.quiet, args.verbose));
    debug!(?args, "CLI arguments parsed");

    let config = config_manager::resolve_config(&args)?;
    info!(
        namespace = %args.namespace,
        items = args.items.len(),
        thread_pool_size = config.thread_pool_size,
        checksum_enabled = config.checksum_enabled,
        "Copier starting"
    );

    let provider = Arc::new(LocalFileSystemProvider::new(&config.conf_basedir));
    let orchestrator = Arc::new(CopyOrchestrator::new(&config, provider)?);

    let signal_target = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_target.interrupt();
        }
    });

    let items = args
        .items
        .iter()
        .map(|pair| (pair.source.clone(), pair.dest.clone()))
        .collect();
    let task_id = orchestrator.submit(&args.namespace, args.bandwidth, items);

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet || args.json,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress_manager::spawn_progress_ui(use_spinner, Arc::clone(&orchestrator), task_id.clone());

    let snapshot = orchestrator.wait(&task_id).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let snapshot = snapshot.ok_or_else(|| anyhow!("task {task_id} is not registered"))?;

    info!(
        task_id = %snapshot.id,
        status = %snapshot.status,
        completed = snapshot.completed_count(),
        failed = snapshot.failed_count(),
        bytes = snapshot.total_bytes(),
        "Copy complete"
    );

    if args.json {
        output::print_json(&snapshot)?;
    } else if !args.quiet {
        output::print_summary(&snapshot);
    }

    if orchestrator.is_interrupted() {
        warn!(task_id = %snapshot.id, "Interrupted before all items finished");
    }

    Ok(exit_handler::determine_exit_outcome(snapshot.status))
}
