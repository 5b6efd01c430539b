//! Progress UI (spinner) for copy runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use copier_core::{CopyOrchestrator, ItemStatus};
use indicatif::{ProgressBar, ProgressStyle};

/// Spawns the progress UI (spinner) when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
    orchestrator: Arc<CopyOrchestrator>,
    task_id: String,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(orchestrator, task_id, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_spinner_inner(
    orchestrator: Arc<CopyOrchestrator>,
    task_id: String,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            if let Some(snapshot) = orchestrator.get(&task_id) {
                let total = snapshot.items.len();
                let done = snapshot.completed_count() + snapshot.failed_count();
                let current = snapshot
                    .items
                    .iter()
                    .find(|item| item.status == ItemStatus::InProgress)
                    .map_or("waiting for a worker", |item| item.source_path.as_str());
                spinner.set_message(format!(
                    "[{done}/{total}] Copying from {}: {current}",
                    snapshot.namespace
                ));
            }
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    })
}
