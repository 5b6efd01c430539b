//! CLI output formatting and display helpers.

use anyhow::Result;
use copier_core::{CopyItemSnapshot, CopyTaskSnapshot, ItemStatus};

/// Prints the human-readable task summary to stdout.
pub(crate) fn print_summary(snapshot: &CopyTaskSnapshot) {
    for line in render_summary_lines(snapshot) {
        println!("{line}");
    }
}

/// Prints the task snapshot as pretty JSON to stdout.
pub(crate) fn print_json(snapshot: &CopyTaskSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

pub(crate) fn render_summary_lines(snapshot: &CopyTaskSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "Task {} {}: {} completed, {} failed, {} bytes",
        snapshot.id,
        snapshot.status,
        snapshot.completed_count(),
        snapshot.failed_count(),
        snapshot.total_bytes()
    )];
    lines.extend(snapshot.items.iter().map(render_item_line));
    lines
}

fn render_item_line(item: &CopyItemSnapshot) -> String {
    let route = format!("{} -> {}", item.source_path, item.dest_path);
    match item.status {
        ItemStatus::Failed => format!(
            "  [failed] {route}: {}",
            item.error_message.as_deref().unwrap_or("unknown error")
        ),
        status => {
            let verified = if item.checksum_verified {
                ", verified"
            } else {
                ""
            };
            format!(
                "  [{status}] {route} ({} bytes, {}{verified})",
                item.bytes_copied, item.speed
            )
        }
    }
}
