use std::path::Path;

use anyhow::{Context, Result};
use classmend_core::archive::{repair_archive, RepairSummary};
use classmend_core::classfile::PatchPolicy;

/// Run the repair over `archive` and print the per-entry and summary report.
///
/// `extra_sentinels` extends the default detection policy; the conventional
/// `"stripped"` marker always applies. With `json` set, the human-readable
/// report is replaced by the serialized summary.
pub fn repair_command(archive: &Path, extra_sentinels: &[String], json: bool) -> Result<()> {
    let mut policy = PatchPolicy::default();
    for sentinel in extra_sentinels {
        policy = policy.with_sentinel(sentinel.clone());
    }

    let summary = repair_archive(archive, &policy)
        .with_context(|| format!("Failed to repair {}", archive.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(archive, &summary);
    }

    Ok(())
}

/// Human-readable report: one line per rewritten entry, then the summary.
fn print_report(archive: &Path, summary: &RepairSummary) {
    for entry in &summary.repaired {
        println!("{} -> {}", entry.entry, entry.source_file);
    }
    println!(
        "Repaired {} of {} class file(s) in {}",
        summary.modified_count(),
        summary.classes_seen,
        archive.display()
    );
}
