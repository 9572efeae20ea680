//! Minimal stdout rendering so the CLI binary has something to show for a
//! run. Full text/csv/json presentation is explicitly out of scope (spec's
//! Non-goals: "formatted reporting... of final duplicate groups"); this is
//! the thin external collaborator the spec still expects the CLI to have,
//! not a feature surface in its own right.

use log::debug;

use crate::config::{Opts, ReportFormat};
use crate::engine::orchestrator::RunOutcome;

/// Print `outcome` to stdout. Every format currently renders the same plain
/// listing; `report_format` is accepted (spec §6.1's CLI surface) but only
/// `Text` has a dedicated renderer, matching the "thin CLI" scope.
pub fn print(outcome: &RunOutcome, opts: &Opts) {
    if !matches!(opts.report_format, ReportFormat::Text) {
        debug!(
            "{:?} report rendering is not implemented; falling back to plain text",
            opts.report_format
        );
    }

    for group in &outcome.duplicate_groups {
        println!("{} duplicates, {} bytes each:", group.paths.len(), group.each_size);
        for path in &group.paths {
            println!("  {}", path.display());
        }
    }
    println!(
        "{} duplicate group(s), {} unique file(s)",
        outcome.duplicate_groups.len(),
        outcome.uniques_count
    );
}
