//! Progress bar utilities for displaying processing status. Only the
//! counting-style bar is used here: the walker (spec §4.1) doesn't know its
//! total file count up front, so there is nothing to show a percentage
//! against.

use kdam::{Bar, BarExt};
use std::sync::{Arc, Mutex};

/// Create a counter for unknown total (shows count without percentage).
pub fn create_counter(desc: &'static str) -> Arc<Mutex<Bar>> {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        position = 0,
        unit = " files"
    )))
}

/// Update progress bar if available. Uses `try_lock` to avoid blocking if the
/// mutex is contended; a skipped update just catches up on the next call.
pub fn update_progress_bar(pb: &Arc<Mutex<Bar>>, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Force a refresh of the bar (e.g. so the final count is flushed to screen).
pub fn refresh_bar(pb: &Arc<Mutex<Bar>>) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}
