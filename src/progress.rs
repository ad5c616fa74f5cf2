//! A timeline progress bar for long runs. The spatial engine may step through hundreds of
//! thousands of ticks and a replay through as many meeting records, so the runner can show how
//! far along the clock is.
//!
//! Only one progress bar can be active at a time. Initializing a new one (for example when the
//! infection replay starts after meeting generation) replaces the previous one.

use std::sync::Mutex;

use log::trace;
use progress_bar::{
    finalize_progress_bar, init_progress_bar, set_progress_bar_action, set_progress_bar_progress,
    Color, Style,
};

/// The `f64` end of the timeline the active bar was set up for.
static MAX_TIME: Mutex<Option<f64>> = Mutex::new(None);

/// Initialize the progress bar with the time at which the run ends.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn init_timeline_progress_bar(label: &str, max_time: f64) {
    trace!("initializing timeline progress bar with max time {max_time}");
    if let Ok(mut slot) = MAX_TIME.lock() {
        *slot = Some(max_time);
    }
    init_progress_bar(max_time.round() as usize);
    set_progress_bar_action(label, Color::Blue, Style::Bold);
}

/// Updates the timeline progress bar with the current time. Does nothing
/// when no bar was initialized.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn update_timeline_progress(mut current_time: f64) {
    let Ok(mut slot) = MAX_TIME.lock() else {
        return;
    };
    if let Some(max_time) = *slot {
        if current_time >= max_time {
            current_time = max_time;
        }
        set_progress_bar_progress(current_time.round() as usize);
        if current_time == max_time {
            finalize_progress_bar();
            *slot = None;
        }
    }
}

/// Completes the active bar, if any, regardless of where the clock stopped.
pub fn finish_timeline_progress() {
    if let Ok(mut slot) = MAX_TIME.lock() {
        if slot.take().is_some() {
            finalize_progress_bar();
        }
    }
}
