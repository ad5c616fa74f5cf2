//! Diagnostic logging. This is not to be confused with _reporting_ (see the `report` module),
//! which records model output such as daily stage probabilities.
//!
//! Every module logs through the `log` facade macros re-exported here: `error!`, `warn!`,
//! `info!`, `debug!` and `trace!`. Logging is _disabled_ by default; the runner enables it with
//! `--log-level <level>`, and code can control it with:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!
//! Per-module filters are set with `set_module_filter()` / `set_module_filters()` and removed with
//! `remove_module_filter()`:
//!
//! ```rust
//! use barracks_epi::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Everything at `info` and above...
//! set_log_level(LevelFilter::Info);
//! // ...but follow the replay engine closely.
//! set_module_filter("barracks_epi::infection_manager", LevelFilter::Trace);
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "logging")]
use log4rs::Handle;

/// Filters installed before anything else touches the configuration. The per-pair trace lines of
/// meeting detection drown everything else, so that module stops at `debug`.
const INITIAL_MODULE_FILTERS: [(&str, LevelFilter); 1] =
    [("barracks_epi::meetings", LevelFilter::Debug)];

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The global level, the per-module filters keyed by module path, and the handle of the installed
/// logger once there is one. The public free functions lock the single instance and call into it.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for targets without their own filter; `Off` silences them.
    pub(in crate::log) global_log_level: LevelFilter,
    /// Ordered so the generated logger configuration does not depend on insertion order.
    pub(in crate::log) module_filters: BTreeMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: LevelFilter::Off,
            module_filters: INITIAL_MODULE_FILTERS
                .iter()
                .map(|&(module, level)| (module.to_owned(), level))
                .collect(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    fn set_log_level(&mut self, level: LevelFilter) {
        if self.global_log_level != level {
            self.global_log_level = level;
            self.set_config();
        }
    }

    fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let changed = module_filters.iter().fold(false, |changed, &(module, level)| {
            let previous = self.module_filters.insert(module.to_owned(), level);
            changed | (previous != Some(level))
        });
        if changed {
            self.set_config();
        }
    }

    fn remove_module_filter(&mut self, module: &str) {
        if self.module_filters.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// Turns on every log message, same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Silences the global level, same as `set_log_level(LevelFilter::Off)`. Module filters still
/// apply to their own targets.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level for targets that have no module filter of their own.
pub fn set_log_level(level: LevelFilter) {
    log_configuration().set_log_level(level);
}

/// Sets the level for log targets under `module_path`, e.g. `barracks_epi::duty`.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Sets several module filters, reconfiguring the logger at most once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    log_configuration().set_module_filters(module_filters);
}

/// Drops the filter for `module_path`; its targets fall back to the global level.
pub fn remove_module_filter(module_path: &str) {
    log_configuration().remove_module_filter(module_path);
}

fn log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A panic while holding the lock leaves the configuration itself consistent.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{log_configuration, remove_module_filter, set_log_level, set_module_filters};
    use log::{error, trace, LevelFilter};
    use std::sync::{LazyLock, Mutex};

    // The configuration is process-wide; these tests take turns.
    static SERIAL: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn global_level_is_applied_and_restored() {
        let _serial = SERIAL.lock().unwrap();
        set_log_level(LevelFilter::Error);
        assert_eq!(log_configuration().global_log_level, LevelFilter::Error);
        error!("global level at error");
        trace!("suppressed");

        set_log_level(LevelFilter::Trace);
        assert_eq!(log_configuration().global_log_level, LevelFilter::Trace);
        set_log_level(LevelFilter::Off);
        assert_eq!(log_configuration().global_log_level, LevelFilter::Off);
    }

    #[test]
    fn meeting_detection_starts_at_debug() {
        let _serial = SERIAL.lock().unwrap();
        assert_eq!(
            log_configuration()
                .module_filters
                .get("barracks_epi::meetings"),
            Some(&LevelFilter::Debug)
        );
    }

    #[test]
    fn module_filters_can_be_replaced_and_removed() {
        let _serial = SERIAL.lock().unwrap();
        set_log_level(LevelFilter::Info);
        set_module_filters(&[
            ("barracks_epi::meetings", LevelFilter::Error),
            ("barracks_epi::duty", LevelFilter::Trace),
        ]);
        {
            let config = log_configuration();
            assert_eq!(
                config.module_filters.get("barracks_epi::meetings"),
                Some(&LevelFilter::Error)
            );
            assert_eq!(
                config.module_filters.get("barracks_epi::duty"),
                Some(&LevelFilter::Trace)
            );
        }

        remove_module_filter("barracks_epi::duty");
        assert!(!log_configuration()
            .module_filters
            .contains_key("barracks_epi::duty"));

        set_module_filters(&[("barracks_epi::meetings", LevelFilter::Debug)]);
        set_log_level(LevelFilter::Off);
    }
}
