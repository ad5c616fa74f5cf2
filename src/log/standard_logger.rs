use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::LogConfiguration;

/// Wall-clock time, padded level, then the emitting module.
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";
const APPENDER: &str = "stderr";

impl LogConfiguration {
    fn build_config(&self) -> Result<Config, log4rs::config::runtime::ConfigErrors> {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        Config::builder()
            .appender(Appender::builder().build(APPENDER, Box::new(stderr)))
            .loggers(
                self.module_filters
                    .iter()
                    .map(|(module, &level)| Logger::builder().build(module.clone(), level)),
            )
            .build(Root::builder().appender(APPENDER).build(self.global_log_level))
    }

    /// Installs the `log4rs` logger on first use and swaps its configuration afterwards.
    pub(in crate::log) fn set_config(&mut self) {
        let config = match self.build_config() {
            Ok(config) => config,
            Err(errors) => {
                eprintln!("invalid log configuration: {errors}");
                return;
            }
        };
        match &self.root_handle {
            Some(handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                // Some other logger got there first, e.g. a test harness.
                Err(error) => eprintln!("failed to install logger: {error}"),
            },
        }
    }
}
