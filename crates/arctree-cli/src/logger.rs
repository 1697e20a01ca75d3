//! Minimal stderr logger for library diagnostics.

use console::style;
use log::Level;
use log::LevelFilter;
use log::Metadata;
use log::Record;

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let label = match record.level() {
            Level::Error => style("error:").red().bold(),
            Level::Warn => style("warning:").yellow().bold(),
            Level::Info => style("info:").cyan(),
            Level::Debug | Level::Trace => style("debug:").dim(),
        };
        eprintln!("{label} {}", record.args());
    }

    fn flush(&self) {}
}

/// Log level for the given verbosity flags.
pub const fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Installs the stderr logger. Calling it twice keeps the first logger.
pub fn init(verbose: bool, quiet: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_for(verbose, quiet));
    }
}
