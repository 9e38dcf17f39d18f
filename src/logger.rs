use log::{Level, LevelFilter, Metadata, Record};
use std::io::{self, Write};

/// Plain stderr logger for the command line tool.
pub struct StderrLogger {
    max_level: LevelFilter,
}

impl StderrLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let max_level = if quiet {
            LevelFilter::Off
        } else if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Warn
        };
        Self { max_level }
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error | Level::Warn => eprintln!("[{}] {}", record.level(), record.args()),
            _ => eprintln!("[{}] {}: {}", record.level(), record.target(), record.args()),
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
