//! Session log files.
//!
//! A log file records everything at debug level and above, one timestamped
//! line per record, appended to whatever the file already holds.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{Level, LevelFilter, Log, Record};

/// An `env_logger` builder that appends to `path`.
pub fn builder(path: &Path) -> io::Result<Builder> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut builder = Builder::new();
    builder
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .filter_level(LevelFilter::Debug)
        .format_target(false);
    Ok(builder)
}

/// A logger owned by one session rather than installed process-wide.
pub fn session_logger(path: &Path) -> io::Result<Logger> {
    Ok(builder(path)?.build())
}

/// Writes one message to `logger` and flushes it.
pub fn write(logger: &Logger, level: Level, text: &str) {
    logger.log(
        &Record::builder()
            .args(format_args!("{text}"))
            .level(level)
            .target("fpdev")
            .build(),
    );
    logger.flush();
}

/// Maps the scripting levels (0 fatal, 1 error, 2 message, 3 debug).
pub fn level_from_raw(level: i32) -> Level {
    match level {
        i32::MIN..=1 => Level::Error,
        2 => Level::Info,
        _ => Level::Debug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_appended_to_the_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "earlier line\n").unwrap();

        let logger = session_logger(file.path()).unwrap();
        write(&logger, Level::Info, "board opened");
        write(&logger, Level::Debug, "wire-in 0x00 staged");
        write(&logger, Level::Trace, "filtered out");

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("earlier line\n"));
        assert!(text.contains("INFO"));
        assert!(text.contains("board opened"));
        assert!(text.contains("wire-in 0x00 staged"));
        assert!(!text.contains("filtered out"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(session_logger(&dir.path().join("no/such/dir/session.log")).is_err());
    }

    #[test]
    fn raw_levels_map_to_log_levels() {
        assert_eq!(level_from_raw(0), Level::Error);
        assert_eq!(level_from_raw(1), Level::Error);
        assert_eq!(level_from_raw(2), Level::Info);
        assert_eq!(level_from_raw(3), Level::Debug);
        assert_eq!(level_from_raw(-4), Level::Error);
    }
}
