// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction of the process's root logger

use crate::FileKv;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use slog::o;
use slog::Drain;
use slog::Level;
use std::fs::OpenOptions;

/// Where log records go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogDestination {
    /// Human-readable output on stdout.
    Stdout,
    /// Bunyan-formatted JSON lines appended to a file.
    File(Utf8PathBuf),
}

#[derive(Debug, thiserror::Error)]
#[error("open log file \"{path}\": {err}")]
pub struct LogInitError {
    path: Utf8PathBuf,
    #[source]
    err: std::io::Error,
}

/// Maps a configured log level, 0 (debug) through 3 (error), to a slog
/// level.  Out of range values are clamped.
pub fn level_from_config(level: u8) -> Level {
    match level {
        0 => Level::Debug,
        1 => Level::Info,
        2 => Level::Warning,
        _ => Level::Error,
    }
}

/// Builds the root logger writing to `dest` at `level` and above.
pub fn root_logger(
    level: Level,
    dest: &LogDestination,
) -> Result<slog::Logger, LogInitError> {
    match dest {
        LogDestination::Stdout => {
            let decorator = slog_term::TermDecorator::new().stdout().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            Ok(async_root_logger(level, drain))
        }
        LogDestination::File(path) => {
            let drain = log_drain_for_file(path)?;
            Ok(async_root_logger(level, drain))
        }
    }
}

fn async_root_logger<T>(level: Level, drain: T) -> slog::Logger
where
    T: slog::Drain + Send + 'static,
    <T as slog::Drain>::Err: std::fmt::Debug,
{
    let level_drain = slog::LevelFilter(drain, level).fuse();
    let async_drain = slog_async::Async::new(level_drain).build().fuse();
    slog::Logger::root(async_drain, o!(FileKv))
}

fn log_drain_for_file(
    path: &Utf8Path,
) -> Result<impl Drain<Ok = (), Err = slog::Never> + Send, LogInitError> {
    let open_error = |err| LogInitError { path: path.to_owned(), err };
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(open_error)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_error)?;

    // Record a message to the stderr so that a reader who doesn't already know
    // how logging is configured knows where the rest of the log messages went.
    eprintln!("note: configured to log to \"{}\"", path);
    Ok(slog_bunyan::with_name("netbox-ssot", file).build().fuse())
}

#[cfg(test)]
mod test {
    use super::*;
    use slog::info;

    #[test]
    fn test_level_from_config() {
        assert_eq!(level_from_config(0), Level::Debug);
        assert_eq!(level_from_config(1), Level::Info);
        assert_eq!(level_from_config(2), Level::Warning);
        assert_eq!(level_from_config(3), Level::Error);
    }

    #[test]
    fn test_file_logger_writes_bunyan_lines() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/ssot.log");
        {
            let log = root_logger(
                Level::Info,
                &LogDestination::File(path.clone()),
            )
            .unwrap();
            info!(log, "hello"; "source" => "pve");
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value =
            serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(line["msg"], "hello");
        assert_eq!(line["source"], "pve");
        assert_eq!(line["name"], "netbox-ssot");
    }
}
