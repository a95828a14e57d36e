// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-test log files

use camino::Utf8Path;
use camino::Utf8PathBuf;
use slog::o;
use slog::Drain;
use slog::Logger;
use std::fs::OpenOptions;

/// A logger for one test, writing bunyan records to its own file.
///
/// It sucks to have to re-run the test suite to get debug output, especially
/// when test failures are non-reproducible, so every test gets a separate log
/// file.  If the test succeeds, [`LogContext::cleanup_successful`] removes
/// it; otherwise the path is left behind for inspection.
pub struct LogContext {
    pub log: Logger,
    log_path: Utf8PathBuf,
}

impl LogContext {
    pub fn new(test_name: &str) -> LogContext {
        let arg0 = std::env::args()
            .next()
            .as_deref()
            .map(Utf8Path::new)
            .and_then(|path| path.file_name())
            .map(str::to_owned)
            .unwrap_or_else(|| String::from("test"));
        let dir = Utf8PathBuf::try_from(std::env::temp_dir())
            .expect("temporary directory is not valid UTF-8");
        let log_path = dir.join(format!(
            "{}-{}.{}.log",
            arg0,
            test_name,
            std::process::id()
        ));
        eprintln!("log file: {}", log_path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .expect("failed to open test log file");
        let bunyan =
            slog_bunyan::with_name("netbox-ssot-test", file).build().fuse();
        let drain = slog_async::Async::new(bunyan).build().fuse();
        let log = Logger::root(drain, o!("test" => test_name.to_owned()));
        LogContext { log, log_path }
    }

    pub fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// Removes the log file of a test that passed.
    pub fn cleanup_successful(self) {
        let LogContext { log, log_path } = self;
        // Flush the async drain before the file goes away.
        drop(log);
        let _ = std::fs::remove_file(&log_path);
    }
}

/// Set up a [`LogContext`] appropriate for a test named `test_name`
pub fn test_setup_log(test_name: &str) -> LogContext {
    LogContext::new(test_name)
}
