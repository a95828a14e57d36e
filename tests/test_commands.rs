// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tests for the netbox-ssot executable.  Runs themselves are tested
//! elsewhere, so this checks argument handling, reporting of bad
//! configuration and the exit codes.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use std::fs;
use std::time::Duration;
use subprocess::Exec;
use subprocess::ExitStatus;
use subprocess::NullFile;
use subprocess::Redirection;

const CMD_NETBOX_SSOT: &str = env!("CARGO_BIN_EXE_netbox-ssot");

/// maximum time to wait for any command
///
/// A bug might otherwise leave a test waiting on a run that never ends.
const TIMEOUT: Duration = Duration::from_secs(30);

const EXIT_SUCCESS: u32 = 0;
const EXIT_FAILURE: u32 = 1;
const EXIT_USAGE: u32 = 2;

/// Runs the given command to completion or up to [`TIMEOUT`], whichever is
/// shorter, with empty stdin.  Returns the exit status and what the command
/// wrote to stdout and stderr.
fn run_command(dir: &Utf8Path, exec: Exec) -> (ExitStatus, String, String) {
    let cmdline = exec.to_cmdline_lossy();
    let stdout_path = dir.join("stdout");
    let stderr_path = dir.join("stderr");
    let stdout_file = fs::File::create(&stdout_path).unwrap();
    let stderr_file = fs::File::create(&stderr_path).unwrap();

    let mut subproc = exec
        .stdin(NullFile)
        .stdout(Redirection::File(stdout_file))
        .stderr(Redirection::File(stderr_file))
        .detached()
        .popen()
        .unwrap_or_else(|e| panic!("failed to start {cmdline}: {e}"));
    let exit_status = subproc
        .wait_timeout(TIMEOUT)
        .unwrap_or_else(|e| panic!("failed to wait for {cmdline}: {e}"))
        .unwrap_or_else(|| {
            let _ = subproc.kill();
            panic!("timed out waiting for {cmdline}")
        });

    let stdout_text = fs::read_to_string(&stdout_path).unwrap();
    let stderr_text = fs::read_to_string(&stderr_path).unwrap();
    (exit_status, stdout_text, stderr_text)
}

fn netbox_ssot(args: &[&str]) -> Exec {
    Exec::cmd(CMD_NETBOX_SSOT).args(args)
}

fn write_config(dir: &Utf8Path, contents: &str) -> Utf8PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn assert_exit_code(exit_status: ExitStatus, code: u32) {
    if let ExitStatus::Exited(exit_code) = exit_status {
        assert_eq!(exit_code, code);
    } else {
        panic!(
            "expected normal process exit with code {}, got {:?}",
            code, exit_status
        );
    }
}

#[test]
fn test_help() {
    let dir = Utf8TempDir::new().unwrap();
    let (exit_status, stdout_text, _) =
        run_command(dir.path(), netbox_ssot(&["--help"]));
    assert_exit_code(exit_status, EXIT_SUCCESS);
    assert!(stdout_text.contains("--config <CONFIG>"), "{stdout_text}");
}

#[test]
fn test_unknown_argument() {
    let dir = Utf8TempDir::new().unwrap();
    let (exit_status, _, stderr_text) =
        run_command(dir.path(), netbox_ssot(&["--frobnicate"]));
    assert_exit_code(exit_status, EXIT_USAGE);
    assert!(stderr_text.contains("--frobnicate"), "{stderr_text}");
}

#[test]
fn test_missing_config_file() {
    let dir = Utf8TempDir::new().unwrap();
    let path = dir.path().join("nonexistent.toml");
    let (exit_status, stdout_text, stderr_text) =
        run_command(dir.path(), netbox_ssot(&["--config", path.as_str()]));
    assert_exit_code(exit_status, EXIT_FAILURE);
    assert_eq!(stdout_text, "");
    assert!(stderr_text.starts_with("error: failed to load"), "{stderr_text}");
    assert!(stderr_text.contains("error reading"), "{stderr_text}");
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let dir = Utf8TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[netbox]
apiToken = ""
hostname = "netbox.example.com"

[[source]]
name = "pve"
type = "proxmox"
hostname = "pve.example.com"
port = 70000
username = "netbox-ssot@pve!ssot"
apiToken = "0b7d5e3a-9c41-4f2e-8a6d-1e2f3a4b5c6d"
"#,
    );
    let (exit_status, stdout_text, stderr_text) =
        run_command(dir.path(), netbox_ssot(&["--config", path.as_str()]));
    assert_exit_code(exit_status, EXIT_FAILURE);
    assert_eq!(stdout_text, "");
    assert!(
        stderr_text.contains("netbox.apiToken: cannot be empty"),
        "{stderr_text}"
    );
    let port = "source[pve].port: must be between 0 and 65535. Is 70000";
    assert!(stderr_text.contains(port), "{stderr_text}");
}

#[test]
fn test_unreachable_registry() {
    let dir = Utf8TempDir::new().unwrap();
    let log_path = dir.path().join("netbox-ssot.log");
    // Nothing listens on the discard port.
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[logger]
level = 0
dest = "{log_path}"

[netbox]
apiToken = "el1aof5y0u2l7nloalfbaqbq4d7pwo8kvp7c8iyj"
hostname = "127.0.0.1"
port = 9
httpScheme = "http"
timeout = 5
"#
        ),
    );
    let (exit_status, stdout_text, stderr_text) =
        run_command(dir.path(), netbox_ssot(&["--config", path.as_str()]));
    assert_exit_code(exit_status, EXIT_FAILURE);
    assert_eq!(stdout_text, "");
    assert!(
        stderr_text.starts_with("error: failed to load the registry"),
        "{stderr_text}"
    );
    // The logger existed by then, and wrote nowhere but its file.
    assert!(log_path.exists());
}
