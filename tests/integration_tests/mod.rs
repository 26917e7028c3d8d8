//! End-to-end tests driving the `ptview` binary.

mod detect;
mod view;

use std::path::PathBuf;
use std::process::{Command, Output};

/// `ptview` isolated from the user's config, color settings and RUST_LOG.
pub fn ptview() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ptview"));
    cmd.env("PTVIEW_CONFIG_PATH", "/nonexistent/ptview/config.toml")
        .env("NO_COLOR", "1")
        .env_remove("CLICOLOR_FORCE")
        .env_remove("RUST_LOG");
    cmd
}

/// Path to a trace under `src/trace/testdata`.
pub fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src/trace/testdata")
        .join(name)
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
