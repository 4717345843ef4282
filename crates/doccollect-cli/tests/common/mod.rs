#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;

pub const CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Config with short backoff so retry paths finish quickly.
const TEST_CONFIG: &str = "[fetch]\nmax_retries = 1\nbase_delay_ms = 10\ncap_delay_ms = 20\nattempt_timeout_secs = 5\ndeadline_secs = 10\n";

/// Create a `doccollect` command isolated under `dir`: its config file lives
/// there and the storage root is `dir/data`.
pub fn doccollect_cmd(dir: &Path) -> Command {
    let config = dir.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, TEST_CONFIG).expect("failed to write test config");
    }

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("doccollect"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("DOCCOLLECT_CONFIG", &config);
    cmd.env("DOCCOLLECT_DATA_DIR", dir.join("data"));
    cmd
}
