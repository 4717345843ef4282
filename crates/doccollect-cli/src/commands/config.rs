//! Config command implementation

use anyhow::Result;
use doccollect_core::Config;

/// Print the effective configuration, CLI overrides included.
pub fn execute(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
