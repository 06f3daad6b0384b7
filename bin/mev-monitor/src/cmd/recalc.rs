use anyhow::{bail, Result};
use clap::Args;
use mev_monitor_rs::{Config, Monitor};
use tracing::info;

#[derive(Debug, Args)]
#[clap(about = "rebuild derived tables from persisted bundles")]
pub struct Command {
    /// What to rebuild; only `attacks` is supported.
    target: String,
}

impl Command {
    pub async fn execute(self, config_file: String) -> Result<()> {
        if self.target != "attacks" {
            bail!("unknown recalc target `{}`; expected `attacks`", self.target);
        }
        info!("loading config from `{config_file}`...");
        let config = Config::from_json_file(&config_file)?;

        let monitor = Monitor::build(&config).await?;
        monitor.recalc_attacks().await?;
        monitor.close().await?;
        Ok(())
    }
}
