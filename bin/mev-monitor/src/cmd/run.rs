use anyhow::Result;
use mev_monitor_rs::{Config, Monitor};
use tracing::info;

/// Live mode: catch up from the last persisted block to the current head,
/// then stop.
#[derive(Debug)]
pub struct Command;

impl Command {
    pub async fn execute(self, config_file: String) -> Result<()> {
        info!("loading config from `{config_file}`...");
        let config = Config::from_json_file(&config_file)?;

        let monitor = Monitor::build(&config).await?;
        monitor.run().await?;
        monitor.close().await?;
        Ok(())
    }
}
