//! Headless command handler.

use anyhow::Result;
use octerm_core::client::HttpClient;
use octerm_core::config::Config;
use tokio::io::BufReader;

use crate::modes;

pub async fn run(config: &Config) -> Result<()> {
    let client = HttpClient::from_config(&config.server)?;
    let mut headless = modes::headless::Headless::new(config, client, tokio::io::stdout());
    headless.run(BufReader::new(tokio::io::stdin())).await
}
