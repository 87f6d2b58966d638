//! Chat command handler.

use std::io::{IsTerminal, Read};

use anyhow::{Context, Result};
use octerm_core::client::HttpClient;
use octerm_core::config::Config;

use super::{exec, session};
use crate::modes;

pub async fn run(config: &Config) -> Result<()> {
    // If stdin is piped, run exec mode instead
    if !std::io::stdin().is_terminal() {
        let mut prompt = String::new();
        std::io::stdin().lock().read_to_string(&mut prompt)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("No input provided via pipe");
        }
        return exec::run(exec::ExecRunOptions {
            config,
            prompt,
            show_thinking: false,
            show_tools: false,
        })
        .await;
    }

    let client = HttpClient::from_config(&config.server)?;
    let session_id = session::resolve(&client, config).await?;

    modes::run_interactive(config, client, session_id)
        .await
        .context("interactive chat failed")?;

    Ok(())
}
