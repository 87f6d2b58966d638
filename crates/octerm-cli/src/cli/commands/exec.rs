//! Exec command handler.

use anyhow::{Context, Result};
use octerm_core::client::{HttpClient, PromptOptions};
use octerm_core::config::Config;

use super::session;
use crate::modes;

pub struct ExecRunOptions<'a> {
    pub config: &'a Config,
    pub prompt: &'a str,
    pub show_thinking: bool,
    pub show_tools: bool,
}

pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    let prompt = options.prompt.trim();
    if prompt.is_empty() {
        anyhow::bail!("Prompt must not be empty");
    }

    let client = HttpClient::from_config(&options.config.server)?;
    let session_id = session::resolve(&client, options.config).await?;

    let exec_opts = modes::exec::ExecOptions {
        show_thinking: options.show_thinking,
        show_tools: options.show_tools,
        prompt: PromptOptions::from_defaults(&options.config.defaults),
    };

    modes::exec::run_exec(&client, &session_id, prompt, &exec_opts)
        .await
        .context("execute prompt")?;

    Ok(())
}
