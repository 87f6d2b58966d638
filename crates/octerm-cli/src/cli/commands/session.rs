//! Session command handlers and the shared resolution step.

use anyhow::{Context, Result};
use octerm_core::client::HttpClient;
use octerm_core::config::Config;
use octerm_core::session::Resolver;
use tracing::info;

/// Resolves the configured session against the server.
pub async fn resolve(client: &HttpClient, config: &Config) -> Result<String> {
    let request = config.session.request();
    let resolver = Resolver::new(client, &config.session).context("invalid session config")?;
    let session_id = resolver
        .resolve(request)
        .await
        .with_context(|| format!("resolve session '{request}'"))?;
    info!(request, session_id = %session_id, "resolved session");
    Ok(session_id)
}

pub async fn print_resolved(config: &Config) -> Result<()> {
    let client = HttpClient::from_config(&config.server)?;
    let session_id = resolve(&client, config).await?;
    println!("{session_id}");
    Ok(())
}
