//! Full-screen TUI for octerm.

pub mod effects;
pub mod events;
pub mod markdown;
pub mod pacing;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod transcript;
pub mod update;

use std::io::{IsTerminal, Write, stderr};

use anyhow::{Context, Result};
use octerm_core::client::{HttpClient, PromptOptions};
use octerm_core::config::Config;
use octerm_core::{interrupt, stream};
pub use runtime::TuiRuntime;

/// Runs the interactive chat UI on an already-resolved session.
///
/// Connects to the event feed before taking over the terminal so connection
/// errors are reported on a normal screen.
pub async fn run_interactive(
    config: &Config,
    client: HttpClient,
    session_id: String,
) -> Result<()> {
    // The TUI needs a terminal to draw on
    if !stderr().is_terminal() {
        anyhow::bail!(
            "Interactive mode requires a terminal.\n\
             Use `octerm exec -p '...'` for non-interactive use."
        );
    }

    let mut err = stderr();
    writeln!(err, "octerm")?;
    writeln!(err, "Server: {}", client.base_url())?;
    writeln!(err, "Session: {session_id}")?;
    err.flush()?;

    let feed = client
        .subscribe()
        .await
        .context("Failed to connect to the event feed")?;
    let cancel = interrupt::cancellation_token();
    let deltas = stream::spawn_stream(feed, cancel.clone());

    let options = PromptOptions::from_defaults(&config.defaults);
    let mut runtime = TuiRuntime::new(config, client, session_id, options, deltas)?;
    let result = runtime.run();

    cancel.cancel();
    drop(runtime);
    result
}
