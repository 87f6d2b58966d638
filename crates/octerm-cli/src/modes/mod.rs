//! Runtime execution modes.
//!
//! - `exec`: Non-interactive streaming mode (stdout/stderr)
//! - `headless`: JSON-lines command dispatcher (stdin/stdout)
//! - `tui`: Full-screen interactive terminal UI (optional feature)

pub mod exec;
pub mod headless;

#[cfg(feature = "tui")]
pub use octerm_tui::run_interactive;

#[cfg(not(feature = "tui"))]
pub async fn run_interactive(
    _config: &octerm_core::config::Config,
    _client: octerm_core::client::HttpClient,
    _session_id: String,
) -> anyhow::Result<()> {
    anyhow::bail!("TUI support is disabled in this build (feature \"tui\").");
}
