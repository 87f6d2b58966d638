//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use octerm_core::config::{self, ConfigOverrides, UiMode};
use octerm_core::{interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "octerm")]
#[command(version = "0.1")]
#[command(about = "Terminal client for a local coding-agent server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (default: $OCTERM_HOME/config.toml)
    #[arg(long, global = true, value_name = "PATH", env = "OCTERM_CONFIG")]
    config: Option<PathBuf>,

    /// Write debug logs to this file (or set OCTERM_LOG)
    #[arg(long, global = true, value_name = "PATH")]
    log: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    #[command(flatten)]
    ui: UiArgs,
}

/// Server, session and prompt routing overrides shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
struct ServerArgs {
    /// Server host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Session id or title, or "daily" for the rolling daily session
    #[arg(long, global = true, value_name = "ID")]
    session: Option<String>,

    /// Token threshold before the daily session rolls over
    #[arg(long, global = true, value_name = "N")]
    daily_max_tokens: Option<u64>,

    /// Message threshold before the daily session rolls over
    #[arg(long, global = true, value_name = "N")]
    daily_max_messages: Option<u64>,

    /// Agent to route prompts to
    #[arg(long, global = true)]
    agent: Option<String>,

    /// Provider id sent with prompts
    #[arg(long = "provider", global = true, value_name = "ID")]
    provider_id: Option<String>,

    /// Model id sent with prompts
    #[arg(long = "model", global = true, value_name = "ID")]
    model_id: Option<String>,
}

/// Interactive UI overrides.
#[derive(clap::Args, Debug, Clone, Default)]
struct UiArgs {
    /// UI mode: full, output or input
    #[arg(long)]
    mode: Option<UiMode>,

    /// Show reasoning blocks
    #[arg(long, overrides_with = "hide_thinking")]
    show_thinking: bool,

    /// Hide reasoning blocks
    #[arg(long, overrides_with = "show_thinking")]
    hide_thinking: bool,

    /// Show tool calls
    #[arg(long, overrides_with = "hide_tools")]
    show_tools: bool,

    /// Hide tool calls
    #[arg(long, overrides_with = "show_tools")]
    hide_tools: bool,

    /// Word-wrap transcript lines
    #[arg(long, overrides_with = "no_wrap")]
    wrap: bool,

    /// Clip long transcript lines instead of wrapping them
    #[arg(long, overrides_with = "wrap")]
    no_wrap: bool,

    /// Height of the input box in rows
    #[arg(long, value_name = "ROWS")]
    input_height: Option<u16>,

    /// Keep only the last N transcript lines (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_output_lines: Option<usize>,
}

fn toggle(show: bool, hide: bool) -> Option<bool> {
    match (show, hide) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl ServerArgs {
    fn overrides(&self, ui: &UiArgs) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            session: self.session.clone(),
            daily_max_tokens: self.daily_max_tokens,
            daily_max_messages: self.daily_max_messages,
            agent: self.agent.clone(),
            provider_id: self.provider_id.clone(),
            model_id: self.model_id.clone(),
            mode: ui.mode,
            show_thinking: toggle(ui.show_thinking, ui.hide_thinking),
            show_tools: toggle(ui.show_tools, ui.hide_tools),
            wrap: toggle(ui.wrap, ui.no_wrap),
            input_height: ui.input_height,
            max_output_lines: ui.max_output_lines,
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sends one prompt and streams the answer to stdout
    Exec {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Also print reasoning fragments
        #[arg(long)]
        show_thinking: bool,

        /// Also print tool fragments
        #[arg(long)]
        show_tools: bool,
    },

    /// Runs a JSON-lines command dispatcher on stdin/stdout
    Headless,

    /// Inspect sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Prints the id of the session prompts would go to (creating it if needed)
    Resolve,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init();
    let _log_guard = logging::init(cli.log.as_deref()).context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        config: config_path,
        log: _,
        server,
        ui,
    } = cli;
    let config_path = config_path.unwrap_or_else(config::paths::config_path);
    let overrides = server.overrides(&ui);
    let load_config = || -> Result<config::Config> {
        let mut config = config::Config::load_from(&config_path).context("load config")?;
        config.apply_overrides(&overrides);
        Ok(config)
    };

    // default to chat mode
    let Some(command) = command else {
        return commands::chat::run(&load_config()?).await;
    };

    match command {
        Commands::Exec {
            prompt,
            show_thinking,
            show_tools,
        } => {
            let config = load_config()?;
            commands::exec::run(commands::exec::ExecRunOptions {
                config: &config,
                prompt: &prompt,
                show_thinking,
                show_tools,
            })
            .await
        }
        Commands::Headless => commands::headless::run(&load_config()?).await,
        Commands::Session { command } => match command {
            SessionCommands::Resolve => commands::session::print_resolved(&load_config()?).await,
        },
        // config commands must work even when the file is broken
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path(&config_path);
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(&config_path),
        },
    }
}
