//! TUI runtime: owns the terminal, runs the event loop, executes effects.
//!
//! This is the only place side effects happen. The reducer produces effects;
//! async results come back through the inbox channel as `UiEvent`s, and
//! stream deltas are drained from the pipeline's receiver each frame.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use octerm_core::client::{ClientResult, HttpClient, PromptOptions};
use octerm_core::config::Config;
use octerm_core::interrupt;
use octerm_core::stream::StreamDelta;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::terminal::{self, Tui};
use crate::{render, update};

/// Target frame interval while streaming or typing (~60fps).
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll interval when nothing is happening.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

type DeltaReceiver = mpsc::Receiver<ClientResult<StreamDelta>>;

/// Full-screen TUI runtime. The terminal is restored on drop.
pub struct TuiRuntime {
    terminal: Tui,
    pub state: AppState,
    client: HttpClient,
    options: PromptOptions,
    /// Stream pipeline output; `None` once the stream has ended.
    deltas: Option<DeltaReceiver>,
    inbox_tx: mpsc::UnboundedSender<UiEvent>,
    inbox_rx: mpsc::UnboundedReceiver<UiEvent>,
    typewriter_interval: Duration,
    last_tick: Instant,
    last_typewriter: Instant,
    last_terminal_event: Instant,
}

impl TuiRuntime {
    /// Takes over the terminal.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be switched to raw mode.
    pub fn new(
        config: &Config,
        client: HttpClient,
        session_id: String,
        options: PromptOptions,
        deltas: DeltaReceiver,
    ) -> Result<Self> {
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });

        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;
        let state = AppState::new(config, session_id, client.base_url());
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let now = Instant::now();
        Ok(Self {
            terminal,
            state,
            client,
            options,
            deltas: Some(deltas),
            inbox_tx,
            inbox_rx,
            typewriter_interval: config.ui.typewriter_interval(),
            last_tick: now,
            last_typewriter: now,
            last_terminal_event: now,
        })
    }

    /// Runs the event loop until the user quits.
    ///
    /// # Errors
    /// Returns an error if reading terminal input or drawing fails.
    pub fn run(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            if interrupt::is_interrupted() {
                break;
            }

            let mut events = self.collect_events()?;

            // Layout must be current before any other event is reduced
            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                if matches!(event, UiEvent::Terminal(_)) {
                    self.last_terminal_event = Instant::now();
                }
                // Renders are batched to the tick cadence
                if matches!(event, UiEvent::Tick) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty {
                self.terminal.draw(|frame| render::render(&self.state, frame))?;
                dirty = false;
            }
        }

        Ok(())
    }

    // ========================================================================
    // Event Collection
    // ========================================================================

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let typing = !self.state.pacing.is_empty();
        let needs_fast_poll = typing
            || self.state.is_busy()
            || self.last_terminal_event.elapsed() < IDLE_POLL_DURATION;
        let tick_interval = if needs_fast_poll {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        self.collect_stream_events(&mut events);
        while let Ok(event) = self.inbox_rx.try_recv() {
            events.push(event);
        }

        let mut poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };
        if typing {
            let until_reveal = self
                .typewriter_interval
                .saturating_sub(self.last_typewriter.elapsed());
            poll_duration = poll_duration.min(until_reveal);
        }

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if typing && self.last_typewriter.elapsed() >= self.typewriter_interval {
            events.push(UiEvent::Typewriter);
            self.last_typewriter = Instant::now();
        }
        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    /// Drains ready deltas. The first error or the channel closing ends the stream.
    fn collect_stream_events(&mut self, events: &mut Vec<UiEvent>) {
        let Some(rx) = self.deltas.as_mut() else {
            return;
        };

        let ended = loop {
            match rx.try_recv() {
                Ok(Ok(delta)) => events.push(UiEvent::Stream(delta)),
                Ok(Err(err)) => break Some(UiEvent::StreamFailed(err)),
                Err(TryRecvError::Empty) => break None,
                Err(TryRecvError::Disconnected) => break Some(UiEvent::StreamClosed),
            }
        };

        if let Some(event) = ended {
            info!("event stream ended");
            events.push(event);
            self.deltas = None;
        }
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::SendPrompt { text } => {
                let client = self.client.clone();
                let session_id = self.state.session_id.clone();
                let options = self.options.clone();
                self.spawn_effect(move || async move {
                    match client.send_prompt(&session_id, &text, &options).await {
                        Ok(()) => {
                            debug!(session_id = %session_id, "prompt sent");
                            UiEvent::PromptSent
                        }
                        Err(err) => {
                            warn!(session_id = %session_id, error = %err, "prompt failed");
                            UiEvent::PromptFailed(err.to_string())
                        }
                    }
                });
            }
        }
    }

    /// Runs `f` on the tokio runtime and delivers its result event to the inbox.
    fn spawn_effect<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(f().await);
        });
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
