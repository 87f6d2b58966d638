//! Application state.
//!
//! ```text
//! AppState
//! ├── transcript: Transcript   (messages and fragments)
//! ├── pacing: PacingBuffer     (answer text waiting to be revealed)
//! ├── input: InputState        (single-line editor)
//! └── view: ViewState          (layout, visibility toggles, scroll)
//! ```
//!
//! The state is owned by the runtime and mutated only by the reducer.

use std::cell::Cell;

use octerm_core::config::{Config, UiMode};

use crate::pacing::PacingBuffer;
use crate::transcript::{RenderFilter, Transcript};

/// Rows taken by the status line.
pub const STATUS_HEIGHT: u16 = 1;

/// Bounds for the input box height.
pub const MIN_INPUT_HEIGHT: u16 = 1;
pub const MAX_INPUT_HEIGHT: u16 = 20;

pub struct AppState {
    pub should_quit: bool,
    pub session_id: String,
    /// Server address shown in the status line.
    pub server: String,
    pub transcript: Transcript,
    pub pacing: PacingBuffer,
    /// Characters revealed per typewriter tick.
    pub typewriter_chunk: usize,
    pub input: InputState,
    pub view: ViewState,
    /// A prompt was sent and its answer has not completed.
    pub awaiting_reply: bool,
    /// The event feed is still delivering.
    pub stream_open: bool,
    /// Spinner animation frame counter.
    pub spinner_frame: usize,
}

impl AppState {
    pub fn new(config: &Config, session_id: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            session_id: session_id.into(),
            server: server.into(),
            transcript: Transcript::new(),
            pacing: PacingBuffer::new(),
            typewriter_chunk: config.ui.typewriter_chunk(),
            input: InputState::default(),
            view: ViewState::from_config(config),
            awaiting_reply: false,
            stream_open: true,
            spinner_frame: 0,
        }
    }

    /// Whether the status line shows the spinner.
    pub fn is_busy(&self) -> bool {
        self.awaiting_reply || self.transcript.has_pending()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub mode: UiMode,
    pub show_thinking: bool,
    pub show_tools: bool,
    pub wrap: bool,
    pub input_height: u16,
    pub max_output_lines: usize,
    /// Lines scrolled up from the bottom; 0 follows new output.
    pub scroll_from_bottom: usize,
    /// Terminal height at the last frame.
    pub frame_height: u16,
    /// Wrapped transcript lines at the last render (written by the renderer).
    pub content_lines: Cell<usize>,
    /// Ctrl+W was pressed; the next `+`/`-` resizes the input box.
    pub resize_armed: bool,
}

impl ViewState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.ui.mode,
            show_thinking: config.ui.show_thinking,
            show_tools: config.ui.show_tools,
            wrap: config.ui.wrap,
            input_height: config
                .ui
                .input_height
                .clamp(MIN_INPUT_HEIGHT, MAX_INPUT_HEIGHT),
            max_output_lines: config.ui.max_output_lines,
            scroll_from_bottom: 0,
            frame_height: 0,
            content_lines: Cell::new(0),
            resize_armed: false,
        }
    }

    pub fn filter(&self) -> RenderFilter {
        RenderFilter {
            show_reasoning: self.show_thinking,
            show_tools: self.show_tools,
        }
    }

    pub fn shows_transcript(&self) -> bool {
        matches!(self.mode, UiMode::Full | UiMode::Output)
    }

    pub fn shows_input(&self) -> bool {
        matches!(self.mode, UiMode::Full | UiMode::Input)
    }

    /// Rows inside the transcript border for the last frame size.
    pub fn transcript_rows(&self) -> u16 {
        if !self.shows_transcript() {
            return 0;
        }
        let input = if self.shows_input() {
            self.input_height + 2
        } else {
            0
        };
        self.frame_height.saturating_sub(STATUS_HEIGHT + input + 2)
    }

    /// Largest useful `scroll_from_bottom`.
    pub fn max_scroll(&self) -> usize {
        self.content_lines
            .get()
            .saturating_sub(usize::from(self.transcript_rows()))
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_from_bottom = self
            .scroll_from_bottom
            .saturating_add(lines)
            .min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }
}

/// Single-line input editor. `cursor` counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
}

impl InputState {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    /// Inserts pasted text; line breaks become spaces.
    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '\r' => {}
                '\n' | '\t' => self.insert_char(' '),
                c => self.insert_char(c),
            }
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// Takes the text out of the editor, leaving it empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map_or(self.text.len(), |(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_editing_is_char_based() {
        let mut input = InputState::default();
        input.insert_str("héllo");
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.text, "hélo");
        assert_eq!(input.cursor, 2);

        input.move_home();
        input.delete();
        assert_eq!(input.text, "élo");

        input.move_end();
        input.insert_char('!');
        assert_eq!(input.take(), "élo!");
        assert!(input.is_empty());
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = InputState::default();
        input.insert_str("a\r\nb\tc");
        assert_eq!(input.text, "a b c");
    }

    #[test]
    fn test_view_from_config_clamps_input_height() {
        let mut config = Config::default();
        config.ui.input_height = 0;
        assert_eq!(ViewState::from_config(&config).input_height, MIN_INPUT_HEIGHT);

        config.ui.input_height = 99;
        assert_eq!(ViewState::from_config(&config).input_height, MAX_INPUT_HEIGHT);
    }

    #[test]
    fn test_scroll_is_bounded_by_content() {
        let mut view = ViewState::from_config(&Config::default());
        view.frame_height = 30;
        // 30 - status 1 - input (6 + 2) - border 2
        assert_eq!(view.transcript_rows(), 19);

        view.content_lines.set(25);
        view.scroll_up(100);
        assert_eq!(view.scroll_from_bottom, 6);
        view.scroll_down(4);
        assert_eq!(view.scroll_from_bottom, 2);
        view.scroll_down(4);
        assert_eq!(view.scroll_from_bottom, 0);
    }

    #[test]
    fn test_mode_controls_panes() {
        let mut config = Config::default();
        config.ui.mode = UiMode::Output;
        let view = ViewState::from_config(&config);
        assert!(view.shows_transcript());
        assert!(!view.shows_input());
    }
}
