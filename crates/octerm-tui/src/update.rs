//! Reducer: `(state, event) -> effects`.
//!
//! All state changes happen here. I/O is requested through the returned
//! effects and carried out by the runtime.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use octerm_core::client::ClientError;
use octerm_core::stream::{ContentDelta, ContentKind, Operation, StreamDelta};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::pacing::Reveal;
use crate::state::{AppState, MAX_INPUT_HEIGHT, MIN_INPUT_HEIGHT};

/// Lines moved per mouse wheel step.
const WHEEL_LINES: usize = 3;

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => {
            app.spinner_frame = app.spinner_frame.wrapping_add(1);
            vec![]
        }
        UiEvent::Typewriter => {
            if let Some(reveal) = app.pacing.drain(app.typewriter_chunk) {
                apply_reveal(app, reveal);
            }
            vec![]
        }
        UiEvent::Frame { height, .. } => {
            app.view.frame_height = height;
            vec![]
        }
        UiEvent::Terminal(event) => handle_terminal_event(app, event),
        UiEvent::Stream(delta) => {
            handle_stream_delta(app, delta);
            vec![]
        }
        UiEvent::StreamFailed(err) => {
            handle_stream_end(app, Some(&err));
            vec![]
        }
        UiEvent::StreamClosed => {
            handle_stream_end(app, None);
            vec![]
        }
        UiEvent::PromptSent => vec![],
        UiEvent::PromptFailed(message) => {
            app.transcript.settle_trailing();
            app.transcript
                .add_system_line(&format!("[Error] Failed to send prompt: {message}"));
            app.awaiting_reply = false;
            vec![]
        }
    }
}

// ============================================================================
// Stream
// ============================================================================

fn handle_stream_delta(app: &mut AppState, delta: StreamDelta) {
    match delta {
        StreamDelta::Meta(meta) => {
            flush_pacing(app);
            app.transcript.apply_meta(&meta);
            if meta.complete && app.transcript.is_trailing(&meta.message_id) {
                app.awaiting_reply = false;
            }
        }
        StreamDelta::Content(delta) if is_paced(&delta) => {
            if let Some(flushed) =
                app.pacing
                    .offer(&delta.fragment_id, &delta.message_id, &delta.text)
            {
                apply_reveal(app, flushed);
            }
            if delta.is_final {
                app.transcript.apply_delta(&ContentDelta {
                    text: String::new(),
                    ..delta
                });
            }
        }
        StreamDelta::Content(delta) => {
            flush_pacing(app);
            app.transcript.apply_delta(&delta);
        }
    }
}

/// Only appended answer prose is typed out.
fn is_paced(delta: &ContentDelta) -> bool {
    delta.kind == ContentKind::Answer && delta.op == Operation::Append && !delta.text.is_empty()
}

fn flush_pacing(app: &mut AppState) {
    if let Some(reveal) = app.pacing.flush() {
        apply_reveal(app, reveal);
    }
}

fn apply_reveal(app: &mut AppState, reveal: Reveal) {
    app.transcript.apply_delta(&ContentDelta {
        message_id: reveal.message_id,
        fragment_id: reveal.fragment_id,
        kind: ContentKind::Answer,
        op: Operation::Append,
        text: reveal.text,
        is_final: false,
    });
}

fn handle_stream_end(app: &mut AppState, err: Option<&ClientError>) {
    flush_pacing(app);
    app.transcript.settle_trailing();
    let line = match err {
        Some(err) => format!("[Error] Event stream failed: {err}"),
        None => "[Info] Event stream closed".to_string(),
    };
    app.transcript.add_system_line(&line);
    app.stream_open = false;
    app.awaiting_reply = false;
}

// ============================================================================
// Terminal input
// ============================================================================

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::Mouse(mouse) => {
            handle_mouse(app, mouse);
            vec![]
        }
        Event::Paste(text) => {
            if app.view.shows_input() {
                app.input.insert_str(&text);
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_mouse(app: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.view.scroll_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.view.scroll_down(WHEEL_LINES),
        _ => {}
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.kind == KeyEventKind::Release {
        return vec![];
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if app.view.resize_armed {
        app.view.resize_armed = false;
        match key.code {
            KeyCode::Char('+' | '=') => {
                app.view.input_height = (app.view.input_height + 1).min(MAX_INPUT_HEIGHT);
                return vec![];
            }
            KeyCode::Char('-') => {
                app.view.input_height = app
                    .view
                    .input_height
                    .saturating_sub(1)
                    .max(MIN_INPUT_HEIGHT);
                return vec![];
            }
            _ => {}
        }
    }

    let page = usize::from(app.view.transcript_rows().max(1));
    match key.code {
        KeyCode::Char('c') if ctrl => return vec![UiEffect::Quit],
        KeyCode::Char('t') if ctrl => app.view.show_thinking = !app.view.show_thinking,
        KeyCode::Char('o') if ctrl => app.view.show_tools = !app.view.show_tools,
        KeyCode::Char('w') if ctrl => app.view.resize_armed = true,
        KeyCode::Char('q') if !ctrl && app.input.is_empty() => return vec![UiEffect::Quit],
        KeyCode::Up => app.view.scroll_up(1),
        KeyCode::Down => app.view.scroll_down(1),
        KeyCode::PageUp => app.view.scroll_up(page),
        KeyCode::PageDown => app.view.scroll_down(page),
        KeyCode::Home if ctrl || app.input.is_empty() => app.view.scroll_up(usize::MAX),
        KeyCode::End if ctrl || app.input.is_empty() => app.view.scroll_from_bottom = 0,
        _ if !app.view.shows_input() => {}
        KeyCode::Enter => return submit(app),
        KeyCode::Char(c) if !ctrl => app.input.insert_char(c),
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        _ => {}
    }
    vec![]
}

fn submit(app: &mut AppState) -> Vec<UiEffect> {
    if app.awaiting_reply || app.input.text.trim().is_empty() {
        return vec![];
    }

    let text = app.input.take().trim().to_string();
    app.transcript.add_user_message(&text);
    app.transcript.ensure_pending_assistant();
    app.awaiting_reply = true;
    app.view.scroll_from_bottom = 0;
    vec![UiEffect::SendPrompt { text }]
}

#[cfg(test)]
mod tests {
    use octerm_core::client::ClientErrorKind;
    use octerm_core::config::Config;
    use octerm_core::stream::MessageMeta;

    use super::*;
    use crate::transcript::Role;

    fn app() -> AppState {
        AppState::new(&Config::default(), "ses_1", "http://127.0.0.1:4096")
    }

    fn key(code: KeyCode) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn ctrl(c: char) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent::new(
            KeyCode::Char(c),
            KeyModifiers::CONTROL,
        )))
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            update(app, key(KeyCode::Char(c)));
        }
    }

    fn content(kind: ContentKind, fragment_id: &str, text: &str) -> UiEvent {
        UiEvent::Stream(StreamDelta::Content(ContentDelta {
            message_id: "m1".to_string(),
            fragment_id: fragment_id.to_string(),
            kind,
            op: Operation::Append,
            text: text.to_string(),
            is_final: false,
        }))
    }

    fn meta(complete: bool) -> UiEvent {
        UiEvent::Stream(StreamDelta::Meta(MessageMeta {
            message_id: "m1".to_string(),
            complete,
        }))
    }

    fn drain_typewriter(app: &mut AppState) {
        while !app.pacing.is_empty() {
            update(app, UiEvent::Typewriter);
        }
    }

    fn answer_text(app: &AppState) -> String {
        app.transcript
            .message("m1")
            .map(|m| m.fragments.iter().map(|f| f.text.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_enter_sends_prompt() {
        let mut app = app();
        type_text(&mut app, "  hello  ");

        let effects = update(&mut app, key(KeyCode::Enter));

        assert_eq!(
            effects,
            vec![UiEffect::SendPrompt {
                text: "hello".to_string()
            }]
        );
        assert!(app.input.is_empty());
        assert!(app.awaiting_reply);
        let messages = app.transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[1].pending);
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut app = app();
        type_text(&mut app, "   ");
        assert!(update(&mut app, key(KeyCode::Enter)).is_empty());
        assert!(app.transcript.is_empty());
    }

    #[test]
    fn test_send_ignored_while_awaiting_reply() {
        let mut app = app();
        type_text(&mut app, "one");
        update(&mut app, key(KeyCode::Enter));
        type_text(&mut app, "two");

        assert!(update(&mut app, key(KeyCode::Enter)).is_empty());
        assert_eq!(app.input.text, "two");
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert_eq!(update(&mut app, ctrl('c')), vec![UiEffect::Quit]);
        assert_eq!(update(&mut app, key(KeyCode::Char('q'))), vec![UiEffect::Quit]);

        type_text(&mut app, "a");
        assert!(update(&mut app, key(KeyCode::Char('q'))).is_empty());
        assert_eq!(app.input.text, "aq");
    }

    #[test]
    fn test_toggles_and_resize() {
        let mut app = app();
        update(&mut app, ctrl('t'));
        update(&mut app, ctrl('o'));
        assert!(!app.view.show_thinking);
        assert!(!app.view.show_tools);

        update(&mut app, ctrl('w'));
        update(&mut app, key(KeyCode::Char('+')));
        assert_eq!(app.view.input_height, 7);
        // Without arming, '-' is typed.
        update(&mut app, key(KeyCode::Char('-')));
        assert_eq!(app.view.input_height, 7);
        assert_eq!(app.input.text, "-");
    }

    #[test]
    fn test_answer_text_is_typed_out() {
        let mut app = app();
        type_text(&mut app, "hi");
        update(&mut app, key(KeyCode::Enter));

        update(&mut app, meta(false));
        update(&mut app, content(ContentKind::Answer, "p1", "Hel"));
        update(&mut app, content(ContentKind::Answer, "p1", "lo"));
        assert_eq!(answer_text(&app), "");

        update(&mut app, UiEvent::Typewriter);
        assert_eq!(answer_text(&app), "Hel");

        drain_typewriter(&mut app);
        let message = app.transcript.message("m1").unwrap();
        assert_eq!(message.fragments.len(), 1);
        assert_eq!(message.fragments[0].text, "Hello");
        assert!(!message.pending);
    }

    #[test]
    fn test_reasoning_flushes_paced_text_first() {
        let mut app = app();
        update(&mut app, content(ContentKind::Answer, "p1", "partial answer"));
        update(&mut app, content(ContentKind::Reasoning, "r1", "thinking"));

        let message = app.transcript.message("m1").unwrap();
        let texts: Vec<&str> = message.fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["partial answer", "thinking"]);
        assert!(app.pacing.is_empty());
    }

    #[test]
    fn test_completion_clears_awaiting_reply() {
        let mut app = app();
        type_text(&mut app, "hi");
        update(&mut app, key(KeyCode::Enter));
        update(&mut app, meta(false));
        update(&mut app, content(ContentKind::Answer, "p1", "done"));
        assert!(app.awaiting_reply);

        update(&mut app, meta(true));

        assert!(!app.awaiting_reply);
        assert!(app.pacing.is_empty());
        assert_eq!(answer_text(&app), "done");
        assert!(!app.is_busy());
    }

    #[test]
    fn test_prompt_failure_shows_error() {
        let mut app = app();
        type_text(&mut app, "hi");
        update(&mut app, key(KeyCode::Enter));

        update(&mut app, UiEvent::PromptFailed("HTTP 500".to_string()));

        assert!(!app.awaiting_reply);
        assert!(!app.is_busy());
        let last = app.transcript.messages().last().unwrap();
        assert!(last.notice);
        assert_eq!(last.fragments[0].text, "[Error] Failed to send prompt: HTTP 500");
    }

    #[test]
    fn test_stream_failure_closes_stream() {
        let mut app = app();
        update(&mut app, content(ContentKind::Answer, "p1", "cut"));
        let err = ClientError::new(ClientErrorKind::Stream, "connection reset");

        update(&mut app, UiEvent::StreamFailed(err));

        assert!(!app.stream_open);
        assert_eq!(answer_text(&app), "cut");
        let last = app.transcript.messages().last().unwrap();
        assert!(last.fragments[0].text.starts_with("[Error] Event stream failed"));
    }

    #[test]
    fn test_frame_and_tick() {
        let mut app = app();
        update(
            &mut app,
            UiEvent::Frame {
                width: 80,
                height: 24,
            },
        );
        update(&mut app, UiEvent::Tick);
        assert_eq!(app.view.frame_height, 24);
        assert_eq!(app.spinner_frame, 1);
    }
}
