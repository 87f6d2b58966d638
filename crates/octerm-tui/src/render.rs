//! Pure view functions for the TUI.
//!
//! Functions here take `&AppState` and draw to a ratatui frame. They never
//! mutate state or return effects; the one exception is the rendered line
//! count, which is recorded in a `Cell` so the reducer can bound scrolling.

use octerm_core::stream::ContentKind;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::markdown::{render_markdown, wrap_plain, wrap_spans};
use crate::state::{AppState, InputState, STATUS_HEIGHT};
use crate::transcript::{Document, Role};

/// Spinner frames for the status line and pending messages.
const SPINNER_FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

/// Ticks per spinner frame.
const SPINNER_SPEED_DIVISOR: usize = 2;

const USER_LABEL: Style = Style::new().fg(Color::Green).add_modifier(Modifier::BOLD);
const ASSISTANT_LABEL: Style = Style::new().fg(Color::Blue).add_modifier(Modifier::BOLD);
const REASONING: Style = Style::new()
    .fg(Color::DarkGray)
    .add_modifier(Modifier::ITALIC);
const TOOL: Style = Style::new().fg(Color::Yellow);
const ERROR: Style = Style::new().fg(Color::Red);
const NOTICE: Style = Style::new().fg(Color::DarkGray);

/// Layout width when wrapping is off; the viewport clips what does not fit.
const UNWRAPPED_WIDTH: usize = 4096;

pub fn spinner(frame: usize) -> &'static str {
    SPINNER_FRAMES[(frame / SPINNER_SPEED_DIVISOR) % SPINNER_FRAMES.len()]
}

/// Renders the entire TUI to the frame.
pub fn render(app: &AppState, frame: &mut Frame) {
    let view = &app.view;
    let mut constraints = Vec::new();
    if view.shows_transcript() {
        constraints.push(Constraint::Min(3));
    }
    if view.shows_input() {
        let height = view.input_height + 2;
        constraints.push(if view.shows_transcript() {
            Constraint::Length(height)
        } else {
            Constraint::Min(height)
        });
    }
    constraints.push(Constraint::Length(STATUS_HEIGHT));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let mut next = 0;
    if view.shows_transcript() {
        render_transcript(app, frame, chunks[next]);
        next += 1;
    }
    if view.shows_input() {
        render_input(app, frame, chunks[next]);
        next += 1;
    }
    render_status_line(app, frame, chunks[next]);
}

fn render_transcript(app: &AppState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Transcript ")
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let document = app.transcript.render(app.view.filter());
    let width = if app.view.wrap {
        usize::from(inner.width)
    } else {
        UNWRAPPED_WIDTH
    };
    let mut lines = transcript_lines(&document, width, app.spinner_frame);
    let max = app.view.max_output_lines;
    if max > 0 && lines.len() > max {
        lines.drain(..lines.len() - max);
    }

    app.view.content_lines.set(lines.len());
    let visible = visible_window(
        lines,
        usize::from(inner.height),
        app.view.scroll_from_bottom,
    );
    frame.render_widget(Paragraph::new(visible), inner);
}

/// Slices `lines` to `height` rows, `scroll_from_bottom` rows up from the end.
/// Short content is bottom-aligned.
pub fn visible_window(
    lines: Vec<Line<'static>>,
    height: usize,
    scroll_from_bottom: usize,
) -> Vec<Line<'static>> {
    let total = lines.len();
    let scroll = scroll_from_bottom.min(total.saturating_sub(height));
    let end = total - scroll;
    let start = end.saturating_sub(height);

    let mut visible: Vec<Line<'static>> =
        lines.into_iter().skip(start).take(end - start).collect();
    if visible.len() < height {
        let mut padded = vec![Line::default(); height - visible.len()];
        padded.append(&mut visible);
        return padded;
    }
    visible
}

/// Lays the document out as styled lines `width` columns wide.
pub fn transcript_lines(
    document: &Document,
    width: usize,
    spinner_frame: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, block) in document.blocks.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        match block.role {
            Role::User => {
                let text: String = block.fragments.iter().map(|f| f.text.as_str()).collect();
                lines.extend(wrap_spans(
                    &[Span::raw(text)],
                    width,
                    &[Span::styled("You: ", USER_LABEL)],
                    &[Span::raw("     ")],
                ));
            }
            Role::Assistant if block.notice => {
                for fragment in &block.fragments {
                    let style = if fragment.text.starts_with("[Error]") {
                        ERROR
                    } else {
                        NOTICE
                    };
                    lines.extend(wrap_plain(&fragment.text, style, width));
                }
            }
            Role::Assistant => {
                let mut header = vec![Span::styled("Assistant", ASSISTANT_LABEL)];
                if block.pending {
                    header.push(Span::raw(" "));
                    header.push(Span::styled(spinner(spinner_frame), NOTICE));
                }
                lines.push(Line::from(header));
                for fragment in &block.fragments {
                    lines.extend(fragment_lines(fragment.kind, &fragment.text, width));
                }
            }
        }
    }
    lines
}

fn fragment_lines(kind: ContentKind, text: &str, width: usize) -> Vec<Line<'static>> {
    match kind {
        ContentKind::Answer => render_markdown(text, width, Style::default()),
        ContentKind::Reasoning => prefixed(text, "│ ", REASONING, width),
        ContentKind::Tool => prefixed(text, "⚙ ", TOOL, width),
        ContentKind::Other => wrap_plain(text, Style::default(), width),
    }
}

fn prefixed(text: &str, marker: &'static str, style: Style, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for part in text.trim_end_matches('\n').split('\n') {
        lines.extend(wrap_spans(
            &[Span::styled(part.to_string(), style)],
            width,
            &[Span::styled(marker, style)],
            &[Span::styled("  ", style)],
        ));
    }
    lines
}

fn render_input(app: &AppState, frame: &mut Frame, area: Rect) {
    let title = if app.awaiting_reply {
        " Prompt (waiting for reply) "
    } else {
        " Prompt "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (rows, (cursor_row, cursor_col)) = layout_input(&app.input, usize::from(inner.width));
    let height = usize::from(inner.height).max(1);
    let first = (cursor_row + 1).saturating_sub(height);
    let visible: Vec<Line<'static>> = rows
        .into_iter()
        .skip(first)
        .take(height)
        .map(Line::from)
        .collect();
    frame.render_widget(Paragraph::new(visible), inner);

    let x = inner
        .x
        .saturating_add(u16::try_from(cursor_col).unwrap_or(u16::MAX));
    let y = inner
        .y
        .saturating_add(u16::try_from(cursor_row - first).unwrap_or(u16::MAX));
    if inner.contains(Position { x, y }) {
        frame.set_cursor_position(Position { x, y });
    }
}

/// Breaks the input into rows of `width` columns and locates the cursor as
/// `(row, column)`.
pub fn layout_input(input: &InputState, width: usize) -> (Vec<String>, (usize, usize)) {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut col = 0;
    let mut cursor = None;

    for (index, c) in input.text.chars().enumerate() {
        let w = c.width().unwrap_or(0);
        if col + w > width {
            rows.push(String::new());
            col = 0;
        }
        if index == input.cursor {
            cursor = Some((rows.len() - 1, col));
        }
        if let Some(row) = rows.last_mut() {
            row.push(c);
        }
        col += w;
    }

    let cursor = cursor.unwrap_or_else(|| {
        if col >= width {
            rows.push(String::new());
            (rows.len() - 1, 0)
        } else {
            (rows.len() - 1, col)
        }
    });
    (rows, cursor)
}

fn render_status_line(app: &AppState, frame: &mut Frame, area: Rect) {
    let separator = Span::styled(" │ ", NOTICE);
    let mut spans = vec![
        Span::styled(" octerm", Style::default().add_modifier(Modifier::BOLD)),
        separator.clone(),
        Span::raw(format!("session {}", app.session_id)),
        separator.clone(),
        Span::raw(app.view.mode.display_name()),
    ];

    if app.is_busy() {
        spans.push(separator.clone());
        spans.push(Span::styled(
            format!("{} thinking...", spinner(app.spinner_frame)),
            Style::default().fg(Color::Yellow),
        ));
    }
    if !app.stream_open {
        spans.push(separator.clone());
        spans.push(Span::styled("stream closed", ERROR));
    }
    if app.view.resize_armed {
        spans.push(separator.clone());
        spans.push(Span::styled("resize: +/-", Style::default().fg(Color::Cyan)));
    }

    spans.push(separator);
    spans.push(Span::styled(app.server.clone(), NOTICE));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
