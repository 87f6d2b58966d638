//! Markdown rendering for answer text.
//!
//! pulldown-cmark events are folded into styled ratatui lines, wrapped to the
//! transcript width. Code blocks are fenced and broken by width rather than by
//! word. Raw HTML is dropped.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

fn heading_style(level: HeadingLevel) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style.fg(Color::Cyan),
        _ => style,
    }
}

const CODE: Style = Style::new().fg(Color::Yellow);
const FENCE: Style = Style::new().fg(Color::DarkGray);
const BULLET: Style = Style::new().fg(Color::Cyan);
const QUOTE: Style = Style::new().fg(Color::Gray).add_modifier(Modifier::ITALIC);
const LINK: Style = Style::new()
    .fg(Color::Blue)
    .add_modifier(Modifier::UNDERLINED);

/// Renders `text` as markdown wrapped to `width` columns.
pub fn render_markdown(text: &str, width: usize, base: Style) -> Vec<Line<'static>> {
    let mut renderer = MarkdownRenderer::new(width, base);
    for event in Parser::new(text) {
        renderer.process_event(event);
    }
    renderer.finish()
}

/// Wraps plain `text` in a single style; explicit newlines are kept.
pub fn wrap_plain(text: &str, style: Style, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for part in text.split('\n') {
        lines.extend(wrap_spans(
            &[Span::styled(part.to_string(), style)],
            width,
            &[],
            &[],
        ));
    }
    lines
}

/// Word-wraps styled spans to `width` columns.
///
/// `first_prefix` starts the first line and `rest_prefix` every continuation
/// line (hanging indent). Runs of whitespace collapse to a single space.
pub fn wrap_spans(
    spans: &[Span<'static>],
    width: usize,
    first_prefix: &[Span<'static>],
    rest_prefix: &[Span<'static>],
) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new(width, first_prefix, rest_prefix);
    for span in spans {
        for (i, segment) in span.content.split('\n').enumerate() {
            if i > 0 {
                builder.break_line();
            }
            builder.push_words(segment, span.style);
        }
    }
    builder.finish()
}

struct LineBuilder<'a> {
    width: usize,
    first_prefix: &'a [Span<'static>],
    rest_prefix: &'a [Span<'static>],
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    used: usize,
}

impl<'a> LineBuilder<'a> {
    fn new(
        width: usize,
        first_prefix: &'a [Span<'static>],
        rest_prefix: &'a [Span<'static>],
    ) -> Self {
        let mut builder = Self {
            width: width.max(1),
            first_prefix,
            rest_prefix,
            lines: Vec::new(),
            current: Vec::new(),
            used: 0,
        };
        builder.start_line();
        builder
    }

    fn prefix(&self) -> &'a [Span<'static>] {
        if self.lines.is_empty() {
            self.first_prefix
        } else {
            self.rest_prefix
        }
    }

    fn start_line(&mut self) {
        let prefix = self.prefix();
        self.used = prefix.iter().map(Span::width).sum();
        self.current = prefix.to_vec();
    }

    fn break_line(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
        self.start_line();
    }

    fn has_content(&self) -> bool {
        self.current.len() > self.prefix().len()
    }

    fn remaining(&self) -> usize {
        self.width.saturating_sub(self.used)
    }

    fn push(&mut self, text: String, style: Style) {
        self.used += text.width();
        self.current.push(Span::styled(text, style));
    }

    fn push_words(&mut self, text: &str, style: Style) {
        let leading_space = text.starts_with(char::is_whitespace);
        let trailing_space = text.ends_with(char::is_whitespace);

        for (i, word) in text.split_whitespace().enumerate() {
            if (i > 0 || leading_space) && self.has_content() {
                self.push_space(style);
            }
            self.push_word(word, style);
        }
        if trailing_space && self.has_content() {
            self.push_space(style);
        }
    }

    fn push_space(&mut self, style: Style) {
        let ends_with_space = self
            .current
            .last()
            .is_some_and(|s| s.content.ends_with(' '));
        if !ends_with_space && self.remaining() > 0 {
            self.push(" ".to_string(), style);
        }
    }

    fn push_word(&mut self, word: &str, style: Style) {
        let word_width = word.width();
        if word_width <= self.remaining() {
            self.push(word.to_string(), style);
            return;
        }
        if self.has_content() {
            self.trim_trailing_space();
            self.break_line();
            if word_width <= self.remaining() {
                self.push(word.to_string(), style);
                return;
            }
        }
        self.push_chars(word, style);
    }

    /// Breaks `text` by character width, for words longer than a line and code.
    fn push_chars(&mut self, text: &str, style: Style) {
        let mut chunk = String::new();
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            let overflows = w > 0 && w + chunk.width() > self.remaining();
            if overflows && (self.has_content() || !chunk.is_empty()) {
                if !chunk.is_empty() {
                    self.push(std::mem::take(&mut chunk), style);
                }
                self.break_line();
            }
            chunk.push(c);
        }
        if !chunk.is_empty() {
            self.push(chunk, style);
        }
    }

    fn trim_trailing_space(&mut self) {
        if self.has_content() && self.current.last().is_some_and(|s| s.content == " ") {
            self.current.pop();
            self.used = self.used.saturating_sub(1);
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.trim_trailing_space();
        if self.has_content() || self.lines.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
        self.lines
    }
}

fn without_empty(spans: Vec<Span<'static>>) -> Vec<Span<'static>> {
    spans.into_iter().filter(|s| !s.content.is_empty()).collect()
}

struct ListState {
    /// Next number for ordered lists.
    next: Option<u64>,
}

struct MarkdownRenderer {
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    lists: Vec<ListState>,
    /// Marker for the list item whose first block is still being collected.
    item_marker: Option<String>,
    /// Fence label while inside a code block.
    code_block: Option<String>,
    quote_depth: usize,
}

impl MarkdownRenderer {
    fn new(width: usize, base: Style) -> Self {
        Self {
            width: width.max(1),
            lines: Vec::new(),
            spans: Vec::new(),
            style_stack: vec![base],
            lists: Vec::new(),
            item_marker: None,
            code_block: None,
            quote_depth: 0,
        }
    }

    fn style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let patched = self.style().patch(style);
        self.style_stack.push(patched);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                let style = self.style();
                self.spans.push(Span::styled(text.into_string(), style));
            }
            Event::Code(code) => {
                let style = self.style().patch(CODE);
                self.spans.push(Span::styled(code.into_string(), style));
            }
            Event::SoftBreak => {
                let style = self.style();
                self.spans.push(Span::styled(" ", style));
            }
            Event::HardBreak => {
                let style = self.style();
                self.spans.push(Span::styled("\n", style));
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.spans.push(Span::styled(marker, BULLET));
            }
            Event::Rule => {
                self.flush_block();
                self.lines
                    .push(Line::from(Span::styled("─".repeat(self.width.min(40)), FENCE)));
                self.lines.push(Line::default());
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                let style = self.style().patch(CODE);
                self.spans.push(Span::styled(math.into_string(), style));
            }
            Event::Html(_) | Event::InlineHtml(_) | Event::FootnoteReference(_) => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_block();
                self.push_style(heading_style(level));
            }
            Tag::CodeBlock(kind) => {
                self.flush_block();
                self.code_block = Some(match kind {
                    CodeBlockKind::Fenced(lang) => lang.into_string(),
                    CodeBlockKind::Indented => String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_block();
                self.lists.push(ListState { next: start });
            }
            Tag::Item => {
                self.flush_block();
                let marker = match self.lists.last_mut() {
                    Some(ListState { next: Some(n) }) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::BlockQuote(_) => {
                self.flush_block();
                self.quote_depth += 1;
                self.push_style(QUOTE);
            }
            Tag::Emphasis => self.push_style(Style::new().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::new().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::new().add_modifier(Modifier::CROSSED_OUT));
            }
            Tag::Link { .. } => self.push_style(LINK),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_block();
                if self.lists.is_empty() {
                    self.lines.push(Line::default());
                }
            }
            TagEnd::Heading(_) => {
                self.flush_block();
                self.pop_style();
                self.lines.push(Line::default());
            }
            TagEnd::CodeBlock => {
                self.flush_code_block();
                self.lines.push(Line::default());
            }
            TagEnd::List(_) => {
                self.flush_block();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.lines.push(Line::default());
                }
            }
            TagEnd::Item => self.flush_block(),
            TagEnd::BlockQuote(_) => {
                self.flush_block();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style();
            }
            _ => {}
        }
    }

    /// Wraps the collected inline spans as one block, with list or quote prefixes.
    fn flush_block(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);

        let indent = "  ".repeat(self.lists.len().saturating_sub(1));
        let quote = "│ ".repeat(self.quote_depth);
        let (first, rest) = match self.item_marker.take() {
            Some(marker) => {
                let hang = " ".repeat(marker.width());
                (
                    vec![
                        Span::raw(format!("{quote}{indent}")),
                        Span::styled(marker, BULLET),
                    ],
                    vec![Span::raw(format!("{quote}{indent}{hang}"))],
                )
            }
            None if !self.lists.is_empty() => {
                // Continuation paragraph inside a list item.
                let hang = format!("{quote}{indent}  ");
                (vec![Span::raw(hang.clone())], vec![Span::raw(hang)])
            }
            None => (
                vec![Span::styled(quote.clone(), QUOTE)],
                vec![Span::styled(quote, QUOTE)],
            ),
        };

        let first = without_empty(first);
        let rest = without_empty(rest);
        self.lines
            .extend(wrap_spans(&spans, self.width, &first, &rest));
    }

    fn flush_code_block(&mut self) {
        let lang = self.code_block.take().unwrap_or_default();
        let text: String = std::mem::take(&mut self.spans)
            .iter()
            .map(|s| s.content.as_ref())
            .collect();

        self.lines
            .push(Line::from(Span::styled(format!("```{lang}"), FENCE)));
        for line in text.trim_end_matches('\n').split('\n') {
            let mut builder = LineBuilder::new(self.width, &[], &[]);
            builder.push_chars(line, CODE);
            self.lines.extend(builder.finish());
        }
        self.lines.push(Line::from(Span::styled("```", FENCE)));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if self.code_block.is_some() {
            self.flush_code_block();
        } else {
            self.flush_block();
        }
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        if self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.lines
    }
}
