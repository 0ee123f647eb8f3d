//! Conversation transcript display component

use crate::conversation::{Conversation, Message, MessageOrigin};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::time::{SystemTime, UNIX_EPOCH};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Transcript projection for one frame
pub struct TranscriptView<'a> {
    pub conversation: &'a Conversation,
    pub assistant_name: &'a str,
    pub composing: bool,
    /// Index into [`Conversation::quick_replies`] of the highlighted reply
    pub focused_reply: Option<usize>,
    /// Lines scrolled up from the newest; 0 follows the conversation
    pub scroll_offset: usize,
}

impl Widget for TranscriptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.draw(area, buf);
    }
}

/// A quick-reply button as laid out in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ButtonSpan {
    line: usize,
    column: usize,
    width: usize,
    reply_index: usize,
}

/// What a drawn transcript frame exposes to input handling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptFrame {
    /// Screen area and index (into [`Conversation::quick_replies`]) of each
    /// visible quick-reply button
    pub buttons: Vec<(Rect, usize)>,
    /// Largest useful scroll offset for this frame
    pub scroll_limit: usize,
}

impl TranscriptView<'_> {
    /// Draw the transcript scrolled `scroll_offset` lines up from the bottom
    pub fn draw(&self, area: Rect, buf: &mut Buffer) -> TranscriptFrame {
        if area.width == 0 || area.height == 0 {
            return TranscriptFrame::default();
        }

        let (mut all_lines, buttons) = self.layout(area.width as usize);
        let height = area.height as usize;
        let scroll_limit = all_lines.len().saturating_sub(height);

        let end = all_lines.len() - self.scroll_offset.min(scroll_limit);
        let start = end.saturating_sub(height);
        let visible: Vec<Line> = all_lines.drain(start..end).collect();
        Paragraph::new(visible).render(area, buf);

        let buttons = buttons
            .into_iter()
            .filter(|button| (start..end).contains(&button.line))
            .map(|button| {
                let x = area.x + (button.column as u16).min(area.width);
                let rect = Rect {
                    x,
                    y: area.y + (button.line - start) as u16,
                    width: (button.width as u16).min(area.right() - x),
                    height: 1,
                };
                (rect, button.reply_index)
            })
            .collect();

        TranscriptFrame {
            buttons,
            scroll_limit,
        }
    }

    /// Every line of the transcript at the given width
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        self.layout(width).0
    }

    fn layout(&self, width: usize) -> (Vec<Line<'static>>, Vec<ButtonSpan>) {
        let mut all_lines = Vec::new();
        let mut buttons = Vec::new();
        let mut reply_index = 0;

        for message in self.conversation.messages() {
            all_lines.extend(self.render_message(message, width));

            let replies = message.quick_replies();
            if !replies.is_empty() {
                let (lines, spans) =
                    render_quick_replies(replies, reply_index, self.focused_reply, width);
                let first_line = all_lines.len();
                buttons.extend(spans.into_iter().map(|span| ButtonSpan {
                    line: first_line + span.line,
                    ..span
                }));
                all_lines.extend(lines);
                reply_index += replies.len();
            }

            all_lines.push(message_footer(message));
            all_lines.push(Line::raw(""));
        }

        if self.composing {
            all_lines.push(typing_indicator());
        }

        (all_lines, buttons)
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: usize) -> Vec<Line<'static>> {
        let (icon, author, style, alignment) = match message.origin {
            MessageOrigin::User => ("👤", "You", Style::default().fg(Color::Blue), Alignment::Right),
            MessageOrigin::Assistant => (
                "🤖",
                self.assistant_name,
                Style::default().fg(Color::Gray),
                Alignment::Left,
            ),
        };

        let mut lines = vec![
            Line::from(vec![Span::styled(
                format!("{} {}", icon, author),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
            )])
            .alignment(alignment),
        ];

        // Bubbles use at most four fifths of the width, like the web widget
        let content_width = (width * 4 / 5).max(1);
        for content_line in wrap_text(&display_text(message), content_width) {
            lines.push(Line::from(vec![Span::styled(content_line, style)]).alignment(alignment));
        }

        lines
    }
}

/// Text as it should appear; assistant text may carry escaped newlines.
pub fn display_text(message: &Message) -> String {
    match message.origin {
        MessageOrigin::User => message.text.clone(),
        MessageOrigin::Assistant => message.text.replace("\\n", "\n"),
    }
}

fn message_footer(message: &Message) -> Line<'static> {
    let alignment = if message.is_user() {
        Alignment::Right
    } else {
        Alignment::Left
    };
    Line::from(vec![Span::styled(
        message.timestamp.format("%H:%M").to_string(),
        Style::default().fg(Color::DarkGray),
    )])
    .alignment(alignment)
}

/// Lay out quick-reply buttons, wrapping onto new lines as needed
fn render_quick_replies(
    replies: &[String],
    first_index: usize,
    focused: Option<usize>,
    width: usize,
) -> (Vec<Line<'static>>, Vec<ButtonSpan>) {
    let mut lines = Vec::new();
    let mut buttons = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;

    for (offset, label) in replies.iter().enumerate() {
        let button = format!("( {} )", label);
        let button_width = button.width();

        if current_width > 0 && current_width + 1 + button_width > width {
            lines.push(Line::from(std::mem::take(&mut current)));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(Span::raw(" "));
            current_width += 1;
        }

        let reply_index = first_index + offset;
        let style = if focused == Some(reply_index) {
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::LightBlue)
        };
        buttons.push(ButtonSpan {
            line: lines.len(),
            column: current_width,
            width: button_width,
            reply_index,
        });
        current.push(Span::styled(button, style));
        current_width += button_width;
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    (lines, buttons)
}

/// Animated three-dot indicator shown while the backend is composing
fn typing_indicator() -> Line<'static> {
    let frame = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        / 150;

    let dots: Vec<Span<'static>> = (0..3u128)
        .map(|i| {
            let style = if (frame + 3 - i) % 3 == 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled("● ", style)
        })
        .collect();

    let mut spans = vec![Span::styled("🤖 ", Style::default().fg(Color::Gray))];
    spans.extend(dots);
    Line::from(spans)
}

/// Wrap text to fit within `width` display columns.
///
/// Explicit line breaks and runs of spaces are kept; whitespace where a line
/// is broken is dropped. Words wider than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;
        let mut continuation = false;

        for token in runs(paragraph) {
            let token_width = token.width();

            if token.starts_with(char::is_whitespace) {
                if continuation && current.is_empty() {
                    continue;
                }
                if current_width + token_width <= width {
                    current.push_str(token);
                    current_width += token_width;
                } else {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                    continuation = true;
                }
                continue;
            }

            if !current.is_empty() && current_width + token_width > width {
                lines.push(current.trim_end().to_string());
                current.clear();
                current_width = 0;
                continuation = true;
            }

            if token_width <= width {
                current.push_str(token);
                current_width += token_width;
                continue;
            }

            for ch in token.chars() {
                let ch_width = ch.width().unwrap_or(0);
                if !current.is_empty() && current_width + ch_width > width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                    continuation = true;
                }
                current.push(ch);
                current_width += ch_width;
            }
        }

        lines.push(current);
    }

    lines
}

/// Split into alternating runs of whitespace and non-whitespace
fn runs(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let space = first.is_whitespace();
        let end = rest
            .find(|ch: char| ch.is_whitespace() != space)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(run)
    })
}
