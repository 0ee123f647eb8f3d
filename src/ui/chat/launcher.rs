use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget, Wrap},
};

use crate::ui::chat::transcript::wrap_text;

pub const LAUNCHER_WIDTH: u16 = 8;
pub const LAUNCHER_HEIGHT: u16 = 3;
pub const BUBBLE_MAX_WIDTH: u16 = 44;

/// Round launcher button shown while the chat is closed
pub struct LauncherView;

impl Widget for LauncherView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Gray));
        let inner = block.inner(area);
        block.render(area, buf);

        let icon = Line::from(Span::styled(" 💬", Style::default().fg(Color::White)));
        buf.set_line(inner.x, inner.y, &icon, inner.width);
    }
}

/// Greeting bubble that floats above the launcher
pub struct BubbleView<'a> {
    pub assistant_name: &'a str,
    pub text: &'a str,
    /// Fade-in progress in `0.0..=1.0`
    pub progress: f64,
}

impl BubbleView<'_> {
    /// Height needed at `width`, including borders and the title row
    pub fn height_for(text: &str, width: u16) -> u16 {
        let inner = width.saturating_sub(2) as usize;
        wrap_text(text, inner).len() as u16 + 3
    }
}

impl Widget for BubbleView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Terminals cannot blend, so fade in through a dimmer palette
        let (border, body) = if self.progress < 0.5 {
            (Color::DarkGray, Color::DarkGray)
        } else {
            (Color::Gray, Color::Gray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border))
            .title_bottom(
                Line::from(Span::styled(" x dismiss ", Style::default().fg(Color::DarkGray)))
                    .alignment(Alignment::Right),
            );
        let inner = block.inner(area);
        block.render(area, buf);

        let lines = vec![
            Line::from(vec![
                Span::styled("● ", Style::default().fg(Color::Green)),
                Span::styled(
                    format!("{} is online", self.assistant_name),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(self.text.to_string(), Style::default().fg(body))),
        ];

        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(inner, buf);
    }
}
