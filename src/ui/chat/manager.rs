use std::cell::RefCell;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Widget},
};
use tokio::sync::mpsc;

use crate::config::WidgetConfig;
use crate::controller::ChatController;
use crate::events::WidgetEvent;
use crate::session::SessionIdProvider;
use crate::transport::WebhookClient;
use crate::ui::chat::commands::{SlashCommand, get_help_text};
use crate::ui::chat::composer::{ChatComposer, ComposerResult};
use crate::ui::chat::launcher::{
    BUBBLE_MAX_WIDTH, BubbleView, LAUNCHER_HEIGHT, LAUNCHER_WIDTH, LauncherView,
};
use crate::ui::chat::transcript::{TranscriptFrame, TranscriptView};
use crate::widget::{TransitionKind, Visibility, WidgetState};

const MARGIN: u16 = 1;
const PANEL_MAX_WIDTH: u16 = 64;
const PANEL_MAX_HEIGHT: u16 = 32;
const HEADER_HEIGHT: u16 = 3;
const WHEEL_LINES: usize = 3;

/// Actions the widget asks the surrounding application to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAction {
    None,
    Exit,
}

/// Screen regions that react to the mouse, recorded on each render
#[derive(Debug, Clone, Default)]
struct HitAreas {
    launcher: Option<Rect>,
    bubble: Option<Rect>,
    bubble_close: Option<Rect>,
    header: Option<Rect>,
    minimize: Option<Rect>,
    close: Option<Rect>,
    transcript: Option<Rect>,
    transcript_frame: TranscriptFrame,
}

fn hit(area: Option<Rect>, column: u16, row: u16) -> bool {
    area.is_some_and(|area| {
        column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
    })
}

/// The floating chat widget: state machine, input handling and rendering
pub struct ChatWidget {
    state: WidgetState,
    composer: ChatComposer,
    controller: ChatController,
    events: mpsc::UnboundedReceiver<WidgetEvent>,
    config: WidgetConfig,
    focused_reply: Option<usize>,
    notice: Option<String>,
    /// Transcript lines scrolled up from the newest message
    scroll_offset: usize,
    hit_areas: RefCell<HitAreas>,
}

impl ChatWidget {
    pub fn new(config: WidgetConfig, client: WebhookClient, sessions: SessionIdProvider) -> Self {
        let (controller, events) = ChatController::new(client, sessions, config.error_text.clone());

        Self {
            state: WidgetState::new(config.greeting.clone()),
            composer: ChatComposer::new(config.placeholder.clone()),
            controller,
            events,
            config,
            focused_reply: None,
            notice: None,
            scroll_offset: 0,
            hit_areas: RefCell::new(HitAreas::default()),
        }
    }

    /// Start the greeting bubble timer. Call once after the widget is shown.
    pub fn mount(&self) {
        self.controller.schedule(
            Duration::from_millis(self.config.bubble_delay_ms),
            WidgetEvent::GreetingDue,
        );
    }

    /// Apply an event and run whatever effect it produces
    pub fn apply(&mut self, event: WidgetEvent) {
        let messages = self.state.conversation().len();
        let history = matches!(event, WidgetEvent::HistoryLoaded(_));

        if let Some(effect) = self.state.apply(event) {
            self.controller.dispatch(effect);
        }

        // New content snaps the transcript back to the newest message
        if history || self.state.conversation().len() != messages {
            self.scroll_offset = 0;
        }

        let available = self.state.conversation().quick_replies().len();
        if self.focused_reply.is_some_and(|index| index >= available) {
            self.focused_reply = None;
        }
        self.sync_focus();
    }

    /// The composer shows its cursor only while no quick reply is highlighted
    fn sync_focus(&mut self) {
        self.composer.set_focus(self.focused_reply.is_none());
    }

    /// Send user text; blank text is ignored
    pub fn send_message(&mut self, text: impl Into<String>) {
        self.apply(WidgetEvent::Submit(text.into()));
    }

    /// Resend a suggestion as if the user had typed it
    pub fn activate_quick_reply(&mut self, label: impl Into<String>) {
        self.focused_reply = None;
        self.apply(WidgetEvent::QuickReply(label.into()));
    }

    /// Open the chat (launcher activation), which loads history
    pub fn open(&mut self) {
        self.apply(WidgetEvent::Open);
    }

    /// Apply every completion that is already waiting (called from main loop)
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion or timer event
    pub async fn next_event(&mut self) -> Option<WidgetEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn focused_reply(&self) -> Option<usize> {
        self.focused_reply
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Transcript lines scrolled up from the newest message
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Scroll the transcript; positive moves towards older messages
    pub fn scroll(&mut self, delta: isize) {
        let limit = self.hit_areas.borrow().transcript_frame.scroll_limit;
        self.scroll_offset = self
            .scroll_offset
            .saturating_add_signed(delta)
            .min(limit);
    }

    fn transcript_page(&self) -> isize {
        let height = self.hit_areas.borrow().transcript.map_or(1, |area| area.height);
        ((height.max(2) - 1) as isize).max(1)
    }

    /// Whether something on screen is animating and needs periodic redraws
    pub fn is_animating(&self) -> bool {
        self.state.is_composing() || self.state.transition(Instant::now()).is_some()
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> WidgetAction {
        if key.kind != KeyEventKind::Press {
            return WidgetAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return WidgetAction::Exit;
        }
        self.notice = None;

        match self.state.visibility() {
            Visibility::Closed => match key.code {
                KeyCode::Enter | KeyCode::Char('o') => self.open(),
                KeyCode::Char('x') => self.apply(WidgetEvent::DismissGreeting),
                KeyCode::Char('q') => return WidgetAction::Exit,
                _ => {}
            },
            Visibility::Minimized => match key.code {
                KeyCode::Char('x') if ctrl => self.apply(WidgetEvent::Close),
                KeyCode::Char('n') if ctrl => self.apply(WidgetEvent::Maximize),
                KeyCode::Enter | KeyCode::Esc => self.apply(WidgetEvent::Maximize),
                _ => {}
            },
            Visibility::Open => return self.handle_open_key(key, ctrl),
        }

        WidgetAction::None
    }

    fn handle_open_key(&mut self, key: KeyEvent, ctrl: bool) -> WidgetAction {
        let palette_open = self.composer.is_palette_open();

        match key.code {
            KeyCode::Char('x') if ctrl => self.apply(WidgetEvent::Close),
            KeyCode::Char('n') if ctrl => self.apply(WidgetEvent::Minimize),
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Esc if !palette_open => {
                if self.focused_reply.take().is_none() {
                    self.apply(WidgetEvent::Minimize);
                }
            }
            KeyCode::PageUp => self.scroll(self.transcript_page()),
            KeyCode::PageDown => self.scroll(-self.transcript_page()),
            KeyCode::Up if !palette_open && self.composer.content().is_empty() => self.scroll(1),
            KeyCode::Down if !palette_open && self.composer.content().is_empty() => self.scroll(-1),
            KeyCode::Tab if !palette_open => self.cycle_quick_reply(1),
            KeyCode::BackTab if !palette_open => self.cycle_quick_reply(-1),
            KeyCode::Enter
                if !palette_open
                    && self.focused_reply.is_some()
                    && !key.modifiers.contains(KeyModifiers::SHIFT) =>
            {
                if let Some(label) = self.focused_label() {
                    self.activate_quick_reply(label);
                }
            }
            _ => {
                if matches!(key.code, KeyCode::Char(_)) {
                    self.focused_reply = None;
                }
                match self.composer.handle_key(key) {
                    ComposerResult::Submitted(text) => self.send_message(text),
                    ComposerResult::Command(command) => return self.handle_slash_command(command),
                    ComposerResult::None => {}
                }
            }
        }

        self.sync_focus();
        WidgetAction::None
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> WidgetAction {
        match command {
            SlashCommand::Minimize => self.apply(WidgetEvent::Minimize),
            SlashCommand::Close => self.apply(WidgetEvent::Close),
            SlashCommand::Help => self.notice = Some(get_help_text()),
            SlashCommand::Quit => return WidgetAction::Exit,
        }
        WidgetAction::None
    }

    fn focused_label(&self) -> Option<String> {
        let index = self.focused_reply?;
        self.state
            .conversation()
            .quick_replies()
            .get(index)
            .map(|reply| reply.label.to_string())
    }

    /// Move the quick-reply highlight; the first press lands on the newest group
    fn cycle_quick_reply(&mut self, delta: isize) {
        let replies = self.state.conversation().quick_replies();
        if replies.is_empty() {
            self.focused_reply = None;
            return;
        }

        let len = replies.len() as isize;
        self.focused_reply = Some(match self.focused_reply {
            Some(current) => (current as isize + delta).rem_euclid(len) as usize,
            None if delta < 0 => replies.len() - 1,
            None => {
                let newest = replies[replies.len() - 1].message_index;
                replies
                    .iter()
                    .position(|reply| reply.message_index == newest)
                    .unwrap_or(0)
            }
        });
    }

    /// Handle clicks on the launcher, bubble, header controls and quick
    /// replies, and wheel scrolling over the transcript
    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> WidgetAction {
        let (column, row) = (mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {}
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let over_transcript = hit(self.hit_areas.borrow().transcript, column, row);
                if over_transcript && self.state.visibility() == Visibility::Open {
                    let lines = WHEEL_LINES as isize;
                    self.scroll(if mouse.kind == MouseEventKind::ScrollUp { lines } else { -lines });
                }
                return WidgetAction::None;
            }
            _ => return WidgetAction::None,
        }

        let areas = self.hit_areas.borrow().clone();
        let clicked_reply = areas
            .transcript_frame
            .buttons
            .iter()
            .find(|(area, _)| hit(Some(*area), column, row))
            .map(|(_, index)| *index);

        if let Some(index) = clicked_reply {
            self.focused_reply = Some(index);
            if let Some(label) = self.focused_label() {
                self.activate_quick_reply(label);
            }
        } else if hit(areas.bubble_close, column, row) {
            self.apply(WidgetEvent::DismissGreeting);
        } else if hit(areas.launcher, column, row) || hit(areas.bubble, column, row) {
            self.open();
        } else if hit(areas.close, column, row) {
            self.apply(WidgetEvent::Close);
        } else if hit(areas.minimize, column, row) {
            match self.state.visibility() {
                Visibility::Minimized => self.apply(WidgetEvent::Maximize),
                _ => self.apply(WidgetEvent::Minimize),
            }
        } else if hit(areas.header, column, row) && self.state.visibility() == Visibility::Minimized {
            self.apply(WidgetEvent::Maximize);
        }

        WidgetAction::None
    }

    /// Draw the widget over `area`, anchored to the bottom-right corner
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let now = Instant::now();
        let mut areas = HitAreas::default();

        match self.state.visibility() {
            Visibility::Closed => self.render_closed(area, buf, now, &mut areas),
            Visibility::Open | Visibility::Minimized => self.render_panel(area, buf, now, &mut areas),
        }

        self.hit_areas.replace(areas);
    }

    fn render_closed(&self, area: Rect, buf: &mut Buffer, now: Instant, areas: &mut HitAreas) {
        let launcher = anchor(area, LAUNCHER_WIDTH, LAUNCHER_HEIGHT, 0);
        Clear.render(launcher, buf);
        LauncherView.render(launcher, buf);
        areas.launcher = Some(launcher);

        if !self.state.is_greeting_bubble_visible() {
            return;
        }

        let width = BUBBLE_MAX_WIDTH.min(area.width.saturating_sub(MARGIN * 2));
        let height = BubbleView::height_for(&self.config.bubble_text, width);
        let bubble = anchor(area, width, height, LAUNCHER_HEIGHT);
        if bubble.height == 0 {
            return;
        }

        let progress = match self.state.transition(now) {
            Some(transition) if transition.kind == TransitionKind::BubbleAppearing => {
                transition.progress(now)
            }
            _ => 1.0,
        };

        Clear.render(bubble, buf);
        BubbleView {
            assistant_name: &self.config.assistant_name,
            text: &self.config.bubble_text,
            progress,
        }
        .render(bubble, buf);

        areas.bubble = Some(bubble);
        areas.bubble_close = Some(Rect {
            x: bubble.right().saturating_sub(12),
            y: bubble.bottom().saturating_sub(1),
            width: 11.min(bubble.width),
            height: 1,
        });
    }

    /// Panel height at `now`, following open/minimize animations
    fn panel_height(&self, full: u16, now: Instant) -> u16 {
        let header = HEADER_HEIGHT.min(full);
        let span = f64::from(full - header);

        let height = match self.state.transition(now) {
            Some(transition) => {
                let progress = transition.progress(now);
                match transition.kind {
                    TransitionKind::Opening => f64::from(full) * progress,
                    TransitionKind::Minimizing => f64::from(full) - span * progress,
                    TransitionKind::Maximizing => f64::from(header) + span * progress,
                    TransitionKind::BubbleAppearing => f64::from(full),
                }
            }
            None if self.state.visibility() == Visibility::Minimized => f64::from(header),
            None => f64::from(full),
        };

        (height.round() as u16).clamp(header, full)
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer, now: Instant, areas: &mut HitAreas) {
        let full_width = PANEL_MAX_WIDTH.min(area.width.saturating_sub(MARGIN * 2));
        let full_height = PANEL_MAX_HEIGHT.min(area.height.saturating_sub(MARGIN * 2));
        if full_width < 10 || full_height < HEADER_HEIGHT {
            return;
        }

        let panel = anchor(area, full_width, self.panel_height(full_height, now), 0);
        Clear.render(panel, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(panel);
        block.render(panel, buf);
        if inner.height == 0 {
            return;
        }

        let header = Rect { height: 1, ..inner };
        self.render_header(header, buf, areas);

        let body = Rect {
            y: inner.y + 1,
            height: inner.height - 1,
            ..inner
        };
        if body.height < 2 {
            return;
        }

        let notice_height = u16::from(self.notice.is_some());
        let palette_height = self.composer.palette_height();
        let composer_height = self.composer.desired_height(6);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),                  // Transcript
                Constraint::Length(notice_height),   // Help notice
                Constraint::Length(palette_height),  // Command palette
                Constraint::Length(composer_height), // Composer
            ])
            .split(body);

        let transcript = TranscriptView {
            conversation: self.state.conversation(),
            assistant_name: &self.config.assistant_name,
            composing: self.state.is_composing(),
            focused_reply: self.focused_reply,
            scroll_offset: self.scroll_offset,
        };
        areas.transcript = Some(chunks[0]);
        areas.transcript_frame = transcript.draw(chunks[0], buf);

        if let Some(notice) = &self.notice {
            let line = Line::from(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)));
            buf.set_line(chunks[1].x, chunks[1].y, &line, chunks[1].width);
        }

        self.composer.render_palette(chunks[2], buf);
        (&self.composer).render(chunks[3], buf);
    }

    fn render_header(&self, header: Rect, buf: &mut Buffer, areas: &mut HitAreas) {
        let title = Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Green)),
            Span::styled(
                self.config.assistant_name.as_str(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  AI Assistant", Style::default().fg(Color::LightBlue)),
        ]);
        buf.set_line(header.x, header.y, &title, header.width);

        let toggle = if self.state.visibility() == Visibility::Minimized {
            "[□]"
        } else {
            "[–]"
        };
        let controls = Line::from(vec![
            Span::styled(toggle, Style::default().fg(Color::Gray)),
            Span::raw(" "),
            Span::styled("[×]", Style::default().fg(Color::Gray)),
        ]);
        let controls_x = header.right().saturating_sub(7);
        buf.set_line(controls_x, header.y, &controls, 7);

        areas.header = Some(header);
        areas.minimize = Some(Rect { x: controls_x, width: 3, ..header });
        areas.close = Some(Rect { x: controls_x + 4, width: 3, ..header });
    }
}

/// Rect of at most `width` x `height` in the bottom-right corner of `area`,
/// lifted by `offset` rows.
fn anchor(area: Rect, width: u16, height: u16, offset: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(MARGIN * 2));
    let bottom = area.bottom().saturating_sub(MARGIN + offset);
    let height = height.min(bottom.saturating_sub(area.y));

    Rect {
        x: area.right().saturating_sub(MARGIN + width),
        y: bottom - height,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_hugs_bottom_right_corner() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(anchor(area, 8, 3, 0), Rect::new(91, 36, 8, 3));
        assert_eq!(anchor(area, 20, 5, 3), Rect::new(79, 31, 20, 5));
    }

    #[test]
    fn anchor_shrinks_to_fit() {
        let area = Rect::new(0, 0, 10, 4);
        let rect = anchor(area, 50, 50, 0);
        assert_eq!(rect, Rect::new(1, 0, 8, 3));
    }
}
