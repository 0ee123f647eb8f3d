use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    style::{Color, Style},
    text::{Line, Span},
};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::session::SessionIdProvider;
use crate::storage::{FileStore, KeyValueStore};
use crate::transport::WebhookClient;
use crate::ui::chat::{ChatWidget, WidgetAction};

/// Frame interval while animations or the typing indicator run
const TICK: Duration = Duration::from_millis(50);

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Session provider backed by the file that stands in for browser storage
pub fn session_provider(config: &Config) -> SessionIdProvider {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage_path()));
    SessionIdProvider::new(Some(store), config.storage_key.clone())
}

pub fn build_widget(config: &Config) -> Result<ChatWidget> {
    let client = WebhookClient::new(config)?;
    Ok(ChatWidget::new(config.widget.clone(), client, session_provider(config)))
}

/// Run the widget until the user quits
pub async fn run(config: Config) -> Result<()> {
    let mut widget = build_widget(&config)?;
    let endpoint = config.require_webhook_url()?.to_string();

    let mut terminal = setup_terminal()?;
    install_panic_hook();

    let host = reqwest::Url::parse(&endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_default();
    tracing::info!(%host, "starting chat widget");
    let result = event_loop(&mut terminal, &mut widget, &endpoint).await;

    restore_terminal(&mut terminal)?;
    tracing::info!("chat widget stopped");
    result
}

async fn event_loop(terminal: &mut Tui, widget: &mut ChatWidget, endpoint: &str) -> Result<()> {
    widget.mount();

    let mut input = EventStream::new();
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut redraw = true;
    loop {
        if redraw {
            terminal
                .draw(|frame| draw(frame, widget, endpoint))
                .context("Failed to draw frame")?;
        }
        redraw = true;

        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if widget.handle_key(key) == WidgetAction::Exit {
                        break;
                    }
                }
                Some(Ok(Event::Mouse(mouse))) => {
                    widget.handle_mouse(mouse);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err).context("Failed to read terminal input"),
                None => break,
            },
            Some(event) = widget.next_event() => {
                widget.apply(event);
                widget.process_events();
            }
            _ = tick.tick() => redraw = widget.is_animating(),
        }
    }

    Ok(())
}

fn draw(frame: &mut Frame, widget: &ChatWidget, endpoint: &str) {
    let area = frame.size();
    let buf = frame.buffer_mut();

    // The "host page" the widget floats over
    let title = Line::from(vec![
        Span::styled(" webchat ", Style::default().fg(Color::Black).bg(Color::LightBlue)),
        Span::styled(format!("  {}", endpoint), Style::default().fg(Color::DarkGray)),
    ]);
    buf.set_line(area.x, area.y, &title, area.width);

    if area.height > 1 {
        let hint = Line::from(Span::styled(
            " Enter open · Esc minimize · Ctrl+X close · /help · Ctrl+C quit",
            Style::default().fg(Color::DarkGray),
        ));
        buf.set_line(area.x, area.bottom() - 1, &hint, area.width.saturating_sub(12));
    }

    widget.render(area, buf);
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Leave the alternate screen before printing a panic message
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        previous(info);
    }));
}
