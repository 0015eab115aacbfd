//! Full-screen TUI mode showing the live progress gauge.
//!
//! The event loop uses `tokio::select!` to handle:
//! - Progress updates from the polling loop
//! - User keyboard input (q/ESC/Ctrl-C to quit)
//!
//! When the poller reaches the terminal state its channel closes; the
//! final frame stays on screen until the user quits.

use crate::client::StatusEndpoint;
use crate::poller;
use crate::state::{PollPhase, Update};
use crate::ui::styles::GaugeStyles;
use crossterm::{
    event::{Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::{Block, Gauge, Paragraph};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// UI state for the modern TUI mode
struct WatchUIState {
    last_update: Option<Update>,
    /// Set once the poller's channel closes (terminal state reached).
    poller_finished: bool,
    should_exit: bool,
}

impl WatchUIState {
    fn new() -> Self {
        Self {
            last_update: None,
            poller_finished: false,
            should_exit: false,
        }
    }
}

/// Run the gauge display until the user quits. Returns the results body
/// captured from the terminal update, if any.
pub async fn run_modern<S>(
    endpoint: S,
    poll_interval: Duration,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>
where
    S: StatusEndpoint + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::channel(32);
    let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(poller::listen(endpoint, tx, poll_interval, shutdown_rx));

    enable_raw_mode().map_err(to_boxed_err)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(to_boxed_err)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(to_boxed_err)?;
    let styles = GaugeStyles::default();
    let mut state = WatchUIState::new();

    // Single background thread to poll for crossterm events and forward
    // them to the async runtime via `event_rx`.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            match crossterm::event::poll(Duration::from_millis(100)) {
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => {
                        // If the async receiver is closed, stop the thread.
                        if event_tx.try_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => {}
                },
                Ok(false) => {
                    // timeout, continue
                }
                Err(_) => {
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    });

    draw(&mut terminal, &state, &styles)?;
    while !state.should_exit {
        tokio::select! {
            biased;

            // Progress updates from the polling loop. The version gate
            // skips redraws for updates that repeat the previous state.
            update = recv_or_pending(&mut rx, state.poller_finished) => {
                match update {
                    Some(upd) => {
                        let redraw = should_redraw(state.last_update.as_ref(), &upd);
                        state.last_update = Some(upd);
                        if redraw {
                            draw(&mut terminal, &state, &styles)?;
                        }
                    }
                    None => {
                        state.poller_finished = true;
                        draw(&mut terminal, &state, &styles)?;
                    }
                }
            }

            // User keyboard input (also covers terminal resize)
            maybe_event = event_rx.recv() => {
                if let Some(event) = maybe_event {
                    process_event(event, &mut state);
                    draw(&mut terminal, &state, &styles)?;
                } else {
                    // Event channel closed -> exit gracefully
                    state.should_exit = true;
                }
            }
        }
    }

    disable_raw_mode().map_err(to_boxed_err)?;
    execute!(io::stdout(), LeaveAlternateScreen).map_err(to_boxed_err)?;
    Ok(state.last_update.and_then(|u| u.results))
}

/// A snapshot is worth redrawing when its version differs from the one
/// on screen; identical readings repeat with the same version.
fn should_redraw(prev: Option<&Update>, next: &Update) -> bool {
    prev.map(|p| p.version) != Some(next.version)
}

/// Receive the next update, or park forever once the channel has closed
/// so the select loop stops seeing a constantly-ready arm.
async fn recv_or_pending(
    rx: &mut mpsc::Receiver<Update>,
    finished: bool,
) -> Option<Update> {
    if finished {
        futures_util::future::pending::<()>().await;
        unreachable!()
    }
    rx.recv().await
}

fn draw<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &WatchUIState,
    styles: &GaugeStyles,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let upd = state.last_update.clone().unwrap_or_default();
    terminal
        .draw(|f| {
            let rows = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Fill(1),
            ])
            .split(f.area());

            let gauge_style = if upd.phase == PollPhase::Done {
                styles.done
            } else {
                styles.bar
            };
            let gauge = Gauge::default()
                .block(Block::bordered().title("progresswatch"))
                .gauge_style(gauge_style)
                .ratio(upd.ratio())
                .label(upd.label.clone());
            f.render_widget(gauge, centered(rows[1], 60));

            let status = match (upd.phase, &upd.err) {
                (PollPhase::Done, None) => {
                    Line::styled("complete, press q to close", styles.done)
                }
                (PollPhase::Done, Some(e)) => Line::styled(
                    format!("complete, results unavailable: {e}"),
                    styles.error,
                ),
                (PollPhase::Polling, Some(e)) => {
                    Line::styled(format!("{e} (retrying)"), styles.error)
                }
                (PollPhase::Polling, None) => Line::raw("polling"),
            };
            f.render_widget(Paragraph::new(status).centered(), rows[2]);
        })
        .map_err(to_boxed_err)?;
    Ok(())
}

/// Clamp an area to `max_width` columns, horizontally centered.
fn centered(area: Rect, max_width: u16) -> Rect {
    let width = area.width.min(max_width);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y,
        width,
        height: area.height,
    }
}

/// Handle user input events (keyboard)
fn process_event(event: Event, state: &mut WatchUIState) {
    if let Event::Key(key) = event {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.should_exit = true;
            }
            KeyCode::Char('c')
                if key
                    .modifiers
                    .contains(crossterm::event::KeyModifiers::CONTROL) =>
            {
                state.should_exit = true;
            }
            _ => {}
        }
    }
}

fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}
