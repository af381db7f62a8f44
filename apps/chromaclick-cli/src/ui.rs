use std::{
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    cursor::Show,
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Terminal,
};
use tokio::sync::mpsc::UnboundedSender;

/// Requests from the panel to the detection worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Detect,
    Reset,
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct PanelSnapshot {
    pub clicks: u64,
    pub last: String,
    /// Rendered activity entries, newest first.
    pub log: Vec<String>,
}

pub enum UiMessage {
    Snapshot(PanelSnapshot),
    Failure(String),
}

/// Puts the terminal back into cooked mode on every exit path, including early `?` returns.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(std::io::stdout(), EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen, Show);
    }
}

pub fn run(
    receiver: Receiver<UiMessage>,
    commands: UnboundedSender<UiCommand>,
    summary: String,
) -> Result<()> {
    // Drops last, so the worker is told to quit after the terminal is restored.
    let _quit = QuitOnDrop(&commands);
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    run_loop(&mut terminal, receiver, &commands, summary.as_str())
}

/// Stops the detection worker when the panel goes away.
struct QuitOnDrop<'a>(&'a UnboundedSender<UiCommand>);

impl Drop for QuitOnDrop<'_> {
    fn drop(&mut self) {
        let _ = self.0.send(UiCommand::Quit);
    }
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    receiver: Receiver<UiMessage>,
    commands: &UnboundedSender<UiCommand>,
    summary: &str,
) -> Result<()> {
    let mut state = PanelSnapshot {
        last: "waiting".into(),
        ..Default::default()
    };
    let mut error: Option<String> = None;
    let mut busy = false;

    loop {
        loop {
            match receiver.try_recv() {
                Ok(UiMessage::Snapshot(snapshot)) => {
                    state = snapshot;
                    error = None;
                    busy = false;
                }
                Ok(UiMessage::Failure(message)) => {
                    error = Some(message);
                    busy = false;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Length(3),
                        Constraint::Min(0),
                    ]
                    .as_ref(),
                )
                .split(f.size());

            let header = Paragraph::new(Line::from(vec![
                Span::styled(
                    "ChromaClick",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled("target:", Style::default().fg(Color::Magenta)),
                Span::raw(" "),
                Span::raw(summary),
                Span::raw("  "),
                Span::styled("d", Style::default().fg(Color::Yellow)),
                Span::raw(" detect  "),
                Span::styled("r", Style::default().fg(Color::Yellow)),
                Span::raw(" reset  "),
                Span::styled("q", Style::default().fg(Color::Yellow)),
                Span::raw(" quit"),
            ]))
            .block(Block::default().borders(Borders::ALL).title("Settings"));
            f.render_widget(header, chunks[0]);

            let status = match (&error, busy) {
                (Some(message), _) => {
                    Span::styled(message.clone(), Style::default().fg(Color::Red))
                }
                (None, true) => Span::raw("detecting..."),
                (None, false) => Span::raw(state.last.clone()),
            };
            let counters = Paragraph::new(Line::from(vec![
                Span::styled(
                    format!("clicks: {}", state.clicks),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                status,
            ]))
            .block(Block::default().borders(Borders::ALL).title("Status"));
            f.render_widget(counters, chunks[1]);

            let items: Vec<ListItem> = state
                .log
                .iter()
                .map(|entry| ListItem::new(entry.clone()))
                .collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL).title("Activity"));
            f.render_widget(list, chunks[2]);
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let command = match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('d') if !busy => Some(UiCommand::Detect),
                    KeyCode::Char('r') if !busy => Some(UiCommand::Reset),
                    _ => None,
                };
                if let Some(command) = command {
                    if commands.send(command).is_err() {
                        return Ok(());
                    }
                    busy = command == UiCommand::Detect;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_exit_tells_worker_to_quit() {
        let (commands, mut requests) = tokio::sync::mpsc::unbounded_channel();
        {
            let _quit = QuitOnDrop(&commands);
            commands.send(UiCommand::Detect).expect("send");
        }
        assert_eq!(requests.try_recv().ok(), Some(UiCommand::Detect));
        assert_eq!(requests.try_recv().ok(), Some(UiCommand::Quit));
        assert!(requests.try_recv().is_err());
    }
}
