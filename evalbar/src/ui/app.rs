use std::io;
use std::time::Duration;

use chess::side_to_move;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use engine::{EngineSettings, EngineSupervisor, EvalSession, SessionOptions};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};

use super::eval_bar::{EvalBar, EvalBarState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Quit,
    Observe,
    Ignore,
}

/// Positions being browsed and what the session was last asked for.
struct WatchState {
    positions: Vec<String>,
    index: usize,
    refresh_token: u64,
    cleared: bool,
    depth: Option<u8>,
    bar: EvalBarState,
}

impl WatchState {
    fn new(positions: Vec<String>) -> Self {
        Self {
            positions,
            index: 0,
            refresh_token: 0,
            cleared: false,
            depth: None,
            bar: EvalBarState::default(),
        }
    }

    fn current(&self) -> Option<&str> {
        if self.cleared {
            return None;
        }
        self.positions.get(self.index).map(String::as_str)
    }

    fn handle_key(&mut self, code: KeyCode) -> KeyAction {
        let len = self.positions.len().max(1);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Left => {
                self.index = (self.index + len - 1) % len;
                self.cleared = false;
                KeyAction::Observe
            }
            KeyCode::Right => {
                self.index = (self.index + 1) % len;
                self.cleared = false;
                KeyAction::Observe
            }
            KeyCode::Char('r') => {
                self.refresh_token += 1;
                KeyAction::Observe
            }
            KeyCode::Char('c') => {
                self.cleared = !self.cleared;
                KeyAction::Observe
            }
            _ => KeyAction::Ignore,
        }
    }
}

pub async fn run_app(settings: &EngineSettings, positions: Vec<String>) -> anyhow::Result<()> {
    let supervisor = EngineSupervisor::from_settings(settings);
    let mut session = EvalSession::mount(&supervisor, SessionOptions::from_settings(settings));
    let mut state = WatchState::new(positions);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui_loop(&mut terminal, &supervisor, &session, &mut state).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.unmount().await;
    supervisor.shutdown().await;
    result
}

async fn run_ui_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    supervisor: &EngineSupervisor,
    session: &EvalSession,
    state: &mut WatchState,
) -> anyhow::Result<()> {
    session.observe(state.current(), state.refresh_token).await?;

    loop {
        let snapshot = session.snapshot();
        state.bar.update(&snapshot);
        if snapshot.evaluation.is_some() {
            state.depth = snapshot.depth;
        }
        let status = supervisor.status();

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(9), Constraint::Min(20)])
                .split(f.area());

            let block = Block::default().borders(Borders::ALL).title("Eval");
            let inner = block.inner(chunks[0]);
            f.render_widget(block, chunks[0]);
            f.render_widget(EvalBar::from_state(&state.bar), inner);

            let fen = state.current().unwrap_or("(cleared)");
            let to_move = state
                .current()
                .and_then(|fen| side_to_move(fen).ok())
                .map_or("-", |side| side.as_str());
            let engine = if state.bar.available {
                status.to_string()
            } else {
                "unavailable".to_string()
            };
            let depth = state.depth.map_or_else(|| "-".to_string(), |d| d.to_string());

            let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Yellow));
            let info_text = vec![
                Line::from(vec![
                    label("Position: "),
                    Span::raw(format!("{}/{}", state.index + 1, state.positions.len())),
                ]),
                Line::from(vec![label("FEN: "), Span::raw(fen)]),
                Line::from(vec![label("To Move: "), Span::raw(to_move)]),
                Line::from(vec![label("Engine: "), Span::raw(engine)]),
                Line::from(vec![label("Depth: "), Span::raw(depth)]),
                Line::from(""),
                Line::from("←/→ position | r restart engine | c clear | q quit"),
            ];

            let info = Paragraph::new(info_text)
                .block(Block::default().borders(Borders::ALL).title("evalbar"));
            f.render_widget(info, chunks[1]);
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(key.code) {
                    KeyAction::Quit => break,
                    KeyAction::Observe => {
                        tracing::debug!(
                            index = state.index,
                            refresh_token = state.refresh_token,
                            cleared = state.cleared,
                            "Observing position"
                        );
                        session.observe(state.current(), state.refresh_token).await?;
                    }
                    KeyAction::Ignore => {}
                }
            }
        }
    }

    Ok(())
}
