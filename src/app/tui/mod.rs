mod actions;
mod render;
mod session;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::config::AppConfig;

use super::backend::{Dispatcher, HttpSearchBackend};
use super::controller::SearchSession;
use super::player::ExternalPlayer;

pub(crate) use self::actions::{KeyOutcome, apply_completion, handle_key};
use self::actions::status_info;
use self::render::draw_tui;
use self::session::TerminalSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Browse,
    EditQuery,
}

/// Everything the interactive screen owns: the search session plus the cursor and
/// status line, which are presentation-only.
pub(crate) struct TuiState {
    pub(crate) session: SearchSession,
    pub(crate) table_state: TableState,
    pub(crate) input_mode: InputMode,
    pub(crate) status: String,
}

impl TuiState {
    pub(crate) fn new(session: SearchSession) -> Self {
        Self {
            session,
            table_state: TableState::default(),
            input_mode: InputMode::EditQuery,
            status: status_info("Type a query and press Enter. Esc switches to browsing."),
        }
    }

    pub(crate) fn cursor(&self) -> Option<usize> {
        self.table_state
            .selected()
            .filter(|idx| *idx < self.session.results().len())
    }
}

pub(crate) fn run_tui(config: &AppConfig) -> Result<()> {
    let player = ExternalPlayer::from_config(&config.player);
    let session = SearchSession::new(Box::new(player), config.backend.request_timeout());
    let dispatcher = Dispatcher::new(Arc::new(HttpSearchBackend::new(config.backend.clone())));
    let mut state = TuiState::new(session);
    info!(
        "interactive session against {} ({:?})",
        config.backend.base_url, config.backend.version
    );

    let mut terminal_session = TerminalSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    loop {
        for completion in dispatcher.drain() {
            apply_completion(&mut state, completion);
        }
        if state.session.expire_overdue(Instant::now()) {
            state.status = actions::status_error("Search timed out. Press F5 to retry.");
        }

        terminal.draw(|frame| draw_tui(frame, &mut state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match handle_key(&mut state, key, Instant::now()) {
            KeyOutcome::Continue => {}
            KeyOutcome::Dispatch(token, request) => dispatcher.dispatch(token, request),
            KeyOutcome::Quit => break,
        }
    }

    state.session.stop_playback();
    terminal_session.restore()?;
    Ok(())
}
