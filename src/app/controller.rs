use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use super::criteria::SearchCriteria;
use super::error::{FocusRejected, PlaybackUnavailable, SearchError};
use super::player::PlaybackDevice;
use super::request::SearchRequest;
use super::response::normalize_body;
use super::result::{EpisodeId, SearchResult};
use super::selection::{PlaybackCue, PlaybackOrigin, PlayerState, Selection};

/// Sequence number of a dispatched search. Only the latest one may change the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RequestToken(u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoadingState {
    Idle,
    Loading,
    Ready,
    Failed(SearchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: RequestToken,
    dispatched_at: Instant,
}

/// Everything one user's search session holds in memory.
///
/// State machine: `Idle -> Loading -> {Ready, Failed} -> Loading -> ...`.
/// Starting a search drops the focus (and stops playback) at once; results are only
/// ever replaced wholesale by the reply to the most recently dispatched request.
/// Checked episodes live in the criteria and survive every transition.
pub(crate) struct SearchSession {
    criteria: SearchCriteria,
    results: Vec<SearchResult>,
    loading_state: LoadingState,
    selection: Selection,
    next_token: u64,
    in_flight: Option<InFlight>,
    request_timeout: Duration,
    completed_at: Option<DateTime<Local>>,
}

impl SearchSession {
    pub(crate) fn new(player: Box<dyn PlaybackDevice>, request_timeout: Duration) -> Self {
        Self {
            criteria: SearchCriteria::default(),
            results: Vec::new(),
            loading_state: LoadingState::Idle,
            selection: Selection::new(player),
            next_token: 0,
            in_flight: None,
            request_timeout,
            completed_at: None,
        }
    }

    pub(crate) fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    /// Criteria stay editable while a search is loading; edits apply to the next one.
    pub(crate) fn criteria_mut(&mut self) -> &mut SearchCriteria {
        &mut self.criteria
    }

    pub(crate) fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub(crate) fn loading_state(&self) -> &LoadingState {
        &self.loading_state
    }

    pub(crate) fn is_loading(&self) -> bool {
        matches!(self.loading_state, LoadingState::Loading)
    }

    pub(crate) fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    pub(crate) fn focused_index(&self) -> Option<usize> {
        self.selection.focused()
    }

    pub(crate) fn focused_result(&self) -> Option<&SearchResult> {
        self.selection
            .focused()
            .and_then(|index| self.results.get(index))
    }

    pub(crate) fn is_checked(&self, id: &EpisodeId) -> bool {
        self.criteria.is_episode_selected(id)
    }

    pub(crate) fn checked_count(&self) -> usize {
        self.criteria.selected_episode_count()
    }

    pub(crate) fn player_state(&self) -> &PlayerState {
        self.selection.player_state()
    }

    pub(crate) fn player_source(&self) -> Option<&str> {
        self.selection.player_source()
    }

    /// Moves to `Loading` and hands out the request to send along with its token.
    pub(crate) fn begin_search(&mut self, now: Instant) -> (RequestToken, SearchRequest) {
        self.next_token += 1;
        let token = RequestToken(self.next_token);
        if let Some(previous) = self.in_flight {
            debug!("search {} superseded by {token}", previous.token);
        }
        self.in_flight = Some(InFlight {
            token,
            dispatched_at: now,
        });
        self.selection.clear_focus();
        self.loading_state = LoadingState::Loading;
        (token, SearchRequest::from_criteria(&self.criteria))
    }

    /// Applies a backend reply if it belongs to the latest request; drops it otherwise.
    pub(crate) fn complete(
        &mut self,
        token: RequestToken,
        outcome: Result<String, SearchError>,
    ) -> Completion {
        match self.in_flight {
            Some(in_flight) if in_flight.token == token => {}
            _ => {
                debug!("discarding stale response for search {token}");
                return Completion::Stale;
            }
        }
        self.in_flight = None;
        self.selection.clear_focus();

        match outcome.and_then(|body| normalize_body(&body).map_err(SearchError::from)) {
            Ok(results) => {
                info!("search {token} ready with {} result(s)", results.len());
                self.results = results;
                self.loading_state = LoadingState::Ready;
                self.completed_at = Some(Local::now());
            }
            Err(err) => {
                warn!("search {token} failed: {err}");
                self.fail(err);
            }
        }
        Completion::Applied
    }

    /// Fails the in-flight search once it has run past the request timeout.
    /// Its reply, if it ever arrives, is then stale.
    pub(crate) fn expire_overdue(&mut self, now: Instant) -> bool {
        let Some(in_flight) = self.in_flight else {
            return false;
        };
        if now.saturating_duration_since(in_flight.dispatched_at) < self.request_timeout {
            return false;
        }
        warn!(
            "search {} exceeded {:?}, marking as timed out",
            in_flight.token, self.request_timeout
        );
        self.in_flight = None;
        self.fail(SearchError::Timeout);
        true
    }

    fn fail(&mut self, err: SearchError) {
        self.selection.clear_focus();
        self.results.clear();
        self.loading_state = LoadingState::Failed(err);
    }

    /// Returns whether the focus moved. Focus is frozen while a search is loading.
    pub(crate) fn focus(&mut self, index: usize) -> Result<bool, FocusRejected> {
        if self.is_loading() {
            return Err(FocusRejected::Loading);
        }
        if index >= self.results.len() {
            return Err(FocusRejected::OutOfRange(index));
        }
        Ok(self.selection.set_focus(index))
    }

    pub(crate) fn clear_focus(&mut self) {
        self.selection.clear_focus();
    }

    /// Checks or unchecks the result at `index`. Returns the new check state.
    pub(crate) fn toggle_episode_at(&mut self, index: usize) -> Option<bool> {
        let result = self.results.get(index)?;
        Some(self.criteria.toggle_episode_result(result))
    }

    pub(crate) fn request_playback(
        &mut self,
        origin: PlaybackOrigin,
    ) -> Result<PlaybackCue, PlaybackUnavailable> {
        let index = self.selection.focused().ok_or(PlaybackUnavailable::NoFocus)?;
        let result = self
            .results
            .get(index)
            .ok_or(PlaybackUnavailable::NoFocus)?;
        self.selection.start_playback(result, origin)
    }

    pub(crate) fn toggle_pause(&mut self) -> Result<Option<bool>, PlaybackUnavailable> {
        self.selection.toggle_pause()
    }

    pub(crate) fn stop_playback(&mut self) {
        self.selection.stop_playback();
    }
}
