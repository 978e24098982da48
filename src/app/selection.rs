use log::{debug, warn};

use super::error::PlaybackUnavailable;
use super::player::{PlaybackDevice, PlayerError};
use super::result::SearchResult;

/// Where in the episode playback should begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackOrigin {
    Transcript,
    Beginning,
}

/// Command for the audio device: what to play and where to start.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackCue {
    pub(crate) source_url: String,
    pub(crate) start_time_seconds: f64,
}

impl PlaybackCue {
    /// Unreadable transcript timings start from zero instead of failing.
    pub(crate) fn for_result(
        result: &SearchResult,
        origin: PlaybackOrigin,
    ) -> Result<Self, PlaybackUnavailable> {
        let source_url = result
            .metadata
            .audio_url
            .clone()
            .ok_or(PlaybackUnavailable::NoAudio)?;
        let start_time_seconds = match origin {
            PlaybackOrigin::Beginning => 0.0,
            PlaybackOrigin::Transcript => result
                .transcript
                .start_time
                .as_ref()
                .and_then(|start| start.seconds())
                .unwrap_or(0.0),
        };
        Ok(Self {
            source_url,
            start_time_seconds,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlayerState {
    Stopped,
    Playing(PlaybackCue),
    Paused(PlaybackCue),
}

/// Which result is open for detail, and what the player is doing for it.
///
/// The focus is an index into the owning session's result list; the session keeps
/// it in range. Any change of focus stops the player first, so a cue can never be
/// applied to an episode the user has moved away from.
pub(crate) struct Selection {
    focused: Option<usize>,
    player: Box<dyn PlaybackDevice>,
    player_state: PlayerState,
}

impl Selection {
    pub(crate) fn new(player: Box<dyn PlaybackDevice>) -> Self {
        Self {
            focused: None,
            player,
            player_state: PlayerState::Stopped,
        }
    }

    pub(crate) fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub(crate) fn player_state(&self) -> &PlayerState {
        &self.player_state
    }

    pub(crate) fn player_source(&self) -> Option<&str> {
        self.player.current_source()
    }

    /// Returns whether the focus moved.
    pub(crate) fn set_focus(&mut self, index: usize) -> bool {
        if self.focused == Some(index) {
            return false;
        }
        self.stop_playback();
        self.focused = Some(index);
        true
    }

    pub(crate) fn clear_focus(&mut self) {
        self.stop_playback();
        self.focused = None;
    }

    pub(crate) fn start_playback(
        &mut self,
        result: &SearchResult,
        origin: PlaybackOrigin,
    ) -> Result<PlaybackCue, PlaybackUnavailable> {
        let cue = PlaybackCue::for_result(result, origin)?;
        self.stop_playback();
        self.command(&cue).map_err(|err| {
            warn!("player rejected cue for {}: {err}", cue.source_url);
            self.player.stop();
            PlaybackUnavailable::Device(err.to_string())
        })?;
        debug!(
            "playing {} from {:.2}s",
            cue.source_url, cue.start_time_seconds
        );
        self.player_state = PlayerState::Playing(cue.clone());
        Ok(cue)
    }

    fn command(&mut self, cue: &PlaybackCue) -> Result<(), PlayerError> {
        self.player.load(&cue.source_url)?;
        self.player.seek(cue.start_time_seconds)?;
        self.player.play()
    }

    /// Pauses a playing cue or resumes a paused one. Returns `Ok(None)` when idle.
    pub(crate) fn toggle_pause(&mut self) -> Result<Option<bool>, PlaybackUnavailable> {
        let state = std::mem::replace(&mut self.player_state, PlayerState::Stopped);
        let (next, paused) = match state {
            PlayerState::Stopped => return Ok(None),
            PlayerState::Playing(cue) => match self.player.pause() {
                Ok(()) => (PlayerState::Paused(cue), true),
                Err(err) => {
                    self.player_state = PlayerState::Playing(cue);
                    return Err(PlaybackUnavailable::Device(err.to_string()));
                }
            },
            PlayerState::Paused(cue) => match self.player.play() {
                Ok(()) => (PlayerState::Playing(cue), false),
                Err(err) => {
                    self.player_state = PlayerState::Paused(cue);
                    return Err(PlaybackUnavailable::Device(err.to_string()));
                }
            },
        };
        self.player_state = next;
        Ok(Some(paused))
    }

    pub(crate) fn stop_playback(&mut self) {
        if matches!(self.player_state, PlayerState::Stopped) {
            return;
        }
        self.player.stop();
        self.player_state = PlayerState::Stopped;
    }
}
