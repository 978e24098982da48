use thiserror::Error;

use super::response::MalformedResponse;

/// Why a search ended in the failed state. None of these are fatal; the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SearchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("search timed out")]
    Timeout,
    #[error("failed to encode request: {0}")]
    Encoding(String),
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] MalformedResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum PlaybackUnavailable {
    #[error("no result is focused")]
    NoFocus,
    #[error("focused episode has no audio")]
    NoAudio,
    #[error("player error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum FocusRejected {
    #[error("a search is in progress")]
    Loading,
    #[error("no result at position {0}")]
    OutOfRange(usize),
}
