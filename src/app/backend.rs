use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use log::{debug, info};

use crate::config::BackendConfig;
use crate::http::{HttpError, RetryPolicy, send_with_retries};

use super::controller::RequestToken;
use super::error::SearchError;
use super::request::SearchRequest;

/// One backend round trip: request in, raw response body out.
pub(crate) trait SearchBackend: Send + Sync {
    fn fetch(&self, request: &SearchRequest) -> Result<String, SearchError>;
}

pub(crate) struct HttpSearchBackend {
    config: BackendConfig,
}

impl HttpSearchBackend {
    pub(crate) fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: self.config.connect_timeout(),
            read_timeout: self.config.read_timeout(),
            attempts: self.config.attempts,
            retry_delay: self.config.retry_delay(),
        }
    }
}

impl SearchBackend for HttpSearchBackend {
    fn fetch(&self, request: &SearchRequest) -> Result<String, SearchError> {
        let encoded = self
            .config
            .version
            .encoding()
            .encode(request)
            .map_err(|err| SearchError::Encoding(err.to_string()))?;
        send_with_retries(&self.config.base_url, &encoded, &self.retry_policy()).map_err(
            |err| match err {
                HttpError::TimedOut { .. } => SearchError::Timeout,
                other => SearchError::Network(other.to_string()),
            },
        )
    }
}

#[derive(Debug)]
pub(crate) struct SearchCompletion {
    pub(crate) token: RequestToken,
    pub(crate) outcome: Result<String, SearchError>,
}

/// Runs backend round trips off the UI thread and hands the replies back in arrival order.
///
/// Nothing here decides whether a reply is still wanted; the session does that by token.
pub(crate) struct Dispatcher {
    backend: Arc<dyn SearchBackend>,
    tx: mpsc::Sender<SearchCompletion>,
    rx: mpsc::Receiver<SearchCompletion>,
}

impl Dispatcher {
    pub(crate) fn new(backend: Arc<dyn SearchBackend>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { backend, tx, rx }
    }

    pub(crate) fn dispatch(&self, token: RequestToken, request: SearchRequest) {
        info!(
            "dispatching search {token}: q={:?} type={} filter={}",
            request.q, request.match_type, request.filter
        );
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let outcome = backend.fetch(&request);
            debug!("search {token} returned (ok: {})", outcome.is_ok());
            let _ = tx.send(SearchCompletion { token, outcome });
        });
    }

    pub(crate) fn drain(&self) -> Vec<SearchCompletion> {
        self.rx.try_iter().collect()
    }

    pub(crate) fn wait(&self, timeout: Duration) -> Option<SearchCompletion> {
        self.rx.recv_timeout(timeout).ok()
    }
}
