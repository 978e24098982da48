use std::io;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::app::{EncodedRequest, HttpMethod};

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum HttpError {
    #[error("request failed: {0}")]
    Status(String),
    #[error("request timed out after {attempts} attempt(s)")]
    TimedOut { attempts: usize },
    #[error("request failed: {0}")]
    Transport(String),
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        {
            return true;
        }
        current = cause.source();
    }
    err.to_string().contains("timed out")
}

pub(crate) fn request_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim().trim_end_matches('/'), path)
}

/// Sends the request, retrying transport failures and 408/429/5xx statuses.
pub(crate) fn send_with_retries(
    base_url: &str,
    request: &EncodedRequest,
    policy: &RetryPolicy,
) -> Result<String, HttpError> {
    let attempts = policy.attempts.max(1);
    let url = request_url(base_url, request.path);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(policy.connect_timeout)
            .timeout_read(policy.read_timeout)
            .timeout_write(policy.read_timeout)
            .build();

        let mut call = agent
            .request(request.method.as_str(), &url)
            .set("Accept", "application/json");
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        debug!(
            "{} {url} (attempt {attempt}/{attempts})",
            request.method.as_str()
        );

        let outcome = match (request.method, request.json_body.as_deref()) {
            (HttpMethod::Post, Some(body)) => call
                .set("Content-Type", "application/json")
                .send_string(body),
            _ => call.call(),
        };

        match outcome {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) if is_timeout(&err) => {
                    if attempt < attempts {
                        thread::sleep(policy.retry_delay);
                        continue;
                    }
                    return Err(HttpError::TimedOut { attempts });
                }
                Err(err) => {
                    return Err(HttpError::Transport(format!(
                        "response decode failed: {err}"
                    )));
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let status_error = if body.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if should_retry_http_status(status) && attempt < attempts {
                    warn!("{url}: {status_error}, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                if should_retry_http_status(status) {
                    return Err(HttpError::Status(format!(
                        "{status_error} after {attempts} attempt(s)"
                    )));
                }

                return Err(HttpError::Status(status_error));
            }
            Err(ureq::Error::Transport(err)) => {
                let timed_out = is_timeout(&err);
                if attempt < attempts {
                    warn!("{url}: transport error: {err}, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                if timed_out {
                    return Err(HttpError::TimedOut { attempts });
                }
                return Err(HttpError::Transport(format!(
                    "transport error after {attempts} attempt(s): {err}"
                )));
            }
        }
    }

    Err(HttpError::Transport(
        "exhausted attempts without a concrete error".to_string(),
    ))
}


#[cfg(test)]
mod tests {
    use super::test_server::{Behavior, TestServer};
    use super::*;

    fn policy(read_timeout_ms: u64, attempts: usize) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(read_timeout_ms),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn get_request() -> EncodedRequest {
        EncodedRequest {
            method: HttpMethod::Get,
            path: "/search",
            query: vec![("q".to_string(), "climate change".to_string())],
            json_body: None,
        }
    }

    #[test]
    fn request_url_joins_without_double_slash() {
        assert_eq!(
            request_url("http://host:5000/", "/search"),
            "http://host:5000/search"
        );
        assert_eq!(request_url("http://host", "/search"), "http://host/search");
    }

    #[test]
    fn retries_retryable_statuses_until_success() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(500, "server-error".to_string()),
            Behavior::Respond(429, "throttled".to_string()),
            Behavior::Respond(200, "[]".to_string()),
        ]);

        let result = send_with_retries(&server.base_url, &get_request(), &policy(200, 3));

        assert_eq!(result.expect("should eventually succeed"), "[]");
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn get_requests_carry_query_parameters() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "[]".to_string())]);

        send_with_retries(&server.base_url, &get_request(), &policy(200, 1)).expect("ok");

        let lines = server.request_lines();
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with("GET /search?q=climate"),
            "unexpected request line: {}",
            lines[0]
        );
    }

    #[test]
    fn post_requests_use_the_search_path() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "[]".to_string())]);
        let request = EncodedRequest {
            method: HttpMethod::Post,
            path: "/search",
            query: Vec::new(),
            json_body: Some(r#"{"q":"climate"}"#.to_string()),
        };

        send_with_retries(&server.base_url, &request, &policy(200, 1)).expect("ok");

        let lines = server.request_lines();
        assert!(
            lines[0].starts_with("POST /search "),
            "unexpected request line: {}",
            lines[0]
        );
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "not-found".to_string())]);

        let result = send_with_retries(&server.base_url, &get_request(), &policy(200, 5));

        let err = result.expect_err("404 should not be retried");
        assert!(
            err.to_string().contains("HTTP status 404"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn retries_transport_timeout_and_recovers() {
        let server = TestServer::spawn(vec![
            Behavior::DelayRespond(Duration::from_millis(120), 200, "[1]".to_string()),
            Behavior::Respond(200, "[]".to_string()),
        ]);

        let result = send_with_retries(&server.base_url, &get_request(), &policy(20, 2));

        assert_eq!(result.expect("timeout should be retried"), "[]");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn reports_timeout_when_every_attempt_times_out() {
        let server = TestServer::spawn(vec![Behavior::DelayRespond(
            Duration::from_millis(150),
            200,
            "[]".to_string(),
        )]);

        let result = send_with_retries(&server.base_url, &get_request(), &policy(20, 1));

        assert_eq!(result, Err(HttpError::TimedOut { attempts: 1 }));
    }

    #[test]
    fn returns_retry_exhausted_error_for_retryable_status() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(503, "still-down".to_string()),
        ]);

        let result = send_with_retries(&server.base_url, &get_request(), &policy(200, 2));

        let err = result.expect_err("retryable failures should eventually error");
        let message = err.to_string();
        assert!(
            message.contains("after 2 attempt(s)") && message.contains("HTTP status 503"),
            "unexpected error message: {message}"
        );
        assert_eq!(server.request_count(), 2);
    }
}
