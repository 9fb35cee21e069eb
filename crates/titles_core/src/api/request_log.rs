//! Request/response access logging.
//!
//! # Responsibility
//! - Emit one event per request and one per response for title routes.
//! - Resolve the client address from proxy headers.
//!
//! # Invariants
//! - Sensitive paths (credentials, health probes) are never logged.
//! - Caller-controlled values are sanitized before they reach a log line.

use crate::logging::sanitize_message;
use log::{error, info};

const MAX_LOGGED_VALUE_CHARS: usize = 200;
const SENSITIVE_PATH_MARKERS: [&str; 5] = ["/login", "/password", "/token", "/health", "/metrics"];

/// Metadata for one handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub client_ip: String,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            client_ip: client_ip.into(),
        }
    }

    /// Whether this request must stay out of the access log.
    pub fn is_sensitive(&self) -> bool {
        is_sensitive_path(&self.path)
    }
}

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
}

/// Picks the client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer address.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: &str,
) -> String {
    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real = real_ip.map(str::trim).filter(|value| !value.is_empty());

    forwarded.or(real).unwrap_or(remote_addr).to_string()
}

/// Logs the start of a request.
pub fn log_request(request: &RequestContext) {
    if request.is_sensitive() {
        return;
    }

    info!(
        "event=http_request module=api status=start method={} path={} client_ip={}",
        request.method,
        sanitize_message(&request.path, MAX_LOGGED_VALUE_CHARS),
        sanitize_message(&request.client_ip, MAX_LOGGED_VALUE_CHARS)
    );
}

/// Logs the completion of a request with its status code.
///
/// `failure` carries a short internal description when the request ended
/// in an unexpected error.
pub fn log_response(request: &RequestContext, status_code: u16, failure: Option<&str>) {
    if request.is_sensitive() {
        return;
    }

    let path = sanitize_message(&request.path, MAX_LOGGED_VALUE_CHARS);
    let client_ip = sanitize_message(&request.client_ip, MAX_LOGGED_VALUE_CHARS);
    match failure {
        Some(detail) => error!(
            "event=http_response module=api status=error method={} path={} client_ip={} status_code={} error={}",
            request.method,
            path,
            client_ip,
            status_code,
            sanitize_message(detail, MAX_LOGGED_VALUE_CHARS)
        ),
        None => info!(
            "event=http_response module=api status=ok method={} path={} client_ip={} status_code={}",
            request.method, path, client_ip, status_code
        ),
    }
}
