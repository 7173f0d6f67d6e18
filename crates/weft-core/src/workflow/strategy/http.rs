//! Outbound HTTP request strategy.
//!
//! The target URL passes the SSRF guard before the transport sees it.
//! Credential headers and URL userinfo are redacted in every log line; the
//! returned output keeps response headers except `set-cookie`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};

use weft_types::config::{HttpConfig, MAX_HTTP_TIMEOUT_SECS};
use weft_types::workflow::NodeKind;

use super::{NodeError, NodeStrategy, optional_u64, required_str};
use crate::workflow::guard::{REDACTED, redact_headers, redact_url, validate_target};
use crate::workflow::ports::{
    BoxFuture, HttpBody, HttpRequest, HttpResponse, HttpTransportDyn, TransportError,
};

/// Longest response body quoted in a status error.
const ERROR_BODY_LIMIT: usize = 512;

pub struct HttpStrategy {
    transport: Arc<dyn HttpTransportDyn>,
    config: HttpConfig,
}

impl HttpStrategy {
    pub fn new(transport: Arc<dyn HttpTransportDyn>, config: HttpConfig) -> Self {
        Self { transport, config }
    }

    /// Build a validated request from node configuration.
    fn build_request(&self, config: &Map<String, Value>) -> Result<HttpRequest, NodeError> {
        let url = validate_target(required_str(config, "url")?, self.config.allow_private_targets)?;
        let method = parse_method(config)?;
        let headers = parse_headers(config)?;

        let body = match config.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(HttpBody::Raw(s.clone())),
            Some(other) => Some(HttpBody::Json(other.clone())),
        };

        let timeout_secs = match optional_u64(config, "timeoutSecs")? {
            Some(0) => return Err(NodeError::Config("'timeoutSecs' must be at least 1".into())),
            Some(secs) => secs,
            None => self.config.timeout_secs,
        }
        .min(MAX_HTTP_TIMEOUT_SECS);

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    async fn run(&self, config: &Map<String, Value>) -> Result<Value, NodeError> {
        let request = self.build_request(config)?;
        let timeout = request.timeout;
        let timeout_secs = timeout.as_secs();

        tracing::debug!(
            method = %request.method,
            url = %redact_url(&request.url),
            headers = ?redact_headers(&request.headers),
            timeout_secs,
            "dispatching HTTP request"
        );

        let response = match tokio::time::timeout(timeout, self.transport.send_boxed(request)).await
        {
            Err(_elapsed) => return Err(NodeError::Timeout(timeout_secs)),
            Ok(Err(TransportError::Timeout)) => return Err(NodeError::Timeout(timeout_secs)),
            Ok(Err(TransportError::Blocked(reason))) => return Err(NodeError::Ssrf(reason)),
            Ok(Err(TransportError::InvalidRequest(reason))) => {
                return Err(NodeError::Config(reason));
            }
            Ok(Err(TransportError::Request(reason))) => return Err(NodeError::Http(reason)),
            Ok(Ok(response)) => response,
        };

        tracing::debug!(
            status = response.status,
            headers = ?redact_headers(&response.headers),
            body_len = response.body.len(),
            "received HTTP response"
        );

        if !(200..300).contains(&response.status) {
            return Err(NodeError::HttpStatus {
                status: response.status,
                body: truncate(&response.body, ERROR_BODY_LIMIT),
            });
        }

        Ok(response_output(response))
    }
}

impl NodeStrategy for HttpStrategy {
    fn kind(&self) -> NodeKind {
        NodeKind::HttpRequest
    }

    fn execute<'a>(
        &'a self,
        config: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, NodeError>> {
        Box::pin(self.run(config))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 9110 token characters besides alphanumerics.
const TCHAR_SYMBOLS: &str = "!#$%&'*+-.^_`|~";

fn parse_method(config: &Map<String, Value>) -> Result<String, NodeError> {
    let method = match config.get("method") {
        None | Some(Value::Null) => return Ok("GET".to_string()),
        Some(Value::String(m)) => m.trim().to_ascii_uppercase(),
        Some(_) => return Err(NodeError::Config("'method' must be a string".into())),
    };
    let is_token = !method.is_empty()
        && method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || TCHAR_SYMBOLS.contains(c));
    if !is_token {
        return Err(NodeError::Config(format!("invalid HTTP method '{method}'")));
    }
    Ok(method)
}

fn parse_headers(config: &Map<String, Value>) -> Result<HashMap<String, String>, NodeError> {
    match config.get("headers") {
        None | Some(Value::Null) => Ok(HashMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name.clone(), s.clone())),
                _ => Err(NodeError::Config(format!("header '{name}' must be a string"))),
            })
            .collect(),
        Some(_) => Err(NodeError::Config("'headers' must be an object".into())),
    }
}

fn response_output(response: HttpResponse) -> Value {
    let headers: Map<String, Value> = response
        .headers
        .into_iter()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case("set-cookie") {
                REDACTED.to_string()
            } else {
                value
            };
            (name, Value::String(value))
        })
        .collect();

    let body = serde_json::from_str::<Value>(&response.body)
        .unwrap_or(Value::String(response.body));

    json!({
        "statusCode": response.status,
        "headers": headers,
        "body": body,
    })
}

fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
