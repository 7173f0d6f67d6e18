//! reqwest-backed [`HttpTransport`].
//!
//! Hostnames are resolved through [`GuardedResolver`], which drops blocked
//! addresses so a public name pointing at a private range never connects.
//! Every redirect hop is re-validated against the same guard.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;

use weft_core::workflow::guard::{GuardError, is_blocked_ip, redact_url, validate_target};
use weft_core::workflow::ports::{
    HttpBody, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use weft_types::config::HttpConfig;

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// DNS resolver that refuses hosts resolving only to blocked addresses.
#[derive(Debug, Default, Clone)]
pub struct GuardedResolver;

/// Keep the allowed addresses of `host`; error when none remain.
pub fn filter_resolved(host: &str, addrs: Vec<SocketAddr>) -> Result<Vec<SocketAddr>, GuardError> {
    let first_blocked = addrs.iter().map(SocketAddr::ip).find(|ip| is_blocked_ip(*ip));
    let allowed: Vec<SocketAddr> = addrs
        .into_iter()
        .filter(|addr| !is_blocked_ip(addr.ip()))
        .collect();

    if let Some(ip) = first_blocked {
        tracing::warn!(host, %ip, remaining = allowed.len(), "dropped blocked address from DNS answer");
        if allowed.is_empty() {
            return Err(GuardError::BlockedAddress(ip));
        }
    }
    Ok(allowed)
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            let allowed = filter_resolved(&host, addrs)?;
            let addrs: Addrs = Box::new(allowed.into_iter());
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

// ---------------------------------------------------------------------------
// Redirects
// ---------------------------------------------------------------------------

/// Why a redirect hop was not followed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedirectError {
    #[error("too many redirects (max {0})")]
    TooMany(usize),

    #[error("redirect target refused: {0}")]
    Blocked(#[from] GuardError),
}

/// Validate one redirect hop. `hops` counts redirects already followed,
/// so with `max_redirects = 1` the first hop passes and the second fails.
pub fn check_redirect(
    target: &url::Url,
    hops: usize,
    max_redirects: usize,
    allow_private: bool,
) -> Result<(), RedirectError> {
    if hops >= max_redirects {
        return Err(RedirectError::TooMany(max_redirects));
    }
    validate_target(target.as_str(), allow_private)?;
    Ok(())
}

fn redirect_policy(max_redirects: usize, allow_private: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        // `previous` includes the original request URL.
        let hops = attempt.previous().len().saturating_sub(1);
        match check_redirect(attempt.url(), hops, max_redirects, allow_private) {
            Ok(()) => attempt.follow(),
            Err(reason) => {
                tracing::warn!(url = %redact_url(attempt.url()), %reason, "refused redirect");
                attempt.error(reason)
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            // A proxy would resolve names itself and skip the guarded resolver.
            .no_proxy()
            .redirect(redirect_policy(
                config.max_redirects,
                config.allow_private_targets,
            ));

        if !config.allow_private_targets {
            builder = builder.dns_resolver(Arc::new(GuardedResolver));
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

/// Map a reqwest failure, surfacing guard refusals from the resolver or
/// the redirect policy as `Blocked`.
fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(guard) = cause.downcast_ref::<GuardError>() {
            return TransportError::Blocked(guard.to_string());
        }
        match cause.downcast_ref::<RedirectError>() {
            Some(RedirectError::Blocked(guard)) => return TransportError::Blocked(guard.to_string()),
            Some(RedirectError::TooMany(_)) => {
                return TransportError::Request(format!("{err}: {cause}"));
            }
            None => {}
        }
        source = cause.source();
    }

    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    TransportError::Request(err.to_string())
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid method {}", request.method)))?;

        let mut builder = self
            .client
            .request(method, request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            None => builder,
            Some(HttpBody::Raw(text)) => builder.body(text),
            Some(HttpBody::Json(value)) => builder.json(&value),
        };

        let response = builder.send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let mut headers: HashMap<String, String> = HashMap::new();
        for (name, value) in response.headers() {
            let value = value.to_str().unwrap_or("<binary>");
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        let body = response.text().await.map_err(map_error)?;

        tracing::info!(
            url = %redact_url(&request.url),
            status,
            body_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
