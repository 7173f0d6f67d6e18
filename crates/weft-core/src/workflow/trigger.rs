//! Trigger construction helpers.
//!
//! The trigger variants themselves live in `weft_types::trigger`. This module
//! validates inbound data while building them: cron expressions are parsed
//! with `croner`, webhook bodies are decoded as JSON objects.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use weft_types::trigger::{ScheduleTrigger, TriggerContext, WebhookTrigger};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while building a trigger context.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("schedule interval must be greater than zero")]
    ZeroInterval,

    #[error("invalid webhook body: {0}")]
    InvalidBody(String),
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Normalize a cron expression to the 6-field form (with seconds).
///
/// Standard 5-field expressions get a leading `0` seconds field; 6-field
/// expressions pass through. Anything else is rejected.
pub fn normalize_cron(expression: &str) -> Result<String, TriggerError> {
    let trimmed = expression.trim();
    match trimmed.split_whitespace().count() {
        5 => Ok(format!("0 {trimmed}")),
        6 => Ok(trimmed.to_string()),
        n => Err(TriggerError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("expected 5 or 6 fields, got {n}"),
        }),
    }
}

fn parse_cron(expression: &str) -> Result<croner::Cron, TriggerError> {
    let normalized = normalize_cron(expression)?;
    normalized
        .parse::<croner::Cron>()
        .map_err(|e| TriggerError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Build a validated schedule trigger.
pub fn schedule_trigger(
    scheduled_at: DateTime<Utc>,
    cron_expression: Option<String>,
    interval_seconds: Option<u64>,
) -> Result<TriggerContext, TriggerError> {
    if let Some(expr) = &cron_expression {
        parse_cron(expr)?;
    }
    if interval_seconds == Some(0) {
        return Err(TriggerError::ZeroInterval);
    }

    Ok(TriggerContext::Schedule(ScheduleTrigger {
        scheduled_at,
        cron_expression,
        interval_seconds,
    }))
}

/// When the schedule fires next after `scheduled_at`.
///
/// The cron expression takes precedence; the interval is the fallback.
pub fn next_scheduled_run(trigger: &ScheduleTrigger) -> Option<DateTime<Utc>> {
    if let Some(expr) = &trigger.cron_expression {
        match parse_cron(expr) {
            Ok(cron) => {
                if let Some(next) = cron.iter_after(trigger.scheduled_at).next() {
                    return Some(next);
                }
            }
            Err(e) => {
                tracing::warn!(expression = expr.as_str(), error = %e, "ignoring unparseable cron");
            }
        }
    }

    let secs = trigger.interval_seconds.filter(|s| *s > 0)?;
    let secs = i64::try_from(secs).ok()?;
    trigger
        .scheduled_at
        .checked_add_signed(Duration::seconds(secs))
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// Build a webhook trigger from a raw request.
///
/// Header names are lower-cased. An empty body becomes an empty map; a JSON
/// object is used as-is; any other JSON value is wrapped as `{"value": ..}`.
pub fn webhook_trigger(
    headers: impl IntoIterator<Item = (String, String)>,
    raw_body: &[u8],
    query_params: impl IntoIterator<Item = (String, String)>,
) -> Result<TriggerContext, TriggerError> {
    let headers: BTreeMap<String, String> = headers
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();

    let body = if raw_body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(raw_body)
            .map_err(|e| TriggerError::InvalidBody(e.to_string()))?
        {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        }
    };

    Ok(TriggerContext::Webhook(WebhookTrigger {
        headers,
        body,
        query_params: query_params.into_iter().collect(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
