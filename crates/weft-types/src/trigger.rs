//! Trigger contexts describing why a workflow execution started.
//!
//! `TriggerContext` is a closed set of variants. Each variant projects to a
//! flat JSON map via `to_map()` for input resolution: every field is present,
//! optional fields that are unset appear as explicit `null`, and nested maps
//! are carried verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// The entity lifecycle event behind an entity trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOperation {
    Created,
    Updated,
    Deleted,
}

impl EntityOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityOperation::Created => "created",
            EntityOperation::Updated => "updated",
            EntityOperation::Deleted => "deleted",
        }
    }
}

/// An entity was created, updated, or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEventTrigger {
    pub operation: EntityOperation,
    pub entity_id: Uuid,
    pub entity_type_id: Uuid,
    /// Snapshot of the entity payload after the event.
    pub entity: Map<String, Value>,
    /// Snapshot before the event (updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_entity: Option<Map<String, Value>>,
}

impl EntityEventTrigger {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("triggerType".into(), json!("entity_event"));
        map.insert("operation".into(), json!(self.operation.as_str()));
        map.insert("entityId".into(), json!(self.entity_id.to_string()));
        map.insert("entityTypeId".into(), json!(self.entity_type_id.to_string()));
        map.insert("entity".into(), Value::Object(self.entity.clone()));
        map.insert(
            "previousEntity".into(),
            self.previous_entity
                .clone()
                .map(Value::Object)
                .unwrap_or(Value::Null),
        );
        map
    }
}

/// An inbound webhook request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTrigger {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Map<String, Value>,
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
}

impl WebhookTrigger {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("triggerType".into(), json!("webhook"));
        map.insert("headers".into(), json!(self.headers));
        map.insert("body".into(), Value::Object(self.body.clone()));
        map.insert("queryParams".into(), json!(self.query_params));
        map
    }
}

/// A scheduled firing. Cron and interval may both be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
}

impl ScheduleTrigger {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("triggerType".into(), json!("schedule"));
        map.insert("scheduledAt".into(), json!(self.scheduled_at.to_rfc3339()));
        map.insert("cronExpression".into(), json!(self.cron_expression));
        map.insert("intervalSeconds".into(), json!(self.interval_seconds));
        map
    }
}

/// A direct invocation with an argument map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionTrigger {
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl FunctionTrigger {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("triggerType".into(), json!("function"));
        map.insert("arguments".into(), Value::Object(self.arguments.clone()));
        map
    }
}

/// Why an execution started. Set exactly once per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerContext {
    EntityEvent(EntityEventTrigger),
    Webhook(WebhookTrigger),
    Schedule(ScheduleTrigger),
    Function(FunctionTrigger),
}

impl TriggerContext {
    /// Short name of the variant, matching the `triggerType` map key.
    pub fn trigger_type(&self) -> &'static str {
        match self {
            TriggerContext::EntityEvent(_) => "entity_event",
            TriggerContext::Webhook(_) => "webhook",
            TriggerContext::Schedule(_) => "schedule",
            TriggerContext::Function(_) => "function",
        }
    }

    /// Flat key/value projection for templating.
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            TriggerContext::EntityEvent(t) => t.to_map(),
            TriggerContext::Webhook(t) => t.to_map(),
            TriggerContext::Schedule(t) => t.to_map(),
            TriggerContext::Function(t) => t.to_map(),
        }
    }
}

impl From<EntityEventTrigger> for TriggerContext {
    fn from(t: EntityEventTrigger) -> Self {
        TriggerContext::EntityEvent(t)
    }
}

impl From<WebhookTrigger> for TriggerContext {
    fn from(t: WebhookTrigger) -> Self {
        TriggerContext::Webhook(t)
    }
}

impl From<ScheduleTrigger> for TriggerContext {
    fn from(t: ScheduleTrigger) -> Self {
        TriggerContext::Schedule(t)
    }
}

impl From<FunctionTrigger> for TriggerContext {
    fn from(t: FunctionTrigger) -> Self {
        TriggerContext::Function(t)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_entity_event_create_maps_previous_to_null() {
        let entity_id = Uuid::now_v7();
        let type_id = Uuid::now_v7();
        let trigger = TriggerContext::from(EntityEventTrigger {
            operation: EntityOperation::Created,
            entity_id,
            entity_type_id: type_id,
            entity: obj(json!({ "name": "Ada", "tags": { "vip": true } })),
            previous_entity: None,
        });

        let map = trigger.to_map();
        assert_eq!(map["triggerType"], json!("entity_event"));
        assert_eq!(map["operation"], json!("created"));
        assert_eq!(map["entityId"], json!(entity_id.to_string()));
        assert_eq!(map["entityTypeId"], json!(type_id.to_string()));
        assert_eq!(map["entity"]["tags"]["vip"], json!(true));
        assert!(map.contains_key("previousEntity"));
        assert_eq!(map["previousEntity"], Value::Null);
    }

    #[test]
    fn test_entity_event_update_keeps_previous() {
        let trigger = EntityEventTrigger {
            operation: EntityOperation::Updated,
            entity_id: Uuid::now_v7(),
            entity_type_id: Uuid::now_v7(),
            entity: obj(json!({ "status": "closed" })),
            previous_entity: Some(obj(json!({ "status": "open" }))),
        };
        assert_eq!(trigger.to_map()["previousEntity"]["status"], json!("open"));
    }

    #[test]
    fn test_webhook_to_map() {
        let trigger = WebhookTrigger {
            headers: BTreeMap::from([("x-source".to_string(), "github".to_string())]),
            body: obj(json!({ "ref": "main", "commits": [{ "id": 1 }] })),
            query_params: BTreeMap::from([("dry_run".to_string(), "1".to_string())]),
        };
        let map = TriggerContext::Webhook(trigger).to_map();
        assert_eq!(map["headers"]["x-source"], json!("github"));
        assert_eq!(map["body"]["commits"][0]["id"], json!(1));
        assert_eq!(map["queryParams"]["dry_run"], json!("1"));
    }

    #[test]
    fn test_schedule_absent_optionals_are_null() {
        let trigger = TriggerContext::Schedule(ScheduleTrigger {
            scheduled_at: Utc::now(),
            cron_expression: None,
            interval_seconds: Some(60),
        });
        let map = trigger.to_map();
        assert!(map.contains_key("cronExpression"));
        assert_eq!(map["cronExpression"], Value::Null);
        assert_eq!(map["intervalSeconds"], json!(60));
        assert!(map["scheduledAt"].is_string());
    }

    #[test]
    fn test_function_arguments_nested_verbatim() {
        let args = obj(json!({ "order": { "lines": [1, 2, 3], "meta": null } }));
        let map = TriggerContext::Function(FunctionTrigger { arguments: args.clone() }).to_map();
        assert_eq!(map["arguments"], Value::Object(args));
    }

    #[test]
    fn test_trigger_serde_tagged() {
        let trigger = TriggerContext::Function(FunctionTrigger::default());
        let v = serde_json::to_value(&trigger).unwrap();
        assert_eq!(v["type"], json!("function"));
        let back: TriggerContext = serde_json::from_value(v).unwrap();
        assert_eq!(back, trigger);
        assert_eq!(back.trigger_type(), "function");
    }

    #[test]
    fn test_trigger_fields_deserialize_camel_case() {
        let trigger: TriggerContext = serde_json::from_value(json!({
            "type": "schedule",
            "scheduledAt": "2025-03-01T08:30:00Z",
            "cronExpression": "0 9 * * *",
        }))
        .unwrap();
        let map = trigger.to_map();
        assert_eq!(map["cronExpression"], json!("0 9 * * *"));
        assert_eq!(map["intervalSeconds"], Value::Null);
    }
}
