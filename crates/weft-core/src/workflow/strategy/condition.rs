//! Condition strategy: evaluates a JEXL expression to a branch decision.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use weft_types::workflow::NodeKind;

use super::{NodeError, NodeStrategy, optional_object, optional_uuid, required_str};
use crate::workflow::expression::WorkflowEvaluator;
use crate::workflow::ports::{BoxFuture, EntityServiceDyn};

pub struct ConditionStrategy {
    entities: Arc<dyn EntityServiceDyn>,
}

impl ConditionStrategy {
    pub fn new(entities: Arc<dyn EntityServiceDyn>) -> Self {
        Self { entities }
    }

    /// Evaluation context: entity payload fields, then `entity`, then the
    /// explicit `context` object, each layer overriding the previous.
    async fn build_context(&self, config: &Map<String, Value>) -> Result<Value, NodeError> {
        let explicit = optional_object(config, "context")?;
        let mut context = Map::new();

        if let Some(entity_id) = optional_uuid(config, "contextEntityId")? {
            let entity = self
                .entities
                .get_boxed(entity_id)
                .await?
                .ok_or_else(|| NodeError::NotFound(format!("entity {entity_id}")))?;
            context.extend(entity.payload.clone());
            context.insert("entity".to_string(), entity.to_output());
        }

        context.extend(explicit);
        Ok(Value::Object(context))
    }

    async fn run(&self, config: &Map<String, Value>) -> Result<Value, NodeError> {
        let expression = required_str(config, "expression")?;
        let context = self.build_context(config).await?;
        let result = evaluate(expression, &context)?;
        tracing::debug!(expression, result, "condition evaluated");
        Ok(json!({ "conditionResult": result }))
    }
}

fn evaluate(expression: &str, context: &Value) -> Result<bool, NodeError> {
    let evaluator = WorkflowEvaluator::new();
    Ok(evaluator.evaluate_strict_bool(expression, context)?)
}

impl NodeStrategy for ConditionStrategy {
    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    fn execute<'a>(
        &'a self,
        config: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, NodeError>> {
        Box::pin(self.run(config))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::strategy::fakes::MemoryEntities;
    use uuid::Uuid;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn strategy() -> (ConditionStrategy, Arc<MemoryEntities>) {
        let entities = Arc::new(MemoryEntities::default());
        (ConditionStrategy::new(entities.clone()), entities)
    }

    #[tokio::test]
    async fn test_true_and_false_results() {
        let (s, _) = strategy();
        let out = s
            .execute(&config(json!({ "expression": "age > 18", "context": { "age": 20 } })))
            .await
            .unwrap();
        assert_eq!(out, json!({ "conditionResult": true }));

        let out = s
            .execute(&config(json!({ "expression": "age > 18", "context": { "age": 3 } })))
            .await
            .unwrap();
        assert_eq!(out, json!({ "conditionResult": false }));
    }

    #[tokio::test]
    async fn test_non_boolean_result_fails() {
        let (s, _) = strategy();
        let err = s
            .execute(&config(json!({ "expression": "age", "context": { "age": 20 } })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::NotBoolean(_)));
        assert!(err.to_string().contains("boolean"));
    }

    #[tokio::test]
    async fn test_parse_error_is_expression_error() {
        let (s, _) = strategy();
        let err = s
            .execute(&config(json!({ "expression": "age >" })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Expression(_)));
    }

    #[tokio::test]
    async fn test_missing_expression_is_config_error() {
        let (s, _) = strategy();
        let err = s
            .execute(&config(json!({ "context": {} })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[tokio::test]
    async fn test_entity_payload_joins_context() {
        let (s, entities) = strategy();
        let entity = entities.insert(Uuid::now_v7(), json!({ "status": "open", "priority": 1 }));

        let out = s
            .execute(&config(json!({
                "expression": "status == 'open' && priority == 5 && entity.payload.priority == 1",
                "contextEntityId": entity.id.to_string(),
                "context": { "priority": 5 },
            })))
            .await
            .unwrap();
        assert_eq!(out, json!({ "conditionResult": true }));
    }

    #[tokio::test]
    async fn test_missing_context_entity_is_not_found() {
        let (s, _) = strategy();
        let err = s
            .execute(&config(json!({
                "expression": "true",
                "contextEntityId": Uuid::now_v7().to_string(),
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::NotFound(_)));
    }
}
