//! Entity CRUD strategies.
//!
//! One `EntityStrategy` instance is registered per operation; all four
//! share the entity service and query limits.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use weft_types::config::EntityConfig;
use weft_types::workflow::NodeKind;

use super::{
    NodeError, NodeStrategy, optional_bool, optional_object, optional_u64, required_object,
    required_uuid,
};
use crate::workflow::ports::{BoxFuture, EntityServiceDyn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrudOperation {
    Create,
    Update,
    Delete,
    Query,
}

pub struct EntityStrategy {
    operation: CrudOperation,
    service: Arc<dyn EntityServiceDyn>,
    limits: EntityConfig,
}

impl EntityStrategy {
    pub fn create(service: Arc<dyn EntityServiceDyn>, limits: EntityConfig) -> Self {
        Self::with_operation(CrudOperation::Create, service, limits)
    }

    pub fn update(service: Arc<dyn EntityServiceDyn>, limits: EntityConfig) -> Self {
        Self::with_operation(CrudOperation::Update, service, limits)
    }

    pub fn delete(service: Arc<dyn EntityServiceDyn>, limits: EntityConfig) -> Self {
        Self::with_operation(CrudOperation::Delete, service, limits)
    }

    pub fn query(service: Arc<dyn EntityServiceDyn>, limits: EntityConfig) -> Self {
        Self::with_operation(CrudOperation::Query, service, limits)
    }

    /// One strategy per CRUD operation.
    pub fn all(service: Arc<dyn EntityServiceDyn>, limits: EntityConfig) -> [Self; 4] {
        [
            Self::create(service.clone(), limits.clone()),
            Self::update(service.clone(), limits.clone()),
            Self::delete(service.clone(), limits.clone()),
            Self::query(service, limits),
        ]
    }

    fn with_operation(
        operation: CrudOperation,
        service: Arc<dyn EntityServiceDyn>,
        limits: EntityConfig,
    ) -> Self {
        Self {
            operation,
            service,
            limits,
        }
    }

    /// Requested limit, defaulted and clamped to the configured maximum.
    fn query_limit(&self, config: &Map<String, Value>) -> Result<usize, NodeError> {
        let limit = match optional_u64(config, "limit")? {
            None => self.limits.default_query_limit,
            Some(0) => return Err(NodeError::Config("'limit' must be at least 1".into())),
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Ok(limit.min(self.limits.max_query_limit))
    }

    async fn run(&self, config: &Map<String, Value>) -> Result<Value, NodeError> {
        match self.operation {
            CrudOperation::Create => {
                let entity_type_id = required_uuid(config, "entityTypeId")?;
                let payload = required_object(config, "payload")?;
                let entity = self.service.create_boxed(entity_type_id, payload).await?;
                tracing::debug!(entity_id = %entity.id, %entity_type_id, "entity created");
                Ok(entity.to_output())
            }
            CrudOperation::Update => {
                let entity_id = required_uuid(config, "entityId")?;
                let payload = required_object(config, "payload")?;
                let merge = optional_bool(config, "merge", true)?;
                let entity = self.service.update_boxed(entity_id, payload, merge).await?;
                tracing::debug!(%entity_id, merge, "entity updated");
                Ok(entity.to_output())
            }
            CrudOperation::Delete => {
                let entity_id = required_uuid(config, "entityId")?;
                let impacted = self.service.delete_boxed(entity_id).await?;
                if impacted == 0 {
                    return Err(NodeError::NotFound(format!("entity {entity_id}")));
                }
                tracing::debug!(%entity_id, impacted, "entity deleted");
                Ok(json!({
                    "deleted": true,
                    "entityId": entity_id.to_string(),
                    "impactedRecords": impacted,
                }))
            }
            CrudOperation::Query => {
                let entity_type_id = required_uuid(config, "entityTypeId")?;
                let filter = optional_object(config, "filter")?;
                let limit = self.query_limit(config)?;
                let entities = self
                    .service
                    .query_boxed(entity_type_id, filter, limit)
                    .await?;
                let count = entities.len();
                Ok(json!({
                    "entities": entities.iter().map(|e| e.to_output()).collect::<Vec<_>>(),
                    "count": count,
                }))
            }
        }
    }
}

impl NodeStrategy for EntityStrategy {
    fn kind(&self) -> NodeKind {
        match self.operation {
            CrudOperation::Create => NodeKind::CreateEntity,
            CrudOperation::Update => NodeKind::UpdateEntity,
            CrudOperation::Delete => NodeKind::DeleteEntity,
            CrudOperation::Query => NodeKind::QueryEntity,
        }
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
