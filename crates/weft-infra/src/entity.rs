//! In-memory [`EntityService`] with per-type required-field validation.
//!
//! Used by the CLI and tests. Entity types must be registered before
//! records of that type can be created.

use std::collections::BTreeSet;

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use weft_core::workflow::ports::EntityService;
use weft_types::entity::{Entity, EntityError};

/// Schema of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTypeSchema {
    /// Payload keys that must be present and non-null.
    pub required_fields: BTreeSet<String>,
}

/// Seed file entry: one entity type and its initial records.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySeed {
    pub entity_type_id: Uuid,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub entities: Vec<SeedRecord>,
}

/// A seeded record. Without an `id` a fresh one is assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

#[derive(Default)]
pub struct InMemoryEntityService {
    types: DashMap<Uuid, EntityTypeSchema>,
    records: DashMap<Uuid, Entity>,
}

impl InMemoryEntityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, entity_type_id: Uuid, schema: EntityTypeSchema) {
        self.types.insert(entity_type_id, schema);
    }

    /// Register the seeded types and insert their records.
    pub fn seed(&self, seeds: Vec<EntitySeed>) -> Result<usize, EntityError> {
        let mut inserted = 0;
        for seed in seeds {
            self.register_type(
                seed.entity_type_id,
                EntityTypeSchema {
                    required_fields: seed.required_fields.into_iter().collect(),
                },
            );
            for record in seed.entities {
                let entity =
                    self.build_entity(record.id.unwrap_or_else(Uuid::now_v7), seed.entity_type_id, record.payload)?;
                self.records.insert(entity.id, entity);
                inserted += 1;
            }
        }
        tracing::debug!(inserted, "seeded in-memory entity service");
        Ok(inserted)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn validate(&self, entity_type_id: Uuid, payload: &Map<String, Value>) -> Result<(), EntityError> {
        let schema = self.types.get(&entity_type_id).ok_or_else(|| {
            EntityError::Validation(format!("unknown entity type {entity_type_id}"))
        })?;

        let missing: Vec<&str> = schema
            .required_fields
            .iter()
            .filter(|field| payload.get(field.as_str()).is_none_or(Value::is_null))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EntityError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    fn build_entity(
        &self,
        id: Uuid,
        entity_type_id: Uuid,
        payload: Map<String, Value>,
    ) -> Result<Entity, EntityError> {
        self.validate(entity_type_id, &payload)?;
        let now = Utc::now();
        Ok(Entity {
            id,
            entity_type_id,
            payload,
            created_at: now,
            updated_at: now,
        })
    }
}

impl EntityService for InMemoryEntityService {
    async fn create(
        &self,
        entity_type_id: Uuid,
        payload: Map<String, Value>,
    ) -> Result<Entity, EntityError> {
        let entity = self.build_entity(Uuid::now_v7(), entity_type_id, payload)?;
        self.records.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update(
        &self,
        entity_id: Uuid,
        payload: Map<String, Value>,
        merge: bool,
    ) -> Result<Entity, EntityError> {
        let mut entry = self
            .records
            .get_mut(&entity_id)
            .ok_or_else(|| EntityError::NotFound(entity_id.to_string()))?;

        let next = if merge {
            let mut merged = entry.payload.clone();
            merged.extend(payload);
            merged
        } else {
            payload
        };
        self.validate(entry.entity_type_id, &next)?;

        entry.payload = next;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, entity_id: Uuid) -> Result<u64, EntityError> {
        match self.records.remove(&entity_id) {
            Some(_) => Ok(1),
            None => Err(EntityError::NotFound(entity_id.to_string())),
        }
    }

    async fn get(&self, entity_id: Uuid) -> Result<Option<Entity>, EntityError> {
        Ok(self.records.get(&entity_id).map(|e| e.clone()))
    }

    async fn query(
        &self,
        entity_type_id: Uuid,
        filter: Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<Entity>, EntityError> {
        let mut found: Vec<Entity> = self
            .records
            .iter()
            .filter(|e| e.entity_type_id == entity_type_id)
            .filter(|e| filter.iter().all(|(k, v)| e.payload.get(k) == Some(v)))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        found.truncate(limit);
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
