//! External collaborators of node strategies.
//!
//! Two ports are defined:
//! 1. [`EntityService`] -- persistence for entity CRUD nodes
//! 2. [`HttpTransport`] -- outbound request dispatch for HTTP nodes
//!
//! Each uses native async fn in traits for implementors and has an
//! object-safe `*Dyn` twin with boxed futures. A blanket impl bridges the two
//! so strategies can hold `Arc<dyn EntityServiceDyn>` without implementors
//! writing any boxing code.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use weft_types::entity::{Entity, EntityError};

/// Boxed future returned by the object-safe port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Entity service
// ---------------------------------------------------------------------------

/// Persistence interface for entity records.
pub trait EntityService: Send + Sync {
    /// Create a record of the given entity type.
    fn create(
        &self,
        entity_type_id: Uuid,
        payload: Map<String, Value>,
    ) -> impl Future<Output = Result<Entity, EntityError>> + Send;

    /// Update a record. With `merge` the payload is shallow-merged into the
    /// stored one, otherwise it replaces it.
    fn update(
        &self,
        entity_id: Uuid,
        payload: Map<String, Value>,
        merge: bool,
    ) -> impl Future<Output = Result<Entity, EntityError>> + Send;

    /// Delete a record and return the number of records removed.
    fn delete(&self, entity_id: Uuid) -> impl Future<Output = Result<u64, EntityError>> + Send;

    fn get(
        &self,
        entity_id: Uuid,
    ) -> impl Future<Output = Result<Option<Entity>, EntityError>> + Send;

    /// Records of one type whose payload contains every `filter` pair.
    fn query(
        &self,
        entity_type_id: Uuid,
        filter: Map<String, Value>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Entity>, EntityError>> + Send;
}

/// Object-safe version of [`EntityService`].
pub trait EntityServiceDyn: Send + Sync {
    fn create_boxed(
        &self,
        entity_type_id: Uuid,
        payload: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Entity, EntityError>>;

    fn update_boxed(
        &self,
        entity_id: Uuid,
        payload: Map<String, Value>,
        merge: bool,
    ) -> BoxFuture<'_, Result<Entity, EntityError>>;

    fn delete_boxed(&self, entity_id: Uuid) -> BoxFuture<'_, Result<u64, EntityError>>;

    fn get_boxed(&self, entity_id: Uuid) -> BoxFuture<'_, Result<Option<Entity>, EntityError>>;

    fn query_boxed(
        &self,
        entity_type_id: Uuid,
        filter: Map<String, Value>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Entity>, EntityError>>;
}

impl<T: EntityService> EntityServiceDyn for T {
    fn create_boxed(
        &self,
        entity_type_id: Uuid,
        payload: Map<String, Value>,
    ) -> BoxFuture<'_, Result<Entity, EntityError>> {
        Box::pin(self.create(entity_type_id, payload))
    }

    fn update_boxed(
        &self,
        entity_id: Uuid,
        payload: Map<String, Value>,
        merge: bool,
    ) -> BoxFuture<'_, Result<Entity, EntityError>> {
        Box::pin(self.update(entity_id, payload, merge))
    }

    fn delete_boxed(&self, entity_id: Uuid) -> BoxFuture<'_, Result<u64, EntityError>> {
        Box::pin(self.delete(entity_id))
    }

    fn get_boxed(&self, entity_id: Uuid) -> BoxFuture<'_, Result<Option<Entity>, EntityError>> {
        Box::pin(self.get(entity_id))
    }

    fn query_boxed(
        &self,
        entity_type_id: Uuid,
        filter: Map<String, Value>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Entity>, EntityError>> {
        Box::pin(self.query(entity_type_id, filter, limit))
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Request body as configured on the node.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    /// Sent verbatim.
    Raw(String),
    /// Serialized with `Content-Type: application/json`.
    Json(Value),
}

/// A validated outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Upper-case method name.
    pub method: String,
    pub url: url::Url,
    pub headers: HashMap<String, String>,
    pub body: Option<HttpBody>,
    pub timeout: Duration,
}

/// A response with the body fully read.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Lower-case header names. Repeated headers are comma-joined.
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Failures below the HTTP status level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("blocked target: {0}")]
    Blocked(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Dispatches HTTP requests.
pub trait HttpTransport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Object-safe version of [`HttpTransport`].
pub trait HttpTransportDyn: Send + Sync {
    fn send_boxed(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

impl<T: HttpTransport> HttpTransportDyn for T {
    fn send_boxed(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(self.send(request))
    }
}
