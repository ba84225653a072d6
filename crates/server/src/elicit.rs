//! Elicitation: blocking server-to-client upcalls for interactive input.
//!
//! The resolver and the tool handlers only see the [`Elicitor`] trait, so
//! they can be exercised in tests with a scripted implementation while the
//! live server routes upcalls through the MCP session peer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Client verdict on an elicitation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// Outcome of an elicitation: the action plus whatever structured content
/// the client supplied.
#[derive(Debug, Clone)]
pub struct ElicitResponse {
    pub action: ElicitAction,
    pub content: JsonObject,
}

impl ElicitResponse {
    pub fn accepted(&self) -> bool {
        self.action == ElicitAction::Accept
    }

    /// Looks up a string field in the returned content.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// Looks up a boolean field in the returned content.
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.content.get(key).and_then(Value::as_bool)
    }
}

/// A blocking upcall to the client requesting structured input.
#[async_trait]
pub trait Elicitor: Send + Sync {
    async fn elicit(&self, message: String, requested_schema: JsonObject)
        -> Result<ElicitResponse>;
}

/// Builds the restricted object schema elicitation requests carry.
pub fn object_schema(properties: Value, required: &[&str]) -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), properties);
    schema.insert("required".into(), json!(required));
    schema
}

/// [`Elicitor`] backed by a live MCP session peer.
///
/// The request's cancellation token is raced against the upcall so a client
/// disconnect or server shutdown tears the pending elicitation down.
pub struct SessionElicitor {
    peer: rmcp::service::Peer<rmcp::RoleServer>,
    ct: CancellationToken,
}

impl SessionElicitor {
    pub fn new(peer: rmcp::service::Peer<rmcp::RoleServer>, ct: CancellationToken) -> Self {
        Self { peer, ct }
    }
}

#[async_trait]
impl Elicitor for SessionElicitor {
    async fn elicit(
        &self,
        message: String,
        requested_schema: JsonObject,
    ) -> Result<ElicitResponse> {
        use rmcp::model::{CreateElicitationRequestParam, ElicitationAction, ElicitationSchema};

        let requested_schema = ElicitationSchema::from_json_schema(requested_schema)
            .context("invalid elicitation schema")?;

        let request = self.peer.create_elicitation(CreateElicitationRequestParam {
            message,
            requested_schema,
        });

        let result = tokio::select! {
            _ = self.ct.cancelled() => anyhow::bail!("elicitation cancelled"),
            result = request => result.context("elicitation request failed")?,
        };

        let action = match result.action {
            ElicitationAction::Accept => ElicitAction::Accept,
            ElicitationAction::Decline => ElicitAction::Decline,
            ElicitationAction::Cancel => ElicitAction::Cancel,
        };

        Ok(ElicitResponse {
            action,
            content: result
                .content
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default(),
        })
    }
}
