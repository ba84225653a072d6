//! Shared test doubles.

use crate::elicit::{ElicitAction, ElicitResponse, Elicitor};
use anyhow::Result;
use async_trait::async_trait;
use rmcp::model::JsonObject;
use std::sync::Mutex;

/// Scripted [`Elicitor`] that replays canned responses and records every
/// message it was asked to show.
pub(crate) struct StaticElicitor {
    responses: Mutex<Vec<ElicitResponse>>,
    pub messages: Mutex<Vec<String>>,
    pub schemas: Mutex<Vec<JsonObject>>,
}

impl StaticElicitor {
    pub fn new(responses: Vec<ElicitResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            messages: Mutex::new(Vec::new()),
            schemas: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(content: serde_json::Value) -> Self {
        let content = content
            .as_object()
            .cloned()
            .expect("elicit content must be an object");
        Self::new(vec![ElicitResponse {
            action: ElicitAction::Accept,
            content,
        }])
    }

    pub fn declining() -> Self {
        Self::new(vec![ElicitResponse {
            action: ElicitAction::Decline,
            content: JsonObject::new(),
        }])
    }
}

#[async_trait]
impl Elicitor for StaticElicitor {
    async fn elicit(
        &self,
        message: String,
        requested_schema: JsonObject,
    ) -> Result<ElicitResponse> {
        self.messages.lock().expect("messages lock").push(message);
        self.schemas
            .lock()
            .expect("schemas lock")
            .push(requested_schema);
        let mut responses = self.responses.lock().expect("responses lock");
        anyhow::ensure!(!responses.is_empty(), "unexpected elicitation");
        Ok(responses.remove(0))
    }
}
