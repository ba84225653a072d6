//! MCP `ServerHandler` implementation for [`KubeGateway`].
//!
//! Registers the three resource tools with their JSON input schemas,
//! dispatches calls into the tool layer, and doubles as the method-level
//! logging middleware: method name, session id, and duration at debug,
//! arguments and result flags at debug, failures at error.

use crate::app::KubeGateway;
use crate::elicit::{Elicitor, SessionElicitor};
use crate::token::TokenContext;
use crate::tools::{
    self, ApplyOutcome, ResourceApplyInput, ResourceGetInput, ResourceListInput,
};
use anyhow::{anyhow, Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam, Tool,
    ToolAnnotations,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::{json, Map as JsonMap, Value};
use std::sync::Arc;
use std::time::Instant;

impl ServerHandler for KubeGateway {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "k-mcp".into(),
                version: crate::version::VERSION.into(),
                ..Default::default()
            },
            instructions: Some(
                "Lists, gets, and applies Kubernetes resources on every cluster named in \
                 your bearer token's audience list. Resources are addressed as Kind, \
                 Kind.group, or Kind.version.group."
                    .into(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_
    {
        tracing::debug!(
            target: "k_mcp::mcp",
            method = "tools/list",
            session_id = session_id(&context).as_deref().unwrap_or(""),
            "MCP method started"
        );
        std::future::ready(Ok(ListToolsResult {
            tools: tool_catalog(),
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_
    {
        let state = self.state.clone();
        Box::pin(async move {
            let started = Instant::now();
            let session = session_id(&context).unwrap_or_default();
            tracing::debug!(
                target: "k_mcp::mcp",
                method = "tools/call",
                tool = %request.name,
                session_id = %session,
                args = ?request.arguments,
                "MCP method started"
            );

            let token = token_context(&context).map_err(|e| {
                rmcp::ErrorData::invalid_request(e.to_string(), None)
            })?;

            let elicitor = SessionElicitor::new(context.peer.clone(), context.ct.clone());
            let elicitor: Option<&dyn Elicitor> = Some(&elicitor);

            let result: Result<CallToolResult> = async {
                match request.name.as_ref() {
                    "resource_list" => {
                        let input: ResourceListInput = parse_args(request.arguments.clone())?;
                        let (message, items) =
                            tools::resource_list(&state, &token, &input, elicitor, &context.ct)
                                .await?;
                        Ok(success(message, Value::Array(items)))
                    }
                    "resource_get" => {
                        let input: ResourceGetInput = parse_args(request.arguments.clone())?;
                        let (message, items) =
                            tools::resource_get(&state, &token, &input, elicitor, &context.ct)
                                .await?;
                        Ok(success(message, Value::Array(items)))
                    }
                    "resource_apply" => {
                        let input: ResourceApplyInput = parse_args(request.arguments.clone())?;
                        let outcome =
                            tools::resource_apply(&state, &token, &input, elicitor, &context.ct)
                                .await?;
                        Ok(match outcome {
                            ApplyOutcome::Cancelled(text) => CallToolResult {
                                content: vec![Content::text(text)],
                                structured_content: None,
                                is_error: Some(false),
                                meta: None,
                            },
                            ApplyOutcome::Applied { message, resources } => {
                                success(message, Value::Array(resources))
                            }
                        })
                    }
                    other => Err(anyhow!("unknown tool {other}")),
                }
            }
            .await;

            let duration_ms = started.elapsed().as_millis() as u64;
            match result {
                Ok(result) => {
                    tracing::debug!(
                        target: "k_mcp::mcp",
                        method = "tools/call",
                        tool = %request.name,
                        session_id = %session,
                        duration_ms,
                        is_error = ?result.is_error,
                        structured = result.structured_content.is_some(),
                        "MCP method completed"
                    );
                    Ok(result)
                }
                Err(e) => {
                    tracing::error!(
                        target: "k_mcp::mcp",
                        method = "tools/call",
                        tool = %request.name,
                        session_id = %session,
                        duration_ms,
                        error = %e,
                        "MCP method failed"
                    );
                    // Tool failures surface as tool errors with readable
                    // text, not protocol errors.
                    Ok(CallToolResult {
                        content: vec![Content::text(format!("{e:#}"))],
                        structured_content: None,
                        is_error: Some(true),
                        meta: None,
                    })
                }
            }
        })
    }
}

fn success(message: String, structured: Value) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(message)],
        structured_content: Some(structured),
        is_error: Some(false),
        meta: None,
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    arguments: Option<rmcp::model::JsonObject>,
) -> Result<T> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
        .context("invalid tool arguments")
}

/// The verified token context attached by the bearer middleware, carried in
/// through the HTTP request parts the transport forwards.
fn token_context(context: &RequestContext<RoleServer>) -> Result<TokenContext> {
    if let Some(token) = context.extensions.get::<TokenContext>() {
        return Ok(token.clone());
    }
    if let Some(parts) = context.extensions.get::<http::request::Parts>() {
        if let Some(token) = parts.extensions.get::<TokenContext>() {
            return Ok(token.clone());
        }
    }
    Err(anyhow!(
        "missing token context; request did not pass bearer authentication"
    ))
}

fn session_id(context: &RequestContext<RoleServer>) -> Option<String> {
    context
        .extensions
        .get::<http::request::Parts>()
        .and_then(|parts| parts.headers.get("mcp-session-id"))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn tool_catalog() -> Vec<Tool> {
    let mut list_schema = JsonMap::new();
    list_schema.insert("type".into(), json!("object"));
    list_schema.insert(
        "properties".into(),
        json!({
            "resource": {
                "type": "string",
                "description": "The Kubernetes resource type (e.g. pods, services, deployments). Kind.version.group or Kind format"
            },
            "namespace": {
                "type": "string",
                "description": "The namespace to list resources from (optional, defaults to all namespaces)"
            },
            "labelSelector": {
                "type": "string",
                "description": "Label selector to filter resources (e.g. app=myapp,version=v1.0)"
            }
        }),
    );
    list_schema.insert("required".into(), json!(["resource"]));
    list_schema.insert("additionalProperties".into(), json!(false));

    let mut get_schema = JsonMap::new();
    get_schema.insert("type".into(), json!("object"));
    get_schema.insert(
        "properties".into(),
        json!({
            "resource": {
                "type": "string",
                "description": "The Kubernetes resource type (e.g. pod, service, deployment). Kind.version.group or Kind format"
            },
            "name": {
                "type": "string",
                "description": "The name of the resource"
            },
            "namespace": {
                "type": "string",
                "description": "The namespace of the resource (required for namespaced resources)"
            }
        }),
    );
    get_schema.insert("required".into(), json!(["resource", "name"]));
    get_schema.insert("additionalProperties".into(), json!(false));

    let mut apply_schema = JsonMap::new();
    apply_schema.insert("type".into(), json!("object"));
    apply_schema.insert(
        "properties".into(),
        json!({
            "resourceYAML": {
                "type": "string",
                "description": "The Kubernetes resource(s) in YAML format. Can contain single or multiple resources separated by ---"
            }
        }),
    );
    apply_schema.insert("required".into(), json!(["resourceYAML"]));
    apply_schema.insert("additionalProperties".into(), json!(false));

    vec![
        Tool {
            name: "resource_list".into(),
            title: Some("List Kubernetes resources of a specific type".into()),
            description: Some(
                "List Kubernetes resources of a specific type. This can be pods, \
                 deployments.v1.apps, etc. Kind.version.group or Kind format"
                    .into(),
            ),
            input_schema: Arc::new(list_schema),
            output_schema: None,
            annotations: Some(ToolAnnotations {
                title: Some("List Kubernetes resources of a specific type".into()),
                read_only_hint: Some(true),
                destructive_hint: Some(false),
                idempotent_hint: Some(false),
                open_world_hint: Some(true),
                ..Default::default()
            }),
            icons: None,
        },
        Tool {
            name: "resource_get".into(),
            title: Some("Get detailed information about a specific Kubernetes resource".into()),
            description: Some(
                "Get detailed information about a specific Kubernetes resource. This can \
                 be pods, deployments.v1.apps, etc. Kind.version.group or Kind format"
                    .into(),
            ),
            input_schema: Arc::new(get_schema),
            output_schema: None,
            annotations: Some(ToolAnnotations {
                title: Some(
                    "Get detailed information about a specific Kubernetes resource".into(),
                ),
                read_only_hint: Some(true),
                destructive_hint: Some(false),
                idempotent_hint: Some(false),
                open_world_hint: Some(true),
                ..Default::default()
            }),
            icons: None,
        },
        Tool {
            name: "resource_apply".into(),
            title: Some("Apply a specific Kubernetes resource".into()),
            description: Some(
                "Apply a specific Kubernetes resource. This can be pods, \
                 deployments.v1.apps, etc. Kind.version.group or Kind format"
                    .into(),
            ),
            input_schema: Arc::new(apply_schema),
            output_schema: None,
            annotations: Some(ToolAnnotations {
                title: Some("Apply a specific Kubernetes resource".into()),
                read_only_hint: Some(false),
                destructive_hint: Some(true),
                idempotent_hint: Some(true),
                open_world_hint: Some(true),
                ..Default::default()
            }),
            icons: None,
        },
    ]
}
