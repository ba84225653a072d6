//! The `resource_list` tool.

use super::{
    cancellable, dynamic_api, ensure_active, non_empty, resolve_resource, ResourceListInput,
};
use crate::app::GatewayState;
use crate::clients::build_cluster_client;
use crate::elicit::Elicitor;
use crate::token::TokenContext;
use anyhow::{Context, Result};
use kube::api::ListParams;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Lists resources of one type across every cluster in the token's
/// audience order. Items are appended in traversal order.
pub(crate) async fn resource_list(
    state: &GatewayState,
    token: &TokenContext,
    input: &ResourceListInput,
    elicitor: Option<&dyn Elicitor>,
    ct: &CancellationToken,
) -> Result<(String, Vec<Value>)> {
    let namespace = non_empty(input.namespace.as_deref());
    let label_selector = non_empty(input.label_selector.as_deref());

    let mut items = Vec::new();
    for api_server_url in &token.api_server_urls {
        ensure_active(ct)?;
        let client = build_cluster_client(&state.tls, &token.bearer_token, api_server_url)?;
        let resolved =
            resolve_resource(state, &client, api_server_url, &input.resource, elicitor).await?;

        let api = dynamic_api(&client, &resolved, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = cancellable(ct, api.list(&params))
            .await
            .with_context(|| format!("failed to list resources on {api_server_url}"))?;
        for item in list.items {
            items.push(serde_json::to_value(&item)?);
        }
    }

    let message = list_summary(items.len(), &input.resource, label_selector, namespace);
    Ok((message, items))
}

fn list_summary(
    count: usize,
    resource: &str,
    label_selector: Option<&str>,
    namespace: Option<&str>,
) -> String {
    let mut message = format!("Found {count} {resource} resources");
    if let Some(selector) = label_selector {
        message.push_str(&format!(" with label selector '{selector}'"));
    }
    if let Some(ns) = namespace {
        message.push_str(&format!(" in namespace '{ns}'"));
    }
    message
}
