//! The `resource_get` tool.

use super::{
    cancellable, dynamic_api, ensure_active, non_empty, resolve_resource, ResourceGetInput,
};
use crate::app::GatewayState;
use crate::clients::build_cluster_client;
use crate::elicit::{object_schema, Elicitor};
use crate::token::TokenContext;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Fetches one named resource from every cluster in audience order. For a
/// namespaced resource with no namespace argument, the namespace is
/// elicited from the client (default `"default"`).
pub(crate) async fn resource_get(
    state: &GatewayState,
    token: &TokenContext,
    input: &ResourceGetInput,
    elicitor: Option<&dyn Elicitor>,
    ct: &CancellationToken,
) -> Result<(String, Vec<Value>)> {
    let mut namespace = non_empty(input.namespace.as_deref()).map(str::to_string);

    let mut items = Vec::new();
    for api_server_url in &token.api_server_urls {
        ensure_active(ct)?;
        let client = build_cluster_client(&state.tls, &token.bearer_token, api_server_url)?;
        let resolved =
            resolve_resource(state, &client, api_server_url, &input.resource, elicitor).await?;

        if resolved.namespaced && namespace.is_none() {
            namespace = Some(elicit_namespace(&input.resource, elicitor).await?);
        }

        let api = dynamic_api(&client, &resolved, namespace.as_deref());
        let object = cancellable(ct, api.get(&input.name))
            .await
            .context("failed to get resource")?;
        items.push(serde_json::to_value(&object)?);
    }

    let message = format!("Retrieved {}/{}", input.resource, input.name);
    Ok((message, items))
}

async fn elicit_namespace(resource: &str, elicitor: Option<&dyn Elicitor>) -> Result<String> {
    let Some(elicitor) = elicitor else {
        anyhow::bail!("user cancelled namespace selection");
    };

    let schema = object_schema(
        json!({
            "namespace": {
                "type": "string",
                "description": "The namespace for the resource",
                "default": "default"
            }
        }),
        &["namespace"],
    );
    let response = elicitor
        .elicit(
            format!(
                "Namespace is required for namespaced resource {resource}. \
                 Please specify a namespace:"
            ),
            schema,
        )
        .await
        .context("failed to elicit namespace")?;

    if !response.accepted() {
        anyhow::bail!("user cancelled namespace selection");
    }

    // Accepting with an empty or missing value falls back to "default".
    let namespace = response
        .str_field("namespace")
        .filter(|ns| !ns.is_empty())
        .unwrap_or("default");
    Ok(namespace.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticElicitor;

    #[tokio::test]
    async fn accepted_namespace_is_used() {
        let elicitor = StaticElicitor::accepting(json!({"namespace": "kube-system"}));
        let ns = elicit_namespace("Pod", Some(&elicitor))
            .await
            .expect("namespace should elicit");
        assert_eq!(ns, "kube-system");

        let schemas = elicitor.schemas.lock().expect("schemas lock");
        assert_eq!(schemas.len(), 1);
        let props = &schemas[0]["properties"]["namespace"];
        assert_eq!(props["type"], "string");
        assert_eq!(props["default"], "default");
        assert_eq!(schemas[0]["required"], json!(["namespace"]));
    }

    #[tokio::test]
    async fn accepted_empty_namespace_falls_back_to_default() {
        let elicitor = StaticElicitor::accepting(json!({"namespace": ""}));
        let ns = elicit_namespace("Pod", Some(&elicitor))
            .await
            .expect("namespace should elicit");
        assert_eq!(ns, "default");
    }

    #[tokio::test]
    async fn declined_namespace_is_user_cancelled() {
        let elicitor = StaticElicitor::declining();
        let err = elicit_namespace("Pod", Some(&elicitor))
            .await
            .expect_err("decline should fail");
        assert_eq!(err.to_string(), "user cancelled namespace selection");
    }

    #[tokio::test]
    async fn missing_session_surfaces_user_cancelled() {
        let err = elicit_namespace("Pod", None)
            .await
            .expect_err("no session should fail");
        assert_eq!(err.to_string(), "user cancelled namespace selection");
    }
}
