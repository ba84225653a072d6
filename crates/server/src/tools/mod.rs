//! Tool handlers: `resource_list`, `resource_get`, `resource_apply`.
//!
//! All three share the same preamble: take the API server URLs and bearer
//! token from the request's [`TokenContext`](crate::token::TokenContext),
//! then visit every cluster in audience order, building clients and
//! resolving the resource per cluster. Results are concatenated in URL
//! order, which keeps aggregate output deterministic.

mod apply;
mod get;
mod list;

pub(crate) use apply::{resource_apply, ApplyOutcome};
pub(crate) use get::resource_get;
pub(crate) use list::resource_list;

use crate::app::GatewayState;
use crate::discovery;
use crate::elicit::Elicitor;
use crate::resolver::{find_resource, ResolvedResource};
use anyhow::Result;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Field manager for server-side apply. Matches the outbound user agent.
pub(crate) const FIELD_MANAGER: &str = crate::clients::USER_AGENT;

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceListInput {
    pub resource: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, rename = "labelSelector")]
    pub label_selector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceGetInput {
    pub resource: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceApplyInput {
    #[serde(rename = "resourceYAML")]
    pub resource_yaml: String,
}

/// Resolves a resource name against one cluster, tolerating a stale
/// discovery snapshot: a not-found answer from cached data invalidates the
/// snapshot and retries once against live discovery.
pub(crate) async fn resolve_resource(
    state: &GatewayState,
    client: &Client,
    api_server_url: &str,
    resource_name: &str,
    elicitor: Option<&dyn Elicitor>,
) -> Result<ResolvedResource> {
    let (resources, from_cache) =
        discovery::server_resources(&state.discovery, client, api_server_url).await?;

    match find_resource(resource_name, &resources, elicitor).await {
        Err(e) if from_cache && e.is_not_found() => {
            tracing::debug!(
                target: "k_mcp::resolver",
                resource = resource_name,
                api_server = api_server_url,
                "not found in cached discovery; retrying live"
            );
            state.discovery.invalidate(api_server_url);
            let fresh = discovery::fetch_server_resources(client).await?;
            state.discovery.store(api_server_url, &fresh);
            Ok(find_resource(resource_name, &fresh, elicitor).await?)
        }
        other => Ok(other?),
    }
}

/// Dynamic API handle for a resolved resource, scoped to a namespace when
/// one is given.
pub(crate) fn dynamic_api(
    client: &Client,
    resolved: &ResolvedResource,
    namespace: Option<&str>,
) -> Api<DynamicObject> {
    let gvk = GroupVersionKind::gvk(&resolved.group, &resolved.version, &resolved.kind);
    let api_resource = ApiResource::from_gvk_with_plural(&gvk, &resolved.plural);
    match namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &api_resource),
        None => Api::all_with(client.clone(), &api_resource),
    }
}

/// Runs an outbound call, aborting promptly when the request is cancelled
/// (client disconnect or server shutdown).
pub(crate) async fn cancellable<T, E, F>(ct: &CancellationToken, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    tokio::select! {
        _ = ct.cancelled() => anyhow::bail!("request cancelled"),
        result = fut => result.map_err(Into::into),
    }
}

pub(crate) fn ensure_active(ct: &CancellationToken) -> Result<()> {
    anyhow::ensure!(!ct.is_cancelled(), "request cancelled");
    Ok(())
}

/// Treats an empty string argument the same as an omitted one.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
