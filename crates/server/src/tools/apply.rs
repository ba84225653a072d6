//! The `resource_apply` tool.
//!
//! Apply runs a three-step protocol per cluster: server-side dry-run of
//! every document, one confirmation elicit carrying the validated preview,
//! then the real server-side applies in document order. Validation comes
//! before consent so the user is never asked to confirm a request that
//! would fail anyway.

use super::{
    cancellable, dynamic_api, ensure_active, resolve_resource, ResourceApplyInput, FIELD_MANAGER,
};
use crate::app::GatewayState;
use crate::clients::build_cluster_client;
use crate::elicit::{object_schema, Elicitor};
use crate::token::TokenContext;
use anyhow::{Context, Result};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Result of an apply request: either everything was applied, or the user
/// backed out. Backing out is a normal outcome, not a tool error.
pub(crate) enum ApplyOutcome {
    Cancelled(&'static str),
    Applied {
        message: String,
        resources: Vec<Value>,
    },
}

struct PlannedApply {
    object: DynamicObject,
    api: Api<DynamicObject>,
    kind: String,
    name: String,
    namespace: Option<String>,
}

/// Applies a multi-document YAML payload to every cluster in audience
/// order.
pub(crate) async fn resource_apply(
    state: &GatewayState,
    token: &TokenContext,
    input: &ResourceApplyInput,
    elicitor: Option<&dyn Elicitor>,
    ct: &CancellationToken,
) -> Result<ApplyOutcome> {
    let objects = parse_documents(&input.resource_yaml)?;

    let mut applied = Vec::new();
    let mut summaries = Vec::new();

    for api_server_url in &token.api_server_urls {
        ensure_active(ct)?;
        let client = build_cluster_client(&state.tls, &token.bearer_token, api_server_url)?;

        // Resolve and dry-run everything before asking for consent. A
        // failure here aborts the whole operation for this cluster.
        let mut planned = Vec::new();
        let mut previews = Vec::new();
        for object in &objects {
            let mut object = object.clone();
            let kind = object
                .types
                .as_ref()
                .map(|t| t.kind.clone())
                .filter(|k| !k.is_empty())
                .context("resource kind is required")?;
            let name = object
                .metadata
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .context("resource name is required")?;

            let resolved = resolve_resource(
                state,
                &client,
                api_server_url,
                &kind.to_lowercase(),
                elicitor,
            )
            .await
            .with_context(|| format!("failed to find resource type {kind}"))?;

            let namespace = default_namespace(&mut object, resolved.namespaced);

            let api = dynamic_api(&client, &resolved, namespace.as_deref());
            let mut dry_run = PatchParams::apply(FIELD_MANAGER);
            dry_run.dry_run = true;
            cancellable(ct, api.patch(&name, &dry_run, &Patch::Apply(&object)))
                .await
                .with_context(|| format!("dry-run validation failed for {kind}/{name}"))?;

            previews.push(format!(
                "- apply {kind}/{name}{}",
                namespace_suffix(namespace.as_deref())
            ));
            planned.push(PlannedApply {
                object,
                api,
                kind,
                name,
                namespace,
            });
        }

        match confirm_apply(&previews, elicitor).await? {
            Confirmation::Rejected => {
                return Ok(ApplyOutcome::Cancelled("Operation cancelled by user"));
            }
            Confirmation::NotConfirmed => {
                return Ok(ApplyOutcome::Cancelled(
                    "Operation cancelled - user did not confirm",
                ));
            }
            Confirmation::Confirmed => {}
        }

        // Real pass, strictly in document order. Apply is idempotent, so a
        // failure at document k leaves documents 0..k applied.
        for plan in planned {
            let params = PatchParams::apply(FIELD_MANAGER);
            let result = cancellable(
                ct,
                plan.api.patch(&plan.name, &params, &Patch::Apply(&plan.object)),
            )
            .await
            .with_context(|| format!("failed to apply {}/{}", plan.kind, plan.name))?;

            let namespace = result.metadata.namespace.clone().or(plan.namespace);
            summaries.push(format!(
                "- applied {}/{}{}",
                plan.kind,
                plan.name,
                namespace_suffix(namespace.as_deref())
            ));
            applied.push(serde_json::to_value(&result)?);
        }
    }

    let message = format!(
        "Successfully processed {} resource(s):\n\n{}",
        applied.len(),
        summaries.join("\n")
    );
    Ok(ApplyOutcome::Applied {
        message,
        resources: applied,
    })
}

enum Confirmation {
    Confirmed,
    NotConfirmed,
    Rejected,
}

async fn confirm_apply(
    previews: &[String],
    elicitor: Option<&dyn Elicitor>,
) -> Result<Confirmation> {
    let elicitor =
        elicitor.context("failed to elicit user confirmation: no session available")?;

    let message = format!(
        "The following resources will be processed:\n\n{}\n\nDo you want to proceed?",
        previews.join("\n")
    );
    let schema = object_schema(
        json!({
            "confirm": {
                "type": "boolean",
                "description": "Confirm whether to proceed with creating/updating the resources"
            }
        }),
        &["confirm"],
    );

    let response = elicitor
        .elicit(message, schema)
        .await
        .context("failed to elicit user confirmation")?;

    if !response.accepted() {
        return Ok(Confirmation::Rejected);
    }
    if response.bool_field("confirm") != Some(true) {
        return Ok(Confirmation::NotConfirmed);
    }
    Ok(Confirmation::Confirmed)
}

fn namespace_suffix(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!(" (namespace: {ns})"),
        None => String::new(),
    }
}

/// Defaults a namespaced object's missing or empty namespace to
/// `"default"`, mutating the object. Returns the effective namespace, or
/// `None` for cluster-scoped objects.
fn default_namespace(object: &mut DynamicObject, namespaced: bool) -> Option<String> {
    if !namespaced {
        return None;
    }
    let namespace = object
        .metadata
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| "default".to_string());
    object.metadata.namespace = Some(namespace.clone());
    Some(namespace)
}

/// Splits a multi-document payload on `---` separators, trims each
/// fragment, drops empties, and decodes the rest as YAML or JSON. Fragments
/// that decode to null or an empty object are dropped; at least one object
/// must remain.
pub(crate) fn parse_documents(resource_yaml: &str) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for doc in resource_yaml.split("---") {
        let doc = doc.trim();
        if doc.is_empty() {
            continue;
        }

        let value: Value =
            serde_yaml::from_str(doc).context("failed to decode YAML document")?;
        match &value {
            Value::Null => continue,
            Value::Object(map) if map.is_empty() => continue,
            Value::Object(_) => {}
            _ => anyhow::bail!("failed to decode YAML document: not an object"),
        }

        let object: DynamicObject =
            serde_json::from_value(value).context("failed to decode YAML document")?;
        objects.push(object);
    }

    anyhow::ensure!(
        !objects.is_empty(),
        "no valid resources found in the provided YAML"
    );
    Ok(objects)
}
