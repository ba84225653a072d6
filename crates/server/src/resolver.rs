//! Maps loose, human-or-LLM-supplied resource names onto fully qualified
//! API resources.
//!
//! Input follows the `Kind[.version][.group]` convention (`pods`,
//! `Deployment.apps`, `NetworkPolicy.v1.networking.k8s.io`). Matching runs
//! over the cluster's discovered resources, preferring exact Kind/group
//! (and version, when supplied) matches and falling back to case-insensitive
//! substring matches. Ambiguity is settled interactively through an
//! [`Elicitor`] when a session is available. Sensitive resources are
//! unconditionally hidden.

use crate::discovery::ApiResourceEntry;
use crate::elicit::{object_schema, Elicitor};
use serde_json::json;
use thiserror::Error;

/// Resources the gateway refuses to surface, regardless of match quality.
const RESTRICTED_RESOURCES: &[(&str, &str)] = &[("", "secrets"), ("", "serviceaccounts")];
const RESTRICTED_GROUP_SUFFIX: &str = "rbac.authorization.k8s.io";

/// A fully qualified API resource selected by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl ResolvedResource {
    fn from_entry(entry: &ApiResourceEntry) -> Self {
        Self {
            group: entry.group.clone(),
            version: entry.version.clone(),
            kind: entry.kind.clone(),
            plural: entry.plural.clone(),
            namespaced: entry.namespaced,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resource {name:?} not found")]
    NotFound { name: String },
    #[error("resource {name:?} not found, did you mean one of these: {candidates}")]
    Ambiguous { name: String, candidates: String },
    #[error("user cancelled resource selection")]
    Cancelled,
    #[error("invalid choice format")]
    InvalidChoiceFormat,
    #[error("invalid choice: {0}")]
    InvalidChoice(String),
    #[error("failed to elicit user choice: {0}")]
    Elicit(#[source] anyhow::Error),
}

impl ResolveError {
    /// True when retrying against a live (uncached) resource list could
    /// change the outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. } | ResolveError::Ambiguous { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedResource {
    pub kind: String,
    pub version: Option<String>,
    pub group: String,
}

/// Splits `Kind[.version][.group]`: the first dot segment is the Kind; the
/// next is the version only when it is version-shaped (`v1`, `v1beta1`);
/// everything after belongs to the group. No group segment means the core
/// group.
pub(crate) fn parse_resource_arg(input: &str) -> ParsedResource {
    let Some((kind, rest)) = input.split_once('.') else {
        return ParsedResource {
            kind: input.to_string(),
            version: None,
            group: String::new(),
        };
    };

    let (version, group) = if let Some((first, remainder)) = rest.split_once('.') {
        if is_version_segment(first) {
            (Some(first.to_string()), remainder.to_string())
        } else {
            (None, rest.to_string())
        }
    } else if is_version_segment(rest) {
        (Some(rest.to_string()), String::new())
    } else {
        (None, rest.to_string())
    };

    ParsedResource {
        kind: kind.to_string(),
        version,
        group,
    }
}

/// `v<digits>` optionally followed by `alpha<digits>` or `beta<digits>`.
fn is_version_segment(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    let tail = &rest[digits..];
    if tail.is_empty() {
        return true;
    }
    let stage = tail.trim_end_matches(|c: char| c.is_ascii_digit());
    stage == "alpha" || stage == "beta"
}

fn is_restricted(group: &str, plural: &str) -> bool {
    RESTRICTED_RESOURCES.contains(&(group, plural)) || group.ends_with(RESTRICTED_GROUP_SUFFIX)
}

fn candidate_label(entry: &ApiResourceEntry) -> String {
    format!("{}.{}.{}", entry.plural, entry.version, entry.group)
}

/// Resolves `resource_name` against a cluster's discovered resources.
///
/// Restricted resources are dropped before any counting, so a denylisted
/// resource behaves exactly as if discovery never returned it. A single
/// exact match wins; multiple exact matches take the first in discovery
/// order. With no exact match, a single partial match is auto-selected;
/// multiple partial matches are either enumerated in the error (no session)
/// or disambiguated through a numbered-list elicitation.
pub async fn find_resource(
    resource_name: &str,
    resources: &[ApiResourceEntry],
    elicitor: Option<&dyn Elicitor>,
) -> Result<ResolvedResource, ResolveError> {
    let parsed = parse_resource_arg(resource_name);
    let kind_lower = parsed.kind.to_lowercase();
    let input_lower = resource_name.to_lowercase();

    let mut exact_matches: Vec<&ApiResourceEntry> = Vec::new();
    let mut partial_matches: Vec<&ApiResourceEntry> = Vec::new();

    for entry in resources {
        if is_restricted(&entry.group, &entry.plural) {
            continue;
        }

        let version_ok = parsed
            .version
            .as_deref()
            .map_or(true, |v| entry.version == v);
        if entry.kind == parsed.kind && entry.group == parsed.group && version_ok {
            exact_matches.push(entry);
        }

        if entry.kind.to_lowercase().contains(&kind_lower)
            || entry.plural.to_lowercase().contains(&input_lower)
        {
            partial_matches.push(entry);
        }
    }

    // Multiple exact matches keep the first in discovery order.
    if let Some(entry) = exact_matches.first() {
        return Ok(ResolvedResource::from_entry(entry));
    }

    match partial_matches.len() {
        0 => Err(ResolveError::NotFound {
            name: resource_name.to_string(),
        }),
        1 => Ok(ResolvedResource::from_entry(partial_matches[0])),
        _ => match elicitor {
            None => Err(ResolveError::Ambiguous {
                name: resource_name.to_string(),
                candidates: partial_matches
                    .iter()
                    .map(|e| candidate_label(e))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            Some(elicitor) => elicit_choice(resource_name, &partial_matches, elicitor).await,
        },
    }
}

async fn elicit_choice(
    resource_name: &str,
    candidates: &[&ApiResourceEntry],
    elicitor: &dyn Elicitor,
) -> Result<ResolvedResource, ResolveError> {
    let options = candidates
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}", i + 1, candidate_label(entry)))
        .collect::<Vec<_>>()
        .join("\n");
    let message = format!(
        "Resource '{resource_name}' not found. Did you mean one of these?\n{options}"
    );
    let schema = object_schema(
        json!({
            "choice": {
                "type": "string",
                "description": "Number of the resource to use"
            }
        }),
        &["choice"],
    );

    let response = elicitor
        .elicit(message, schema)
        .await
        .map_err(ResolveError::Elicit)?;

    if !response.accepted() {
        return Err(ResolveError::Cancelled);
    }

    let choice = match response.content.get("choice") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(ResolveError::InvalidChoiceFormat),
    };

    let index: usize = choice
        .trim()
        .parse()
        .map_err(|_| ResolveError::InvalidChoice(choice.clone()))?;
    if index < 1 || index > candidates.len() {
        return Err(ResolveError::InvalidChoice(choice));
    }

    Ok(ResolvedResource::from_entry(candidates[index - 1]))
}
