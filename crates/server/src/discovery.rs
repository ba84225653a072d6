//! Server resource discovery with an on-disk, per-cluster cache.
//!
//! Each API server's preferred-resource list is flattened into
//! [`ApiResourceEntry`] rows and snapshotted under
//! `~/k-mcp-discovery-cache/`. Snapshots expire after six hours; a missing,
//! stale, or corrupt snapshot degrades to live discovery. Writers are
//! atomic (tempfile + rename) so concurrent readers never observe a torn
//! file.

use anyhow::{Context, Result};
use kube::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Snapshot lifetime before a live refresh is forced.
const CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// One discoverable API resource, as the resolver consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResourceEntry {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

#[derive(Serialize, Deserialize)]
struct DiscoverySnapshot {
    fetched_at: u64,
    resources: Vec<ApiResourceEntry>,
}

/// On-disk discovery cache keyed by API server URL.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    base_dir: PathBuf,
}

impl DiscoveryCache {
    /// Cache rooted under the invoking user's home directory.
    pub fn new() -> Result<Self> {
        let home = home_dir()?;
        Ok(Self {
            base_dir: home.join("k-mcp-discovery-cache"),
        })
    }

    /// Cache rooted at an explicit directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Snapshot path for a cluster URL. Distinct URLs never collide: the
    /// readable sanitized form is suffixed with a digest of the raw URL.
    fn snapshot_path(&self, url: &str) -> PathBuf {
        let sanitized: String = url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let digest = Sha256::digest(url.as_bytes());
        let digest_hex: String = digest
            .iter()
            .take(6)
            .map(|b| format!("{b:02x}"))
            .collect();
        self.base_dir.join(format!("{sanitized}-{digest_hex}.json"))
    }

    /// Loads a fresh snapshot for `url`, or `None` when the snapshot is
    /// missing, stale, or unreadable.
    pub fn load(&self, url: &str) -> Option<Vec<ApiResourceEntry>> {
        let path = self.snapshot_path(url);
        let data = fs::read_to_string(&path).ok()?;
        let snapshot: DiscoverySnapshot = match serde_json::from_str(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(
                    target: "k_mcp::discovery",
                    url,
                    error = %e,
                    "discovery snapshot corrupt; falling back to live discovery"
                );
                return None;
            }
        };

        let now = unix_now();
        let age = now.saturating_sub(snapshot.fetched_at);
        if age > CACHE_TTL.as_secs() {
            tracing::debug!(
                target: "k_mcp::discovery",
                url,
                age_secs = age,
                "discovery snapshot stale; falling back to live discovery"
            );
            return None;
        }

        Some(snapshot.resources)
    }

    /// Persists a snapshot atomically. Best-effort: failures are logged and
    /// discovery continues uncached.
    pub fn store(&self, url: &str, resources: &[ApiResourceEntry]) {
        if let Err(e) = self.try_store(url, resources) {
            tracing::debug!(
                target: "k_mcp::discovery",
                url,
                error = %e,
                "failed to persist discovery snapshot"
            );
        }
    }

    fn try_store(&self, url: &str, resources: &[ApiResourceEntry]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("creating cache dir {}", self.base_dir.display()))?;
        let snapshot = DiscoverySnapshot {
            fetched_at: unix_now(),
            resources: resources.to_vec(),
        };
        let text = serde_json::to_string(&snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base_dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(self.snapshot_path(url))?;
        Ok(())
    }

    /// Drops the snapshot for `url` so the next lookup discovers live.
    pub fn invalidate(&self, url: &str) {
        let _ = fs::remove_file(self.snapshot_path(url));
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().context("home directory not found")
}

/// Fetches the cluster's preferred resources, serving from the cache when a
/// fresh snapshot exists. Returns the entries and whether they came from
/// the cache, so callers can invalidate and retry on a suspect miss.
pub async fn server_resources(
    cache: &DiscoveryCache,
    client: &Client,
    url: &str,
) -> Result<(Vec<ApiResourceEntry>, bool)> {
    if let Some(resources) = cache.load(url) {
        return Ok((resources, true));
    }
    let resources = fetch_server_resources(client).await?;
    cache.store(url, &resources);
    Ok((resources, false))
}

/// Runs live discovery and flattens each group's preferred-version
/// resources. Groups are ordered core-first then alphabetically so the
/// entry order is deterministic across runs.
pub async fn fetch_server_resources(client: &Client) -> Result<Vec<ApiResourceEntry>> {
    use kube::discovery::{Discovery, Scope};

    let discovery = Discovery::new(client.clone())
        .run()
        .await
        .context("failed to get server resources")?;

    let mut groups: Vec<_> = discovery.groups().collect();
    groups.sort_by(|a, b| {
        let a_core = a.name().is_empty();
        let b_core = b.name().is_empty();
        b_core.cmp(&a_core).then_with(|| a.name().cmp(b.name()))
    });

    let mut entries = Vec::new();
    for group in groups {
        for (resource, capabilities) in group.recommended_resources() {
            entries.push(ApiResourceEntry {
                group: resource.group.clone(),
                version: resource.version.clone(),
                kind: resource.kind.clone(),
                plural: resource.plural.clone(),
                namespaced: matches!(capabilities.scope, Scope::Namespaced),
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pod_entry() -> ApiResourceEntry {
        ApiResourceEntry {
            group: String::new(),
            version: "v1".into(),
            kind: "Pod".into(),
            plural: "pods".into(),
            namespaced: true,
        }
    }

    #[test]
    fn store_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());

        cache.store("https://c1", &[pod_entry()]);
        let loaded = cache.load("https://c1").expect("snapshot should be fresh");
        assert_eq!(loaded, vec![pod_entry()]);
    }

    #[test]
    fn missing_snapshot_loads_none() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());
        assert!(cache.load("https://nowhere").is_none());
    }

    #[test]
    fn corrupt_snapshot_degrades_to_none() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());

        cache.store("https://c1", &[pod_entry()]);
        fs::write(cache.snapshot_path("https://c1"), "{not json").expect("corrupt snapshot");
        assert!(cache.load("https://c1").is_none());
    }

    #[test]
    fn stale_snapshot_degrades_to_none() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());

        let snapshot = DiscoverySnapshot {
            fetched_at: unix_now() - CACHE_TTL.as_secs() - 60,
            resources: vec![pod_entry()],
        };
        fs::create_dir_all(temp.path()).expect("cache dir");
        fs::write(
            cache.snapshot_path("https://c1"),
            serde_json::to_string(&snapshot).expect("serialize snapshot"),
        )
        .expect("write snapshot");

        assert!(cache.load("https://c1").is_none());
    }

    #[test]
    fn distinct_urls_use_distinct_files() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());
        assert_ne!(
            cache.snapshot_path("https://c1"),
            cache.snapshot_path("https://c2")
        );
        // Same sanitized form, different raw URLs.
        assert_ne!(
            cache.snapshot_path("https://c1"),
            cache.snapshot_path("https:%2Fc1")
        );
    }

    #[test]
    fn invalidate_removes_snapshot() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());

        cache.store("https://c1", &[pod_entry()]);
        cache.invalidate("https://c1");
        assert!(cache.load("https://c1").is_none());
    }

    #[test]
    fn store_overwrites_previous_snapshot() {
        let temp = tempdir().expect("tempdir");
        let cache = DiscoveryCache::with_base_dir(temp.path().to_path_buf());

        cache.store("https://c1", &[pod_entry()]);
        let mut updated = pod_entry();
        updated.plural = "replacements".into();
        cache.store("https://c1", &[updated.clone()]);

        let loaded = cache.load("https://c1").expect("snapshot should load");
        assert_eq!(loaded, vec![updated]);
    }
}
