//! Device registry: keyed store of discovered hosts.
//!
//! Two interchangeable backends behind one contract: a durable sqlite store
//! and a transient in-memory store for environments without one. Both obey
//! the same semantics: `upsert` is insert-or-update keyed on IP (last
//! completed write wins for rtt/last_seen), `list` orders by last_seen
//! descending with never-seen records last, and no record ever exists for
//! an address that has not answered at least once.

mod memory;
mod schema;
mod sqlite;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::RegistryError;
use crate::types::Device;

pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;

/// Contract shared by the durable and transient backends.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Insert or update the record for `ip`, setting `last_seen` to now.
    async fn upsert(&self, ip: &str, rtt: Option<i32>) -> Result<Device, RegistryError>;

    /// All records, ordered by `last_seen` descending, never-seen last.
    async fn list(&self) -> Result<Vec<Device>, RegistryError>;
}

/// Open the configured registry backend.
///
/// When a durable path is configured but the sqlite backend fails to open,
/// the process falls back to the transient backend instead of refusing to
/// start. Restart durability is lost but discovery keeps working.
pub fn open_registry(db_path: Option<&Path>) -> Arc<dyn DeviceRegistry> {
    match db_path {
        Some(path) => match SqliteRegistry::open(path) {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "sqlite registry unavailable, falling back to in-memory");
                Arc::new(MemoryRegistry::new())
            }
        },
        None => Arc::new(MemoryRegistry::new()),
    }
}

/// Default location for the sqlite registry file.
pub fn default_db_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "lansweep", "lansweep")
        .map(|dirs| dirs.data_dir().join("devices.sqlite"))
}

/// Canonical registry order: last_seen descending, never-seen last,
/// ties broken by ip for stable output.
pub(crate) fn sort_devices(devices: &mut [Device]) {
    devices.sort_by(|a, b| match (b.last_seen, a.last_seen) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.ip.cmp(&b.ip)),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.ip.cmp(&b.ip),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    // Contract checks run against both backends so they cannot drift
    // apart on upsert semantics.

    async fn check_rtt_less_refresh_overwrites(registry: &dyn DeviceRegistry) {
        registry.upsert("10.9.9.9", Some(4)).await.unwrap();
        let refreshed = registry.upsert("10.9.9.9", None).await.unwrap();
        assert_eq!(
            refreshed.rtt, None,
            "the last completed write owns rtt even without a measurement"
        );
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    async fn check_overlapping_upserts_last_completion_wins(registry: Arc<dyn DeviceRegistry>) {
        // Two writers race on the same key, like the interval sweep and a
        // cooperating one-shot sweep process.
        let a = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.upsert("10.9.9.1", Some(1)).await })
        };
        let b = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.upsert("10.9.9.1", Some(2)).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let devices = registry.list().await.unwrap();
        assert_eq!(devices.len(), 1, "concurrent writers never duplicate a key");
        assert!(
            devices[0].rtt == Some(1) || devices[0].rtt == Some(2),
            "state is one writer's record, never a blend"
        );

        // A write issued after both completions is the later completion by
        // construction and must own the record.
        let settled = registry.upsert("10.9.9.1", Some(9)).await.unwrap();
        assert_eq!(settled.rtt, Some(9));
        assert_eq!(registry.list().await.unwrap()[0].rtt, Some(9));
    }

    #[tokio::test]
    async fn test_memory_rtt_less_refresh_overwrites() {
        check_rtt_less_refresh_overwrites(&MemoryRegistry::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_rtt_less_refresh_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SqliteRegistry::open(&dir.path().join("devices.sqlite")).unwrap();
        check_rtt_less_refresh_overwrites(&registry).await;
    }

    #[tokio::test]
    async fn test_memory_overlapping_upserts() {
        check_overlapping_upserts_last_completion_wins(Arc::new(MemoryRegistry::new())).await;
    }

    #[tokio::test]
    async fn test_sqlite_overlapping_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SqliteRegistry::open(&dir.path().join("devices.sqlite")).unwrap();
        check_overlapping_upserts_last_completion_wins(Arc::new(registry)).await;
    }

    #[tokio::test]
    async fn test_open_registry_without_path_is_transient() {
        let registry = open_registry(None);
        registry.upsert("192.168.1.2", Some(5)).await.unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_registry_falls_back_when_sqlite_unavailable() {
        // A directory path cannot be opened as a sqlite file.
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(Some(dir.path()));

        // Fallback registry still satisfies the contract.
        registry.upsert("10.0.0.9", None).await.unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }
}
