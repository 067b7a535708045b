//! Durable sqlite registry backend.
//!
//! Upserts resolve conflicts at the storage layer (`INSERT .. ON CONFLICT
//! (ip) DO UPDATE`), so concurrent sweepers in separate processes cannot
//! race-lose an update: whichever write completes last owns rtt/last_seen.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use super::schema::devices;
use super::{sort_devices, DeviceRegistry};
use crate::error::RegistryError;
use crate::types::Device;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// `busy_timeout` is per-connection, so every connection the pool hands
/// out needs it — not just the one used for migrations.
#[derive(Debug)]
struct BusyTimeoutCustomizer;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for BusyTimeoutCustomizer
{
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 2000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Queryable)]
struct DeviceRow {
    id: i32,
    ip: String,
    hostname: Option<String>,
    alias: Option<String>,
    rtt: Option<i32>,
    last_seen: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = devices)]
struct NewDevice<'a> {
    ip: &'a str,
    rtt: Option<i32>,
    last_seen: Option<NaiveDateTime>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            ip: row.ip,
            hostname: row.hostname,
            alias: row.alias,
            rtt: row.rtt,
            last_seen: row.last_seen.map(|t| Utc.from_utc_datetime(&t)),
        }
    }
}

pub struct SqliteRegistry {
    pool: DbPool,
}

impl SqliteRegistry {
    /// Open (or create) the registry database and run pending migrations.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RegistryError::Open(e.to_string()))?;
        }

        let url = path.to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        // Fail fast so startup can fall back to the transient backend.
        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(3))
            .connection_customizer(Box::new(BusyTimeoutCustomizer))
            .build(manager)
            .map_err(|e| RegistryError::Open(e.to_string()))?;

        let mut conn = pool.get()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| RegistryError::Open(e.to_string()))?;

        // Multiple processes share this file; WAL keeps writers from
        // blocking readers. Journal mode persists in the file, so setting
        // it once here is enough.
        conn.batch_execute("PRAGMA journal_mode = WAL;")
            .map_err(RegistryError::from)?;

        info!(path = %path.display(), "sqlite registry ready");
        Ok(Self { pool })
    }

}

fn upsert_blocking(
    pool: &DbPool,
    ip_value: &str,
    rtt_value: Option<i32>,
    now: DateTime<Utc>,
) -> Result<Device, RegistryError> {
    use super::schema::devices::dsl::*;

    let mut conn = pool.get()?;
    let record = NewDevice {
        ip: ip_value,
        rtt: rtt_value,
        last_seen: Some(now.naive_utc()),
    };

    let row: DeviceRow = diesel::insert_into(devices)
        .values(&record)
        .on_conflict(ip)
        .do_update()
        .set((rtt.eq(record.rtt), last_seen.eq(record.last_seen)))
        .get_result(&mut conn)?;

    Ok(row.into())
}

fn list_blocking(pool: &DbPool) -> Result<Vec<Device>, RegistryError> {
    use super::schema::devices::dsl::*;

    let mut conn = pool.get()?;
    let rows = devices.load::<DeviceRow>(&mut conn)?;

    let mut result: Vec<Device> = rows.into_iter().map(Device::from).collect();
    // Sort in code: sqlite ORDER BY .. DESC puts NULLs first, the
    // contract wants never-seen records last.
    sort_devices(&mut result);
    Ok(result)
}

// Diesel is synchronous; a sweep can issue a whole batch of upserts at
// once, so the calls run on the blocking pool instead of tying up
// runtime workers.
#[async_trait]
impl DeviceRegistry for SqliteRegistry {
    async fn upsert(&self, ip: &str, rtt: Option<i32>) -> Result<Device, RegistryError> {
        let pool = self.pool.clone();
        let ip = ip.to_string();
        let now = Utc::now();
        tokio::task::spawn_blocking(move || upsert_blocking(&pool, &ip, rtt, now))
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?
    }

    async fn list(&self) -> Result<Vec<Device>, RegistryError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || list_blocking(&pool))
            .await
            .map_err(|e| RegistryError::Query(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (SqliteRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = SqliteRegistry::open(&dir.path().join("devices.sqlite")).unwrap();
        (registry, dir)
    }

    #[tokio::test]
    async fn test_upsert_insert_then_update() {
        let (registry, _dir) = open_temp();

        let first = registry.upsert("192.168.1.20", Some(2)).await.unwrap();
        let second = registry.upsert("192.168.1.20", Some(7)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.rtt, Some(7));
        assert!(second.last_seen >= first.last_seen);

        let devices = registry.list().await.unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn test_list_order_matches_contract() {
        let (registry, _dir) = open_temp();

        registry.upsert("10.0.0.3", Some(7)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.upsert("10.0.0.1", Some(2)).await.unwrap();

        let devices = registry.list().await.unwrap();
        assert_eq!(devices[0].ip, "10.0.0.1");
        assert_eq!(devices[1].ip, "10.0.0.3");
    }

    #[tokio::test]
    async fn test_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.sqlite");

        {
            let registry = SqliteRegistry::open(&path).unwrap();
            registry.upsert("10.0.0.5", Some(1)).await.unwrap();
        }

        let registry = SqliteRegistry::open(&path).unwrap();
        let devices = registry.list().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].ip, "10.0.0.5");
    }
}
