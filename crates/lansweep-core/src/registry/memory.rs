//! Transient in-memory registry backend.
//!
//! Same contract as the sqlite backend, lost on restart. This backend
//! exists precisely for environments without a durable store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{sort_devices, DeviceRegistry};
use crate::error::RegistryError;
use crate::types::Device;

#[derive(Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    devices: HashMap<String, Device>,
    next_id: i32,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn upsert(&self, ip: &str, rtt: Option<i32>) -> Result<Device, RegistryError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.devices.get_mut(ip) {
            // Same contract as the sqlite DO UPDATE clause: the refresh
            // owns rtt and last_seen even when it carries no measurement.
            existing.rtt = rtt;
            existing.last_seen = Some(now);
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let device = Device {
            id: inner.next_id,
            ip: ip.to_string(),
            hostname: None,
            alias: None,
            rtt,
            last_seen: Some(now),
        };
        inner.devices.insert(ip.to_string(), device.clone());
        Ok(device)
    }

    async fn list(&self) -> Result<Vec<Device>, RegistryError> {
        let inner = self.inner.read().await;
        let mut devices: Vec<Device> = inner.devices.values().cloned().collect();
        sort_devices(&mut devices);
        Ok(devices)
    }
}
