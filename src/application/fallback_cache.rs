// Durable fallback cache - mirrors the latest telemetry snapshot to persistent storage
use crate::domain::channel::{Channel, PerArm};
use crate::domain::snapshot::{ChannelEntry, TelemetrySnapshot};
use crate::domain::telemetry::{
    ArmStatus, BatteryInfo, CanStatus, ChannelValue, JointHealth, JointTelemetry,
    LocationAndCameras,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode stored snapshot: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// String-keyed persistent storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub fn storage_key(robot_id: &str) -> String {
    format!("robot_{}_last_data", robot_id)
}

/// Stored form: every channel's payload (null when absent) plus one wall-clock stamp
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FallbackRecord {
    battery: Option<BatteryInfo>,
    location_and_cameras: Option<LocationAndCameras>,
    joint_telemetry: Option<PerArm<Vec<JointTelemetry>>>,
    arm_status: Option<PerArm<ArmStatus>>,
    joint_health: Option<PerArm<Vec<JointHealth>>>,
    can_status: Option<CanStatus>,
    last_updated: i64,
}

impl FallbackRecord {
    fn capture(snapshot: &TelemetrySnapshot, now_ms: i64) -> Self {
        Self {
            battery: snapshot.battery().cloned(),
            location_and_cameras: snapshot.location_and_cameras().cloned(),
            joint_telemetry: snapshot.joint_telemetry().cloned(),
            arm_status: snapshot.arm_status().cloned(),
            joint_health: snapshot.joint_health().cloned(),
            can_status: snapshot.can_status().copied(),
            last_updated: now_ms,
        }
    }

    /// Every restored channel is stamped with the record's `lastUpdated`
    fn into_snapshot(self) -> TelemetrySnapshot {
        let updated_at = self.last_updated;
        let values = [
            self.battery.map(ChannelValue::Battery),
            self.location_and_cameras.map(ChannelValue::LocationAndCameras),
            self.joint_telemetry.map(ChannelValue::JointTelemetry),
            self.arm_status.map(ChannelValue::ArmStatus),
            self.joint_health.map(ChannelValue::JointHealth),
            self.can_status.map(ChannelValue::CanStatus),
        ];

        let channels: BTreeMap<Channel, ChannelEntry> = values
            .into_iter()
            .flatten()
            .map(|value| {
                (
                    value.channel(),
                    ChannelEntry { value, updated_at },
                )
            })
            .collect();

        TelemetrySnapshot::new(channels)
    }
}

#[derive(Clone)]
pub struct DurableFallbackCache {
    store: Arc<dyn KeyValueStore>,
}

impl DurableFallbackCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite the stored snapshot for `robot_id`. Failures are logged, never returned.
    pub async fn save(&self, robot_id: &str, snapshot: &TelemetrySnapshot, now_ms: i64) {
        if let Err(e) = self.try_save(robot_id, snapshot, now_ms).await {
            tracing::warn!(robot_id = %robot_id, error = %e, "Failed to persist telemetry snapshot");
        }
    }

    /// Last persisted snapshot, if one exists and can be read
    pub async fn load(&self, robot_id: &str) -> Option<TelemetrySnapshot> {
        match self.try_load(robot_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(robot_id = %robot_id, error = %e, "Failed to load cached telemetry snapshot");
                None
            }
        }
    }

    async fn try_save(
        &self,
        robot_id: &str,
        snapshot: &TelemetrySnapshot,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        let record = FallbackRecord::capture(snapshot, now_ms);
        let json = serde_json::to_string(&record)?;
        self.store.set(&storage_key(robot_id), &json).await
    }

    async fn try_load(&self, robot_id: &str) -> Result<Option<TelemetrySnapshot>, StorageError> {
        let Some(json) = self.store.get(&storage_key(robot_id)).await? else {
            return Ok(None);
        };
        let record: FallbackRecord = serde_json::from_str(&json)?;
        tracing::debug!(robot_id = %robot_id, last_updated = record.last_updated, "Loaded cached telemetry");
        Ok(Some(record.into_snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_cache::TelemetryCache;
    use crate::domain::channel::ArmSide;
    use crate::infrastructure::key_value_store::MemoryStore;

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn populated_cache() -> TelemetryCache {
        let mut cache = TelemetryCache::new();
        cache.set(
            ChannelValue::Battery(BatteryInfo {
                soc: 73.0,
                voltage: 48.2,
                ..BatteryInfo::default()
            }),
            1_000,
        );
        cache.set(
            ChannelValue::JointTelemetry(PerArm::default().with_side(
                ArmSide::Left,
                vec![JointTelemetry {
                    id: 1,
                    position: 0.5,
                    ..JointTelemetry::default()
                }],
            )),
            2_000,
        );
        cache.set(ChannelValue::CanStatus(CanStatus { can0: true, can1: false }), 3_000);
        cache
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let fallback = DurableFallbackCache::new(Arc::new(MemoryStore::new()));
        let original = populated_cache().snapshot();

        fallback.save("7", &original, 5_000).await;
        let restored = fallback.load("7").await.unwrap();

        for channel in Channel::ALL {
            assert_eq!(
                original.get(channel).map(|e| &e.value),
                restored.get(channel).map(|e| &e.value),
                "channel {channel}"
            );
        }
        assert_eq!(restored.last_updated_at(), Some(5_000));
    }

    #[tokio::test]
    async fn test_stored_layout() {
        let store = Arc::new(MemoryStore::new());
        let fallback = DurableFallbackCache::new(store.clone());

        fallback.save("42", &populated_cache().snapshot(), 9_000).await;

        let json = store.get("robot_42_last_data").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lastUpdated"], 9_000);
        assert_eq!(value["battery"]["soc"], 73.0);
        assert!(value["armStatus"].is_null());
    }

    #[tokio::test]
    async fn test_missing_entry_loads_nothing() {
        let fallback = DurableFallbackCache::new(Arc::new(MemoryStore::new()));
        assert!(fallback.load("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set(&storage_key("7"), "{not json").await.unwrap();

        let fallback = DurableFallbackCache::new(store);
        assert!(fallback.load("7").await.is_none());
    }

    #[tokio::test]
    async fn test_storage_failures_are_swallowed() {
        let fallback = DurableFallbackCache::new(Arc::new(BrokenStore));

        fallback.save("7", &populated_cache().snapshot(), 1).await;
        assert!(fallback.load("7").await.is_none());
    }
}
