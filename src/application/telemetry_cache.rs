// Telemetry cache - latest value and timestamp per channel for one robot
use crate::domain::channel::Channel;
use crate::domain::snapshot::{ChannelEntry, TelemetrySnapshot};
use crate::domain::telemetry::ChannelValue;
use std::collections::BTreeMap;

/// Pure, synchronous store. Callers sharing it across tasks wrap it in a mutex.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    channels: BTreeMap<Channel, ChannelEntry>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelValue> {
        self.channels.get(&channel).map(|e| &e.value)
    }

    pub fn updated_at(&self, channel: Channel) -> Option<i64> {
        self.channels.get(&channel).map(|e| e.updated_at)
    }

    /// Replace the channel named by `value` wholesale; other channels are untouched
    pub fn set(&mut self, value: ChannelValue, at_ms: i64) -> Channel {
        let channel = value.channel();
        self.channels.insert(
            channel,
            ChannelEntry {
                value,
                updated_at: at_ms,
            },
        );
        channel
    }

    /// Returns true if the channel held a value
    pub fn clear(&mut self, channel: Channel) -> bool {
        self.channels.remove(&channel).is_some()
    }

    pub fn channels_with_values(&self) -> Vec<(Channel, i64)> {
        self.channels
            .iter()
            .map(|(channel, entry)| (*channel, entry.updated_at))
            .collect()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::new(self.channels.clone())
    }

    /// Replace the whole cache with a previously captured snapshot
    pub fn seed(&mut self, snapshot: &TelemetrySnapshot) {
        self.channels = snapshot
            .entries()
            .map(|(channel, entry)| (channel, entry.clone()))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{BatteryInfo, CanStatus};

    #[test]
    fn test_set_replaces_only_its_channel() {
        let mut cache = TelemetryCache::new();
        cache.set(ChannelValue::CanStatus(CanStatus { can0: true, can1: true }), 10);
        cache.set(
            ChannelValue::Battery(BatteryInfo {
                soc: 50.0,
                ..BatteryInfo::default()
            }),
            20,
        );
        cache.set(
            ChannelValue::Battery(BatteryInfo {
                soc: 49.0,
                ..BatteryInfo::default()
            }),
            30,
        );

        assert_eq!(cache.updated_at(Channel::CanStatus), Some(10));
        assert_eq!(cache.updated_at(Channel::Battery), Some(30));
        assert_eq!(cache.snapshot().battery().map(|b| b.soc), Some(49.0));
    }

    #[test]
    fn test_clear_drops_value_and_timestamp() {
        let mut cache = TelemetryCache::new();
        cache.set(ChannelValue::CanStatus(CanStatus::default()), 10);

        assert!(cache.clear(Channel::CanStatus));
        assert!(!cache.clear(Channel::CanStatus));
        assert!(cache.get(Channel::CanStatus).is_none());
        assert!(cache.updated_at(Channel::CanStatus).is_none());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut cache = TelemetryCache::new();
        cache.set(ChannelValue::CanStatus(CanStatus::default()), 10);
        let snapshot = cache.snapshot();

        cache.clear(Channel::CanStatus);

        assert!(snapshot.can_status().is_some());
        assert!(cache.snapshot().is_empty());
    }
}
