// Read-only telemetry snapshot and connection state
use super::channel::{Channel, PerArm};
use super::telemetry::{
    ArmStatus, BatteryInfo, CanStatus, ChannelValue, JointHealth, JointTelemetry,
    LocationAndCameras,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A channel's value together with the time (epoch ms) it was last set.
/// Keeping both in one entry means a timestamp never exists without a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntry {
    pub value: ChannelValue,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    channels: BTreeMap<Channel, ChannelEntry>,
}

impl TelemetrySnapshot {
    pub fn new(channels: BTreeMap<Channel, ChannelEntry>) -> Self {
        Self { channels }
    }

    pub fn get(&self, channel: Channel) -> Option<&ChannelEntry> {
        self.channels.get(&channel)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Channel, &ChannelEntry)> {
        self.channels.iter().map(|(channel, entry)| (*channel, entry))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Most recent update over all channels
    pub fn last_updated_at(&self) -> Option<i64> {
        self.channels.values().map(|e| e.updated_at).max()
    }

    /// Milliseconds since the most recent update, for "cached N minutes ago"
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        self.last_updated_at().map(|t| (now_ms - t).max(0))
    }

    pub fn battery(&self) -> Option<&BatteryInfo> {
        match self.get(Channel::Battery).map(|e| &e.value) {
            Some(ChannelValue::Battery(v)) => Some(v),
            _ => None,
        }
    }

    pub fn location_and_cameras(&self) -> Option<&LocationAndCameras> {
        match self.get(Channel::LocationAndCameras).map(|e| &e.value) {
            Some(ChannelValue::LocationAndCameras(v)) => Some(v),
            _ => None,
        }
    }

    pub fn joint_telemetry(&self) -> Option<&PerArm<Vec<JointTelemetry>>> {
        match self.get(Channel::JointTelemetry).map(|e| &e.value) {
            Some(ChannelValue::JointTelemetry(v)) => Some(v),
            _ => None,
        }
    }

    pub fn arm_status(&self) -> Option<&PerArm<ArmStatus>> {
        match self.get(Channel::ArmStatus).map(|e| &e.value) {
            Some(ChannelValue::ArmStatus(v)) => Some(v),
            _ => None,
        }
    }

    pub fn joint_health(&self) -> Option<&PerArm<Vec<JointHealth>>> {
        match self.get(Channel::JointHealth).map(|e| &e.value) {
            Some(ChannelValue::JointHealth(v)) => Some(v),
            _ => None,
        }
    }

    pub fn can_status(&self) -> Option<&CanStatus> {
        match self.get(Channel::CanStatus).map(|e| &e.value) {
            Some(ChannelValue::CanStatus(v)) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Erroring,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting…",
            ConnectionState::Connected => "Live",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Erroring => "Connection Error",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Text shown to the user. A failure stays visible through the whole
    /// retry loop until a connection opens again.
    pub fn status(&self, has_error: bool) -> &'static str {
        if has_error && !self.is_live() && *self != ConnectionState::Idle {
            ConnectionState::Erroring.label()
        } else {
            self.label()
        }
    }
}
