// Channel model - independently updatable slices of a robot's live state
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Battery,
    LocationAndCameras,
    JointTelemetry,
    ArmStatus,
    JointHealth,
    CanStatus,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Battery,
        Channel::LocationAndCameras,
        Channel::JointTelemetry,
        Channel::ArmStatus,
        Channel::JointHealth,
        Channel::CanStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Battery => "battery",
            Channel::LocationAndCameras => "location_and_cameras",
            Channel::JointTelemetry => "joint_telemetry",
            Channel::ArmStatus => "arm_status",
            Channel::JointHealth => "joint_health",
            Channel::CanStatus => "can_status",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    /// Parse the `arm` field of an event ("left" / "right", any case)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(ArmSide::Left),
            "right" => Some(ArmSide::Right),
            _ => None,
        }
    }
}

/// One value per arm side; each side is replaced independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerArm<T> {
    pub left: Option<T>,
    pub right: Option<T>,
}

impl<T> Default for PerArm<T> {
    fn default() -> Self {
        Self {
            left: None,
            right: None,
        }
    }
}

impl<T: Clone> PerArm<T> {
    /// Copy of `self` with `side` replaced and the other side untouched
    pub fn with_side(&self, side: ArmSide, value: T) -> Self {
        let mut next = self.clone();
        match side {
            ArmSide::Left => next.left = Some(value),
            ArmSide::Right => next.right = Some(value),
        }
        next
    }
}
