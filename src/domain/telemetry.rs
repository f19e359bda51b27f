// Telemetry payload domain models, one shape per channel
use super::channel::{Channel, PerArm};
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    /// State of charge, percent (0-100)
    pub soc: f64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    /// Depth of discharge, percent
    pub dod: f64,
    pub working_hours: f64,
    pub drop_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub connected: bool,
    pub usb_speed: String,
    pub profiles_ok: bool,
    pub frames_ok: bool,
}

impl Default for CameraStatus {
    fn default() -> Self {
        Self {
            connected: false,
            usb_speed: UNKNOWN.to_string(),
            profiles_ok: false,
            frames_ok: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAndCameras {
    pub location: String,
    pub left: CameraStatus,
    pub right: CameraStatus,
}

impl Default for LocationAndCameras {
    fn default() -> Self {
        Self {
            location: UNKNOWN.to_string(),
            left: CameraStatus::default(),
            right: CameraStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointTelemetry {
    pub id: i64,
    pub position: f64,
    pub velocity: f64,
    pub effort: f64,
    pub motor_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmStatus {
    pub control_mode: String,
    pub arm_status_text: String,
    pub mode_feed: String,
    pub teach_mode: String,
    pub motion_status: String,
    pub trajectory_num: f64,
    pub error_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthFlag {
    Ok,
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointHealth {
    pub id: i64,
    pub limit: HealthFlag,
    pub comms: HealthFlag,
    pub motor: HealthFlag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanStatus {
    pub can0: bool,
    pub can1: bool,
}

/// Latest value of one channel; always replaced as a whole
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Battery(BatteryInfo),
    LocationAndCameras(LocationAndCameras),
    JointTelemetry(PerArm<Vec<JointTelemetry>>),
    ArmStatus(PerArm<ArmStatus>),
    JointHealth(PerArm<Vec<JointHealth>>),
    CanStatus(CanStatus),
}

impl ChannelValue {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelValue::Battery(_) => Channel::Battery,
            ChannelValue::LocationAndCameras(_) => Channel::LocationAndCameras,
            ChannelValue::JointTelemetry(_) => Channel::JointTelemetry,
            ChannelValue::ArmStatus(_) => Channel::ArmStatus,
            ChannelValue::JointHealth(_) => Channel::JointHealth,
            ChannelValue::CanStatus(_) => Channel::CanStatus,
        }
    }
}
