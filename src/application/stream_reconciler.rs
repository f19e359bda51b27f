// Stream reconciler - folds tagged event-stream messages into the telemetry cache
use crate::application::telemetry_cache::TelemetryCache;
use crate::domain::channel::{ArmSide, Channel, PerArm};
use crate::domain::telemetry::{
    ArmStatus, BatteryInfo, CameraStatus, CanStatus, ChannelValue, HealthFlag, JointHealth,
    JointTelemetry, LocationAndCameras, UNKNOWN,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no event tag")]
    MissingEvent,
    #[error("`{0}` data is not an object")]
    DataNotObject(String),
    #[error("`{0}` does not name a valid arm side")]
    MissingArm(String),
    #[error("`{0}` has no joints list")]
    MissingJoints(String),
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Maps an event tag to the channel it updates
pub fn channel_for_event(tag: &str) -> Option<Channel> {
    match tag {
        "battery_information" => Some(Channel::Battery),
        "camera_status_update" => Some(Channel::LocationAndCameras),
        "robot_joint_telemetry" => Some(Channel::JointTelemetry),
        "robot_arm_status" => Some(Channel::ArmStatus),
        "robot_joint_status" => Some(Channel::JointHealth),
        "can_status" => Some(Channel::CanStatus),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct StreamReconciler {
    robot_id: String,
}

impl StreamReconciler {
    pub fn new(robot_id: impl Into<String>) -> Self {
        Self {
            robot_id: robot_id.into(),
        }
    }

    /// Fold one raw frame into `cache`. Malformed frames and unknown tags leave
    /// the cache untouched. Returns the channel that was updated, if any.
    pub fn on_message(&self, cache: &mut TelemetryCache, raw: &[u8], now_ms: i64) -> Option<Channel> {
        match self.decode(cache, raw) {
            Ok(Some(value)) => Some(cache.set(value, now_ms)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(robot_id = %self.robot_id, error = %e, "Dropping malformed telemetry message");
                None
            }
        }
    }

    /// Build the next value of the addressed channel, merging with the cached one where the
    /// channel is only partially updated by an event
    fn decode(&self, cache: &TelemetryCache, raw: &[u8]) -> Result<Option<ChannelValue>, MessageError> {
        let raw: RawEvent = serde_json::from_slice(raw)?;
        let tag = raw.event.ok_or(MessageError::MissingEvent)?;

        let Some(channel) = channel_for_event(&tag) else {
            tracing::trace!(robot_id = %self.robot_id, event = %tag, "Ignoring unrecognised event");
            return Ok(None);
        };

        let data = raw
            .data
            .as_object()
            .ok_or_else(|| MessageError::DataNotObject(tag.clone()))?;

        let value = match channel {
            Channel::Battery => ChannelValue::Battery(battery(data)),
            Channel::LocationAndCameras => {
                let previous = match cache.get(channel) {
                    Some(ChannelValue::LocationAndCameras(prev)) => Some(prev),
                    _ => None,
                };
                ChannelValue::LocationAndCameras(location_and_cameras(data, previous))
            }
            Channel::JointTelemetry => {
                let side = arm_side(data, &tag)?;
                let joints: Vec<_> = joints(data, &tag)?.map(joint_telemetry).collect();
                let previous = match cache.get(channel) {
                    Some(ChannelValue::JointTelemetry(prev)) => prev.clone(),
                    _ => PerArm::default(),
                };
                ChannelValue::JointTelemetry(previous.with_side(side, joints))
            }
            Channel::ArmStatus => {
                let side = arm_side(data, &tag)?;
                let previous = match cache.get(channel) {
                    Some(ChannelValue::ArmStatus(prev)) => prev.clone(),
                    _ => PerArm::default(),
                };
                ChannelValue::ArmStatus(previous.with_side(side, arm_status(data)))
            }
            Channel::JointHealth => {
                let side = arm_side(data, &tag)?;
                let joints: Vec<_> = joints(data, &tag)?.map(joint_health).collect();
                let previous = match cache.get(channel) {
                    Some(ChannelValue::JointHealth(prev)) => prev.clone(),
                    _ => PerArm::default(),
                };
                ChannelValue::JointHealth(previous.with_side(side, joints))
            }
            Channel::CanStatus => ChannelValue::CanStatus(CanStatus {
                can0: flag(data, "can0").unwrap_or(false),
                can1: flag(data, "can1").unwrap_or(false),
            }),
        };

        Ok(Some(value))
    }
}

fn battery(data: &Map<String, Value>) -> BatteryInfo {
    BatteryInfo {
        soc: number(data, "soc").unwrap_or(0.0),
        voltage: number(data, "voltage").unwrap_or(0.0),
        current: number(data, "current").unwrap_or(0.0),
        power: number(data, "power").unwrap_or(0.0),
        dod: number(data, "dod").unwrap_or(0.0),
        working_hours: number(data, "working_hours").unwrap_or(0.0),
        drop_percentage: number(data, "drop_percentage").unwrap_or(0.0),
    }
}

fn location_and_cameras(data: &Map<String, Value>, previous: Option<&LocationAndCameras>) -> LocationAndCameras {
    let location = text(data, "location")
        .or_else(|| previous.map(|p| p.location.clone()))
        .unwrap_or_else(|| UNKNOWN.to_string());

    LocationAndCameras {
        location,
        left: camera(data.get("left"), previous.map(|p| &p.left)),
        right: camera(data.get("right"), previous.map(|p| &p.right)),
    }
}

/// Unspecified fields keep the previous value for the same camera
fn camera(update: Option<&Value>, previous: Option<&CameraStatus>) -> CameraStatus {
    let base = previous.cloned().unwrap_or_default();
    let Some(Value::Object(fields)) = update else {
        return base;
    };

    CameraStatus {
        connected: flag(fields, "connected").unwrap_or(base.connected),
        usb_speed: text(fields, "usb_speed").unwrap_or(base.usb_speed),
        profiles_ok: flag(fields, "profiles_ok").unwrap_or(base.profiles_ok),
        frames_ok: flag(fields, "frames_ok").unwrap_or(base.frames_ok),
    }
}

fn joint_telemetry(joint: &Map<String, Value>) -> JointTelemetry {
    JointTelemetry {
        id: integer(joint, "id"),
        position: number(joint, "position").unwrap_or(0.0),
        velocity: number(joint, "velocity").unwrap_or(0.0),
        effort: number(joint, "effort").unwrap_or(0.0),
        motor_temperature: number(joint, "motor_temp").unwrap_or(0.0),
    }
}

fn arm_status(data: &Map<String, Value>) -> ArmStatus {
    let text_or_unknown = |key: &str| text(data, key).unwrap_or_else(|| UNKNOWN.to_string());

    ArmStatus {
        control_mode: text_or_unknown("control_mode"),
        arm_status_text: text_or_unknown("arm_status"),
        mode_feed: text_or_unknown("mode_feed"),
        teach_mode: text_or_unknown("teach_mode"),
        motion_status: text_or_unknown("motion_status"),
        trajectory_num: number(data, "trajectory_num").unwrap_or(0.0),
        error_code: text_or_unknown("error_code"),
    }
}

fn joint_health(joint: &Map<String, Value>) -> JointHealth {
    JointHealth {
        id: integer(joint, "id"),
        limit: health(joint.get("limit").or_else(|| joint.get("limit_ok"))),
        comms: health(joint.get("comms").or_else(|| joint.get("comms_ok"))),
        motor: health(joint.get("motor").or_else(|| joint.get("motor_ok"))),
    }
}

fn arm_side(data: &Map<String, Value>, tag: &str) -> Result<ArmSide, MessageError> {
    data.get("arm")
        .and_then(Value::as_str)
        .and_then(ArmSide::parse)
        .ok_or_else(|| MessageError::MissingArm(tag.to_string()))
}

fn joints<'a>(
    data: &'a Map<String, Value>,
    tag: &str,
) -> Result<impl Iterator<Item = &'a Map<String, Value>>, MessageError> {
    let list = data
        .get("joints")
        .and_then(Value::as_array)
        .ok_or_else(|| MessageError::MissingJoints(tag.to_string()))?;

    Ok(list.iter().filter_map(Value::as_object))
}

fn number(data: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match data.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn integer(data: &Map<String, Value>, key: &str) -> i64 {
    number(data, key).map(|v| v as i64).unwrap_or(0)
}

fn flag(data: &Map<String, Value>, key: &str) -> Option<bool> {
    match data.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn health(value: Option<&Value>) -> HealthFlag {
    match value {
        Some(Value::Bool(true)) => HealthFlag::Ok,
        Some(Value::Bool(false)) => HealthFlag::Error,
        Some(Value::String(s)) => match s.trim().to_ascii_uppercase().as_str() {
            "OK" | "TRUE" => HealthFlag::Ok,
            "ERROR" | "ERR" | "FALSE" => HealthFlag::Error,
            _ => HealthFlag::Unknown,
        },
        _ => HealthFlag::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(cache: &mut TelemetryCache, message: Value, now_ms: i64) -> Option<Channel> {
        let raw = serde_json::to_vec(&message).unwrap();
        StreamReconciler::new("7").on_message(cache, &raw, now_ms)
    }

    #[test]
    fn test_battery_information() {
        let mut cache = TelemetryCache::new();
        let updated = feed(
            &mut cache,
            json!({"event": "battery_information", "data": {
                "soc": 73, "voltage": 48.2, "current": 1.1, "power": 52.8,
                "dod": 12, "working_hours": 5.5, "drop_percentage": 3
            }}),
            1_000,
        );

        assert_eq!(updated, Some(Channel::Battery));
        let snapshot = cache.snapshot();
        let battery = snapshot.battery().unwrap();
        assert_eq!(battery.soc, 73.0);
        assert_eq!(battery.voltage, 48.2);
        assert_eq!(battery.current, 1.1);
        assert_eq!(battery.power, 52.8);
        assert_eq!(battery.dod, 12.0);
        assert_eq!(battery.working_hours, 5.5);
        assert_eq!(battery.drop_percentage, 3.0);
        assert_eq!(cache.updated_at(Channel::Battery), Some(1_000));
    }

    #[test]
    fn test_battery_coerces_missing_and_garbled_fields() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "battery_information", "data": {"soc": "64.5", "voltage": "n/a", "power": null}}),
            1,
        );

        let battery = cache.snapshot().battery().cloned().unwrap();
        assert_eq!(battery.soc, 64.5);
        assert_eq!(battery.voltage, 0.0);
        assert_eq!(battery.power, 0.0);
        assert_eq!(battery.working_hours, 0.0);
    }

    #[test]
    fn test_joint_telemetry_sides_are_independent() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "robot_joint_telemetry", "data": {"arm": "left", "joints": [
                {"id": 1, "position": 0.5, "velocity": 0, "effort": 0, "motor_temp": 30}
            ]}}),
            1,
        );
        feed(
            &mut cache,
            json!({"event": "robot_joint_telemetry", "data": {"arm": "right", "joints": [
                {"id": 1, "position": -0.5, "velocity": 0.1, "effort": 2, "motor_temp": 31},
                {"id": 2, "position": 1.0, "velocity": 0, "effort": 0, "motor_temp": 29}
            ]}}),
            2,
        );

        let snapshot = cache.snapshot();
        let joints = snapshot.joint_telemetry().unwrap();
        let left = joints.left.as_ref().unwrap();
        let right = joints.right.as_ref().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].position, 0.5);
        assert_eq!(left[0].motor_temperature, 30.0);
        assert_eq!(right.len(), 2);
        assert_eq!(right[1].id, 2);
    }

    #[test]
    fn test_joint_list_replaced_wholesale() {
        let mut cache = TelemetryCache::new();
        let two = json!({"event": "robot_joint_telemetry", "data": {"arm": "left", "joints": [{"id": 1}, {"id": 2}]}});
        let one = json!({"event": "robot_joint_telemetry", "data": {"arm": "left", "joints": [{"id": 3}]}});
        feed(&mut cache, two, 1);
        feed(&mut cache, one, 2);

        let snapshot = cache.snapshot();
        let left = snapshot.joint_telemetry().unwrap().left.clone().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, 3);
    }

    #[test]
    fn test_arm_status_replaces_named_side() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "robot_arm_status", "data": {
                "arm": "right", "control_mode": 1, "arm_status": "normal",
                "mode_feed": "auto", "teach_mode": "off", "motion_status": "idle",
                "trajectory_num": 4, "error_code": "0"
            }}),
            1,
        );
        feed(&mut cache, json!({"event": "robot_arm_status", "data": {"arm": "left"}}), 2);

        let snapshot = cache.snapshot();
        let status = snapshot.arm_status().unwrap();
        let right = status.right.as_ref().unwrap();
        assert_eq!(right.control_mode, "1");
        assert_eq!(right.arm_status_text, "normal");
        assert_eq!(right.trajectory_num, 4.0);
        let left = status.left.as_ref().unwrap();
        assert_eq!(left.control_mode, UNKNOWN);
        assert_eq!(left.trajectory_num, 0.0);
    }

    #[test]
    fn test_joint_health_tri_state() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "robot_joint_status", "data": {"arm": "left", "joints": [
                {"id": 1, "limit": "OK", "comms": "ERROR", "motor": "??"},
                {"id": 2, "limit_ok": true, "comms_ok": false}
            ]}}),
            1,
        );

        let snapshot = cache.snapshot();
        let left = snapshot.joint_health().unwrap().left.clone().unwrap();
        assert_eq!(left[0].limit, HealthFlag::Ok);
        assert_eq!(left[0].comms, HealthFlag::Error);
        assert_eq!(left[0].motor, HealthFlag::Unknown);
        assert_eq!(left[1].limit, HealthFlag::Ok);
        assert_eq!(left[1].comms, HealthFlag::Error);
        assert_eq!(left[1].motor, HealthFlag::Unknown);
    }

    #[test]
    fn test_camera_partial_update_keeps_previous_fields() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "camera_status_update", "data": {
                "location": "Bay 3",
                "left": {"connected": true, "usb_speed": "3.2", "profiles_ok": true, "frames_ok": true},
                "right": {"connected": true, "usb_speed": "2.0", "profiles_ok": true, "frames_ok": false}
            }}),
            1,
        );
        feed(
            &mut cache,
            json!({"event": "camera_status_update", "data": {"left": {"frames_ok": false}}}),
            2,
        );

        let snapshot = cache.snapshot();
        let cameras = snapshot.location_and_cameras().unwrap();
        assert_eq!(cameras.location, "Bay 3");
        assert!(cameras.left.connected);
        assert_eq!(cameras.left.usb_speed, "3.2");
        assert!(!cameras.left.frames_ok);
        assert_eq!(cameras.right.usb_speed, "2.0");
        assert!(!cameras.right.frames_ok);
    }

    #[test]
    fn test_camera_defaults_without_previous_value() {
        let mut cache = TelemetryCache::new();
        feed(
            &mut cache,
            json!({"event": "camera_status_update", "data": {"right": {"connected": true}}}),
            1,
        );

        let cameras = cache.snapshot().location_and_cameras().cloned().unwrap();
        assert_eq!(cameras.location, UNKNOWN);
        assert_eq!(cameras.left, CameraStatus::default());
        assert!(cameras.right.connected);
        assert_eq!(cameras.right.usb_speed, UNKNOWN);
    }

    #[test]
    fn test_can_status() {
        let mut cache = TelemetryCache::new();
        feed(&mut cache, json!({"event": "can_status", "data": {"can0": true}}), 1);

        assert_eq!(
            cache.snapshot().can_status(),
            Some(&CanStatus {
                can0: true,
                can1: false
            })
        );
    }

    #[test]
    fn test_noise_has_no_effect() {
        let mut cache = TelemetryCache::new();
        feed(&mut cache, json!({"event": "can_status", "data": {"can0": true, "can1": true}}), 5);
        let before = cache.snapshot();

        let reconciler = StreamReconciler::new("7");
        let noise: [&[u8]; 6] = [
            b"not json",
            b"{\"data\": {\"can0\": false}}",
            b"{\"event\": \"can_status\", \"data\": 3}",
            b"{\"event\": \"robot_arm_status\", \"data\": {\"arm\": \"middle\"}}",
            b"{\"event\": \"robot_joint_telemetry\", \"data\": {\"arm\": \"left\"}}",
            b"{\"event\": \"calibration_progress\", \"data\": {}}",
        ];
        for raw in noise {
            assert_eq!(reconciler.on_message(&mut cache, raw, 99), None);
        }

        assert_eq!(cache.snapshot(), before);
    }

    #[test]
    fn test_unrelated_channels_commute() {
        let battery = json!({"event": "battery_information", "data": {"soc": 40}});
        let can = json!({"event": "can_status", "data": {"can1": true}});

        let mut first = TelemetryCache::new();
        feed(&mut first, battery.clone(), 10);
        feed(&mut first, can.clone(), 20);

        let mut second = TelemetryCache::new();
        feed(&mut second, can, 20);
        feed(&mut second, battery, 10);

        assert_eq!(first.snapshot(), second.snapshot());
    }
}
