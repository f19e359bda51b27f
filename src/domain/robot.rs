// Robot metadata domain model
use super::telemetry::BatteryInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotInfo {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub minimum_battery_charge: Option<f64>,
}

impl RobotInfo {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Robot {}", self.id))
    }
}

/// Low-battery alert: state of charge strictly below the robot's configured minimum
pub fn is_battery_low(robot: &RobotInfo, battery: &BatteryInfo) -> bool {
    match robot.minimum_battery_charge {
        Some(minimum) => battery.soc < minimum,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot(minimum: Option<f64>) -> RobotInfo {
        RobotInfo {
            id: 7,
            name: None,
            serial_number: None,
            minimum_battery_charge: minimum,
        }
    }

    #[test]
    fn test_low_battery() {
        let battery = BatteryInfo {
            soc: 19.5,
            ..BatteryInfo::default()
        };

        assert!(is_battery_low(&robot(Some(20.0)), &battery));
        assert!(!is_battery_low(&robot(Some(19.5)), &battery));
        assert!(!is_battery_low(&robot(None), &battery));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(robot(None).display_name(), "Robot 7");

        let named = RobotInfo {
            name: Some("Picker".to_string()),
            ..robot(None)
        };
        assert_eq!(named.display_name(), "Picker");
    }
}
