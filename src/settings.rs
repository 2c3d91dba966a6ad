use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::lenient;
use crate::time_model::SpeedProfile;

pub const DEFAULT_START_TIME: &str = "08:00";

/// Planner settings: active speed profile, start of day, distance method and
/// safety margin.
///
/// Every field has its own serde default so that a partial object restored
/// from an older save fills in what it is missing. A field stored as `null`
/// (an emptied number input) or with an unknown name also takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub activity_mode: ActivityMode,

    /// Vertical ascent rate, m/h (default: 300)
    #[serde(default = "default_ascent_speed", deserialize_with = "ascent_speed_or_default")]
    pub ascent_speed: f64,

    /// Vertical descent rate, m/h (default: 400)
    #[serde(default = "default_descent_speed", deserialize_with = "descent_speed_or_default")]
    pub descent_speed: f64,

    /// Horizontal rate, m/h (default: 5000)
    #[serde(default = "default_flat_speed", deserialize_with = "flat_speed_or_default")]
    pub flat_speed: f64,

    /// Departure time, "HH:MM" (default: "08:00")
    #[serde(default = "default_start_time", deserialize_with = "start_time_or_default")]
    pub start_time: String,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub distance_calculation_method: DistanceMethod,

    /// Extra planning margin on total time, 0-100 (default: 0)
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub safety_time_percentage: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_activity(ActivityMode::default())
    }
}

impl Settings {
    pub fn for_activity(mode: ActivityMode) -> Self {
        let speeds = mode.speeds();
        Self {
            activity_mode: mode,
            ascent_speed: speeds.ascent_speed,
            descent_speed: speeds.descent_speed,
            flat_speed: speeds.flat_speed,
            start_time: default_start_time(),
            distance_calculation_method: DistanceMethod::default(),
            safety_time_percentage: 0.0,
        }
    }

    /// Switch activity mode, replacing the three speeds with the mode's table.
    /// Start time, distance method and safety margin are kept.
    pub fn with_activity_mode(&self, mode: ActivityMode) -> Self {
        let speeds = mode.speeds();
        Self {
            activity_mode: mode,
            ascent_speed: speeds.ascent_speed,
            descent_speed: speeds.descent_speed,
            flat_speed: speeds.flat_speed,
            ..self.clone()
        }
    }

    pub fn speeds(&self) -> SpeedProfile {
        SpeedProfile {
            ascent_speed: self.ascent_speed,
            descent_speed: self.descent_speed,
            flat_speed: self.flat_speed,
        }
    }

    /// Problems the calculations will paper over. Nothing here is fatal;
    /// callers surface these to the user.
    pub fn validate(&self) -> Vec<SettingsWarning> {
        let mut warnings: Vec<SettingsWarning> = self
            .speeds()
            .invalid_axes()
            .into_iter()
            .map(SettingsWarning::InvalidSpeed)
            .collect();

        if parse_start_time(&self.start_time).is_none() {
            warnings.push(SettingsWarning::InvalidStartTime(self.start_time.clone()));
        }
        let pct = self.safety_time_percentage;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            warnings.push(SettingsWarning::SafetyPercentageOutOfRange(pct));
        }

        warnings
    }
}

/// Resolve the settings a route actually runs with: its own override when
/// present, the application-wide defaults otherwise.
pub fn effective(route_settings: Option<&Settings>, defaults: &Settings) -> Settings {
    route_settings.unwrap_or(defaults).clone()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsWarning {
    InvalidSpeed(&'static str),
    InvalidStartTime(String),
    SafetyPercentageOutOfRange(f64),
}

impl std::fmt::Display for SettingsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSpeed(axis) => {
                write!(f, "{axis} must be a positive number; using the default")
            }
            Self::InvalidStartTime(value) => write!(
                f,
                "start time '{value}' is not HH:MM; using {DEFAULT_START_TIME}"
            ),
            Self::SafetyPercentageOutOfRange(value) => {
                write!(f, "safety percentage {value} is outside 0-100; clamping")
            }
        }
    }
}

/// Parse "HH:MM" (also accepts "H:MM" and "HH:MM:SS").
pub fn parse_start_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityMode {
    #[default]
    Hiking,
    Backpacking,
    TrailRunning,
}

impl ActivityMode {
    pub const ALL: [ActivityMode; 3] = [Self::Hiking, Self::Backpacking, Self::TrailRunning];

    /// Default speed table for the mode.
    pub fn speeds(self) -> SpeedProfile {
        match self {
            Self::Hiking => SpeedProfile::default(),
            Self::Backpacking => SpeedProfile {
                ascent_speed: 250.0,
                descent_speed: 350.0,
                flat_speed: 4000.0,
            },
            Self::TrailRunning => SpeedProfile {
                ascent_speed: 600.0,
                descent_speed: 900.0,
                flat_speed: 9000.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMethod {
    /// Follow the recorded track polyline between waypoints.
    #[default]
    #[serde(rename = "track")]
    Track,
    /// Straight geodesic line from one GPX waypoint to the next.
    #[serde(rename = "waypoint-to-waypoint", alias = "waypoint")]
    WaypointToWaypoint,
}

fn default_ascent_speed() -> f64 {
    crate::time_model::DEFAULT_ASCENT_SPEED
}

fn default_descent_speed() -> f64 {
    crate::time_model::DEFAULT_DESCENT_SPEED
}

fn default_flat_speed() -> f64 {
    crate::time_model::DEFAULT_FLAT_SPEED
}

fn default_start_time() -> String {
    DEFAULT_START_TIME.to_string()
}

fn ascent_speed_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient::or_else(d, default_ascent_speed)
}

fn descent_speed_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient::or_else(d, default_descent_speed)
}

fn flat_speed_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    lenient::or_else(d, default_flat_speed)
}

fn start_time_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient::or_else(d, default_start_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.activity_mode, ActivityMode::Hiking);
        assert_eq!(s.speeds(), SpeedProfile::default());
        assert_eq!(s.start_time, "08:00");
        assert_eq!(s.distance_calculation_method, DistanceMethod::Track);
        assert_eq!(s.safety_time_percentage, 0.0);
        assert!(s.validate().is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"ascentSpeed": 350, "startTime": "06:30"}"#).unwrap();
        assert_eq!(s.ascent_speed, 350.0);
        assert_eq!(s.descent_speed, 400.0);
        assert_eq!(s.flat_speed, 5000.0);
        assert_eq!(s.start_time, "06:30");
        assert_eq!(s.distance_calculation_method, DistanceMethod::Track);
    }

    #[test]
    fn test_nulls_and_unknown_names_take_defaults() {
        let s: Settings = serde_json::from_str(
            r#"{"activityMode": "skiTouring", "ascentSpeed": null, "descentSpeed": 380,
                "flatSpeed": null, "startTime": null, "safetyTimePercentage": null,
                "distanceCalculationMethod": "as-the-crow-flies"}"#,
        )
        .unwrap();
        assert_eq!(s.activity_mode, ActivityMode::Hiking);
        assert_eq!(s.ascent_speed, 300.0);
        assert_eq!(s.descent_speed, 380.0);
        assert_eq!(s.flat_speed, 5000.0);
        assert_eq!(s.start_time, "08:00");
        assert_eq!(s.safety_time_percentage, 0.0);
        assert_eq!(s.distance_calculation_method, DistanceMethod::Track);
    }

    #[test]
    fn test_method_names() {
        let s: Settings =
            serde_json::from_str(r#"{"distanceCalculationMethod": "waypoint"}"#).unwrap();
        assert_eq!(s.distance_calculation_method, DistanceMethod::WaypointToWaypoint);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["distanceCalculationMethod"], "waypoint-to-waypoint");
        assert_eq!(json["activityMode"], "hiking");
    }

    #[test]
    fn test_effective_prefers_route_override() {
        let defaults = Settings::default();
        let mut custom = Settings::default();
        custom.flat_speed = 4200.0;
        assert_eq!(effective(None, &defaults), defaults);
        assert_eq!(effective(Some(&custom), &defaults).flat_speed, 4200.0);
    }

    #[test]
    fn test_with_activity_mode_keeps_other_fields() {
        let mut s = Settings::default();
        s.start_time = "05:15".to_string();
        s.safety_time_percentage = 20.0;
        let run = s.with_activity_mode(ActivityMode::TrailRunning);
        assert_eq!(run.speeds(), ActivityMode::TrailRunning.speeds());
        assert_eq!(run.start_time, "05:15");
        assert_eq!(run.safety_time_percentage, 20.0);
    }

    #[test]
    fn test_validate_reports_problems() {
        let s = Settings {
            flat_speed: 0.0,
            start_time: "late".to_string(),
            safety_time_percentage: 150.0,
            ..Settings::default()
        };
        let warnings = s.validate();
        assert_eq!(
            warnings,
            vec![
                SettingsWarning::InvalidSpeed("flatSpeed"),
                SettingsWarning::InvalidStartTime("late".to_string()),
                SettingsWarning::SafetyPercentageOutOfRange(150.0),
            ]
        );
    }

    #[test]
    fn test_parse_start_time() {
        assert!(parse_start_time("08:00").is_some());
        assert!(parse_start_time("7:05").is_some());
        assert!(parse_start_time("23:59:30").is_some());
        assert!(parse_start_time("24:00").is_none());
        assert!(parse_start_time("").is_none());
    }
}
