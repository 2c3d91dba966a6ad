use chrono::{NaiveTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::route::Waypoint;
use crate::settings::{Settings, parse_start_time};

const MINUTES_PER_DAY: i64 = 24 * 60;
const MILLIS_PER_DAY: i64 = MINUTES_PER_DAY * 60 * 1000;

fn fallback_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

/// Wall-clock arrival "HH:MM" after `elapsed_minutes` from `start_time`.
///
/// Wraps past midnight and rounds to the nearest minute. An unreadable start
/// time counts as 08:00 and a non-finite elapsed time as zero.
pub fn arrival_clock(start_time: &str, elapsed_minutes: f64) -> String {
    let start = parse_start_time(start_time).unwrap_or_else(fallback_start);
    let elapsed = if elapsed_minutes.is_finite() {
        elapsed_minutes
    } else {
        0.0
    };

    let millis = ((elapsed * 60_000.0).round() as i64).rem_euclid(MILLIS_PER_DAY);
    let (arrival, _) = start.overflowing_add_signed(TimeDelta::milliseconds(millis));

    let total_seconds = i64::from(arrival.num_seconds_from_midnight());
    let minutes = ((total_seconds + 30) / 60).rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn clamp_percentage(pct: f64) -> f64 {
    if pct.is_finite() { pct.clamp(0.0, 100.0) } else { 0.0 }
}

/// `total_time` inflated by the safety margin. Display only: the result is
/// never stored back into a waypoint.
pub fn with_safety(total_time: f64, safety_percentage: f64) -> f64 {
    total_time * (1.0 + clamp_percentage(safety_percentage) / 100.0)
}

/// Route-level timing summary for the summary panel and exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySummary {
    pub total_time: f64,
    pub safety_percentage: f64,
    pub safety_time: f64,
    pub total_with_safety: f64,
    pub arrival: String,
    pub arrival_with_safety: String,
}

impl SafetySummary {
    pub fn for_waypoints(waypoints: &[Waypoint], settings: &Settings) -> Self {
        let total_time = waypoints.last().map(|w| w.total_time).unwrap_or(0.0);
        let safety_percentage = clamp_percentage(settings.safety_time_percentage);
        let total_with_safety = with_safety(total_time, safety_percentage);

        Self {
            total_time,
            safety_percentage,
            safety_time: total_with_safety - total_time,
            total_with_safety,
            arrival: arrival_clock(&settings.start_time, total_time),
            arrival_with_safety: arrival_clock(&settings.start_time, total_with_safety),
        }
    }
}
