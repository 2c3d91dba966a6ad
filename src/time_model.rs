use serde::{Deserialize, Serialize};

pub const DEFAULT_ASCENT_SPEED: f64 = 300.0;
pub const DEFAULT_DESCENT_SPEED: f64 = 400.0;
pub const DEFAULT_FLAT_SPEED: f64 = 5000.0;

/// Travel speeds in meters per hour.
///
/// `ascent_speed` and `descent_speed` are vertical rates; `flat_speed` is the
/// horizontal walking rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedProfile {
    pub ascent_speed: f64,
    pub descent_speed: f64,
    pub flat_speed: f64,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            ascent_speed: DEFAULT_ASCENT_SPEED,
            descent_speed: DEFAULT_DESCENT_SPEED,
            flat_speed: DEFAULT_FLAT_SPEED,
        }
    }
}

impl SpeedProfile {
    /// Same profile with every unusable axis replaced by its default.
    pub fn sanitized(&self) -> Self {
        Self {
            ascent_speed: usable_speed(self.ascent_speed, DEFAULT_ASCENT_SPEED),
            descent_speed: usable_speed(self.descent_speed, DEFAULT_DESCENT_SPEED),
            flat_speed: usable_speed(self.flat_speed, DEFAULT_FLAT_SPEED),
        }
    }

    /// Names of the axes that [`sanitized`](Self::sanitized) would replace.
    pub fn invalid_axes(&self) -> Vec<&'static str> {
        [
            ("ascentSpeed", self.ascent_speed),
            ("descentSpeed", self.descent_speed),
            ("flatSpeed", self.flat_speed),
        ]
        .into_iter()
        .filter(|(_, v)| !is_usable(*v))
        .map(|(name, _)| name)
        .collect()
    }
}

fn is_usable(speed: f64) -> bool {
    speed.is_finite() && speed > 0.0
}

fn usable_speed(speed: f64, fallback: f64) -> f64 {
    if is_usable(speed) { speed } else { fallback }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Pure movement time, in minutes, for one segment.
///
/// The segment length is split into a vertical part (gain and loss, walked at
/// the ascent and descent rates) and the remaining horizontal part walked at
/// the flat rate. Terrain penalty and rest stops are not applied here.
///
/// Never fails: bad speeds fall back to the per-axis defaults, negative or
/// non-finite geometry counts as zero, and a non-finite result is 0.
pub fn segment_time_minutes(
    distance_km: f64,
    elevation_gain_m: f64,
    elevation_loss_m: f64,
    speeds: &SpeedProfile,
) -> f64 {
    let speeds = speeds.sanitized();
    let distance_m = non_negative(distance_km) * 1000.0;
    let gain = non_negative(elevation_gain_m);
    let loss = non_negative(elevation_loss_m);

    let mut hours = 0.0;

    let flat_distance = distance_m - gain - loss;
    if flat_distance > 0.0 {
        hours += flat_distance / speeds.flat_speed;
    }
    if gain > 0.0 {
        hours += gain / speeds.ascent_speed;
    }
    if loss > 0.0 {
        hours += loss / speeds.descent_speed;
    }

    let minutes = hours * 60.0;
    if minutes.is_finite() && minutes > 0.0 {
        minutes
    } else {
        0.0
    }
}
