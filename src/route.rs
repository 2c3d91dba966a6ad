use serde::{Deserialize, Serialize};

use crate::error::RoutePlannerError;
use crate::gpx_types::GpxPoint;
use crate::lenient;
use crate::settings::{Settings, effective};

type Result<T> = std::result::Result<T, RoutePlannerError>;

/// One row of the route plan.
///
/// Geometry fields are fixed at import. `terrain_difficulty_penalty`,
/// `stop_duration`, `name`, `comments` and `is_decision_point` are user edits;
/// `segment_time`, `total_time` and `hour` are derived and rewritten by
/// [`crate::recalc::recalculate`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Waypoint {
    #[serde(deserialize_with = "lenient::or_default")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    /// Name was generated ("Start", "Waypoint 3", ...) rather than typed or
    /// read from the GPX file. Saves that predate the flag leave it unset;
    /// see [`Waypoint::is_auto_named`].
    #[serde(deserialize_with = "lenient::or_none", skip_serializing_if = "Option::is_none")]
    pub auto_named: Option<bool>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub comments: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub is_decision_point: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub is_start_point: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub is_end_point: bool,

    #[serde(deserialize_with = "lenient::or_default")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub longitude: f64,
    /// Meters
    #[serde(deserialize_with = "lenient::or_default")]
    pub elevation: f64,

    /// Kilometers from the previous waypoint
    #[serde(deserialize_with = "lenient::or_default")]
    pub segment_distance: f64,
    /// Meters gained since the previous waypoint
    #[serde(deserialize_with = "lenient::or_default")]
    pub segment_ascent: f64,
    /// Meters lost since the previous waypoint
    #[serde(deserialize_with = "lenient::or_default")]
    pub segment_descent: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_distance: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_ascent: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_descent: f64,

    /// Fraction added to the segment's movement time (0.25 = 25 % slower)
    #[serde(deserialize_with = "lenient::or_default")]
    pub terrain_difficulty_penalty: f64,
    /// Rest minutes spent at this waypoint
    #[serde(deserialize_with = "lenient::or_default")]
    pub stop_duration: f64,

    /// Movement minutes for the segment, without penalty or stop
    #[serde(deserialize_with = "lenient::or_default")]
    pub segment_time: f64,
    /// Minutes from the start including all penalties and stops so far
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_time: f64,
    /// Arrival clock, "HH:MM"
    #[serde(deserialize_with = "lenient::or_default")]
    pub hour: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub utm: String,
}

impl Waypoint {
    pub fn is_endpoint(&self) -> bool {
        self.is_start_point || self.is_end_point
    }

    /// Whether the name was generated. Without a stored flag the name itself
    /// decides.
    pub fn is_auto_named(&self) -> bool {
        self.auto_named.unwrap_or_else(|| is_generated_name(&self.name))
    }

    /// Whether the user changed anything worth carrying to a rebuilt route.
    pub fn has_user_edits(&self) -> bool {
        self.terrain_difficulty_penalty != 0.0
            || self.stop_duration != 0.0
            || !self.comments.trim().is_empty()
            || self.is_decision_point
            || !self.is_auto_named()
    }
}

/// "Start", "End", "Waypoint N", "Point N", or blank.
fn is_generated_name(name: &str) -> bool {
    let name = name.trim();
    let numbered = |prefix: &str| {
        name.strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    };
    name.is_empty()
        || name == "Start"
        || name == "End"
        || numbered("Waypoint ")
        || numbered("Point ")
}

/// Route summary cached next to the waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMetadata {
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_distance: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_ascent: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub total_descent: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub max_elevation: f64,
}

impl RouteMetadata {
    /// Totals come from the last waypoint. `max_elevation` is the highest of
    /// `track_elevations` when given, else of the waypoints themselves.
    pub fn derive(waypoints: &[Waypoint], track_elevations: Option<&[GpxPoint]>) -> Self {
        let Some(last) = waypoints.last() else {
            return Self::default();
        };

        let max_elevation = match track_elevations {
            Some(points) if !points.is_empty() => points
                .iter()
                .map(GpxPoint::elevation)
                .fold(f64::NEG_INFINITY, f64::max),
            _ => waypoints
                .iter()
                .map(|w| w.elevation)
                .fold(f64::NEG_INFINITY, f64::max),
        };

        Self {
            total_distance: last.total_distance,
            total_ascent: last.total_ascent,
            total_descent: last.total_descent,
            max_elevation: if max_elevation.is_finite() {
                max_elevation
            } else {
                0.0
            },
        }
    }
}

/// The geometry a route was built from, kept so the distance method can be
/// switched later without re-uploading the GPX file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteSource {
    pub track_points: Vec<GpxPoint>,
    pub gpx_waypoints: Vec<GpxPoint>,
}

/// A planned route as stored by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub waypoints: Vec<Waypoint>,
    /// `None` inherits the application-wide settings.
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub settings: Option<Settings>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub metadata: RouteMetadata,
    #[serde(
        default,
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<RouteSource>,
    /// Milliseconds since the Unix epoch
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub created_at: f64,
}

impl Route {
    pub fn effective_settings(&self, defaults: &Settings) -> Settings {
        effective(self.settings.as_ref(), defaults)
    }

    pub fn refresh_metadata(&mut self) {
        let track = self.source.as_ref().map(|s| s.track_points.as_slice());
        self.metadata = RouteMetadata::derive(&self.waypoints, track);
    }

    pub fn waypoint(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    /// Apply one user edit and return the updated route. Timing fields are
    /// recomputed when the edit affects them; `self` is left untouched.
    pub fn apply_edit(
        &self,
        waypoint_id: &str,
        edit: WaypointEdit,
        defaults: &Settings,
    ) -> Result<Route> {
        let idx = self
            .waypoints
            .iter()
            .position(|w| w.id == waypoint_id)
            .ok_or_else(|| RoutePlannerError::UnknownWaypoint(waypoint_id.to_string()))?;

        let mut waypoints = self.waypoints.clone();
        let wp = &mut waypoints[idx];
        let retime = edit.affects_timing();

        match edit {
            WaypointEdit::Name(name) => {
                wp.name = name;
                wp.auto_named = Some(false);
            }
            WaypointEdit::Comments(comments) => wp.comments = comments,
            WaypointEdit::IsDecisionPoint(flag) => {
                if wp.is_endpoint() {
                    return Err(RoutePlannerError::EndpointDecisionPoint(wp.id.clone()));
                }
                wp.is_decision_point = flag;
            }
            WaypointEdit::TerrainDifficultyPenalty(penalty) => {
                wp.terrain_difficulty_penalty = penalty;
            }
            WaypointEdit::StopDuration(minutes) => wp.stop_duration = minutes,
        }

        let mut route = Route {
            waypoints,
            ..self.clone()
        };
        if retime {
            let settings = route.effective_settings(defaults);
            route.waypoints = crate::recalc::recalculate(&route.waypoints, &settings);
        }
        Ok(route)
    }
}

/// A single field change on one waypoint, as sent by the table editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum WaypointEdit {
    Name(String),
    Comments(String),
    IsDecisionPoint(bool),
    TerrainDifficultyPenalty(f64),
    StopDuration(f64),
}

impl WaypointEdit {
    pub fn affects_timing(&self) -> bool {
        matches!(self, Self::TerrainDifficultyPenalty(_) | Self::StopDuration(_))
    }
}
