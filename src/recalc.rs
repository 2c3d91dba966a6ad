use tracing::warn;

use crate::builder::build_from_source;
use crate::error::RoutePlannerError;
use crate::geodesy::{distance_m, grid_label};
use crate::matcher::NEAREST_POINT_TOLERANCE_M;
use crate::projector::arrival_clock;
use crate::route::{Route, Waypoint};
use crate::settings::{DistanceMethod, Settings};
use crate::time_model::segment_time_minutes;

type Result<T> = std::result::Result<T, RoutePlannerError>;

fn non_negative_or_zero(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Recompute `segment_time`, `total_time` and `hour` for every waypoint.
///
/// Geometry is copied through untouched. Each waypoint's own penalty and stop
/// are applied on top of its movement time; the first waypoint is the
/// departure and always sits at zero. Penalties and stops that are negative or
/// not finite are reset to zero.
pub fn recalculate(waypoints: &[Waypoint], settings: &Settings) -> Vec<Waypoint> {
    let speeds = settings.speeds();
    let mut total_time = 0.0;

    waypoints
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let mut w = w.clone();
            w.terrain_difficulty_penalty = non_negative_or_zero(w.terrain_difficulty_penalty);
            w.stop_duration = non_negative_or_zero(w.stop_duration);

            if i == 0 {
                w.segment_time = 0.0;
            } else {
                w.segment_time = segment_time_minutes(
                    w.segment_distance,
                    w.segment_ascent,
                    w.segment_descent,
                    &speeds,
                );
                total_time +=
                    w.segment_time * (1.0 + w.terrain_difficulty_penalty) + w.stop_duration;
            }
            w.total_time = total_time;
            w.hour = arrival_clock(&settings.start_time, total_time);
            if w.utm.is_empty() {
                w.utm = grid_label(w.latitude, w.longitude);
            }
            w
        })
        .collect()
}

/// Recalculate a stored route against its effective settings.
///
/// Settings problems are logged here; the calculation itself still runs with
/// per-field fallbacks.
pub fn recalculate_route(route: &Route, defaults: &Settings) -> Route {
    let settings = route.effective_settings(defaults);
    for warning in settings.validate() {
        warn!(route = %route.id, "{warning}");
    }

    let mut updated = Route {
        waypoints: recalculate(&route.waypoints, &settings),
        ..route.clone()
    };
    updated.refresh_metadata();
    updated
}

/// Rebuild a route's geometry with another distance method, keeping user edits.
///
/// Needs the route's retained source geometry. When the route carries its own
/// settings the method is stored there; otherwise the route keeps inheriting
/// and the caller is expected to have switched the defaults.
pub fn change_distance_method(
    route: &Route,
    method: DistanceMethod,
    defaults: &Settings,
) -> Result<Route> {
    let source = route
        .source
        .as_ref()
        .ok_or(RoutePlannerError::MissingRouteSource)?;

    let mut settings = route.effective_settings(defaults);
    settings.distance_calculation_method = method;

    let built = build_from_source(route.name.clone(), source, &settings)?;
    let (merged, dropped) =
        carry_over_edits(&route.waypoints, built.waypoints, NEAREST_POINT_TOLERANCE_M);
    if dropped > 0 {
        warn!(
            route = %route.id,
            dropped,
            "edited waypoints had no counterpart after changing the distance method"
        );
    }

    let mut updated = Route {
        waypoints: recalculate(&merged, &settings),
        settings: route.settings.as_ref().map(|_| settings.clone()),
        ..route.clone()
    };
    updated.refresh_metadata();
    Ok(updated)
}

/// Copy user edits from `old` onto the freshly built `new` waypoints.
///
/// Start maps to Start and End to End. Every other new waypoint takes the
/// closest unused old waypoint within `tolerance_m`, or failing that the
/// unused old waypoint at the same index. Returns the merged list and the
/// number of edited old waypoints that found no home.
pub fn carry_over_edits(
    old: &[Waypoint],
    mut new: Vec<Waypoint>,
    tolerance_m: f64,
) -> (Vec<Waypoint>, usize) {
    let mut used = vec![false; old.len()];

    for (j, target) in new.iter_mut().enumerate() {
        let source = if target.is_start_point {
            old.iter().position(|o| o.is_start_point)
        } else if target.is_end_point {
            old.iter().position(|o| o.is_end_point)
        } else {
            closest_unused(old, &used, target, tolerance_m).or_else(|| {
                old.get(j)
                    .filter(|o| !used[j] && !o.is_endpoint())
                    .map(|_| j)
            })
        };

        let Some(i) = source.filter(|&i| !used[i]) else {
            continue;
        };
        used[i] = true;

        let from = &old[i];
        target.terrain_difficulty_penalty = from.terrain_difficulty_penalty;
        target.stop_duration = from.stop_duration;
        target.comments = from.comments.clone();
        if !target.is_endpoint() {
            target.is_decision_point = from.is_decision_point;
        }
        if !from.is_auto_named() && !from.name.trim().is_empty() {
            target.name = from.name.clone();
            target.auto_named = Some(false);
        }
    }

    let dropped = old
        .iter()
        .zip(&used)
        .filter(|(o, used)| !**used && o.has_user_edits())
        .count();
    (new, dropped)
}

fn closest_unused(
    old: &[Waypoint],
    used: &[bool],
    target: &Waypoint,
    tolerance_m: f64,
) -> Option<usize> {
    old.iter()
        .enumerate()
        .filter(|(i, o)| !used[*i] && !o.is_endpoint())
        .map(|(i, o)| {
            (
                i,
                distance_m(o.latitude, o.longitude, target.latitude, target.longitude),
            )
        })
        .filter(|(_, d)| *d <= tolerance_m)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
