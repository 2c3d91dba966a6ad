pub mod builder;
pub mod error;
pub mod export;
pub mod geodesy;
pub mod gpx_types;
pub mod lenient;
pub mod matcher;
pub mod parser;
pub mod projector;
pub mod recalc;
pub mod repository;
pub mod route;
pub mod settings;
pub mod time_model;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;
use wasm_bindgen::prelude::*;

use crate::error::RoutePlannerError;
use crate::projector::SafetySummary;
use crate::route::{Route, WaypointEdit};
use crate::settings::{ActivityMode, DistanceMethod, Settings};

/// Parse a GPX string and build a new route, returned as a JS object.
///
/// `settings` may be null/undefined for the defaults. The new route inherits
/// the application settings (`settings: null`).
#[wasm_bindgen(js_name = buildRoute)]
pub fn build_route(gpx_string: &str, settings: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let settings = parse_settings(settings)?;
    log_settings_warnings(&settings);

    let gpx_data = parser::parse_gpx(gpx_string)?;
    let built = builder::build(&gpx_data, &settings)?;

    let created_at = js_sys::Date::now();
    let route = built.into_route(format!("route-{created_at:.0}"), created_at);
    to_js(&route)
}

/// Recompute timing for every waypoint of `route`.
#[wasm_bindgen(js_name = recalculateRoute)]
pub fn recalculate_route(route: JsValue, defaults: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let route: Route = from_js(route)?;
    let defaults = parse_settings(defaults)?;
    to_js(&recalc::recalculate_route(&route, &defaults))
}

/// Apply a single field edit (`{field, value}`) to one waypoint.
#[wasm_bindgen(js_name = updateWaypoint)]
pub fn update_waypoint(
    route: JsValue,
    waypoint_id: &str,
    edit: JsValue,
    defaults: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let route: Route = from_js(route)?;
    let edit: WaypointEdit = from_js(edit)?;
    let defaults = parse_settings(defaults)?;
    to_js(&route.apply_edit(waypoint_id, edit, &defaults)?)
}

/// Rebuild the route's geometry with another distance method, keeping edits.
#[wasm_bindgen(js_name = changeDistanceMethod)]
pub fn change_distance_method(
    route: JsValue,
    method: JsValue,
    defaults: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let route: Route = from_js(route)?;
    let method: DistanceMethod = from_js(method)?;
    let defaults = parse_settings(defaults)?;
    to_js(&recalc::change_distance_method(&route, method, &defaults)?)
}

/// Settings a route actually runs with.
#[wasm_bindgen(js_name = effectiveSettings)]
pub fn effective_settings(route: JsValue, defaults: JsValue) -> Result<JsValue, JsValue> {
    let route: Route = from_js(route)?;
    let defaults = parse_settings(defaults)?;
    to_js(&route.effective_settings(&defaults))
}

/// Problems in a settings object, as messages for the settings panel. Empty
/// when everything is usable as entered.
#[wasm_bindgen(js_name = validateSettings)]
pub fn validate_settings(settings: JsValue) -> Result<Vec<String>, JsValue> {
    let settings = parse_settings(settings)?;
    Ok(settings_warnings(&settings))
}

/// Switch activity mode on a settings object.
#[wasm_bindgen(js_name = applyActivityMode)]
pub fn apply_activity_mode(settings: JsValue, mode: JsValue) -> Result<JsValue, JsValue> {
    let settings = parse_settings(settings)?;
    let mode: ActivityMode = from_js(mode)?;
    to_js(&settings.with_activity_mode(mode))
}

#[wasm_bindgen(js_name = arrivalClock)]
pub fn arrival_clock(start_time: &str, elapsed_minutes: f64) -> String {
    projector::arrival_clock(start_time, elapsed_minutes)
}

#[wasm_bindgen(js_name = withSafety)]
pub fn with_safety(total_time: f64, safety_percentage: f64) -> f64 {
    projector::with_safety(total_time, safety_percentage)
}

#[wasm_bindgen(js_name = safetySummary)]
pub fn safety_summary(route: JsValue, defaults: JsValue) -> Result<JsValue, JsValue> {
    let route: Route = from_js(route)?;
    let defaults = parse_settings(defaults)?;
    let settings = route.effective_settings(&defaults);
    to_js(&SafetySummary::for_waypoints(&route.waypoints, &settings))
}

#[wasm_bindgen(js_name = routeToCsv)]
pub fn route_to_csv(route: JsValue, defaults: JsValue) -> Result<String, JsValue> {
    let route: Route = from_js(route)?;
    let defaults = parse_settings(defaults)?;
    let settings = route.effective_settings(&defaults);
    Ok(export::route_to_csv(&route, &settings)?)
}

/// GeoJSON FeatureCollection of the route, as a JSON string.
#[wasm_bindgen(js_name = routeToGeoJsonString)]
pub fn route_to_geojson_string(route: JsValue) -> Result<String, JsValue> {
    let route: Route = from_js(route)?;
    let fc = export::route_to_feature_collection(&route);
    serde_json::to_string(&fc).map_err(|e| RoutePlannerError::from(e).into())
}

fn parse_settings(settings: JsValue) -> Result<Settings, JsValue> {
    if settings.is_undefined() || settings.is_null() {
        Ok(Settings::default())
    } else {
        from_js(settings)
    }
}

fn settings_warnings(settings: &Settings) -> Vec<String> {
    settings.validate().iter().map(ToString::to_string).collect()
}

fn log_settings_warnings(settings: &Settings) {
    for warning in settings_warnings(settings) {
        warn!("{warning}");
    }
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
