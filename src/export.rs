use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::error::RoutePlannerError;
use crate::projector::SafetySummary;
use crate::route::{Route, Waypoint};
use crate::settings::Settings;

type Result<T> = std::result::Result<T, RoutePlannerError>;

const CSV_HEADER: [&str; 17] = [
    "#",
    "Name",
    "Decision",
    "Elevation (m)",
    "Seg Dist (km)",
    "Seg Asc (m)",
    "Seg Desc (m)",
    "Total Dist (km)",
    "Total Asc (m)",
    "Total Desc (m)",
    "Penalty (%)",
    "Stop (min)",
    "Seg Time (min)",
    "Total Time (min)",
    "Hour",
    "UTM",
    "Comments",
];

/// Render the route plan as CSV: one row per waypoint, then a blank line and
/// a two-column summary block. Rows end in CRLF.
pub fn route_to_csv(route: &Route, settings: &Settings) -> Result<String> {
    let mut table = csv_writer(Vec::new());
    table.write_record(CSV_HEADER)?;
    for (i, wp) in route.waypoints.iter().enumerate() {
        table.write_record(waypoint_row(i + 1, wp))?;
    }
    let mut buf = finish(table)?;

    // The summary block is a second table of a different width; a bare line
    // break keeps the two apart without an empty quoted field.
    buf.extend_from_slice(b"\r\n");

    let mut summary = csv_writer(buf);
    for (label, value) in summary_rows(route, settings) {
        summary.write_record([label, value.as_str()])?;
    }

    Ok(String::from_utf8(finish(summary)?)?)
}

fn csv_writer(buf: Vec<u8>) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(buf)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| RoutePlannerError::Csv(e.into_error().into()))
}

fn summary_rows(route: &Route, settings: &Settings) -> Vec<(&'static str, String)> {
    let summary = SafetySummary::for_waypoints(&route.waypoints, settings);
    let last = route.waypoints.last().cloned().unwrap_or_default();

    vec![
        ("Route", route.name.clone()),
        ("Start Time", settings.start_time.clone()),
        (
            "Speeds (m/h)",
            format!(
                "ascent {:.0} / descent {:.0} / flat {:.0}",
                settings.ascent_speed, settings.descent_speed, settings.flat_speed
            ),
        ),
        ("Total Distance (km)", format!("{:.2}", last.total_distance)),
        ("Total Ascent (m)", format!("{:.0}", last.total_ascent)),
        ("Total Descent (m)", format!("{:.0}", last.total_descent)),
        ("Max Elevation (m)", format!("{:.0}", route.metadata.max_elevation)),
        ("Total Time (min)", format!("{:.0}", summary.total_time)),
        ("Estimated Arrival", summary.arrival.clone()),
        (
            "Safety Time",
            format!(
                "{:.0}% = {:.0} min",
                summary.safety_percentage, summary.safety_time
            ),
        ),
        (
            "Total Time With Safety (min)",
            format!("{:.0}", summary.total_with_safety),
        ),
        ("Arrival With Safety", summary.arrival_with_safety),
    ]
}

fn waypoint_row(number: usize, wp: &Waypoint) -> Vec<String> {
    vec![
        number.to_string(),
        wp.name.clone(),
        if wp.is_decision_point { "Yes" } else { "No" }.to_string(),
        format!("{:.0}", wp.elevation),
        format!("{:.2}", wp.segment_distance),
        format!("{:.0}", wp.segment_ascent),
        format!("{:.0}", wp.segment_descent),
        format!("{:.2}", wp.total_distance),
        format!("{:.0}", wp.total_ascent),
        format!("{:.0}", wp.total_descent),
        format!("{:.0}", wp.terrain_difficulty_penalty * 100.0),
        format!("{:.0}", wp.stop_duration),
        format!("{:.0}", wp.segment_time),
        format!("{:.0}", wp.total_time),
        wp.hour.clone(),
        wp.utm.clone(),
        wp.comments.clone(),
    ]
}

/// Convert a computed route to a GeoJSON FeatureCollection: the route line
/// first, then one Point feature per waypoint with its plan fields.
pub fn route_to_feature_collection(route: &Route) -> FeatureCollection {
    let mut features = Vec::with_capacity(route.waypoints.len() + 1);

    if route.waypoints.len() >= 2 {
        features.push(route_line_feature(route));
    }
    features.extend(route.waypoints.iter().map(waypoint_to_feature));

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn route_line_feature(route: &Route) -> Feature {
    let coords: Vec<Vec<f64>> = route.waypoints.iter().map(point_coords).collect();
    let geometry = Geometry::new(Value::LineString(coords));

    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String("route".to_string()));
    props.insert("name".to_string(), JsonValue::String(route.name.clone()));
    insert_number(&mut props, "totalDistance", route.metadata.total_distance);
    insert_number(&mut props, "totalAscent", route.metadata.total_ascent);
    insert_number(&mut props, "totalDescent", route.metadata.total_descent);
    insert_number(&mut props, "maxElevation", route.metadata.max_elevation);

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn waypoint_to_feature(wp: &Waypoint) -> Feature {
    let geometry = Geometry::new(Value::Point(point_coords(wp)));

    let kind = if wp.is_start_point {
        "start"
    } else if wp.is_end_point {
        "end"
    } else {
        "waypoint"
    };

    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String(kind.to_string()));
    props.insert("id".to_string(), JsonValue::String(wp.id.clone()));
    props.insert("name".to_string(), JsonValue::String(wp.name.clone()));
    props.insert(
        "isDecisionPoint".to_string(),
        JsonValue::Bool(wp.is_decision_point),
    );
    insert_number(&mut props, "segmentDistance", wp.segment_distance);
    insert_number(&mut props, "segmentAscent", wp.segment_ascent);
    insert_number(&mut props, "segmentDescent", wp.segment_descent);
    insert_number(&mut props, "totalDistance", wp.total_distance);
    insert_number(&mut props, "totalAscent", wp.total_ascent);
    insert_number(&mut props, "totalDescent", wp.total_descent);
    insert_number(&mut props, "terrainDifficultyPenalty", wp.terrain_difficulty_penalty);
    insert_number(&mut props, "stopDuration", wp.stop_duration);
    insert_number(&mut props, "segmentTime", wp.segment_time);
    insert_number(&mut props, "totalTime", wp.total_time);
    props.insert("hour".to_string(), JsonValue::String(wp.hour.clone()));
    props.insert("utm".to_string(), JsonValue::String(wp.utm.clone()));
    if !wp.comments.is_empty() {
        props.insert("comments".to_string(), JsonValue::String(wp.comments.clone()));
    }

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Build [lon, lat, ele] coordinate array.
fn point_coords(wp: &Waypoint) -> Vec<f64> {
    vec![wp.longitude, wp.latitude, wp.elevation]
}

fn insert_number(props: &mut Map<String, JsonValue>, key: &str, value: f64) {
    props.insert(
        key.to_string(),
        JsonValue::Number(serde_json::Number::from_f64(value).unwrap_or(0.into())),
    );
}
