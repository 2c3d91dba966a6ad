use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RoutePlannerError;
use crate::geodesy::{distance_km, grid_label};
use crate::gpx_types::{GpxData, GpxPoint};
use crate::matcher::{
    NEAREST_POINT_TOLERANCE_M, ROUTE_MATCH_TOLERANCE_M, match_waypoints, nearest_track_point,
    split_track,
};
use crate::recalc::recalculate;
use crate::route::{Route, RouteMetadata, RouteSource, Waypoint};
use crate::settings::{DistanceMethod, Settings};

type Result<T> = std::result::Result<T, RoutePlannerError>;

/// Upper bound on waypoints produced when the track itself is sampled,
/// Start and End included.
pub const MAX_SAMPLED_WAYPOINTS: usize = 20;

/// How the waypoint sequence was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStrategy {
    /// GPX waypoints snapped onto the track, distances along the polyline.
    TrackMatched,
    /// GPX waypoints in file order joined by straight lines.
    WaypointToWaypoint,
    /// No usable GPX waypoints; evenly spaced track points stand in.
    SampledTrack,
}

#[derive(Debug, Clone)]
pub struct BuiltRoute {
    pub name: String,
    pub waypoints: Vec<Waypoint>,
    pub metadata: RouteMetadata,
    pub source: RouteSource,
    pub strategy: BuildStrategy,
}

impl BuiltRoute {
    /// Wrap as a stored route that inherits the application settings.
    pub fn into_route(self, id: String, created_at: f64) -> Route {
        Route {
            id,
            name: self.name,
            waypoints: self.waypoints,
            settings: None,
            metadata: self.metadata,
            source: Some(self.source),
            created_at,
        }
    }
}

/// Distance and elevation change over one stretch of route.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentGeometry {
    pub distance_km: f64,
    pub ascent_m: f64,
    pub descent_m: f64,
}

impl SegmentGeometry {
    /// A single hop: the sign of the elevation change makes it either an
    /// ascent or a descent, never both.
    pub fn straight(from: &GpxPoint, to: &GpxPoint) -> Self {
        let change = to.elevation() - from.elevation();
        Self {
            distance_km: distance_km(from.lat, from.lon, to.lat, to.lon),
            ascent_m: change.max(0.0),
            descent_m: (-change).max(0.0),
        }
    }

    /// Sum of the hops between consecutive points of `track[start..=end]`.
    pub fn along(track: &[GpxPoint], start: usize, end: usize) -> Self {
        if end <= start || end >= track.len() {
            return Self::default();
        }
        track[start..=end]
            .windows(2)
            .map(|w| Self::straight(&w[0], &w[1]))
            .fold(Self::default(), |acc, hop| Self {
                distance_km: acc.distance_km + hop.distance_km,
                ascent_m: acc.ascent_m + hop.ascent_m,
                descent_m: acc.descent_m + hop.descent_m,
            })
    }
}

/// Build the waypoint table for a parsed GPX file.
///
/// Fails when the file has no track or its first track has no points.
pub fn build(gpx: &GpxData, settings: &Settings) -> Result<BuiltRoute> {
    let track = gpx.primary_track_points().ok_or(RoutePlannerError::NoTracks)?;
    if track.is_empty() {
        return Err(RoutePlannerError::EmptyTrack);
    }
    if gpx.tracks.len() > 1 {
        debug!(tracks = gpx.tracks.len(), "using only the first track");
    }

    let source = RouteSource {
        track_points: track,
        gpx_waypoints: gpx.waypoints.clone(),
    };
    build_from_source(gpx.route_name(), &source, settings)
}

/// Build the waypoint table from retained route geometry.
pub fn build_from_source(
    name: String,
    source: &RouteSource,
    settings: &Settings,
) -> Result<BuiltRoute> {
    let track = source.track_points.as_slice();
    if track.is_empty() {
        return Err(RoutePlannerError::EmptyTrack);
    }
    let method = settings.distance_calculation_method;

    let (sequence, strategy) = match method {
        DistanceMethod::Track => match track_matched(track, &source.gpx_waypoints) {
            Some(seq) => (seq, BuildStrategy::TrackMatched),
            None => (sampled(track, method), BuildStrategy::SampledTrack),
        },
        DistanceMethod::WaypointToWaypoint => {
            match waypoint_to_waypoint(track, &source.gpx_waypoints) {
                Some(seq) => (seq, BuildStrategy::WaypointToWaypoint),
                None => (sampled(track, method), BuildStrategy::SampledTrack),
            }
        }
    };

    let waypoints = recalculate(&sequence.into_waypoints(), settings);
    let metadata = RouteMetadata::derive(&waypoints, Some(track));

    debug!(
        ?strategy,
        waypoints = waypoints.len(),
        track_points = track.len(),
        total_km = metadata.total_distance,
        "built route"
    );

    Ok(BuiltRoute {
        name,
        waypoints,
        metadata,
        source: source.clone(),
        strategy,
    })
}

fn track_matched(track: &[GpxPoint], gpx_waypoints: &[GpxPoint]) -> Option<Sequence> {
    let matches = match_waypoints(track, gpx_waypoints, ROUTE_MATCH_TOLERANCE_M);
    let dropped = gpx_waypoints.len() - matches.len();
    if dropped > 0 {
        warn!(
            dropped,
            tolerance_m = ROUTE_MATCH_TOLERANCE_M,
            "GPX waypoints too far from the track were ignored"
        );
    }

    let slices = split_track(track.len(), &matches);
    if slices.is_empty() {
        return None;
    }

    let mut seq = Sequence::start(&track[0]);
    for slice in slices {
        let geometry = SegmentGeometry::along(track, slice.start_index, slice.end_index);
        match slice.matched {
            Some(i) => {
                let m = &matches[i];
                let mut at = m.waypoint.clone();
                // Elevation sums run along the track, so fall back to the
                // snapped track point when the waypoint has none.
                if at.ele.is_none() {
                    at.ele = track[m.track_index].ele;
                }
                seq.push_gpx_waypoint(&at, geometry);
            }
            None => seq.finish(&track[track.len() - 1], geometry),
        }
    }
    Some(seq)
}

fn waypoint_to_waypoint(track: &[GpxPoint], gpx_waypoints: &[GpxPoint]) -> Option<Sequence> {
    if gpx_waypoints.is_empty() {
        return None;
    }

    let mut seq = Sequence::start(&track[0]);
    let mut prev = track[0].clone();
    for wpt in gpx_waypoints {
        let mut at = wpt.clone();
        // Straight legs still need a height at each end; borrow it from the
        // track when the waypoint has none.
        if at.ele.is_none() {
            at.ele = nearest_track_point(track, at.lat, at.lon, NEAREST_POINT_TOLERANCE_M)
                .and_then(|np| track[np.index].ele);
        }
        seq.push_gpx_waypoint(&at, SegmentGeometry::straight(&prev, &at));
        prev = at;
    }
    let last = &track[track.len() - 1];
    seq.finish(last, SegmentGeometry::straight(&prev, last));
    Some(seq)
}

/// Indices of the intermediate track points kept when sampling.
fn sample_indices(track_len: usize) -> Vec<usize> {
    if track_len < 3 {
        return Vec::new();
    }
    let last = track_len - 1;
    let intermediate_slots = MAX_SAMPLED_WAYPOINTS - 1;
    let stride = last.div_ceil(intermediate_slots).max(1);
    (1..)
        .map(|k| k * stride)
        .take_while(|&i| i < last)
        .collect()
}

fn sampled(track: &[GpxPoint], method: DistanceMethod) -> Sequence {
    let geometry_between = |from: usize, to: usize| match method {
        DistanceMethod::Track => SegmentGeometry::along(track, from, to),
        DistanceMethod::WaypointToWaypoint => SegmentGeometry::straight(&track[from], &track[to]),
    };

    let mut seq = Sequence::start(&track[0]);
    let mut prev = 0;
    for idx in sample_indices(track.len()) {
        seq.push_sample(&track[idx], geometry_between(prev, idx));
        prev = idx;
    }
    let last = track.len() - 1;
    seq.finish(&track[last], geometry_between(prev, last));
    seq
}

/// Accumulates waypoints with running geometry totals. Timing is left at zero
/// for [`recalculate`] to fill in.
struct Sequence {
    waypoints: Vec<Waypoint>,
    totals: SegmentGeometry,
    named: usize,
}

impl Sequence {
    fn start(first: &GpxPoint) -> Self {
        let mut seq = Self {
            waypoints: Vec::new(),
            totals: SegmentGeometry::default(),
            named: 0,
        };
        let mut start = seq.make(first, SegmentGeometry::default());
        start.name = "Start".to_string();
        start.auto_named = Some(true);
        start.is_start_point = true;
        seq.waypoints.push(start);
        seq
    }

    fn push_gpx_waypoint(&mut self, wpt: &GpxPoint, geometry: SegmentGeometry) {
        self.named += 1;
        let mut w = self.make(wpt, geometry);
        match wpt.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => w.name = name.to_string(),
            None => {
                w.name = format!("Waypoint {}", self.named);
                w.auto_named = Some(true);
            }
        }
        w.comments = wpt.comment().unwrap_or_default().to_string();
        self.waypoints.push(w);
    }

    fn push_sample(&mut self, pt: &GpxPoint, geometry: SegmentGeometry) {
        self.named += 1;
        let mut w = self.make(pt, geometry);
        match pt.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => w.name = name.to_string(),
            None => {
                w.name = format!("Point {}", self.named);
                w.auto_named = Some(true);
            }
        }
        w.comments = pt.comment().unwrap_or_default().to_string();
        self.waypoints.push(w);
    }

    fn finish(&mut self, last: &GpxPoint, geometry: SegmentGeometry) {
        let mut end = self.make(last, geometry);
        end.name = "End".to_string();
        end.auto_named = Some(true);
        end.is_end_point = true;
        self.waypoints.push(end);
    }

    fn make(&mut self, pt: &GpxPoint, geometry: SegmentGeometry) -> Waypoint {
        self.totals.distance_km += geometry.distance_km;
        self.totals.ascent_m += geometry.ascent_m;
        self.totals.descent_m += geometry.descent_m;

        Waypoint {
            id: format!("waypoint-{}", self.waypoints.len()),
            auto_named: Some(false),
            latitude: pt.lat,
            longitude: pt.lon,
            elevation: pt.elevation(),
            segment_distance: geometry.distance_km,
            segment_ascent: geometry.ascent_m,
            segment_descent: geometry.descent_m,
            total_distance: self.totals.distance_km,
            total_ascent: self.totals.ascent_m,
            total_descent: self.totals.descent_m,
            utm: grid_label(pt.lat, pt.lon),
            ..Waypoint::default()
        }
    }

    fn into_waypoints(self) -> Vec<Waypoint> {
        self.waypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::{GpxSegment, GpxTrack};

    fn gpx(track: Vec<GpxPoint>, waypoints: Vec<GpxPoint>) -> GpxData {
        GpxData {
            name: None,
            waypoints,
            tracks: vec![GpxTrack {
                name: Some("Test".to_string()),
                segments: vec![GpxSegment { points: track }],
            }],
        }
    }

    fn saddle_track() -> Vec<GpxPoint> {
        vec![
            GpxPoint::new(0.0, 0.0).with_ele(1000.0),
            GpxPoint::new(0.0, 0.01).with_ele(1200.0),
            GpxPoint::new(0.0, 0.02).with_ele(1100.0),
        ]
    }

    #[test]
    fn test_no_tracks_is_error() {
        let data = GpxData::default();
        assert!(matches!(
            build(&data, &Settings::default()),
            Err(RoutePlannerError::NoTracks)
        ));
    }

    #[test]
    fn test_empty_track_is_error() {
        let data = gpx(Vec::new(), Vec::new());
        assert!(matches!(
            build(&data, &Settings::default()),
            Err(RoutePlannerError::EmptyTrack)
        ));
    }

    #[test]
    fn test_track_matched_midpoint() {
        let data = gpx(
            saddle_track(),
            vec![GpxPoint::new(0.0, 0.01).with_ele(1200.0).with_name("Saddle")],
        );
        let built = build(&data, &Settings::default()).unwrap();
        assert_eq!(built.strategy, BuildStrategy::TrackMatched);

        let names: Vec<_> = built.waypoints.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Start", "Saddle", "End"]);
        assert!(built.waypoints[0].is_start_point);
        assert!(built.waypoints[2].is_end_point);

        let saddle = &built.waypoints[1];
        assert_eq!(saddle.segment_ascent, 200.0);
        assert_eq!(saddle.segment_descent, 0.0);
        assert_eq!(saddle.auto_named, Some(false));

        let end = &built.waypoints[2];
        assert_eq!(end.segment_descent, 100.0);
        assert_eq!(end.total_ascent, 200.0);
        assert_eq!(end.total_descent, 100.0);
        assert!((end.total_distance - 2.0 * distance_km(0.0, 0.0, 0.0, 0.01)).abs() < 1e-9);
        assert_eq!(built.metadata.max_elevation, 1200.0);
        assert_eq!(built.name, "Test");
    }

    #[test]
    fn test_track_matched_follows_polyline() {
        // Out and back: the waypoint at the far end is reached after the full outbound leg.
        let track = vec![
            GpxPoint::new(0.0, 0.0),
            GpxPoint::new(0.0, 0.01),
            GpxPoint::new(0.0, 0.02),
            GpxPoint::new(0.0, 0.01),
            GpxPoint::new(0.0, 0.0),
        ];
        let data = gpx(track, vec![GpxPoint::new(0.0, 0.02).with_name("Turnaround")]);
        let built = build(&data, &Settings::default()).unwrap();
        let leg = distance_km(0.0, 0.0, 0.0, 0.01);
        assert!((built.waypoints[1].segment_distance - 2.0 * leg).abs() < 1e-9);
        assert!((built.waypoints[2].total_distance - 4.0 * leg).abs() < 1e-9);
    }

    #[test]
    fn test_waypoint_to_waypoint_uses_file_order_and_straight_lines() {
        let track = vec![
            GpxPoint::new(0.0, 0.0),
            GpxPoint::new(0.005, 0.005),
            GpxPoint::new(0.0, 0.01),
            GpxPoint::new(0.0, 0.02),
        ];
        let wpts = vec![
            GpxPoint::new(0.0, 0.02).with_name("B"),
            GpxPoint::new(0.0, 0.01).with_name("A"),
        ];
        let settings = Settings {
            distance_calculation_method: DistanceMethod::WaypointToWaypoint,
            ..Settings::default()
        };
        let built = build(&gpx(track, wpts), &settings).unwrap();
        assert_eq!(built.strategy, BuildStrategy::WaypointToWaypoint);
        let names: Vec<_> = built.waypoints.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Start", "B", "A", "End"]);
        let leg = distance_km(0.0, 0.0, 0.0, 0.01);
        assert!((built.waypoints[1].segment_distance - 2.0 * leg).abs() < 1e-9);
        assert!((built.waypoints[3].total_distance - 4.0 * leg).abs() < 1e-6);
    }

    #[test]
    fn test_waypoint_to_waypoint_borrows_missing_elevation() {
        let track = vec![
            GpxPoint::new(0.0, 0.0).with_ele(2000.0),
            GpxPoint::new(0.0, 0.01).with_ele(2050.0),
            GpxPoint::new(0.0, 0.02).with_ele(2100.0),
        ];
        let wpts = vec![
            GpxPoint::new(0.0002, 0.01).with_name("Col"),
            GpxPoint::new(0.05, 0.05).with_name("Off the map"),
        ];
        let settings = Settings {
            distance_calculation_method: DistanceMethod::WaypointToWaypoint,
            ..Settings::default()
        };
        let built = build(&gpx(track, wpts), &settings).unwrap();

        let col = &built.waypoints[1];
        assert_eq!(col.elevation, 2050.0);
        assert_eq!(col.segment_ascent, 50.0);
        assert_eq!(col.segment_descent, 0.0);
        // Too far from the track to borrow a height.
        assert_eq!(built.waypoints[2].elevation, 0.0);
    }

    #[test]
    fn test_unmatched_waypoints_fall_back_to_sampling() {
        let track: Vec<GpxPoint> = (0..100).map(|i| GpxPoint::new(0.0, i as f64 * 0.001)).collect();
        let data = gpx(track, vec![GpxPoint::new(1.0, 1.0).with_name("Elsewhere")]);
        let built = build(&data, &Settings::default()).unwrap();
        assert_eq!(built.strategy, BuildStrategy::SampledTrack);
        assert!(built.waypoints.len() <= MAX_SAMPLED_WAYPOINTS);
        assert!(built.waypoints.len() > 2);
        assert_eq!(built.waypoints[1].name, "Point 1");
        assert_eq!(built.waypoints[1].auto_named, Some(true));
        let expected = distance_km(0.0, 0.0, 0.0, 0.099);
        assert!((built.metadata.total_distance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sample_indices_bounds() {
        assert!(sample_indices(1).is_empty());
        assert!(sample_indices(2).is_empty());
        assert_eq!(sample_indices(3), vec![1]);
        assert_eq!(sample_indices(10), (1..9).collect::<Vec<_>>());
        for n in [20, 21, 57, 1000, 12_345] {
            let idx = sample_indices(n);
            assert!(idx.len() + 2 <= MAX_SAMPLED_WAYPOINTS, "n = {n}");
            assert!(idx.iter().all(|&i| i > 0 && i < n - 1));
        }
    }

    #[test]
    fn test_single_point_track() {
        let data = gpx(vec![GpxPoint::new(46.0, 7.0).with_ele(500.0)], Vec::new());
        let built = build(&data, &Settings::default()).unwrap();
        assert_eq!(built.waypoints.len(), 2);
        assert_eq!(built.waypoints[1].total_distance, 0.0);
        assert_eq!(built.waypoints[1].hour, "08:00");
    }

    #[test]
    fn test_ids_unique() {
        let track: Vec<GpxPoint> = (0..50).map(|i| GpxPoint::new(0.0, i as f64 * 0.001)).collect();
        let built = build(&gpx(track, Vec::new()), &Settings::default()).unwrap();
        let mut ids: Vec<_> = built.waypoints.iter().map(|w| w.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), built.waypoints.len());
    }
}
