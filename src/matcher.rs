//! Place sparse GPX waypoints onto the dense track polyline.
//!
//! Each waypoint snaps to its nearest track point (within a tolerance), the
//! snapped waypoints are ordered by position along the track, and the track
//! is cut into consecutive index ranges ending at each of them.

use crate::geodesy::distance_m;
use crate::gpx_types::GpxPoint;

/// Snap radius used when building a route.
pub const ROUTE_MATCH_TOLERANCE_M: f64 = 200.0;
/// Snap radius for general nearest-point lookups.
pub const NEAREST_POINT_TOLERANCE_M: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub index: usize,
    pub distance_m: f64,
}

/// Closest track point to (`lat`, `lon`) no farther than `tolerance_m`.
/// On equal distances the earlier track point wins.
pub fn nearest_track_point(
    track: &[GpxPoint],
    lat: f64,
    lon: f64,
    tolerance_m: f64,
) -> Option<NearestPoint> {
    track
        .iter()
        .enumerate()
        .map(|(index, pt)| NearestPoint {
            index,
            distance_m: distance_m(lat, lon, pt.lat, pt.lon),
        })
        .filter(|np| np.distance_m <= tolerance_m)
        .fold(None, |best: Option<NearestPoint>, np| match best {
            Some(b) if b.distance_m <= np.distance_m => Some(b),
            _ => Some(np),
        })
}

/// A GPX waypoint snapped onto the track.
#[derive(Debug, Clone, Copy)]
pub struct MatchedWaypoint<'a> {
    pub waypoint: &'a GpxPoint,
    /// Position in the GPX file's waypoint list
    pub input_index: usize,
    pub track_index: usize,
    pub distance_m: f64,
}

/// Snap every waypoint onto the track and return them in path order.
///
/// Waypoints with no track point within `tolerance_m` are left out. Two
/// waypoints on the same track point keep their file order.
pub fn match_waypoints<'a>(
    track: &[GpxPoint],
    waypoints: &'a [GpxPoint],
    tolerance_m: f64,
) -> Vec<MatchedWaypoint<'a>> {
    let mut matched: Vec<MatchedWaypoint<'a>> = waypoints
        .iter()
        .enumerate()
        .filter_map(|(input_index, waypoint)| {
            nearest_track_point(track, waypoint.lat, waypoint.lon, tolerance_m).map(|np| {
                MatchedWaypoint {
                    waypoint,
                    input_index,
                    track_index: np.index,
                    distance_m: np.distance_m,
                }
            })
        })
        .collect();

    // sort_by_key is stable
    matched.sort_by_key(|m| m.track_index);
    matched
}

/// Inclusive range of track indices between two consecutive route stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSlice {
    pub start_index: usize,
    pub end_index: usize,
    /// Index into the matched waypoint list for the stop at `end_index`;
    /// `None` for the tail that runs to the track's last point.
    pub matched: Option<usize>,
}

/// Cut a track of `track_len` points at each matched waypoint.
///
/// Yields one slice per matched waypoint followed by the tail slice. With no
/// matches there is nothing to cut and the result is empty.
pub fn split_track(track_len: usize, matches: &[MatchedWaypoint<'_>]) -> Vec<TrackSlice> {
    if matches.is_empty() || track_len == 0 {
        return Vec::new();
    }

    let mut slices = Vec::with_capacity(matches.len() + 1);
    let mut start_index = 0;
    for (i, m) in matches.iter().enumerate() {
        slices.push(TrackSlice {
            start_index,
            end_index: m.track_index,
            matched: Some(i),
        });
        start_index = m.track_index;
    }
    slices.push(TrackSlice {
        start_index,
        end_index: track_len - 1,
        matched: None,
    });
    slices
}
