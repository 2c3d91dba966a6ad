use serde::{Deserialize, Serialize};

/// Parsed GPX data: sparse waypoints in file order plus every track.
#[derive(Debug, Default)]
pub struct GpxData {
    pub name: Option<String>,
    pub waypoints: Vec<GpxPoint>,
    pub tracks: Vec<GpxTrack>,
}

impl GpxData {
    /// The first track's segments joined into one polyline.
    ///
    /// Returns `None` when the file has no tracks at all, and an empty vector
    /// when the first track has no points.
    pub fn primary_track_points(&self) -> Option<Vec<GpxPoint>> {
        self.tracks.first().map(|trk| {
            trk.segments
                .iter()
                .flat_map(|seg| seg.points.iter().cloned())
                .collect()
        })
    }

    /// Display name for a route built from this file.
    pub fn route_name(&self) -> String {
        self.tracks
            .first()
            .and_then(|t| t.name.clone())
            .or_else(|| self.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unnamed Route".to_string())
    }
}

/// A single GPX point (used for wpt and trkpt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ele: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            name: None,
            cmt: None,
            desc: None,
        }
    }

    pub fn with_ele(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Elevation in meters; a point without `<ele>` reads as sea level.
    pub fn elevation(&self) -> f64 {
        self.ele.filter(|e| e.is_finite()).unwrap_or(0.0)
    }

    /// Comment text for the planner: `<cmt>` first, then `<desc>`.
    pub fn comment(&self) -> Option<&str> {
        self.cmt
            .as_deref()
            .or(self.desc.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A GPX track (<trk>).
#[derive(Debug, Default)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub segments: Vec<GpxSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Default)]
pub struct GpxSegment {
    pub points: Vec<GpxPoint>,
}
