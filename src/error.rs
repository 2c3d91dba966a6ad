use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum RoutePlannerError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("Invalid value '{value}' for attribute '{attribute}' on <{element}>")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("No tracks found in GPX file")]
    NoTracks,
    #[error("No points found in track")]
    EmptyTrack,
    #[error(
        "Route has no retained GPX track; re-import the GPX file to change the distance calculation method"
    )]
    MissingRouteSource,
    #[error("No waypoint with id '{0}' in this route")]
    UnknownWaypoint(String),
    #[error("Start and end waypoints cannot be decision points ('{0}')")]
    EndpointDecisionPoint(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV output is not UTF-8: {0}")]
    CsvEncoding(#[from] std::string::FromUtf8Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<RoutePlannerError> for JsValue {
    fn from(e: RoutePlannerError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
