use gpx_route_planner_wasm::builder::build;
use gpx_route_planner_wasm::export::route_to_csv;
use gpx_route_planner_wasm::parser::parse_gpx;
use gpx_route_planner_wasm::route::{Route, WaypointEdit};
use gpx_route_planner_wasm::settings::Settings;
use std::path::Path;

fn load_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{path}")).unwrap()
}

fn plan(gpx: &str, settings: &Settings) -> Route {
    let data = parse_gpx(gpx).unwrap();
    build(&data, settings)
        .unwrap()
        .into_route("route-snapshot".to_string(), 0.0)
}

/// Compare actual CSV output against the expected snapshot file.
/// When `UPDATE_SNAPSHOTS=1` is set, write/overwrite the expected file instead.
fn assert_snapshot(actual: &str, expected_path: &str) {
    let path = format!("tests/fixtures/expected/{expected_path}");

    if matches!(std::env::var("UPDATE_SNAPSHOTS").as_deref(), Ok("1")) {
        let dir = Path::new(&path).parent().unwrap();
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(&path, actual.as_bytes()).unwrap();
        eprintln!("Updated snapshot: {path}");
        return;
    }

    let expected = std::fs::read_to_string(&path).unwrap_or_else(|_| {
        panic!("Expected file not found: {path}. Run with UPDATE_SNAPSHOTS=1 to generate.")
    });

    // Checkouts may rewrite line endings; the CRLF itself is checked separately.
    assert_eq!(
        actual.replace("\r\n", "\n"),
        expected.replace("\r\n", "\n"),
        "Snapshot mismatch for {path}.\nRun with UPDATE_SNAPSHOTS=1 to update."
    );
}

#[test]
fn snapshot_balcony_csv() {
    let settings = Settings {
        safety_time_percentage: 10.0,
        ..Settings::default()
    };
    let route = plan(&load_fixture("balcony.gpx"), &settings);
    let csv = route_to_csv(&route, &settings).unwrap();

    assert!(csv.ends_with("\r\n"));
    assert!(!csv.replace("\r\n", "").contains('\n'));
    assert_snapshot(&csv, "balcony.csv");
}

#[test]
fn snapshot_alpine_traverse_csv_with_edits() {
    let settings = Settings {
        start_time: "07:30".to_string(),
        safety_time_percentage: 20.0,
        ..Settings::default()
    };
    let route = plan(&load_fixture("alpine_traverse.gpx"), &settings);

    // waypoint-1 is Col and waypoint-2 is Hut; Lake is off the track.
    let edits = [
        ("waypoint-1", WaypointEdit::TerrainDifficultyPenalty(0.25)),
        ("waypoint-1", WaypointEdit::IsDecisionPoint(true)),
        ("waypoint-2", WaypointEdit::StopDuration(15.0)),
        (
            "waypoint-2",
            WaypointEdit::Comments("Water, beds and soup".to_string()),
        ),
    ];
    let route = edits.into_iter().fold(route, |route, (id, edit)| {
        route.apply_edit(id, edit, &settings).unwrap()
    });

    let csv = route_to_csv(&route, &settings).unwrap();
    assert_snapshot(&csv, "alpine_traverse.csv");
}
