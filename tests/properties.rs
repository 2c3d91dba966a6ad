use gpx_route_planner_wasm::builder::{MAX_SAMPLED_WAYPOINTS, build_from_source};
use gpx_route_planner_wasm::gpx_types::GpxPoint;
use gpx_route_planner_wasm::recalc::recalculate;
use gpx_route_planner_wasm::route::RouteSource;
use gpx_route_planner_wasm::settings::{DistanceMethod, Settings};
use proptest::prelude::*;

fn track_strategy() -> impl Strategy<Value = Vec<GpxPoint>> {
    prop::collection::vec((-0.002f64..0.002, -0.002f64..0.002, 500.0f64..3500.0), 1..60).prop_map(
        |steps| {
            let (mut lat, mut lon) = (45.8, 6.9);
            steps
                .into_iter()
                .map(|(dlat, dlon, ele)| {
                    lat += dlat;
                    lon += dlon;
                    GpxPoint::new(lat, lon).with_ele(ele)
                })
                .collect()
        },
    )
}

fn source_strategy() -> impl Strategy<Value = RouteSource> {
    track_strategy().prop_flat_map(|track| {
        let len = track.len();
        let waypoints = prop::collection::vec((0..len, -0.003f64..0.003), 0..8);
        (Just(track), waypoints).prop_map(|(track, picks)| {
            let gpx_waypoints = picks
                .into_iter()
                .enumerate()
                .map(|(n, (idx, offset))| {
                    let at = &track[idx];
                    GpxPoint::new(at.lat + offset, at.lon).with_name(format!("Mark {n}"))
                })
                .collect();
            RouteSource {
                track_points: track,
                gpx_waypoints,
            }
        })
    })
}

fn method_strategy() -> impl Strategy<Value = DistanceMethod> {
    prop_oneof![
        Just(DistanceMethod::Track),
        Just(DistanceMethod::WaypointToWaypoint)
    ]
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn built_routes_keep_running_sums(source in source_strategy(), method in method_strategy()) {
        let settings = Settings { distance_calculation_method: method, ..Settings::default() };
        let built = build_from_source("Random".to_string(), &source, &settings).unwrap();
        let w = &built.waypoints;

        prop_assert!(w.len() >= 2);
        prop_assert!(w[0].is_start_point);
        prop_assert!(w[w.len() - 1].is_end_point);
        prop_assert_eq!(w[0].total_time, 0.0);
        if source.gpx_waypoints.is_empty() {
            prop_assert!(w.len() <= MAX_SAMPLED_WAYPOINTS);
        }

        for pair in w.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            prop_assert!(close(next.total_distance, prev.total_distance + next.segment_distance));
            prop_assert!(close(next.total_ascent, prev.total_ascent + next.segment_ascent));
            prop_assert!(close(next.total_descent, prev.total_descent + next.segment_descent));
            prop_assert!(next.total_time >= prev.total_time);
        }
        prop_assert!(built.metadata.total_distance == w[w.len() - 1].total_distance);
    }

    #[test]
    fn recalculation_honors_edits(
        source in source_strategy(),
        edits in prop::collection::vec((0.0f64..1.0, 0.0f64..90.0), 20),
    ) {
        let settings = Settings::default();
        let built = build_from_source("Random".to_string(), &source, &settings).unwrap();

        let mut waypoints = built.waypoints.clone();
        for (w, (penalty, stop)) in waypoints.iter_mut().zip(edits) {
            w.terrain_difficulty_penalty = penalty;
            w.stop_duration = stop;
        }
        let timed = recalculate(&waypoints, &settings);

        prop_assert_eq!(timed[0].total_time, 0.0);
        for pair in timed.windows(2) {
            let (prev, w) = (&pair[0], &pair[1]);
            let expected = prev.total_time
                + w.segment_time * (1.0 + w.terrain_difficulty_penalty)
                + w.stop_duration;
            prop_assert!(close(w.total_time, expected));
        }

        let again = recalculate(&timed, &settings);
        prop_assert_eq!(again, timed);
    }
}
