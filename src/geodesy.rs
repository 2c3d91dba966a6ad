const EARTH_RADIUS_KM: f64 = 6371.0;

// WGS84 ellipsoid, for the UTM display label only.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const UTM_BANDS: &[u8] = b"CDEFGHJKLMNPQRSTUVWX";

/// Great-circle distance in kilometers (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat
        + lat1.to_radians().cos() * lat2.to_radians().cos() * sin_dlon * sin_dlon;
    // Rounding can push h a hair past 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Great-circle distance in meters.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_km(lat1, lon1, lat2, lon2) * 1000.0
}

/// UTM zone number, including the Norway and Svalbard exceptions.
fn utm_zone(lat: f64, lon: f64) -> u8 {
    let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..84.0).contains(&lat) {
        match lon {
            l if (0.0..9.0).contains(&l) => return 31,
            l if (9.0..21.0).contains(&l) => return 33,
            l if (21.0..33.0).contains(&l) => return 35,
            l if (33.0..42.0).contains(&l) => return 37,
            _ => {}
        }
    }
    (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8
}

fn utm_band(lat: f64) -> char {
    let idx = ((lat + 80.0) / 8.0).floor().clamp(0.0, (UTM_BANDS.len() - 1) as f64) as usize;
    UTM_BANDS[idx] as char
}

/// Grid position label such as `32T 421184E 5146780N`.
///
/// Display only: nothing in the distance or time calculations reads it.
/// Latitudes outside the UTM range (polar caps) get a plain `UPS` label.
pub fn grid_label(lat: f64, lon: f64) -> String {
    if !lat.is_finite() || !lon.is_finite() {
        return "n/a".to_string();
    }
    if !(-80.0..=84.0).contains(&lat) {
        return format!("UPS {lat:.5} {lon:.5}");
    }

    let zone = utm_zone(lat, lon);
    let (easting, northing) = utm_project(lat, lon, zone);
    format!(
        "{zone}{} {:.0}E {:.0}N",
        utm_band(lat),
        easting.round(),
        northing.round()
    )
}

/// Transverse Mercator projection onto the given UTM zone.
fn utm_project(lat: f64, lon: f64, zone: u8) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let phi = lat.to_radians();
    let lon0 = (f64::from(zone) - 1.0) * 6.0 - 180.0 + 3.0;
    let dlon = ((lon - lon0 + 180.0).rem_euclid(360.0) - 180.0).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * dlon;

    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut northing = UTM_K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if lat < 0.0 {
        northing += UTM_FALSE_NORTHING_SOUTH;
    }

    (easting, northing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_point() {
        assert_eq!(distance_km(45.0, 5.0, 45.0, 5.0), 0.0);
    }

    #[test]
    fn test_distance_one_degree_of_longitude_at_equator() {
        let d = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_distance_m_scales() {
        let km = distance_km(46.0, 7.0, 46.01, 7.01);
        assert!((distance_m(46.0, 7.0, 46.01, 7.01) - km * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_label_equator_central_meridian() {
        assert_eq!(grid_label(0.0, 3.0), "31N 500000E 0N");
    }

    #[test]
    fn test_grid_label_known_position() {
        // Matterhorn summit, west of the zone 32 central meridian
        let label = grid_label(45.9763, 7.6586);
        assert!(label.starts_with("32T "), "got {label}");
        let parts: Vec<&str> = label.split(' ').collect();
        let easting: f64 = parts[1].trim_end_matches('E').parse().unwrap();
        let northing: f64 = parts[2].trim_end_matches('N').parse().unwrap();
        assert!((easting - 396_100.0).abs() < 1_000.0, "easting {easting}");
        assert!((northing - 5_092_000.0).abs() < 5_000.0, "northing {northing}");
    }

    #[test]
    fn test_grid_label_southern_hemisphere_and_norway() {
        assert!(grid_label(-33.9, 18.4).starts_with("34H "));
        assert!(grid_label(60.0, 5.0).starts_with("32V "));
        assert!(grid_label(78.0, 15.0).starts_with("33X "));
    }

    #[test]
    fn test_grid_label_is_stable_and_total() {
        assert_eq!(grid_label(46.5, 7.9), grid_label(46.5, 7.9));
        assert!(grid_label(89.0, 0.0).starts_with("UPS"));
        assert_eq!(grid_label(f64::NAN, 0.0), "n/a");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = (f64, f64)> {
            (-90.0..=90.0, -180.0..=180.0)
        }

        proptest! {
            #[test]
            fn prop_distance_symmetric(a in valid_coord(), b in valid_coord()) {
                let ab = distance_km(a.0, a.1, b.0, b.1);
                let ba = distance_km(b.0, b.1, a.0, a.1);
                prop_assert!((ab - ba).abs() < 1e-9);
            }

            #[test]
            fn prop_distance_same_point_is_zero(a in valid_coord()) {
                prop_assert_eq!(distance_km(a.0, a.1, a.0, a.1), 0.0);
            }

            #[test]
            fn prop_distance_finite_and_bounded(a in valid_coord(), b in valid_coord()) {
                let d = distance_km(a.0, a.1, b.0, b.1);
                prop_assert!(d.is_finite());
                prop_assert!(d >= 0.0);
                prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
            }
        }
    }
}
