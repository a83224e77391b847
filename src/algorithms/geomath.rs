//! Spherical and planar geometry on geodetic points
//!
//! Pure functions, no state. Distances use a spherical Earth of radius
//! [`EARTH_RADIUS_M`]; the local offset is an equirectangular approximation
//! meant for the short ranges at which content is placed around a user.

use crate::core::{GeoPoint, LocalOffset, EARTH_RADIUS_M};

/// Great-circle distance in meters (haversine formula)
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Forward azimuth from `from` to `to`, degrees in [0, 360).
///
/// When both points coincide the azimuth is undefined; `atan2(0, 0)` makes
/// this return 0 rather than failing.
pub fn initial_bearing(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// East/north displacement of `target` as seen from `origin`.
///
/// Equirectangular approximation: `x = Δlon · R · cos(lat0)`, `z = Δlat · R`.
/// Error grows with distance and towards the poles, where `cos(lat0)`
/// collapses; treat results beyond about 1 km as indicative only.
pub fn local_offset(origin: &GeoPoint, target: &GeoPoint) -> LocalOffset {
    let delta_lat = (target.latitude - origin.latitude).to_radians();
    let delta_lon = (target.longitude - origin.longitude).to_radians();
    let origin_lat = origin.latitude.to_radians();

    LocalOffset {
        x: delta_lon * EARTH_RADIUS_M * origin_lat.cos(),
        z: delta_lat * EARTH_RADIUS_M,
    }
}

/// Inverse of [`local_offset`]: the point `offset` meters away from `origin`
pub fn offset_to_point(origin: &GeoPoint, offset: &LocalOffset) -> GeoPoint {
    let origin_lat = origin.latitude.to_radians();

    GeoPoint {
        latitude: origin.latitude + (offset.z / EARTH_RADIUS_M).to_degrees(),
        longitude: origin.longitude
            + (offset.x / (EARTH_RADIUS_M * origin_lat.cos())).to_degrees(),
    }
}

/// Bearing of a planar offset, degrees in [0, 360); 0 for a zero offset
pub fn planar_bearing(offset: &LocalOffset) -> f64 {
    normalize_degrees(offset.x.atan2(offset.z).to_degrees())
}

/// Even-odd ray casting with longitude as x and latitude as y.
///
/// A point exactly on an edge or vertex may be reported either way depending
/// on which edges the horizontal ray crosses; callers must not rely on the
/// result for boundary points. Polygons crossing the antimeridian are not
/// supported.
pub fn point_in_polygon(point: &GeoPoint, vertices: &[GeoPoint]) -> bool {
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;

    let mut j = vertices.len().wrapping_sub(1);
    for (i, vi) in vertices.iter().enumerate() {
        let vj = &vertices[j];
        let (xi, yi) = (vi.longitude, vi.latitude);
        let (xj, yj) = (vj.longitude, vj.latitude);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Arithmetic mean of the given points
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat_sum, lon_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));

    Some(GeoPoint {
        latitude: lat_sum / n,
        longitude: lon_sum / n,
    })
}

/// Whether `point` lies within `radius_m` of `center` (inclusive)
pub fn is_within_radius(point: &GeoPoint, center: &GeoPoint, radius_m: f64) -> bool {
    haversine_distance(point, center) <= radius_m
}

/// Wrap any angle into [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap any angle into (-180, 180]
pub fn wrap_signed_degrees(angle: f64) -> f64 {
    let wrapped = normalize_degrees(angle);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint { latitude, longitude }
    }

    fn unit_square() -> Vec<GeoPoint> {
        // (lon, lat) = (0,0), (1,0), (1,1), (0,1)
        vec![pt(0.0, 0.0), pt(0.0, 1.0), pt(1.0, 1.0), pt(1.0, 0.0)]
    }

    #[test]
    fn test_haversine_zero_for_identical_points() {
        for p in [pt(0.0, 0.0), pt(41.3874, 2.1686), pt(-89.9, 179.9)] {
            assert_eq!(haversine_distance(&p, &p), 0.0);
        }
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = pt(41.3874, 2.1686);
        let b = pt(41.4036, 2.1744);
        let ab = haversine_distance(&a, &b);
        let ba = haversine_distance(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_millidegree_latitude() {
        let d = haversine_distance(&pt(0.0, 0.0), &pt(0.001, 0.0));
        assert!((d - 111.2).abs() < 1.0, "distance was {}", d);
    }

    #[test]
    fn test_initial_bearing_cardinal_points() {
        let origin = pt(0.0, 0.0);
        assert!(initial_bearing(&origin, &pt(1.0, 0.0)).abs() < 1.0);
        assert!((initial_bearing(&origin, &pt(0.0, 1.0)) - 90.0).abs() < 1.0);
        assert!((initial_bearing(&origin, &pt(-1.0, 0.0)) - 180.0).abs() < 1.0);
        assert!((initial_bearing(&origin, &pt(0.0, -1.0)) - 270.0).abs() < 1.0);
    }

    #[test]
    fn test_initial_bearing_coincident_points_is_stable() {
        let p = pt(41.0, 2.0);
        assert_eq!(initial_bearing(&p, &p), 0.0);
    }

    #[test]
    fn test_local_offset_axes() {
        let origin = pt(0.0, 0.0);
        let north = local_offset(&origin, &pt(0.001, 0.0));
        assert!(north.x.abs() < 1e-9);
        assert!((north.z - 111.19).abs() < 0.1);

        let east = local_offset(&origin, &pt(0.0, 0.001));
        assert!((east.x - 111.19).abs() < 0.1);
        assert!(east.z.abs() < 1e-9);
    }

    #[test]
    fn test_local_offset_shrinks_east_with_latitude() {
        let at_60 = local_offset(&pt(60.0, 0.0), &pt(60.0, 0.001));
        let at_0 = local_offset(&pt(0.0, 0.0), &pt(0.0, 0.001));
        assert!((at_60.x / at_0.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_offset_to_point_inverts_local_offset() {
        let origin = pt(41.3874, 2.1686);
        let offset = LocalOffset::new(-35.0, 120.0);
        let point = offset_to_point(&origin, &offset);
        let back = local_offset(&origin, &point);
        assert!((back.x - offset.x).abs() < 1e-6);
        assert!((back.z - offset.z).abs() < 1e-6);
    }

    #[test]
    fn test_planar_and_great_circle_bearing_agree_at_short_range() {
        let user = pt(41.3874, 2.1686);
        for (dlat, dlon) in [(0.002, 0.001), (-0.003, 0.004), (0.0005, -0.006), (-0.004, -0.001)] {
            let target = pt(user.latitude + dlat, user.longitude + dlon);
            let great_circle = initial_bearing(&user, &target);
            let planar = planar_bearing(&local_offset(&user, &target));
            let diff = wrap_signed_degrees(great_circle - planar).abs();
            assert!(diff < 0.5, "bearings differ by {} degrees", diff);
        }
    }

    #[test]
    fn test_point_in_unit_square() {
        let square = unit_square();
        assert!(point_in_polygon(&pt(0.5, 0.5), &square));
        assert!(!point_in_polygon(&pt(2.0, 2.0), &square));
        assert!(!point_in_polygon(&pt(0.5, -0.5), &square));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // U shape opening north
        let u = vec![
            pt(0.0, 0.0),
            pt(0.0, 3.0),
            pt(3.0, 3.0),
            pt(3.0, 2.0),
            pt(1.0, 2.0),
            pt(1.0, 1.0),
            pt(3.0, 1.0),
            pt(3.0, 0.0),
        ];
        assert!(point_in_polygon(&pt(0.5, 1.5), &u));
        assert!(!point_in_polygon(&pt(2.0, 1.5), &u));
        assert!(point_in_polygon(&pt(2.0, 0.5), &u));
    }

    #[test]
    fn test_point_in_polygon_empty_is_outside() {
        assert!(!point_in_polygon(&pt(0.0, 0.0), &[]));
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&unit_square()).unwrap();
        assert!((c.latitude - 0.5).abs() < 1e-12);
        assert!((c.longitude - 0.5).abs() < 1e-12);
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_is_within_radius_inclusive() {
        let center = pt(0.0, 0.0);
        let p = pt(0.001, 0.0);
        let d = haversine_distance(&p, &center);
        assert!(is_within_radius(&p, &center, d));
        assert!(!is_within_radius(&p, &center, d - 0.01));
    }

    #[test]
    fn test_angle_wrapping() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(450.0), 90.0);

        assert!((wrap_signed_degrees(350.0 - 10.0) - -20.0).abs() < 1e-9);
        assert_eq!(wrap_signed_degrees(180.0), 180.0);
        assert_eq!(wrap_signed_degrees(-180.0), 180.0);
        assert_eq!(wrap_signed_degrees(-179.0), -179.0);
    }
}
