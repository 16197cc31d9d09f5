use shared::{ElevationPoint, FeatureCollection, Geometry, Position, ProfileStats};

use crate::error::PlanError;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Longest course the engine plans (10 000 km).
pub const MAX_COURSE_METERS: f64 = 1.0e7;

pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();

    let h = sin_dlat * sin_dlat + phi1.cos() * phi2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_M * h.min(1.0).sqrt().asin()
}

/// A raw `[lng, lat, ele?]` position reduced to the values the extractor keeps.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
    elevation: f64,
}

fn parse_position(position: &Position) -> Option<RawCoordinate> {
    let lng = (*position.first()?)?;
    let lat = (*position.get(1)?)?;
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    let elevation = position
        .get(2)
        .copied()
        .flatten()
        .filter(|e| e.is_finite())
        .unwrap_or(0.0);
    Some(RawCoordinate { lat, lng, elevation })
}

fn line_strings(geometry: &Geometry) -> Vec<&[Position]> {
    match geometry {
        Geometry::LineString { coordinates } => vec![coordinates.as_slice()],
        Geometry::MultiLineString { coordinates } => {
            coordinates.iter().map(|line| line.as_slice()).collect()
        }
        Geometry::Unsupported => Vec::new(),
    }
}

/// Flatten every line geometry of the collection into one distance-indexed
/// profile. Distance keeps accumulating across geometry boundaries.
pub fn extract_elevation_profile(track: &FeatureCollection) -> Vec<ElevationPoint> {
    let mut points: Vec<ElevationPoint> = Vec::new();
    let mut original_index = 0usize;
    let mut skipped = 0usize;

    let lines = track
        .features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .flat_map(line_strings);

    for line in lines {
        for position in line {
            let index = original_index;
            original_index += 1;

            let Some(coord) = parse_position(position) else {
                skipped += 1;
                continue;
            };

            let distance = match points.last() {
                Some(prev) => prev.distance + haversine_m(prev.lat, prev.lng, coord.lat, coord.lng),
                None => 0.0,
            };

            points.push(ElevationPoint {
                distance,
                elevation: coord.elevation,
                lat: coord.lat,
                lng: coord.lng,
                original_index: index,
            });
        }
    }

    if skipped > 0 {
        tracing::debug!("skipped {} degenerate coordinate(s) while extracting profile", skipped);
    }

    points
}

/// `true` when the profile can support interpolation and integration: at
/// least two finite points, starting at distance 0, with non-decreasing
/// distances and a positive length no longer than [`MAX_COURSE_METERS`].
pub fn is_usable(points: &[ElevationPoint]) -> bool {
    let finite = |p: &ElevationPoint| {
        p.distance.is_finite() && p.elevation.is_finite() && p.lat.is_finite() && p.lng.is_finite()
    };
    let total = total_distance(points);
    points.len() >= 2
        && points[0].distance == 0.0
        && points.iter().all(finite)
        && points.windows(2).all(|w| w[1].distance >= w[0].distance)
        && total > 0.0
        && total <= MAX_COURSE_METERS
}

/// Accepts a caller-supplied profile. A profile whose first point sits past
/// 0 is shifted back to start at 0; anything else that fails [`is_usable`]
/// is rejected.
pub fn prepare_profile(mut points: Vec<ElevationPoint>) -> Result<Vec<ElevationPoint>, PlanError> {
    let offset = points.first().map(|p| p.distance).unwrap_or(0.0);
    if offset.is_finite() && offset != 0.0 {
        tracing::debug!("shifting profile by {offset:.1} m to start at 0");
        for point in &mut points {
            point.distance -= offset;
        }
    }
    if is_usable(&points) {
        Ok(points)
    } else {
        Err(PlanError::NoProfile)
    }
}

pub fn total_distance(points: &[ElevationPoint]) -> f64 {
    points.last().map(|p| p.distance).unwrap_or(0.0)
}

pub fn profile_stats(points: &[ElevationPoint]) -> ProfileStats {
    let mut total_gain = 0.0;
    let mut total_loss = 0.0;

    for window in points.windows(2) {
        let diff = window[1].elevation - window[0].elevation;
        if diff > 0.0 {
            total_gain += diff;
        } else {
            total_loss += -diff;
        }
    }

    let min_elevation = points
        .iter()
        .map(|p| p.elevation)
        .fold(f64::INFINITY, f64::min);
    let max_elevation = points
        .iter()
        .map(|p| p.elevation)
        .fold(f64::NEG_INFINITY, f64::max);

    ProfileStats {
        total_distance: total_distance(points),
        total_gain,
        total_loss,
        min_elevation: min_elevation.is_finite().then_some(min_elevation),
        max_elevation: max_elevation.is_finite().then_some(max_elevation),
        point_count: points.len(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use shared::ElevationPoint;

    /// Straight northbound course sampled from `(distance, elevation)` pairs.
    pub fn profile(samples: &[(f64, f64)]) -> Vec<ElevationPoint> {
        samples
            .iter()
            .enumerate()
            .map(|(i, &(distance, elevation))| ElevationPoint {
                distance,
                elevation,
                lat: 45.0 + distance / 111_195.0,
                lng: 5.0,
                original_index: i,
            })
            .collect()
    }

    /// Rolling course: one sample every `step` meters following a sine hill.
    pub fn rolling(length: f64, step: f64, amplitude: f64) -> Vec<ElevationPoint> {
        let count = (length / step).round() as usize;
        let samples: Vec<(f64, f64)> = (0..=count)
            .map(|i| {
                let d = (i as f64 * step).min(length);
                (d, 200.0 + amplitude * (d / 1500.0).sin())
            })
            .collect();
        profile(&samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Feature;

    fn line(coords: &[[f64; 3]]) -> Feature {
        Feature {
            geometry: Some(Geometry::LineString {
                coordinates: coords
                    .iter()
                    .map(|c| vec![Some(c[0]), Some(c[1]), Some(c[2])])
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_haversine_same_point() {
        assert_eq!(haversine_m(45.0, 5.0, 45.0, 5.0), 0.0);
    }

    #[test]
    fn test_haversine_1km_north() {
        let dist = haversine_m(45.0, 5.0, 45.009, 5.0);
        assert!((dist - 1000.0).abs() < 10.0);
    }

    #[test]
    fn test_empty_collection_gives_empty_profile() {
        let profile = extract_elevation_profile(&FeatureCollection { features: vec![] });
        assert!(profile.is_empty());
        assert!(!is_usable(&profile));
    }

    #[test]
    fn test_single_point_profile() {
        let track = FeatureCollection {
            features: vec![line(&[[5.0, 45.0, 120.0]])],
        };
        let profile = extract_elevation_profile(&track);
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].distance, 0.0);
        assert!(!is_usable(&profile));
    }

    #[test]
    fn test_non_monotonic_profile_is_rejected() {
        let profile = fixtures::profile(&[(0.0, 100.0), (3000.0, 400.0), (1000.0, 100.0)]);
        assert!(!is_usable(&profile));
        assert_eq!(prepare_profile(profile), Err(PlanError::NoProfile));
    }

    #[test]
    fn test_offset_profile_is_shifted_to_zero() {
        let profile = fixtures::profile(&[(1000.0, 100.0), (2000.0, 200.0)]);
        assert!(!is_usable(&profile));
        let shifted = prepare_profile(profile).unwrap();
        assert_eq!(shifted[0].distance, 0.0);
        assert_eq!(total_distance(&shifted), 1000.0);
        assert_eq!(shifted[1].elevation, 200.0);
    }

    #[test]
    fn test_non_finite_or_oversized_profile_is_rejected() {
        let mut profile = fixtures::profile(&[(0.0, 100.0), (1000.0, 120.0)]);
        profile[1].elevation = f64::NAN;
        assert!(!is_usable(&profile));

        let huge = fixtures::profile(&[(0.0, 100.0), (1e300, 120.0)]);
        assert_eq!(prepare_profile(huge), Err(PlanError::NoProfile));
    }

    #[test]
    fn test_distance_continues_across_geometries() {
        let track = FeatureCollection {
            features: vec![
                line(&[[5.0, 45.0, 100.0], [5.0, 45.001, 101.0]]),
                line(&[[5.0, 45.002, 102.0], [5.0, 45.003, 103.0]]),
            ],
        };
        let profile = extract_elevation_profile(&track);
        assert_eq!(profile.len(), 4);
        assert_eq!(profile[0].distance, 0.0);
        for pair in profile.windows(2) {
            assert!(pair[1].distance > pair[0].distance);
            assert!(pair[1].original_index > pair[0].original_index);
        }
        let expected = haversine_m(45.0, 5.0, 45.003, 5.0);
        assert!((total_distance(&profile) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_multilinestring_and_degenerate_coordinates() {
        let track = FeatureCollection {
            features: vec![Feature {
                geometry: Some(Geometry::MultiLineString {
                    coordinates: vec![
                        vec![vec![Some(5.0), Some(45.0)], vec![None, Some(45.001)]],
                        vec![vec![Some(5.0), Some(45.002), None], vec![Some(5.0)]],
                    ],
                }),
            }],
        };
        let profile = extract_elevation_profile(&track);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].elevation, 0.0);
        assert_eq!(profile[1].original_index, 2);
    }

    #[test]
    fn test_profile_stats() {
        let profile =
            fixtures::profile(&[(0.0, 100.0), (100.0, 110.0), (200.0, 105.0), (300.0, 120.0)]);
        let stats = profile_stats(&profile);
        assert_eq!(stats.total_distance, 300.0);
        assert!((stats.total_gain - 25.0).abs() < 1e-9);
        assert!((stats.total_loss - 5.0).abs() < 1e-9);
        assert_eq!(stats.min_elevation, Some(100.0));
        assert_eq!(stats.max_elevation, Some(120.0));
        assert_eq!(stats.point_count, 4);
    }

    #[test]
    fn test_profile_stats_empty() {
        let stats = profile_stats(&[]);
        assert_eq!(stats.total_distance, 0.0);
        assert_eq!(stats.min_elevation, None);
        assert_eq!(stats.max_elevation, None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn position() -> impl Strategy<Value = [f64; 3]> {
            (-80.0..80.0f64, -170.0..170.0f64, -100.0..4000.0f64)
                .prop_map(|(lat, lng, ele)| [lng, lat, ele])
        }

        proptest! {
            #[test]
            fn prop_distance_is_monotonic(coords in prop::collection::vec(position(), 0..40)) {
                let track = FeatureCollection { features: vec![line(&coords)] };
                let profile = extract_elevation_profile(&track);
                prop_assert_eq!(profile.len(), coords.len());
                if let Some(first) = profile.first() {
                    prop_assert_eq!(first.distance, 0.0);
                }
                for pair in profile.windows(2) {
                    prop_assert!(pair[1].distance >= pair[0].distance);
                }
            }
        }
    }
}
