use std::collections::BTreeSet;

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use shared::{ElevationPoint, ProfileSample, RouteMatch};

use crate::profile::{EARTH_RADIUS_M, haversine_m};

/// Sample elevation, latitude and longitude at `distance` meters along the
/// profile. The distance is clamped to the profile bounds.
pub fn interpolate_at_distance(
    points: &[ElevationPoint],
    distance: f64,
) -> Option<ProfileSample> {
    let first = points.first()?;
    let last = points.last()?;

    let d = if distance.is_nan() {
        first.distance
    } else {
        distance.clamp(first.distance, last.distance.max(first.distance))
    };

    let i = points.partition_point(|p| p.distance < d);
    if i == 0 {
        return Some((*first).into());
    }
    if i >= points.len() {
        return Some((*last).into());
    }

    let prev = points[i - 1];
    let curr = points[i];
    if d == curr.distance {
        return Some(curr.into());
    }

    let span = curr.distance - prev.distance;
    if span <= 0.0 {
        return Some(prev.into());
    }

    let ratio = (d - prev.distance) / span;
    Some(ProfileSample {
        distance: d,
        elevation: prev.elevation + (curr.elevation - prev.elevation) * ratio,
        lat: prev.lat + (curr.lat - prev.lat) * ratio,
        lng: prev.lng + (curr.lng - prev.lng) * ratio,
    })
}

/// Elevation only; `None` for an empty profile.
pub fn elevation_at(points: &[ElevationPoint], distance: f64) -> Option<f64> {
    interpolate_at_distance(points, distance).map(|s| s.elevation)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Position along the segment, 0 at `a`, 1 at `b`.
    pub t: f64,
    pub snapped_lat: f64,
    pub snapped_lng: f64,
}

/// Project `(lat, lng)` onto the segment `a → b` in a locally flat
/// (equirectangular) frame.
pub fn project_point_on_track_segment(
    lat: f64,
    lng: f64,
    a: &ElevationPoint,
    b: &ElevationPoint,
) -> SegmentProjection {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();

    let (ax, ay) = (a.lng * cos_lat, a.lat);
    let (bx, by) = (b.lng * cos_lat, b.lat);
    let (px, py) = (lng * cos_lat, lat);

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    SegmentProjection {
        t,
        snapped_lat: a.lat + (b.lat - a.lat) * t,
        snapped_lng: a.lng + (b.lng - a.lng) * t,
    }
}

/// Number of nearest vertices whose adjacent segments are examined.
const NEAREST_CANDIDATES: usize = 16;
/// Extra pointer distance under which two candidates count as the same spot
/// on an overlapping course.
const OVERLAP_SLACK_M: f64 = 15.0;
const OVERLAP_RATIO: f64 = 1.5;

/// Spatial index over a profile for "which route distance did the user click".
pub struct TrackIndex {
    points: Vec<ElevationPoint>,
    origin: (f64, f64),
    tree: KdTree<f64, usize, [f64; 2]>,
}

impl TrackIndex {
    /// Points without finite coordinates are left out, and the track runs
    /// straight between their neighbours.
    pub fn new(points: &[ElevationPoint]) -> Self {
        let usable: Vec<ElevationPoint> = points
            .iter()
            .copied()
            .filter(|p| p.lat.is_finite() && p.lng.is_finite() && p.distance.is_finite())
            .collect();
        let skipped = points.len() - usable.len();
        if skipped > 0 {
            tracing::debug!("skipped {skipped} track points without usable coordinates");
        }

        let origin = usable.first().map(|p| (p.lat, p.lng)).unwrap_or((0.0, 0.0));
        let mut tree = KdTree::new(2);
        let mut indexed = Vec::with_capacity(usable.len());
        for point in usable {
            let xy = local_xy(origin, point.lat, point.lng);
            if let Err(err) = tree.add(xy, indexed.len()) {
                tracing::debug!(
                    "point {} left out of the track index: {err:?}",
                    point.original_index
                );
                continue;
            }
            indexed.push(point);
        }

        Self {
            points: indexed,
            origin,
            tree,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Route distance of the point on the track closest to `(lat, lng)`.
    ///
    /// When the course passes the same spot more than once, `hint` (usually
    /// the previously selected distance) picks between the passes.
    pub fn nearest(&self, lat: f64, lng: f64, hint: Option<f64>) -> Option<RouteMatch> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if self.points.len() == 1 {
            let p = self.points[0];
            return Some(RouteMatch {
                route_distance_meters: p.distance,
                pointer_distance_meters: haversine_m(lat, lng, p.lat, p.lng),
            });
        }

        let query = local_xy(self.origin, lat, lng);
        let k = NEAREST_CANDIDATES.min(self.points.len());
        let nearest = self.tree.nearest(&query, k, &squared_euclidean).ok()?;

        let mut segment_starts = BTreeSet::new();
        for (_, &idx) in &nearest {
            if idx > 0 {
                segment_starts.insert(idx - 1);
            }
            if idx + 1 < self.points.len() {
                segment_starts.insert(idx);
            }
        }

        let candidates: Vec<RouteMatch> = segment_starts
            .into_iter()
            .map(|start| {
                let a = &self.points[start];
                let b = &self.points[start + 1];
                let proj = project_point_on_track_segment(lat, lng, a, b);
                let pointer = haversine_m(lat, lng, proj.snapped_lat, proj.snapped_lng);
                RouteMatch {
                    route_distance_meters: a.distance + (b.distance - a.distance) * proj.t,
                    pointer_distance_meters: pointer,
                }
            })
            .filter(|m| m.pointer_distance_meters.is_finite())
            .collect();

        select_candidate(&candidates, hint)
    }
}

fn select_candidate(candidates: &[RouteMatch], hint: Option<f64>) -> Option<RouteMatch> {
    let min_pointer = candidates
        .iter()
        .map(|c| c.pointer_distance_meters)
        .min_by(f64::total_cmp)?;

    // Ties (within a millimeter) go to the earliest pass.
    let best = candidates
        .iter()
        .copied()
        .filter(|c| c.pointer_distance_meters <= min_pointer + 1e-3)
        .min_by(|a, b| a.route_distance_meters.total_cmp(&b.route_distance_meters))?;

    let Some(hint) = hint.filter(|h| h.is_finite()) else {
        return Some(best);
    };

    let threshold = (best.pointer_distance_meters * OVERLAP_RATIO)
        .max(best.pointer_distance_meters + OVERLAP_SLACK_M);

    candidates
        .iter()
        .copied()
        .filter(|c| c.pointer_distance_meters <= threshold)
        .min_by(|a, b| {
            (a.route_distance_meters - hint)
                .abs()
                .total_cmp(&(b.route_distance_meters - hint).abs())
        })
        .or(Some(best))
}

fn local_xy(origin: (f64, f64), lat: f64, lng: f64) -> [f64; 2] {
    let cos_lat = origin.0.to_radians().cos();
    [
        (lng - origin.1).to_radians() * cos_lat * EARTH_RADIUS_M,
        (lat - origin.0).to_radians() * EARTH_RADIUS_M,
    ]
}
