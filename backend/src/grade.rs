use shared::ElevationPoint;

use crate::interpolate::elevation_at;

/// Horizontal runs shorter than this are treated as a collapsed window.
const MIN_RUN_M: f64 = 1e-9;

/// Upper bound on samples along one course; the step widens to respect it.
pub const MAX_SAMPLES: usize = 1_000_000;

/// `step` widened so that `[0, end]` never holds more than [`MAX_SAMPLES`]
/// intervals.
pub fn bounded_step(end: f64, step: f64) -> f64 {
    step.max(end / MAX_SAMPLES as f64)
}

/// Local slope in percent at `distance`.
///
/// With a positive `window_m` the elevation is sampled half a window either
/// side of `distance` (clamped to the course) and divided by the run actually
/// covered. A zero window falls back to the slope of the profile segment that
/// brackets `distance`.
pub fn calculate_grade_at_distance(
    points: &[ElevationPoint],
    distance: f64,
    window_m: f64,
) -> f64 {
    if points.len() < 2 || distance.is_nan() {
        return 0.0;
    }

    if !(window_m > 0.0) || !window_m.is_finite() {
        return point_to_point_grade(points, distance);
    }

    let first = points[0].distance;
    let last = points[points.len() - 1].distance.max(first);
    let half = window_m / 2.0;
    let lo = (distance - half).clamp(first, last);
    let hi = (distance + half).clamp(first, last);

    let run = hi - lo;
    if run <= MIN_RUN_M {
        return 0.0;
    }

    match (elevation_at(points, lo), elevation_at(points, hi)) {
        (Some(e_lo), Some(e_hi)) => (e_hi - e_lo) / run * 100.0,
        _ => 0.0,
    }
}

fn point_to_point_grade(points: &[ElevationPoint], distance: f64) -> f64 {
    let hi = points
        .partition_point(|p| p.distance <= distance)
        .clamp(1, points.len() - 1);
    let a = &points[hi - 1];
    let b = &points[hi];

    let run = b.distance - a.distance;
    if run <= MIN_RUN_M {
        return 0.0;
    }
    (b.elevation - a.elevation) / run * 100.0
}

/// Distances `0, step, 2·step, …` up to and including `end`.
pub fn sample_distances(end: f64, step: f64) -> Vec<f64> {
    if !(end > 0.0) || !(step > 0.0) || !end.is_finite() {
        return Vec::new();
    }
    let step = bounded_step(end, step);
    let count = (end / step).floor() as usize;
    let mut distances: Vec<f64> = (0..=count).map(|i| i as f64 * step).collect();
    if distances.last().is_some_and(|&d| end - d > MIN_RUN_M) {
        distances.push(end);
    }
    distances
}

/// `(distance, grade %)` pairs every `step_m` meters along the course.
pub fn grade_profile(points: &[ElevationPoint], window_m: f64, step_m: f64) -> Vec<(f64, f64)> {
    let Some(last) = points.last() else {
        return Vec::new();
    };
    sample_distances(last.distance, step_m)
        .into_iter()
        .map(|d| (d, calculate_grade_at_distance(points, d, window_m)))
        .collect()
}
