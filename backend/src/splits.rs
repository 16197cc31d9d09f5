use std::sync::Arc;

use shared::{
    ElevationPoint, PaceMode, PaceUnit, Plan, SmoothingConfig, SplitRow, Waypoint, WaypointArrival,
    WaypointStoppageTime,
};

use crate::interpolate::elevation_at;
use crate::pacing::PacingModel;
use crate::waypoints::{self, StoppageSchedule, sorted_waypoints};

/// Boundaries closer than this to the course end are merged into the last row.
const BOUNDARY_EPS_M: f64 = 1e-6;

/// Elevation gain and loss between two distances, walking every profile point
/// strictly inside the span plus interpolated boundary elevations.
pub fn gain_loss(points: &[ElevationPoint], start: f64, end: f64) -> (f64, f64) {
    let (Some(first), Some(last)) = (elevation_at(points, start), elevation_at(points, end)) else {
        return (0.0, 0.0);
    };
    if !(end > start) {
        return (0.0, 0.0);
    }

    let lo = points.partition_point(|p| p.distance <= start);
    let hi = points.partition_point(|p| p.distance < end);
    let interior = points.get(lo..hi).unwrap_or(&[]).iter().map(|p| p.elevation);

    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut previous = first;
    for elevation in interior.chain(std::iter::once(last)) {
        let diff = elevation - previous;
        if diff > 0.0 {
            gain += diff;
        } else {
            loss -= diff;
        }
        previous = elevation;
    }
    (gain, loss)
}

/// Net rise over run in percent; 0 for an empty span.
pub fn average_grade(points: &[ElevationPoint], start: f64, end: f64) -> f64 {
    let run = end - start;
    if !(run > 0.0) {
        return 0.0;
    }
    match (elevation_at(points, start), elevation_at(points, end)) {
        (Some(a), Some(b)) => (b - a) / run * 100.0,
        _ => 0.0,
    }
}

/// Fixed-length split boundaries: every `unit_m` meters, last one at `end`.
pub fn split_boundaries(end: f64, unit_m: f64) -> Vec<f64> {
    if !(end > 0.0) || !(unit_m > 0.0) || !end.is_finite() {
        return Vec::new();
    }
    let mut boundaries = vec![0.0];
    let mut k = 1usize;
    loop {
        let next = k as f64 * unit_m;
        if next >= end - BOUNDARY_EPS_M {
            boundaries.push(end);
            break;
        }
        boundaries.push(next);
        k += 1;
    }
    boundaries
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSummary {
    pub finish_sec: f64,
    pub travel_sec: f64,
    pub stoppage_sec: f64,
    /// Moving pace in seconds per plan unit.
    pub average_pace: f64,
}

/// A pacing model together with the waypoint schedule, producing
/// display-ready rows whose elapsed times agree with the finish.
#[derive(Debug, Clone)]
pub struct CoursePlan {
    model: Arc<PacingModel>,
    schedule: StoppageSchedule,
    waypoints: Vec<Waypoint>,
    stoppage_total: f64,
    finish_sec: f64,
    /// Final correction applied to travel time so the finish lands on a
    /// whole second, or on the target in `time` mode.
    extra_scale: f64,
}

impl CoursePlan {
    /// Run the whole pipeline. `None` when there is nothing to plan.
    pub fn build(
        points: &[ElevationPoint],
        plan: &Plan,
        smoothing: &SmoothingConfig,
        waypoints: &[Waypoint],
        stoppage_times: &[WaypointStoppageTime],
    ) -> Option<Self> {
        let course_end = waypoints::course_end(points, waypoints);
        let schedule = StoppageSchedule::new(waypoints, stoppage_times, plan);
        let model = PacingModel::build(
            points,
            plan,
            smoothing,
            course_end,
            schedule.cumulative_at(course_end),
        )?;
        Some(Self::new(Arc::new(model), schedule, waypoints))
    }

    pub fn new(
        model: Arc<PacingModel>,
        schedule: StoppageSchedule,
        waypoints: &[Waypoint],
    ) -> Self {
        let course_end = model.course_end();
        let stoppage_total = schedule.cumulative_at(course_end);
        let travel_raw = model.travel_time();
        let plan = model.plan();

        let finish_sec = match (plan.pace_mode, plan.target_time_seconds) {
            (PaceMode::Time, Some(target)) if plan.target_includes_stoppages => {
                target.max(stoppage_total)
            }
            (PaceMode::Time, Some(target)) => target + stoppage_total,
            _ => (travel_raw + stoppage_total).round(),
        };

        let travel_desired = (finish_sec - stoppage_total).max(0.0);
        let extra_scale = if travel_raw > 0.0 {
            travel_desired / travel_raw
        } else {
            1.0
        };

        tracing::debug!(
            "course plan: travel={:.3}s stoppage={:.0}s finish={:.0}s extra_scale={:.9}",
            travel_raw,
            stoppage_total,
            finish_sec,
            extra_scale
        );

        Self {
            model,
            schedule,
            waypoints: sorted_waypoints(waypoints),
            stoppage_total,
            finish_sec,
            extra_scale,
        }
    }

    pub fn model(&self) -> &PacingModel {
        &self.model
    }

    pub fn course_end(&self) -> f64 {
        self.model.course_end()
    }

    pub fn finish_elapsed(&self) -> f64 {
        self.finish_sec
    }

    pub fn extra_scale(&self) -> f64 {
        self.extra_scale
    }

    /// Corrected travel seconds to `distance`.
    fn travel_at(&self, distance: f64) -> f64 {
        if distance >= self.course_end() {
            return self.finish_sec - self.stoppage_total;
        }
        self.model.elapsed_at(distance) * self.extra_scale
    }

    /// Elapsed seconds at `distance`, including stoppage at every waypoint
    /// located at or before it.
    pub fn elapsed_at(&self, distance: f64) -> f64 {
        if distance >= self.course_end() {
            return self.finish_sec;
        }
        self.travel_at(distance) + self.schedule.cumulative_at(distance)
    }

    fn row(&self, index: usize, start: f64, end: f64) -> SplitRow {
        let points = self.model.points();
        let dist = end - start;
        let (gain, loss) = gain_loss(points, start, end);
        let units = dist / self.model.unit_meters();
        let pace_sec_per_unit =
            (dist > 0.0).then(|| (self.travel_at(end) - self.travel_at(start)) / units);

        SplitRow {
            index,
            start,
            end,
            dist,
            gain,
            loss,
            avg_grade: average_grade(points, start, end),
            pace_sec_per_unit,
            elapsed_sec: self.elapsed_at(end),
        }
    }

    fn rows_from_boundaries(&self, boundaries: &[f64]) -> Vec<SplitRow> {
        boundaries
            .windows(2)
            .enumerate()
            .map(|(index, pair)| self.row(index, pair[0], pair[1]))
            .collect()
    }

    /// One row per `unit` of distance, the last absorbing the remainder.
    pub fn fixed_splits(&self, unit: PaceUnit) -> Vec<SplitRow> {
        self.rows_from_boundaries(&split_boundaries(self.course_end(), unit.meters()))
    }

    /// One row per waypoint-to-waypoint leg. Without at least two waypoints
    /// the whole course is a single leg.
    pub fn waypoint_segments(&self) -> Vec<SplitRow> {
        let end = self.course_end();
        let mut boundaries: Vec<f64> = Vec::with_capacity(self.waypoints.len());
        for w in &self.waypoints {
            let d = if w.distance.is_finite() { w.distance.clamp(0.0, end) } else { 0.0 };
            let floor = boundaries.last().copied().unwrap_or(0.0);
            boundaries.push(d.max(floor));
        }
        if boundaries.len() < 2 {
            boundaries = vec![0.0, end];
        }
        self.rows_from_boundaries(&boundaries)
    }

    pub fn waypoint_arrivals(&self) -> Vec<WaypointArrival> {
        let mut stoppage_before = 0.0;
        self.schedule
            .stops()
            .iter()
            .map(|stop| {
                let distance = stop.distance.clamp(0.0, self.course_end());
                let arrival_sec = if distance >= self.course_end() {
                    self.finish_sec - stop.stoppage
                } else {
                    self.travel_at(distance) + stoppage_before
                };
                stoppage_before += stop.stoppage;
                WaypointArrival {
                    waypoint_id: stop.waypoint_id.clone(),
                    distance,
                    arrival_sec,
                    stoppage_sec: stop.stoppage,
                    departure_sec: arrival_sec + stop.stoppage,
                }
            })
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let travel_sec = self.finish_sec - self.stoppage_total;
        let units = self.course_end() / self.model.unit_meters();
        PlanSummary {
            finish_sec: self.finish_sec,
            travel_sec,
            stoppage_sec: self.stoppage_total,
            average_pace: if units > 0.0 { travel_sec / units } else { 0.0 },
        }
    }
}
