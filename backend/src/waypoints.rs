use std::collections::HashMap;

use shared::{ElevationPoint, Plan, Waypoint, WaypointStoppageTime};

use crate::profile::total_distance;

/// Waypoints ordered by `order`, ties broken by distance.
pub fn sorted_waypoints(waypoints: &[Waypoint]) -> Vec<Waypoint> {
    let mut sorted = waypoints.to_vec();
    sorted.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then(a.distance.total_cmp(&b.distance))
    });
    sorted
}

/// Start and Finish are fixed; everything in between may be removed.
pub fn can_delete_waypoint(waypoints: &[Waypoint], id: &str) -> bool {
    let sorted = sorted_waypoints(waypoints);
    match sorted.iter().position(|w| w.id == id) {
        Some(pos) => pos != 0 && pos + 1 != sorted.len(),
        None => false,
    }
}

/// Where the course ends: the Finish waypoint, or the end of the track. A
/// Finish placed past the end of the track is pulled back onto it.
pub fn course_end(points: &[ElevationPoint], waypoints: &[Waypoint]) -> f64 {
    let track_end = total_distance(points);
    match sorted_waypoints(waypoints).last() {
        Some(finish)
            if waypoints.len() >= 2 && finish.distance.is_finite() && finish.distance > 0.0 =>
        {
            finish.distance.min(track_end)
        }
        _ => track_end,
    }
}

/// A waypoint with its resolved stoppage delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub waypoint_id: String,
    pub distance: f64,
    pub stoppage: f64,
}

/// Stoppage delays for every waypoint, in course order.
#[derive(Debug, Clone, Default)]
pub struct StoppageSchedule {
    stops: Vec<Stop>,
}

impl StoppageSchedule {
    pub fn new(waypoints: &[Waypoint], overrides: &[WaypointStoppageTime], plan: &Plan) -> Self {
        let overrides: HashMap<&str, f64> = overrides
            .iter()
            .map(|o| (o.waypoint_id.as_str(), o.stoppage_time))
            .collect();
        let default = sanitize_seconds(plan.default_stoppage_time);

        let sorted = sorted_waypoints(waypoints);
        let last = sorted.len().saturating_sub(1);
        let stops = sorted
            .iter()
            .enumerate()
            .map(|(pos, w)| {
                let intermediate = pos != 0 && pos != last;
                let stoppage = if intermediate {
                    overrides
                        .get(w.id.as_str())
                        .map(|&s| sanitize_seconds(s))
                        .unwrap_or(default)
                } else {
                    0.0
                };
                Stop {
                    waypoint_id: w.id.clone(),
                    distance: w.distance,
                    stoppage,
                }
            })
            .collect();

        Self { stops }
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stoppage_for(&self, waypoint_id: &str) -> f64 {
        self.stops
            .iter()
            .find(|s| s.waypoint_id == waypoint_id)
            .map(|s| s.stoppage)
            .unwrap_or(0.0)
    }

    /// Stoppage accumulated at waypoints located at or before `distance`.
    pub fn cumulative_at(&self, distance: f64) -> f64 {
        self.stops
            .iter()
            .filter(|s| s.distance <= distance)
            .map(|s| s.stoppage)
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.stops.iter().map(|s| s.stoppage).sum()
    }
}

fn sanitize_seconds(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
