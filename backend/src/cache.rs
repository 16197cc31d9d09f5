use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use lru::LruCache;
use shared::{ElevationPoint, Plan, SmoothingConfig, Waypoint, WaypointStoppageTime};

use crate::splits::CoursePlan;
use crate::waypoints::sorted_waypoints;

/// Everything that feeds the integral, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub points: &'a [ElevationPoint],
    pub plan: &'a Plan,
    pub smoothing: &'a SmoothingConfig,
    pub waypoints: &'a [Waypoint],
    pub stoppage_times: &'a [WaypointStoppageTime],
}

impl PlanInputs<'_> {
    pub fn build(&self) -> Option<CoursePlan> {
        CoursePlan::build(
            self.points,
            self.plan,
            self.smoothing,
            self.waypoints,
            self.stoppage_times,
        )
    }

    /// Cache key covering every input that changes the result. Waypoints and
    /// overrides are hashed in a canonical order.
    pub fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();

        h.write_usize(self.points.len());
        for p in self.points {
            h.write_u64(p.distance.to_bits());
            h.write_u64(p.elevation.to_bits());
            h.write_u64(p.lat.to_bits());
            h.write_u64(p.lng.to_bits());
        }

        let plan = self.plan;
        plan.pace.map(f64::to_bits).hash(&mut h);
        plan.pace_unit.hash(&mut h);
        plan.pace_mode.hash(&mut h);
        plan.target_time_seconds.map(f64::to_bits).hash(&mut h);
        plan.pacing_strategy.hash(&mut h);
        h.write_u64(plan.pacing_linear_percent.to_bits());
        plan.use_grade_adjustment.hash(&mut h);
        h.write_u64(plan.default_stoppage_time.to_bits());
        plan.target_includes_stoppages.hash(&mut h);

        let smoothing = self.smoothing;
        h.write_u64(smoothing.grade_window_meters.to_bits());
        h.write_u64(smoothing.pace_smoothing_meters.to_bits());
        h.write_u64(smoothing.sample_step_meters.to_bits());

        let waypoints = sorted_waypoints(self.waypoints);
        h.write_usize(waypoints.len());
        for w in &waypoints {
            w.id.hash(&mut h);
            h.write_u64(w.distance.to_bits());
            w.order.hash(&mut h);
        }

        let mut overrides: Vec<&WaypointStoppageTime> = self.stoppage_times.iter().collect();
        overrides.sort_by(|a, b| a.waypoint_id.cmp(&b.waypoint_id));
        h.write_usize(overrides.len());
        for o in overrides {
            o.waypoint_id.hash(&mut h);
            h.write_u64(o.stoppage_time.to_bits());
        }

        h.finish()
    }
}

/// LRU memo of built course plans.
///
/// Builds happen outside the lock; when two callers race on the same key the
/// later insert wins, which is harmless because both results are identical.
pub struct PlanCache {
    entries: Mutex<LruCache<u64, Arc<CoursePlan>>>,
}

impl PlanCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_build(&self, inputs: PlanInputs<'_>) -> Option<Arc<CoursePlan>> {
        let key = inputs.fingerprint();

        if let Some(hit) = self.lock().get(&key).cloned() {
            tracing::debug!("plan cache hit {key:016x}");
            return Some(hit);
        }

        let built = Arc::new(inputs.build()?);
        self.lock().put(key, Arc::clone(&built));
        tracing::debug!("plan cache miss {key:016x}, stored");
        Some(built)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<u64, Arc<CoursePlan>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::fixtures;

    fn plan() -> Plan {
        Plan {
            pace: Some(300.0),
            ..Plan::default()
        }
    }

    fn waypoints() -> Vec<Waypoint> {
        vec![
            Waypoint {
                id: "start".into(),
                distance: 0.0,
                order: 0,
                tags: vec![],
            },
            Waypoint {
                id: "finish".into(),
                distance: 3_000.0,
                order: 1,
                tags: vec!["finish".into()],
            },
        ]
    }

    #[test]
    fn test_repeated_inputs_hit_the_cache() {
        let cache = PlanCache::new(NonZeroUsize::new(4).unwrap());
        let points = fixtures::rolling(3_000.0, 25.0, 20.0);
        let plan = plan();
        let smoothing = SmoothingConfig::default();
        let waypoints = waypoints();
        let inputs = PlanInputs {
            points: &points,
            plan: &plan,
            smoothing: &smoothing,
            waypoints: &waypoints,
            stoppage_times: &[],
        };

        let first = cache.get_or_build(inputs).unwrap();
        let second = cache.get_or_build(inputs).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_every_input_changes_the_key() {
        let points = fixtures::rolling(3_000.0, 25.0, 20.0);
        let plan = plan();
        let smoothing = SmoothingConfig::default();
        let waypoints = waypoints();
        let base = PlanInputs {
            points: &points,
            plan: &plan,
            smoothing: &smoothing,
            waypoints: &waypoints,
            stoppage_times: &[],
        };
        let key = base.fingerprint();

        let mut moved = points.clone();
        moved[10].elevation += 1.0;
        assert_ne!(PlanInputs { points: &moved, ..base }.fingerprint(), key);

        let linear = Plan {
            pacing_linear_percent: 5.0,
            ..plan.clone()
        };
        assert_ne!(PlanInputs { plan: &linear, ..base }.fingerprint(), key);

        let coarse = SmoothingConfig {
            sample_step_meters: 100.0,
            ..smoothing
        };
        assert_ne!(PlanInputs { smoothing: &coarse, ..base }.fingerprint(), key);

        let overrides = vec![WaypointStoppageTime {
            waypoint_id: "start".into(),
            stoppage_time: 10.0,
        }];
        assert_ne!(PlanInputs { stoppage_times: &overrides, ..base }.fingerprint(), key);

        let mut reversed = waypoints.clone();
        reversed.reverse();
        assert_eq!(PlanInputs { waypoints: &reversed, ..base }.fingerprint(), key);
    }

    #[test]
    fn test_unusable_inputs_are_not_cached() {
        let cache = PlanCache::new(NonZeroUsize::new(2).unwrap());
        let plan = Plan::default();
        let smoothing = SmoothingConfig::default();
        let inputs = PlanInputs {
            points: &[],
            plan: &plan,
            smoothing: &smoothing,
            waypoints: &[],
            stoppage_times: &[],
        };
        assert!(cache.get_or_build(inputs).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = PlanCache::new(NonZeroUsize::new(1).unwrap());
        let points = fixtures::rolling(2_000.0, 25.0, 20.0);
        let smoothing = SmoothingConfig::default();
        let a = plan();
        let b = Plan {
            pace: Some(280.0),
            ..plan()
        };
        let with_a = PlanInputs {
            points: &points,
            plan: &a,
            smoothing: &smoothing,
            waypoints: &[],
            stoppage_times: &[],
        };
        let with_b = PlanInputs { plan: &b, ..with_a };
        let first = cache.get_or_build(with_a).unwrap();
        cache.get_or_build(with_b).unwrap();
        let again = cache.get_or_build(with_a).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 1);
    }
}
