use std::sync::Arc;

use shared::{ElevationPoint, PaceMode, PaceSample, PacingStrategy, Plan, SmoothingConfig};

use crate::adjustment::{GradeCurve, MAX_FACTOR, MIN_FACTOR, MinettiCurve};
use crate::error::PlanError;
use crate::grade::{bounded_step, calculate_grade_at_distance, sample_distances};
use crate::interpolate::elevation_at;
use crate::profile::is_usable;

pub const MAX_LINEAR_PERCENT: f64 = 50.0;

/// Macro pacing multiplier at `distance`.
///
/// The linear strategy runs `(1 - P/2)×` at the start and `(1 + P/2)×` at the
/// finish, where `P` is the clamped percent as a fraction.
pub fn pacing_factor(
    strategy: PacingStrategy,
    distance: f64,
    course_end: f64,
    linear_percent: f64,
) -> f64 {
    match strategy {
        PacingStrategy::Flat => 1.0,
        PacingStrategy::Linear => {
            if !(course_end > 0.0) {
                return 1.0;
            }
            let t = (distance / course_end).clamp(0.0, 1.0);
            let t = if t.is_nan() { 0.0 } else { t };
            1.0 + (t - 0.5) * clamp_linear_percent(linear_percent) / 100.0
        }
    }
}

pub fn clamp_linear_percent(percent: f64) -> f64 {
    if percent.is_finite() {
        percent.clamp(-MAX_LINEAR_PERCENT, MAX_LINEAR_PERCENT)
    } else {
        0.0
    }
}

/// `pace` and `time` modes rescale local paces so the course average matches
/// what the user asked for; `normalized` leaves them alone.
pub fn maintains_target_average(mode: PaceMode) -> bool {
    mode != PaceMode::Normalized
}

/// Seconds per unit the plan is anchored on, before any rescaling.
pub fn base_pace(plan: &Plan, course_end: f64) -> Option<f64> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    match plan.pace_mode {
        PaceMode::Pace | PaceMode::Normalized => plan.pace.filter(|&p| positive(p)),
        PaceMode::Time => {
            let target = plan.target_time_seconds.filter(|&t| positive(t))?;
            let units = course_end / plan.pace_unit.meters();
            positive(units).then(|| target / units)
        }
    }
}

/// Plan validation that reports the reason instead of degrading to `None`.
pub trait ValidatePlan {
    /// Returns the base pace (seconds per unit) the plan resolves to.
    fn validate(&self, course_distance: f64) -> Result<f64, PlanError>;
}

impl ValidatePlan for Plan {
    fn validate(&self, course_distance: f64) -> Result<f64, PlanError> {
        if !(course_distance.is_finite() && course_distance > 0.0) {
            return Err(PlanError::ZeroDistance);
        }
        base_pace(self, course_distance).ok_or(match self.pace_mode {
            PaceMode::Time => PlanError::MissingTarget,
            PaceMode::Pace | PaceMode::Normalized => PlanError::MissingPace,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    start: f64,
    end: f64,
    factor: f64,
}

/// Dense time/pace model of one course under one plan.
///
/// Built once by integrating the combined grade × strategy factor with the
/// midpoint rule every `sample_step_meters`; afterwards every query is a
/// binary search over prefix sums.
#[derive(Clone)]
pub struct PacingModel {
    points: Vec<ElevationPoint>,
    plan: Plan,
    smoothing: SmoothingConfig,
    curve: Arc<dyn GradeCurve>,
    course_end: f64,
    unit_m: f64,
    base_pace: f64,
    normalization_scale: f64,
    time_scale: f64,
    samples: Vec<Sample>,
    /// Travel seconds at the start of each sample, plus the course total.
    cumulative: Vec<f64>,
}

impl std::fmt::Debug for PacingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacingModel")
            .field("course_end", &self.course_end)
            .field("base_pace", &self.base_pace)
            .field("normalization_scale", &self.normalization_scale)
            .field("time_scale", &self.time_scale)
            .field("samples", &self.samples.len())
            .finish()
    }
}

impl PacingModel {
    /// Build with the default grade curve.
    ///
    /// `total_stoppage` is only used by `time` mode plans whose target
    /// includes stoppages. Returns `None` when there is nothing to pace: an
    /// unusable profile, a non-positive course end, or no usable base pace.
    pub fn build(
        points: &[ElevationPoint],
        plan: &Plan,
        smoothing: &SmoothingConfig,
        course_end: f64,
        total_stoppage: f64,
    ) -> Option<Self> {
        Self::build_with_curve(
            points,
            plan,
            smoothing,
            course_end,
            total_stoppage,
            Arc::new(MinettiCurve),
        )
    }

    pub fn build_with_curve(
        points: &[ElevationPoint],
        plan: &Plan,
        smoothing: &SmoothingConfig,
        course_end: f64,
        total_stoppage: f64,
        curve: Arc<dyn GradeCurve>,
    ) -> Option<Self> {
        if !is_usable(points) || !course_end.is_finite() || course_end <= 0.0 {
            return None;
        }
        let base_pace = base_pace(plan, course_end)?;

        let mut model = Self {
            points: points.to_vec(),
            plan: plan.clone(),
            smoothing: smoothing.sanitized(),
            curve,
            course_end,
            unit_m: plan.pace_unit.meters(),
            base_pace,
            normalization_scale: 1.0,
            time_scale: 1.0,
            samples: Vec::new(),
            cumulative: Vec::new(),
        };

        model.samples = model.integrate_samples();

        // Stage one: keep the course average at the anchored pace.
        let weighted: f64 = model.samples.iter().map(|s| s.factor * (s.end - s.start)).sum();
        if maintains_target_average(plan.pace_mode) && weighted > 0.0 {
            model.normalization_scale = course_end / weighted;
        }

        // Stage two: hit the travel time implied by the target exactly.
        if plan.pace_mode == PaceMode::Time {
            let travel_base = model.seconds_per_unit_scale() * weighted / model.unit_m;
            let target = plan.target_time_seconds.unwrap_or(0.0);
            let stoppage = if plan.target_includes_stoppages {
                total_stoppage.max(0.0)
            } else {
                0.0
            };
            let desired_travel = (target - stoppage).max(0.0);
            if travel_base > 0.0 {
                model.time_scale = desired_travel / travel_base;
            }
        }

        model.cumulative = model.prefix_times();

        tracing::debug!(
            "pacing model built: end={:.1}m samples={} base={:.2}s/{} norm={:.6} \
             time_scale={:.6} travel={:.1}s",
            model.course_end,
            model.samples.len(),
            model.base_pace,
            model.plan.pace_unit.label(),
            model.normalization_scale,
            model.time_scale,
            model.travel_time()
        );

        Some(model)
    }

    fn integrate_samples(&self) -> Vec<Sample> {
        let step = bounded_step(self.course_end, self.smoothing.sample_step_meters);
        let count = (self.course_end / step).ceil().max(1.0) as usize;
        let mut samples = Vec::with_capacity(count);

        let mut start = 0.0;
        let mut i = 0usize;
        while start < self.course_end {
            let end = ((i + 1) as f64 * step).min(self.course_end);
            if end > start {
                let mid = (start + end) / 2.0;
                samples.push(Sample {
                    start,
                    end,
                    factor: self.combined_factor_at(mid),
                });
            }
            i += 1;
            start = end;
        }
        samples
    }

    fn prefix_times(&self) -> Vec<f64> {
        let scale = self.seconds_per_unit_scale();
        let mut cumulative = Vec::with_capacity(self.samples.len() + 1);
        let mut total = 0.0;
        cumulative.push(total);
        for s in &self.samples {
            total += scale * s.factor * (s.end - s.start) / self.unit_m;
            cumulative.push(total);
        }
        cumulative
    }

    fn seconds_per_unit_scale(&self) -> f64 {
        self.base_pace * self.normalization_scale * self.time_scale
    }

    pub fn grade_at(&self, distance: f64) -> f64 {
        calculate_grade_at_distance(&self.points, distance, self.smoothing.grade_window_meters)
    }

    pub fn grade_factor_at(&self, distance: f64) -> f64 {
        if !self.plan.use_grade_adjustment {
            return 1.0;
        }
        // Curves may override `factor`; the bounds hold regardless.
        let factor = self.curve.factor(self.grade_at(distance));
        if factor.is_finite() {
            factor.clamp(MIN_FACTOR, MAX_FACTOR)
        } else {
            1.0
        }
    }

    pub fn pacing_factor_at(&self, distance: f64) -> f64 {
        pacing_factor(
            self.plan.pacing_strategy,
            distance,
            self.course_end,
            self.plan.pacing_linear_percent,
        )
    }

    pub fn combined_factor_at(&self, distance: f64) -> f64 {
        self.grade_factor_at(distance) * self.pacing_factor_at(distance)
    }

    /// Seconds per unit at `distance`.
    pub fn actual_pace_at(&self, distance: f64) -> f64 {
        self.seconds_per_unit_scale() * self.combined_factor_at(distance)
    }

    /// Travel seconds from the start to `distance` (stoppages excluded).
    pub fn elapsed_at(&self, distance: f64) -> f64 {
        if distance.is_nan() || distance <= 0.0 {
            return 0.0;
        }
        if distance >= self.course_end {
            return self.travel_time();
        }
        let idx = self.samples.partition_point(|s| s.end <= distance);
        let Some(sample) = self.samples.get(idx) else {
            return self.travel_time();
        };
        let partial =
            self.seconds_per_unit_scale() * sample.factor * (distance - sample.start) / self.unit_m;
        self.cumulative[idx] + partial
    }

    /// Mean seconds per unit between two distances, `None` for an empty span.
    pub fn mean_pace_between(&self, start: f64, end: f64) -> Option<f64> {
        let dist = end - start;
        if !(dist > 0.0) {
            return None;
        }
        Some((self.elapsed_at(end) - self.elapsed_at(start)) / (dist / self.unit_m))
    }

    pub fn travel_time(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Chart series every `step_m` meters. With pace smoothing enabled each
    /// pace is the travel-time mean over the centred window.
    pub fn pace_profile(&self, step_m: f64) -> Vec<PaceSample> {
        let window = self.smoothing.pace_smoothing_meters;
        sample_distances(self.course_end, step_m)
            .into_iter()
            .map(|d| {
                let pace = if window > 0.0 {
                    let lo = (d - window / 2.0).max(0.0);
                    let hi = (d + window / 2.0).min(self.course_end);
                    self.mean_pace_between(lo, hi)
                        .unwrap_or_else(|| self.actual_pace_at(d))
                } else {
                    self.actual_pace_at(d)
                };
                PaceSample {
                    distance: d,
                    elevation: elevation_at(&self.points, d).unwrap_or(0.0),
                    grade: self.grade_at(d),
                    pace,
                }
            })
            .collect()
    }

    pub fn points(&self) -> &[ElevationPoint] {
        &self.points
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn course_end(&self) -> f64 {
        self.course_end
    }

    pub fn unit_meters(&self) -> f64 {
        self.unit_m
    }

    pub fn base_pace(&self) -> f64 {
        self.base_pace
    }

    pub fn normalization_scale(&self) -> f64 {
        self.normalization_scale
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
