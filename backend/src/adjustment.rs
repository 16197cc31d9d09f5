//! Grade → pace multiplier curves.

/// Hard safety bounds applied to every curve's output.
pub const MIN_FACTOR: f64 = 0.5;
pub const MAX_FACTOR: f64 = 3.0;
/// Grades beyond ±50 % are evaluated at the limit.
pub const MAX_GRADE_PERCENT: f64 = 50.0;

/// Maps a grade (percent) to a pacing multiplier relative to flat ground.
///
/// Implementations only describe the raw curve; callers go through
/// [`GradeCurve::factor`], which clamps grade and output.
pub trait GradeCurve: Send + Sync {
    /// Unclamped multiplier for a grade already limited to ±50 %.
    fn raw_factor(&self, grade_percent: f64) -> f64;

    fn factor(&self, grade_percent: f64) -> f64 {
        if !grade_percent.is_finite() {
            return 1.0;
        }
        let grade = grade_percent.clamp(-MAX_GRADE_PERCENT, MAX_GRADE_PERCENT);
        let raw = self.raw_factor(grade);
        if raw.is_finite() {
            raw.clamp(MIN_FACTOR, MAX_FACTOR)
        } else {
            1.0
        }
    }
}

/// Energy cost of running on gradients (Minetti et al., 2002), divided by the
/// flat-ground cost so that grade 0 maps to exactly 1.0.
///
/// The cost bottoms out around −18 % and climbs again on steeper descents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinettiCurve;

const FLAT_COST: f64 = 3.6;

impl GradeCurve for MinettiCurve {
    fn raw_factor(&self, grade_percent: f64) -> f64 {
        let i = grade_percent / 100.0;
        // Horner form of 155.4i⁵ − 30.4i⁴ − 43.3i³ + 46.3i² + 19.5i + 3.6
        let cost = ((((155.4 * i - 30.4) * i - 43.3) * i + 46.3) * i + 19.5) * i + FLAT_COST;
        cost / FLAT_COST
    }
}

/// Linear ramp kept for comparison and for hosts that want a gentler model.
#[derive(Debug, Clone, Copy)]
pub struct LinearCurve {
    pub uphill_per_percent: f64,
    pub downhill_per_percent: f64,
}

impl Default for LinearCurve {
    fn default() -> Self {
        Self {
            uphill_per_percent: 0.033,
            downhill_per_percent: 0.018,
        }
    }
}

impl GradeCurve for LinearCurve {
    fn raw_factor(&self, grade_percent: f64) -> f64 {
        if grade_percent >= 0.0 {
            1.0 + grade_percent * self.uphill_per_percent
        } else {
            1.0 + grade_percent * self.downhill_per_percent
        }
    }
}

/// Pacing multiplier for `grade_percent` using the default curve.
pub fn pace_adjustment(grade_percent: f64) -> f64 {
    MinettiCurve.factor(grade_percent)
}
