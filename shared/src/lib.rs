use serde::{Deserialize, Serialize};

/// One sample of the distance-indexed elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationPoint {
    /// Cumulative meters from the start of the course.
    pub distance: f64,
    pub elevation: f64,
    pub lat: f64,
    pub lng: f64,
    pub original_index: usize,
}

/// Result of sampling the profile at an arbitrary distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSample {
    pub distance: f64,
    pub elevation: f64,
    pub lat: f64,
    pub lng: f64,
}

impl From<ElevationPoint> for ProfileSample {
    fn from(point: ElevationPoint) -> Self {
        Self {
            distance: point.distance,
            elevation: point.elevation,
            lat: point.lat,
            lng: point.lng,
        }
    }
}

/// GeoJSON feature collection as produced by the GPX/TCX conversion step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Positions are `[lng, lat, elevation?]`; `null` components are tolerated and
/// filtered by the extractor.
pub type Position = Vec<Option<f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmoothingConfig {
    pub grade_window_meters: f64,
    pub pace_smoothing_meters: f64,
    pub sample_step_meters: f64,
}

pub const DEFAULT_GRADE_WINDOW_METERS: f64 = 100.0;
pub const DEFAULT_PACE_SMOOTHING_METERS: f64 = 200.0;
pub const DEFAULT_SAMPLE_STEP_METERS: f64 = 50.0;
/// Finer integration steps are raised to this floor.
pub const MIN_SAMPLE_STEP_METERS: f64 = 0.1;

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            grade_window_meters: DEFAULT_GRADE_WINDOW_METERS,
            pace_smoothing_meters: DEFAULT_PACE_SMOOTHING_METERS,
            sample_step_meters: DEFAULT_SAMPLE_STEP_METERS,
        }
    }
}

impl SmoothingConfig {
    /// Replace values the engine cannot work with (negative windows,
    /// non-positive or non-finite step) by usable ones. Positive steps below
    /// [`MIN_SAMPLE_STEP_METERS`] are raised to it.
    pub fn sanitized(self) -> Self {
        let window = |value: f64| if value.is_finite() { value.max(0.0) } else { 0.0 };
        let step = self.sample_step_meters;
        let sample_step_meters = if step.is_finite() && step > 0.0 {
            step.max(MIN_SAMPLE_STEP_METERS)
        } else {
            DEFAULT_SAMPLE_STEP_METERS
        };
        Self {
            grade_window_meters: window(self.grade_window_meters),
            pace_smoothing_meters: window(self.pace_smoothing_meters),
            sample_step_meters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceUnit {
    #[default]
    MinPerKm,
    MinPerMi,
}

pub const METERS_PER_KM: f64 = 1000.0;
pub const METERS_PER_MILE: f64 = 1609.344;

impl PaceUnit {
    /// Length of one distance unit in meters.
    pub fn meters(self) -> f64 {
        match self {
            PaceUnit::MinPerKm => METERS_PER_KM,
            PaceUnit::MinPerMi => METERS_PER_MILE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaceUnit::MinPerKm => "km",
            PaceUnit::MinPerMi => "mi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceMode {
    #[default]
    Pace,
    Time,
    Normalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingStrategy {
    #[default]
    Flat,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Seconds per `pace_unit`.
    #[serde(default)]
    pub pace: Option<f64>,
    #[serde(default)]
    pub pace_unit: PaceUnit,
    #[serde(default)]
    pub pace_mode: PaceMode,
    #[serde(default)]
    pub target_time_seconds: Option<f64>,
    #[serde(default)]
    pub pacing_strategy: PacingStrategy,
    #[serde(default)]
    pub pacing_linear_percent: f64,
    #[serde(default = "default_true")]
    pub use_grade_adjustment: bool,
    #[serde(default)]
    pub default_stoppage_time: f64,
    #[serde(default)]
    pub target_includes_stoppages: bool,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            pace: None,
            pace_unit: PaceUnit::default(),
            pace_mode: PaceMode::default(),
            target_time_seconds: None,
            pacing_strategy: PacingStrategy::default(),
            pacing_linear_percent: 0.0,
            use_grade_adjustment: true,
            default_stoppage_time: 0.0,
            target_includes_stoppages: false,
        }
    }
}

pub fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub id: String,
    pub distance: f64,
    pub order: i32,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointStoppageTime {
    pub waypoint_id: String,
    pub stoppage_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRow {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub dist: f64,
    pub gain: f64,
    pub loss: f64,
    pub avg_grade: f64,
    pub pace_sec_per_unit: Option<f64>,
    pub elapsed_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointArrival {
    pub waypoint_id: String,
    pub distance: f64,
    pub arrival_sec: f64,
    pub stoppage_sec: f64,
    pub departure_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    pub route_distance_meters: f64,
    pub pointer_distance_meters: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total_distance: f64,
    pub total_gain: f64,
    pub total_loss: f64,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
    pub point_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaceSample {
    pub distance: f64,
    pub elevation: f64,
    pub grade: f64,
    pub pace: f64,
}

/// Everything needed to build a plan: either a ready profile or a raw track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub profile: Option<Vec<ElevationPoint>>,
    #[serde(default)]
    pub track: Option<FeatureCollection>,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub stoppage_times: Vec<WaypointStoppageTime>,
    /// Split length unit; defaults to the plan's pace unit.
    #[serde(default)]
    pub split_unit: Option<PaceUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub course_end: f64,
    pub splits: Vec<SplitRow>,
    pub segments: Vec<SplitRow>,
    pub waypoints: Vec<WaypointArrival>,
    pub finish_sec: f64,
    pub finish_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub track: FeatureCollection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub points: Vec<ElevationPoint>,
    pub stats: ProfileStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaceProfileResponse {
    pub samples: Vec<PaceSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestRequest {
    pub profile: Vec<ElevationPoint>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub hint_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_deserializes_wire_names() {
        let plan: Plan = serde_json::from_str(
            r#"{
                "pace": 300,
                "paceUnit": "min_per_mi",
                "paceMode": "time",
                "targetTimeSeconds": 3600,
                "pacingStrategy": "linear",
                "pacingLinearPercent": -10,
                "useGradeAdjustment": false,
                "defaultStoppageTime": 30,
                "targetIncludesStoppages": true
            }"#,
        )
        .unwrap();
        assert_eq!(plan.pace_unit, PaceUnit::MinPerMi);
        assert_eq!(plan.pace_mode, PaceMode::Time);
        assert_eq!(plan.pacing_strategy, PacingStrategy::Linear);
        assert_eq!(plan.target_time_seconds, Some(3600.0));
        assert!(!plan.use_grade_adjustment);
        assert!(plan.target_includes_stoppages);
    }

    #[test]
    fn plan_defaults_enable_grade_adjustment() {
        let plan: Plan = serde_json::from_str("{}").unwrap();
        assert!(plan.use_grade_adjustment);
        assert_eq!(plan.pace_mode, PaceMode::Pace);
        assert_eq!(plan.pace, None);
    }

    #[test]
    fn unsupported_geometry_is_tolerated() {
        let fc: FeatureCollection = serde_json::from_str(
            r#"{"features": [
                {"geometry": {"type": "Point", "coordinates": [5.0, 45.0]}},
                {"geometry": {"type": "LineString",
                              "coordinates": [[5.0, 45.0, 200.0], [5.1, 45.0, null]]}},
                {"geometry": null}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(fc.features[0].geometry, Some(Geometry::Unsupported)));
        assert!(matches!(fc.features[1].geometry, Some(Geometry::LineString { .. })));
        assert!(fc.features[2].geometry.is_none());
    }

    #[test]
    fn smoothing_sanitized_repairs_bad_values() {
        let config = SmoothingConfig {
            grade_window_meters: -10.0,
            pace_smoothing_meters: f64::NAN,
            sample_step_meters: 0.0,
        }
        .sanitized();
        assert_eq!(config.grade_window_meters, 0.0);
        assert_eq!(config.pace_smoothing_meters, 0.0);
        assert_eq!(config.sample_step_meters, DEFAULT_SAMPLE_STEP_METERS);

        let tiny = SmoothingConfig {
            sample_step_meters: 1e-300,
            ..SmoothingConfig::default()
        }
        .sanitized();
        assert_eq!(tiny.sample_step_meters, MIN_SAMPLE_STEP_METERS);
    }

    #[test]
    fn unit_lengths() {
        assert_eq!(PaceUnit::MinPerKm.meters(), 1000.0);
        assert!((PaceUnit::MinPerMi.meters() - 1609.344).abs() < 1e-9);
    }
}
