pub mod adjustment;
pub mod cache;
pub mod config;
pub mod error;
pub mod grade;
pub mod interpolate;
pub mod pacing;
pub mod profile;
pub mod splits;
pub mod units;
pub mod waypoints;

use std::{num::NonZeroUsize, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use shared::{
    ApiError, ElevationPoint, NearestRequest, PaceProfileResponse, PlanRequest, PlanResponse,
    ProfileRequest, ProfileResponse, RouteMatch,
};
use tower_http::cors::{Any, CorsLayer};

use crate::cache::{PlanCache, PlanInputs};
use crate::error::PlanError;
use crate::interpolate::TrackIndex;
use crate::pacing::ValidatePlan;
use crate::profile::{extract_elevation_profile, prepare_profile, profile_stats};
use crate::splits::CoursePlan;
use crate::units::format_duration;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PlanCache>,
}

impl AppState {
    pub fn new(cache_capacity: NonZeroUsize) -> Self {
        Self {
            cache: Arc::new(PlanCache::new(cache_capacity)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/profile", post(profile_handler))
        .route("/api/splits", post(splits_handler))
        .route("/api/pace-profile", post(pace_profile_handler))
        .route("/api/nearest", post(nearest_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn profile_handler(Json(req): Json<ProfileRequest>) -> Json<ProfileResponse> {
    let points = extract_elevation_profile(&req.track);
    let stats = profile_stats(&points);
    tracing::debug!(
        "extracted {} profile points, {:.0} m",
        stats.point_count,
        stats.total_distance
    );
    Json(ProfileResponse { points, stats })
}

async fn splits_handler(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> ApiResult<PlanResponse> {
    let points = request_profile(&req)?;
    let course = plan_course(&state, &req, &points)?;
    let split_unit = req.split_unit.unwrap_or(req.plan.pace_unit);

    let finish_sec = course.finish_elapsed();
    Ok(Json(PlanResponse {
        course_end: course.course_end(),
        splits: course.fixed_splits(split_unit),
        segments: course.waypoint_segments(),
        waypoints: course.waypoint_arrivals(),
        finish_sec,
        finish_formatted: format_duration(finish_sec),
    }))
}

async fn pace_profile_handler(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> ApiResult<PaceProfileResponse> {
    let points = request_profile(&req)?;
    let course = plan_course(&state, &req, &points)?;
    let step = req.smoothing.sanitized().sample_step_meters;
    Ok(Json(PaceProfileResponse {
        samples: course.model().pace_profile(step),
    }))
}

async fn nearest_handler(Json(req): Json<NearestRequest>) -> ApiResult<RouteMatch> {
    let points = prepare_profile(req.profile).map_err(|err| reject(StatusCode::BAD_REQUEST, err))?;
    TrackIndex::new(&points)
        .nearest(req.lat, req.lng, req.hint_distance)
        .map(Json)
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "coordinates are not finite"))
}

/// The explicit profile wins over the raw track.
fn request_profile(req: &PlanRequest) -> Result<Vec<ElevationPoint>, (StatusCode, Json<ApiError>)> {
    let points = match (&req.profile, &req.track) {
        (Some(points), _) => points.clone(),
        (None, Some(track)) => extract_elevation_profile(track),
        (None, None) => Vec::new(),
    };
    prepare_profile(points).map_err(|err| reject(StatusCode::BAD_REQUEST, err))
}

fn plan_course(
    state: &AppState,
    req: &PlanRequest,
    points: &[ElevationPoint],
) -> Result<Arc<CoursePlan>, (StatusCode, Json<ApiError>)> {
    let course_end = waypoints::course_end(points, &req.waypoints);
    req.plan
        .validate(course_end)
        .map_err(|err| reject(StatusCode::UNPROCESSABLE_ENTITY, err))?;

    state
        .cache
        .get_or_build(PlanInputs {
            points,
            plan: &req.plan,
            smoothing: &req.smoothing,
            waypoints: &req.waypoints,
            stoppage_times: &req.stoppage_times,
        })
        .ok_or_else(|| reject(StatusCode::UNPROCESSABLE_ENTITY, PlanError::ZeroDistance))
}

fn reject(status: StatusCode, err: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    let message = err.to_string();
    tracing::warn!("rejected request ({status}): {message}");
    (status, Json(ApiError { message }))
}
