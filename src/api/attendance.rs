use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::service::attendance;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationPayload {
    #[schema(example = 22.5726)]
    pub latitude: Option<f64>,
    #[schema(example = 88.3639)]
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

impl LocationPayload {
    fn coords(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct RangeQuery {
    /// Inclusive range start, YYYY-MM-DD (defaults to 30 days back)
    pub from: Option<String>,
    /// Inclusive range end, YYYY-MM-DD (defaults to today)
    pub to: Option<String>,
    /// Maximum rows returned
    pub limit: Option<u32>,
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(100).clamp(1, 1000)
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/start",
    request_body = LocationPayload,
    responses(
        (status = 201, description = "Attendance started", body = Object, example = json!({
            "success": true, "message": "Attendance started"
        })),
        (status = 400, description = "Already started, out of range, or window closed"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Invalid coordinates"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn start(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: Option<web::Json<LocationPayload>>,
) -> Result<HttpResponse, ApiError> {
    let coords = payload.as_ref().and_then(|p| p.coords());
    let notes = payload.as_ref().and_then(|p| p.notes.clone());

    let record = attendance::start_attendance(
        pool.get_ref(),
        config.get_ref(),
        auth.user_id,
        coords,
        notes.as_deref(),
    )
    .await?;

    tracing::info!(user_id = auth.user_id, date = %record.date, "Attendance started");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Attendance started",
        "attendance": record
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/end",
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Attendance completed", body = Object, example = json!({
            "success": true, "message": "Attendance completed", "total_hours": "08:00"
        })),
        (status = 400, description = "No active session"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn end(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: Option<web::Json<LocationPayload>>,
) -> Result<HttpResponse, ApiError> {
    let coords = payload.as_ref().and_then(|p| p.coords());

    let record =
        attendance::end_attendance(pool.get_ref(), config.get_ref(), auth.user_id, coords).await?;

    let total_hours = attendance::format_minutes(record.total_minutes.unwrap_or(0));

    tracing::info!(user_id = auth.user_id, %total_hours, "Attendance completed");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Attendance completed",
        "attendance": record,
        "total_hours": total_hours
    })))
}

/// Today's session status (pure read)
#[utoipa::path(
    get,
    path = "/api/attendance/status",
    responses(
        (status = 200, description = "Current attendance status", body = Object, example = json!({
            "success": true, "status": "active", "current_elapsed_time": "03:12"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let view = attendance::current_status(pool.get_ref(), auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": view.status,
        "attendance": view.attendance,
        "current_elapsed_time": view.current_elapsed_time
    })))
}

/// Own attendance history
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(RangeQuery),
    responses(
        (status = 200, description = "Attendance records, newest first"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> Result<HttpResponse, ApiError> {
    let records = attendance::list_history(
        pool.get_ref(),
        auth.user_id,
        query.from.as_deref(),
        query.to.as_deref(),
        clamp_limit(query.limit),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "records": records
    })))
}

/// Company-wide attendance overview (admin/manager/office)
#[utoipa::path(
    get,
    path = "/api/attendance/all",
    params(RangeQuery),
    responses(
        (status = 200, description = "All attendance records in range"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn all(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_back_office()?;

    let records = attendance::list_all(
        pool.get_ref(),
        query.from.as_deref(),
        query.to.as_deref(),
        clamp_limit(query.limit),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "records": records
    })))
}
