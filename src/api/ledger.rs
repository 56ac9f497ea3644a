use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::service::ledger::{self, CreateLedgerRequest, LedgerFilters};
use crate::service::storage::LedgerStore;
use actix_multipart::form::{MultipartForm, tempfile::TempFile};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLedgerPayload {
    /// Required for sales principals; ignored for clients (always self)
    pub client_id: Option<u64>,
    #[schema(example = "Need Q1 statement")]
    pub request_details: String,
    pub additional_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusPayload {
    #[schema(example = "uploaded")]
    pub status: String,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LedgerListQuery {
    /// Exact status filter; "all" or absent disables it
    pub status: Option<String>,
    /// Case-insensitive substring over details, notes, client name/email
    pub search: Option<String>,
    /// Management overview (admin/manager/office only)
    pub all_ledgers: Option<bool>,
}

// The size cap itself comes from config (see multipart_form_config);
// oversized uploads must land in the same rejection envelope as the
// service-side size check.
#[derive(MultipartForm)]
pub struct LedgerUploadForm {
    pub file: TempFile,
}

pub fn upload_stream_rejection(reason: &dyn std::fmt::Display) -> ApiError {
    ApiError::FileRejected(format!("Upload rejected: {reason}"))
}

/// Multipart extraction limits derived from the configured max file size,
/// with headroom for field framing. Extraction failures (including payloads
/// over the limit) are surfaced as FileRejected instead of the extractor's
/// default error shape.
pub fn multipart_form_config(config: &Config) -> actix_multipart::form::MultipartFormConfig {
    actix_multipart::form::MultipartFormConfig::default()
        .total_limit(config.max_ledger_file_bytes as usize + 1024 * 1024)
        .memory_limit(2 * 1024 * 1024)
        .error_handler(|err, _req| upload_stream_rejection(&err).into())
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "csv" => "text/csv",
        Some(ext) if ext == "xls" => "application/vnd.ms-excel",
        Some(ext) if ext == "xlsx" => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        _ => "application/octet-stream",
    }
}

/// List ledger requests, row-filtered by the caller's role
#[utoipa::path(
    get,
    path = "/api/ledgers",
    params(LedgerListQuery),
    responses(
        (status = 200, description = "Visible ledger requests, newest first"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LedgerListQuery>,
) -> Result<HttpResponse, ApiError> {
    let filters = LedgerFilters {
        status: query.status.clone(),
        search: query.search.clone(),
        show_all: query.all_ledgers.unwrap_or(false),
    };

    let ledgers = ledger::list_requests(pool.get_ref(), &auth, &filters).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "ledgers": ledgers
    })))
}

/// Create a ledger request (client or sales)
#[utoipa::path(
    post,
    path = "/api/ledgers",
    request_body = CreateLedgerPayload,
    responses(
        (status = 201, description = "Request created", body = Object, example = json!({
            "success": true, "message": "Ledger request created"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn create(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLedgerPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let created = ledger::create_request(
        pool.get_ref(),
        &auth,
        CreateLedgerRequest {
            client_id: payload.client_id,
            request_details: payload.request_details,
            additional_notes: payload.additional_notes,
        },
    )
    .await?;

    tracing::info!(
        user_id = auth.user_id,
        request_id = %created.request_id,
        "Ledger request created"
    );

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Ledger request created",
        "ledger": created
    })))
}

/// Fetch one ledger request
#[utoipa::path(
    get,
    path = "/api/ledgers/{id}",
    params(("id" = u64, Path, description = "Ledger request id")),
    responses(
        (status = 200, description = "Ledger request found"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn get(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let row = ledger::get_request(pool.get_ref(), &auth, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "ledger": row
    })))
}

/// Role- and state-gated status change
#[utoipa::path(
    put,
    path = "/api/ledgers/{id}",
    params(("id" = u64, Path, description = "Ledger request id")),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateStatusPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row = ledger::update_status(pool.get_ref(), &auth, id, &payload.status).await?;

    tracing::info!(
        user_id = auth.user_id,
        request_id = %row.request_id,
        status = %row.status,
        "Ledger status updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Status updated",
        "ledger": row
    })))
}

/// Attach the ledger file to a pending request (admin/manager/office)
#[utoipa::path(
    post,
    path = "/api/ledgers/{id}/upload",
    params(("id" = u64, Path, description = "Ledger request id")),
    responses(
        (status = 200, description = "File stored and request marked uploaded"),
        (status = 400, description = "Wrong state or file rejected"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn upload(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<LedgerStore>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    MultipartForm(form): MultipartForm<LedgerUploadForm>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let file_name = form
        .file
        .file_name
        .clone()
        .ok_or_else(|| ApiError::validation("file", "file name is required"))?;

    let bytes = std::fs::read(form.file.file.path()).map_err(|e| {
        tracing::error!(error = %e, ledger_id = id, "Failed to read uploaded temp file");
        ApiError::Internal
    })?;

    let row = ledger::upload_file(
        pool.get_ref(),
        store.get_ref(),
        config.get_ref(),
        &auth,
        id,
        &file_name,
        &bytes,
    )
    .await?;

    tracing::info!(
        user_id = auth.user_id,
        request_id = %row.request_id,
        file_name = %file_name,
        size = bytes.len(),
        "Ledger file uploaded"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "File uploaded",
        "ledger": row
    })))
}

/// Download the attached ledger file
#[utoipa::path(
    get,
    path = "/api/ledgers/{id}/download",
    params(("id" = u64, Path, description = "Ledger request id")),
    responses(
        (status = 200, description = "Binary file with Content-Disposition"),
        (status = 400, description = "No file available"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn download(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<LedgerStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let (file_name, bytes) =
        ledger::download_file(pool.get_ref(), store.get_ref(), &auth, path.into_inner()).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&file_name))
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{file_name}\""),
        ))
        .body(bytes))
}

/// Delete a request and its blob (admin/manager)
#[utoipa::path(
    delete,
    path = "/api/ledgers/{id}",
    params(("id" = u64, Path, description = "Ledger request id")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn delete(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<LedgerStore>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ledger::delete_request(pool.get_ref(), store.get_ref(), &auth, id).await?;

    tracing::info!(user_id = auth.user_id, ledger_id = id, "Ledger request deleted");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Ledger request deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn oversized_upload_maps_to_file_rejected_envelope() {
        let err = upload_stream_rejection(&"payload reached size limit");
        assert_eq!(err.kind(), "file_rejected");
        assert_eq!(
            actix_web::ResponseError::status_code(&err),
            StatusCode::BAD_REQUEST
        );
        assert!(err.to_string().contains("size limit"));
    }

    #[test]
    fn download_content_types_follow_extension() {
        assert_eq!(content_type_for("q1.pdf"), "application/pdf");
        assert_eq!(content_type_for("Q1.CSV"), "text/csv");
        assert_eq!(content_type_for("sheet.xls"), "application/vnd.ms-excel");
        assert_eq!(content_type_for("unknown.bin"), "application/octet-stream");
    }
}
