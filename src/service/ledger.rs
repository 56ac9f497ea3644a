use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{ApiError, is_unique_violation};
use crate::model::ledger::{LedgerRequest, LedgerStatus};
use crate::model::role::Role;
use crate::service::attendance::now_local;
use crate::service::storage::{LEDGER_PREFIX, LedgerStore};
use rand::Rng;
use sqlx::MySqlPool;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "xlsx", "xls", "csv"];

const REQUEST_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const REQUEST_ID_ATTEMPTS: usize = 5;

const BASE_SELECT: &str = r#"
    SELECT lr.id, lr.request_id, lr.client_id, lr.requested_by, lr.status,
           lr.request_details, lr.additional_notes, lr.request_date,
           lr.uploaded_date, lr.uploaded_by, lr.file_path, lr.file_name, lr.file_size,
           c.name AS client_name, c.email AS client_email, r.name AS requester_name
    FROM ledger_requests lr
    JOIN users c ON c.id = lr.client_id
    JOIN users r ON r.id = lr.requested_by
"#;

/// Row-level visibility, derived once and reused by list and by every
/// per-row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerScope {
    /// No row filtering (admin/manager default, or back-office overview).
    All,
    /// Rows where the principal is the client.
    ClientOwned(u64),
    /// Rows the principal requested.
    SalesOwned(u64),
    /// Rows the principal requested or is the client of.
    OfficeOwned(u64),
}

pub fn visibility_scope(role: Role, user_id: u64, show_all: bool) -> LedgerScope {
    if show_all && role.is_back_office() {
        return LedgerScope::All;
    }
    match role {
        Role::Client => LedgerScope::ClientOwned(user_id),
        Role::Sales => LedgerScope::SalesOwned(user_id),
        Role::Office => LedgerScope::OfficeOwned(user_id),
        Role::Admin | Role::Manager => LedgerScope::All,
    }
}

pub fn scope_allows(scope: LedgerScope, client_id: u64, requested_by: u64) -> bool {
    match scope {
        LedgerScope::All => true,
        LedgerScope::ClientOwned(id) => client_id == id,
        LedgerScope::SalesOwned(id) => requested_by == id,
        LedgerScope::OfficeOwned(id) => requested_by == id || client_id == id,
    }
}

/// Human-readable unique code, e.g. "LED-7K2Q9A". Collisions are handled by
/// retrying the insert against the unique index.
pub fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| REQUEST_ID_CHARSET[rng.gen_range(0..REQUEST_ID_CHARSET.len())] as char)
        .collect();
    format!("LED-{suffix}")
}

/// Extension and size are checked before anything touches the custody store.
pub fn validate_upload(file_name: &str, size: i64, max_bytes: i64) -> Result<String, ApiError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::FileRejected(format!(
            "Unsupported file type '{ext}'; allowed: pdf, xlsx, xls, csv"
        )));
    }
    if size <= 0 {
        return Err(ApiError::FileRejected("Uploaded file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(ApiError::FileRejected(format!(
            "File exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(ext)
}

/// Monotonic transition gate: pending -> uploaded -> confirmed only.
pub fn transition_gate(current: LedgerStatus, requested: LedgerStatus) -> Result<(), ApiError> {
    let valid = matches!(
        (current, requested),
        (LedgerStatus::Pending, LedgerStatus::Uploaded)
            | (LedgerStatus::Uploaded, LedgerStatus::Confirmed)
    );
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidState(format!(
            "Cannot move a request from '{current}' to '{requested}'"
        )))
    }
}

async fn fetch_by_id(pool: &MySqlPool, id: u64) -> Result<Option<LedgerRequest>, ApiError> {
    let sql = format!("{BASE_SELECT} WHERE lr.id = ?");
    sqlx::query_as::<_, LedgerRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, ledger_id = id, "Failed to fetch ledger request");
            ApiError::Internal
        })
}

/// Fetches a row and re-derives the same per-row access rule the list uses.
pub async fn get_request(
    pool: &MySqlPool,
    principal: &AuthUser,
    id: u64,
) -> Result<LedgerRequest, ApiError> {
    let row = fetch_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ledger request not found".to_string()))?;

    let scope = visibility_scope(principal.role, principal.user_id, false);
    if !scope_allows(scope, row.client_id, row.requested_by) {
        return Err(ApiError::Forbidden(
            "You do not have access to this ledger request".to_string(),
        ));
    }
    Ok(row)
}

pub struct CreateLedgerRequest {
    pub client_id: Option<u64>,
    pub request_details: String,
    pub additional_notes: Option<String>,
}

pub struct LedgerFilters {
    pub status: Option<String>,
    pub search: Option<String>,
    pub show_all: bool,
}

enum FilterValue {
    U64(u64),
    Str(String),
}

pub async fn list_requests(
    pool: &MySqlPool,
    principal: &AuthUser,
    filters: &LedgerFilters,
) -> Result<Vec<LedgerRequest>, ApiError> {
    let scope = visibility_scope(principal.role, principal.user_id, filters.show_all);

    let mut conditions: Vec<&str> = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    match scope {
        LedgerScope::All => {}
        LedgerScope::ClientOwned(id) => {
            conditions.push("lr.client_id = ?");
            args.push(FilterValue::U64(id));
        }
        LedgerScope::SalesOwned(id) => {
            conditions.push("lr.requested_by = ?");
            args.push(FilterValue::U64(id));
        }
        LedgerScope::OfficeOwned(id) => {
            conditions.push("(lr.requested_by = ? OR lr.client_id = ?)");
            args.push(FilterValue::U64(id));
            args.push(FilterValue::U64(id));
        }
    }

    if let Some(status) = filters.status.as_deref() {
        if status != "all" {
            conditions.push("lr.status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }
    }

    if let Some(search) = filters.search.as_deref() {
        if !search.trim().is_empty() {
            conditions.push(
                "(lr.request_details LIKE ? OR lr.additional_notes LIKE ? \
                 OR c.name LIKE ? OR c.email LIKE ?)",
            );
            let like = format!("%{}%", search.trim());
            for _ in 0..4 {
                args.push(FilterValue::Str(like.clone()));
            }
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("{BASE_SELECT} {where_clause} ORDER BY lr.request_date DESC");

    let mut query = sqlx::query_as::<_, LedgerRequest>(&sql);
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(v),
            FilterValue::Str(s) => query.bind(s),
        };
    }

    query.fetch_all(pool).await.map_err(|e| {
        tracing::error!(error = %e, user_id = principal.user_id, "Failed to list ledger requests");
        ApiError::Internal
    })
}

pub async fn create_request(
    pool: &MySqlPool,
    principal: &AuthUser,
    payload: CreateLedgerRequest,
) -> Result<LedgerRequest, ApiError> {
    principal.require(&[Role::Client, Role::Sales])?;

    let details = payload.request_details.trim().to_string();
    if details.is_empty() {
        return Err(ApiError::validation(
            "request_details",
            "request details are required",
        ));
    }

    // Clients always request for themselves; sales must name the client.
    let client_id = match principal.role {
        Role::Client => principal.user_id,
        _ => payload.client_id.ok_or_else(|| {
            ApiError::validation("client_id", "client_id is required for sales requests")
        })?,
    };

    let client_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ? LIMIT 1)")
            .bind(client_id)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, client_id, "Failed to verify client");
                ApiError::Internal
            })?;
    if !client_exists {
        return Err(ApiError::validation("client_id", "unknown client"));
    }

    let now = now_local();

    for _ in 0..REQUEST_ID_ATTEMPTS {
        let request_id = generate_request_id();

        let result = sqlx::query(
            r#"
            INSERT INTO ledger_requests
                (request_id, client_id, requested_by, status, request_details,
                 additional_notes, request_date)
            VALUES (?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(&request_id)
        .bind(client_id)
        .bind(principal.user_id)
        .bind(&details)
        .bind(payload.additional_notes.as_deref())
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Ok(done) => {
                return fetch_by_id(pool, done.last_insert_id())
                    .await?
                    .ok_or(ApiError::Internal);
            }
            // Regenerate the code when the unique index rejects it.
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => {
                tracing::error!(error = %e, client_id, "Failed to create ledger request");
                return Err(ApiError::Internal);
            }
        }
    }

    tracing::error!(client_id, "Exhausted request-id generation attempts");
    Err(ApiError::Internal)
}

/// Role- and state-gated status change. The write is conditional on the
/// expected prior status, so a concurrent transition surfaces as a rejection
/// rather than a silent overwrite.
pub async fn update_status(
    pool: &MySqlPool,
    principal: &AuthUser,
    id: u64,
    requested: &str,
) -> Result<LedgerRequest, ApiError> {
    let row = get_request(pool, principal, id).await?;

    let requested: LedgerStatus = requested.parse().map_err(|_| {
        ApiError::validation("status", "status must be 'uploaded' or 'confirmed'")
    })?;

    match requested {
        LedgerStatus::Uploaded => principal.require_back_office()?,
        LedgerStatus::Confirmed => principal.require(&[Role::Client])?,
        LedgerStatus::Pending => {
            return Err(ApiError::InvalidState(
                "A request cannot be moved back to pending".to_string(),
            ));
        }
    }

    let current = row
        .status_enum()
        .ok_or(ApiError::Internal)?;
    transition_gate(current, requested)?;

    let result = match requested {
        LedgerStatus::Uploaded => {
            sqlx::query(
                r#"
                UPDATE ledger_requests
                SET status = 'uploaded', uploaded_date = ?, uploaded_by = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(now_local())
            .bind(principal.user_id)
            .bind(id)
            .execute(pool)
            .await
        }
        LedgerStatus::Confirmed => {
            sqlx::query(
                "UPDATE ledger_requests SET status = 'confirmed' WHERE id = ? AND status = 'uploaded'",
            )
            .bind(id)
            .execute(pool)
            .await
        }
        LedgerStatus::Pending => unreachable!(),
    }
    .map_err(|e| {
        tracing::error!(error = %e, ledger_id = id, "Failed to update ledger status");
        ApiError::Internal
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidState(format!(
            "Request {} changed status concurrently",
            row.request_id
        )));
    }

    fetch_by_id(pool, id).await?.ok_or(ApiError::Internal)
}

/// Stores the blob first, then flips the row pending -> uploaded with a
/// conditional update; the blob is rolled back if the row moved meanwhile.
/// A previously attached blob is purged so no orphan remains.
pub async fn upload_file(
    pool: &MySqlPool,
    store: &LedgerStore,
    config: &Config,
    principal: &AuthUser,
    id: u64,
    file_name: &str,
    bytes: &[u8],
) -> Result<LedgerRequest, ApiError> {
    principal.require_back_office()?;

    let row = get_request(pool, principal, id).await?;

    if row.status_enum() != Some(LedgerStatus::Pending) {
        return Err(ApiError::InvalidState(
            "Only pending requests can receive a ledger file".to_string(),
        ));
    }

    let ext = validate_upload(file_name, bytes.len() as i64, config.max_ledger_file_bytes)?;

    let rel_path = format!(
        "{LEDGER_PREFIX}/{}_{}.{}",
        row.request_id,
        chrono::Utc::now().timestamp(),
        ext
    );

    if let Some(old) = row.file_path.as_deref() {
        if store.delete(old).is_err() {
            tracing::warn!(ledger_id = id, old, "Could not purge replaced ledger blob");
        }
    }

    store.store(&rel_path, bytes)?;

    let result = sqlx::query(
        r#"
        UPDATE ledger_requests
        SET status = 'uploaded', uploaded_date = ?, uploaded_by = ?,
            file_path = ?, file_name = ?, file_size = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(now_local())
    .bind(principal.user_id)
    .bind(&rel_path)
    .bind(file_name)
    .bind(bytes.len() as i64)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, ledger_id = id, "Failed to attach ledger file");
        ApiError::Internal
    })?;

    if result.rows_affected() == 0 {
        let _ = store.delete(&rel_path);
        return Err(ApiError::InvalidState(
            "Request is no longer pending".to_string(),
        ));
    }

    fetch_by_id(pool, id).await?.ok_or(ApiError::Internal)
}

pub async fn download_file(
    pool: &MySqlPool,
    store: &LedgerStore,
    principal: &AuthUser,
    id: u64,
) -> Result<(String, Vec<u8>), ApiError> {
    let row = get_request(pool, principal, id).await?;

    let downloadable = matches!(
        row.status_enum(),
        Some(LedgerStatus::Uploaded) | Some(LedgerStatus::Confirmed)
    );
    let file_path = match (downloadable, row.file_path.as_deref()) {
        (true, Some(p)) if store.exists(p) => p,
        _ => {
            return Err(ApiError::FileUnavailable(
                "No file is available for this request".to_string(),
            ));
        }
    };

    let bytes = store.read(file_path)?;
    let name = row
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}.pdf", row.request_id));
    Ok((name, bytes))
}

/// Destroys a request out-of-band. Blob deletion is best-effort: the
/// metadata row goes away regardless.
pub async fn delete_request(
    pool: &MySqlPool,
    store: &LedgerStore,
    principal: &AuthUser,
    id: u64,
) -> Result<(), ApiError> {
    principal.require_admin_or_manager()?;

    let row = fetch_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ledger request not found".to_string()))?;

    if let Some(path) = row.file_path.as_deref() {
        if store.delete(path).is_err() {
            tracing::warn!(ledger_id = id, path, "Blob deletion failed; removing metadata anyway");
        }
    }

    sqlx::query("DELETE FROM ledger_requests WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, ledger_id = id, "Failed to delete ledger request");
            ApiError::Internal
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_well_formed() {
        for _ in 0..50 {
            let id = generate_request_id();
            assert_eq!(id.len(), 10);
            assert!(id.starts_with("LED-"));
            assert!(
                id[4..]
                    .bytes()
                    .all(|b| REQUEST_ID_CHARSET.contains(&b))
            );
        }
    }

    #[test]
    fn client_scope_isolates_rows() {
        let scope = visibility_scope(Role::Client, 10, false);
        assert!(scope_allows(scope, 10, 99));
        assert!(!scope_allows(scope, 11, 10)); // another client's row
    }

    #[test]
    fn sales_scope_follows_requester() {
        let scope = visibility_scope(Role::Sales, 20, false);
        assert!(scope_allows(scope, 99, 20));
        assert!(!scope_allows(scope, 20, 21));
    }

    #[test]
    fn office_scope_allows_either_side() {
        let scope = visibility_scope(Role::Office, 30, false);
        assert!(scope_allows(scope, 30, 99));
        assert!(scope_allows(scope, 99, 30));
        assert!(!scope_allows(scope, 98, 99));
    }

    #[test]
    fn show_all_is_back_office_only() {
        assert_eq!(visibility_scope(Role::Office, 1, true), LedgerScope::All);
        assert_eq!(visibility_scope(Role::Manager, 1, true), LedgerScope::All);
        // A client asking for the overview still only sees their own rows.
        assert_eq!(
            visibility_scope(Role::Client, 1, true),
            LedgerScope::ClientOwned(1)
        );
        assert_eq!(
            visibility_scope(Role::Sales, 1, true),
            LedgerScope::SalesOwned(1)
        );
    }

    #[test]
    fn admin_and_manager_default_to_unfiltered() {
        assert_eq!(visibility_scope(Role::Admin, 1, false), LedgerScope::All);
        assert_eq!(visibility_scope(Role::Manager, 1, false), LedgerScope::All);
    }

    #[test]
    fn transitions_are_monotonic() {
        assert!(transition_gate(LedgerStatus::Pending, LedgerStatus::Uploaded).is_ok());
        assert!(transition_gate(LedgerStatus::Uploaded, LedgerStatus::Confirmed).is_ok());
        // Confirmed is unreachable without passing through uploaded.
        assert!(transition_gate(LedgerStatus::Pending, LedgerStatus::Confirmed).is_err());
        // No regressions, no self-loops.
        assert!(transition_gate(LedgerStatus::Uploaded, LedgerStatus::Pending).is_err());
        assert!(transition_gate(LedgerStatus::Confirmed, LedgerStatus::Uploaded).is_err());
        assert!(transition_gate(LedgerStatus::Confirmed, LedgerStatus::Confirmed).is_err());
    }

    #[test]
    fn upload_validation_checks_type_then_size() {
        let max = 10 * 1024 * 1024;
        assert_eq!(validate_upload("q1.pdf", 1024, max).unwrap(), "pdf");
        assert_eq!(validate_upload("Q1.XLSX", 1024, max).unwrap(), "xlsx");
        assert!(validate_upload("virus.exe", 10, max).is_err());
        assert!(validate_upload("noextension", 10, max).is_err());
        assert!(validate_upload("big.csv", max + 1, max).is_err());
        assert!(validate_upload("empty.csv", 0, max).is_err());
    }
}
