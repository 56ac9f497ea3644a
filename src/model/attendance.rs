use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Persisted session state. "not_started" is the absence of a row for the
/// day and is never written to storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotStarted,
    Active,
    Completed,
}

/// One row per (user, local calendar day). Timestamps are Asia/Kolkata
/// local wall-clock values.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-08-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-08-01T09:05:00", value_type = String)]
    pub start_time: Option<NaiveDateTime>,
    #[schema(example = "2026-08-01T17:05:00", value_type = String)]
    pub end_time: Option<NaiveDateTime>,
    #[schema(example = "active", value_type = String)]
    pub status: String,
    pub total_minutes: Option<i64>,
    pub notes: Option<String>,
    #[schema(example = "2026-08-01T09:05:00", value_type = String)]
    pub created_at: Option<NaiveDateTime>,
}

impl AttendanceRecord {
    pub fn status_enum(&self) -> AttendanceStatus {
        self.status
            .parse()
            .unwrap_or(AttendanceStatus::NotStarted)
    }
}
