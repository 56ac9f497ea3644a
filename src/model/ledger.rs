use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Monotonic lifecycle: pending -> uploaded -> confirmed, never backwards.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Uploaded,
    Confirmed,
}

/// A ledger request row joined with its client and requester relations.
/// File fields are non-null exactly when status is uploaded or confirmed.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LedgerRequest {
    pub id: u64,
    #[schema(example = "LED-7K2Q9A")]
    pub request_id: String,
    pub client_id: u64,
    pub requested_by: u64,
    #[schema(example = "pending", value_type = String)]
    pub status: String,
    pub request_details: String,
    pub additional_notes: Option<String>,
    #[schema(example = "2026-08-01T10:00:00", value_type = String)]
    pub request_date: NaiveDateTime,
    #[schema(example = "2026-08-02T11:30:00", value_type = String)]
    pub uploaded_date: Option<NaiveDateTime>,
    pub uploaded_by: Option<u64>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub requester_name: Option<String>,
}

impl LedgerRequest {
    pub fn status_enum(&self) -> Option<LedgerStatus> {
        self.status.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_storage_strings() {
        assert_eq!("pending".parse::<LedgerStatus>().ok(), Some(LedgerStatus::Pending));
        assert_eq!(LedgerStatus::Uploaded.to_string(), "uploaded");
        assert_eq!(LedgerStatus::Confirmed.to_string(), "confirmed");
        assert!("rejected".parse::<LedgerStatus>().is_err());
    }
}
