use crate::config::Config;
use crate::error::{ApiError, is_unique_violation};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::service::geofence;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Asia::Kolkata;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

/// Attendance days follow the office wall clock, not UTC.
pub fn now_local() -> NaiveDateTime {
    Utc::now().with_timezone(&Kolkata).naive_local()
}

/// Check-ins are accepted up to and including the cutoff minute.
pub fn within_checkin_window(now: NaiveTime, cutoff: NaiveTime) -> bool {
    now <= cutoff
}

/// Minutes between two timestamps, rounded to the nearest minute.
pub fn elapsed_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    ((end - start).num_seconds() as f64 / 60.0).round() as i64
}

/// "HH:MM", zero-padded, hours unbounded (a 30h value formats as "30:00").
pub fn format_minutes(total: i64) -> String {
    let total = total.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Inclusive [from, to] range; malformed or missing bounds fall back to the
/// trailing 30 days, never an error.
pub fn resolve_date_range(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let parse = |s: Option<&str>| s.and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());
    let to = parse(to).unwrap_or(today);
    let from = parse(from).unwrap_or_else(|| to - Duration::days(30));
    (from, to)
}

fn enforce_geofence(config: &Config, coords: Option<(f64, f64)>) -> Result<(), ApiError> {
    if !config.geofence_enforced {
        return Ok(());
    }
    let (lat, lon) = coords.ok_or_else(|| {
        ApiError::validation("latitude", "location is required to record attendance")
    })?;
    let check = geofence::validate_location(
        lat,
        lon,
        config.office_latitude,
        config.office_longitude,
        config.geofence_radius_meters,
    )?;
    if !check.valid {
        return Err(ApiError::OutOfRange {
            distance_meters: check.distance_meters,
        });
    }
    Ok(())
}

async fn fetch_day_record(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, ApiError> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id, %date, "Failed to fetch attendance record");
        ApiError::Internal
    })
}

/// Check-in: time-window gate, geofence gate, then a conditional insert.
/// The UNIQUE(user_id, date) constraint closes the check-then-insert race.
pub async fn start_attendance(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    coords: Option<(f64, f64)>,
    notes: Option<&str>,
) -> Result<AttendanceRecord, ApiError> {
    let now = now_local();

    if !within_checkin_window(now.time(), config.checkin_cutoff) {
        return Err(ApiError::TimeWindowClosed(format!(
            "Check-in closes at {}; current time is {}",
            config.checkin_cutoff.format("%H:%M"),
            now.format("%H:%M"),
        )));
    }

    enforce_geofence(config, coords)?;

    let today = now.date();
    if let Some(existing) = fetch_day_record(pool, user_id, today).await? {
        return Err(match existing.status_enum() {
            AttendanceStatus::Completed => {
                ApiError::InvalidState("Attendance already completed for today".to_string())
            }
            _ => ApiError::InvalidState("Attendance already started for today".to_string()),
        });
    }

    sqlx::query(
        r#"
        INSERT INTO attendance_records (user_id, date, start_time, status, notes)
        VALUES (?, ?, ?, 'active', ?)
        "#,
    )
    .bind(user_id)
    .bind(today)
    .bind(now)
    .bind(notes)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Attendance already recorded for today".to_string())
        } else {
            tracing::error!(error = %e, user_id, "Failed to create attendance record");
            ApiError::Internal
        }
    })?;

    fetch_day_record(pool, user_id, today)
        .await?
        .ok_or(ApiError::Internal)
}

/// Check-out: requires an active session; the write is conditional on
/// status = 'active' so concurrent check-outs cannot double-apply.
pub async fn end_attendance(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    coords: Option<(f64, f64)>,
) -> Result<AttendanceRecord, ApiError> {
    let now = now_local();

    enforce_geofence(config, coords)?;

    let today = now.date();
    let record = fetch_day_record(pool, user_id, today).await?;

    let record = match record {
        Some(r) if r.status_enum() == AttendanceStatus::Active => r,
        Some(_) => {
            return Err(ApiError::InvalidState(
                "Attendance already completed for today".to_string(),
            ));
        }
        None => {
            return Err(ApiError::InvalidState(
                "No active attendance session for today".to_string(),
            ));
        }
    };

    let start_time = record.start_time.ok_or(ApiError::Internal)?;
    let total = elapsed_minutes(start_time, now).max(0);

    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET end_time = ?, total_minutes = ?, status = 'completed'
        WHERE user_id = ? AND date = ? AND status = 'active'
        "#,
    )
    .bind(now)
    .bind(total)
    .bind(user_id)
    .bind(today)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id, "Failed to complete attendance record");
        ApiError::Internal
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Attendance record was modified concurrently".to_string(),
        ));
    }

    fetch_day_record(pool, user_id, today)
        .await?
        .ok_or(ApiError::Internal)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceStatusView {
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<AttendanceRecord>,
    /// Derived at read time for active sessions, never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_elapsed_time: Option<String>,
}

/// Pure read: synthesizes NotStarted when no row exists for today.
pub async fn current_status(
    pool: &MySqlPool,
    user_id: u64,
) -> Result<AttendanceStatusView, ApiError> {
    let now = now_local();
    let record = fetch_day_record(pool, user_id, now.date()).await?;

    Ok(match record {
        None => AttendanceStatusView {
            status: AttendanceStatus::NotStarted,
            attendance: None,
            current_elapsed_time: None,
        },
        Some(r) => {
            let status = r.status_enum();
            let elapsed = match (status, r.start_time) {
                (AttendanceStatus::Active, Some(start)) => {
                    Some(format_minutes(elapsed_minutes(start, now).max(0)))
                }
                _ => None,
            };
            AttendanceStatusView {
                status,
                attendance: Some(r),
                current_elapsed_time: elapsed,
            }
        }
    })
}

pub async fn list_history(
    pool: &MySqlPool,
    user_id: u64,
    from: Option<&str>,
    to: Option<&str>,
    limit: u32,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let (from, to) = resolve_date_range(from, to, now_local().date());

    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE user_id = ? AND date BETWEEN ? AND ?
        ORDER BY date DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id, "Failed to fetch attendance history");
        ApiError::Internal
    })
}

pub async fn list_all(
    pool: &MySqlPool,
    from: Option<&str>,
    to: Option<&str>,
    limit: u32,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let (from, to) = resolve_date_range(from, to, now_local().date());

    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE date BETWEEN ? AND ?
        ORDER BY date DESC, created_at DESC
        LIMIT ?
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch attendance overview");
        ApiError::Internal
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn cutoff_is_inclusive() {
        let cutoff = t(9, 30);
        assert!(within_checkin_window(t(9, 0), cutoff));
        assert!(within_checkin_window(t(9, 30), cutoff));
        assert!(!within_checkin_window(t(9, 31), cutoff));
        assert!(!within_checkin_window(t(10, 0), cutoff));
    }

    #[test]
    fn duration_formatting_zero_pads() {
        assert_eq!(format_minutes(480), "08:00");
        assert_eq!(format_minutes(425), "07:05");
        assert_eq!(format_minutes(0), "00:00");
        assert_eq!(format_minutes(1805), "30:05");
        assert_eq!(format_minutes(-3), "00:00");
    }

    #[test]
    fn elapsed_rounds_to_nearest_minute() {
        assert_eq!(elapsed_minutes(dt(9, 0, 0), dt(17, 0, 0)), 480);
        assert_eq!(elapsed_minutes(dt(9, 0, 0), dt(9, 7, 29)), 7);
        assert_eq!(elapsed_minutes(dt(9, 0, 0), dt(9, 7, 30)), 8);
    }

    #[test]
    fn date_range_defaults_to_trailing_30_days() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        let (from, to) = resolve_date_range(None, None, today);
        assert_eq!(to, today);
        assert_eq!(from, today - Duration::days(30));

        // Malformed bounds are treated as absent, not an error.
        let (from, to) = resolve_date_range(Some("01/08/2026"), Some("garbage"), today);
        assert_eq!(to, today);
        assert_eq!(from, today - Duration::days(30));

        let (from, to) =
            resolve_date_range(Some("2026-07-01"), Some("2026-07-15"), today);
        assert_eq!(from, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2026, 7, 15).unwrap());
    }
}
