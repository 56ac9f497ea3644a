use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Office geofence
    pub office_latitude: f64,
    pub office_longitude: f64,
    pub geofence_radius_meters: f64,
    /// Server-side geofence enforcement on check-in/out. The legacy behavior
    /// was advisory only (front-end check); enforcement is on by default.
    pub geofence_enforced: bool,

    /// Latest local time (Asia/Kolkata) at which a check-in is accepted.
    pub checkin_cutoff: NaiveTime,

    // File custody
    pub storage_root: String,
    pub max_ledger_file_bytes: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),

            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            office_latitude: env::var("OFFICE_LATITUDE")
                .unwrap_or_else(|_| "22.5726".to_string())
                .parse()
                .unwrap(),
            office_longitude: env::var("OFFICE_LONGITUDE")
                .unwrap_or_else(|_| "88.3639".to_string())
                .parse()
                .unwrap(),
            geofence_radius_meters: env::var("GEOFENCE_RADIUS_METERS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap(),
            geofence_enforced: env::var("GEOFENCE_ENFORCED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap(),

            checkin_cutoff: NaiveTime::parse_from_str(
                &env::var("CHECKIN_CUTOFF").unwrap_or_else(|_| "09:30".to_string()),
                "%H:%M",
            )
            .expect("CHECKIN_CUTOFF must be HH:MM"),

            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "storage".to_string()),
            max_ledger_file_bytes: env::var("MAX_LEDGER_FILE_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .unwrap(),
        }
    }
}
