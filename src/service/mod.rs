pub mod attendance;
pub mod geofence;
pub mod ledger;
pub mod storage;
