pub mod attendance;
pub mod ledger;
pub mod role;
pub mod user;
