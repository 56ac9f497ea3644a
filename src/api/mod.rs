pub mod attendance;
pub mod ledger;
