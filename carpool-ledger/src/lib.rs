pub mod ledger;

pub use ledger::{CapacityLedger, SeatLease};
