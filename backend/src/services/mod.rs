//! Business logic services
//!
//! Each service owns one area of the stock workflow and receives the acting
//! facility and user explicitly on every call. All lot balance changes go
//! through the ledger module.

pub mod dispense;
pub mod inventory;
pub mod ledger;
pub mod receiving;
pub mod reconcile;
pub mod reorder;
