//! HTTP request handlers

mod dispense;
mod health;
mod imports;
mod inventory;
mod receiving;
mod reorder;

pub use dispense::{
    cancel_dispense, create_dispense, get_dispense, list_dispenses, update_dispense,
};
pub use health::health_check;
pub use imports::import_dispenses;
pub use inventory::{medicine_lots, movement_history, stock_summary};
pub use receiving::{create_receipt, get_receipt, list_receipts};
pub use reorder::{recalculate_min_max, suggest_requisition};
