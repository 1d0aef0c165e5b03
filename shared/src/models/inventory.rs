//! Inventory view models returned to the UI layer

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockStatus;

/// One medicine's stock position in the facility overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineStockSummary {
    pub medicine_id: Uuid,
    pub medicine_code: String,
    pub generic_name: String,
    pub strength: Option<String>,
    pub unit: String,
    pub reorder_point: i64,
    pub quantity_on_hand: i64,
    pub status: StockStatus,
}

/// A lot of a medicine currently held at a facility, FEFO-ordered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotStockView {
    pub lot_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_on_hand: i64,
    pub received_date: NaiveDate,
}

/// One row of the per-medicine audit trail, with running balance recomputed
/// from the movement log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementHistoryEntry {
    pub movement_id: Uuid,
    pub transaction_date: DateTime<Utc>,
    pub movement_type: String,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_change: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reference_document: String,
    pub hos_guid: Option<String>,
    pub user_full_name: String,
    pub remarks: Option<String>,
}
