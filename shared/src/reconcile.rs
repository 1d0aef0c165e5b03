//! Bulk-import reconciliation decisions
//!
//! Hospital exports identify each dispense line with an external `hos_guid`.
//! Re-importing a file must not double-dispense: rows already recorded with
//! the same quantity are skipped, rows whose quantity changed replace the
//! prior dispense, and unseen rows are allocated fresh.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of a parsed bulk import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    pub hos_guid: String,
    pub medicine_code: String,
    pub quantity_requested: i64,
    pub dispense_date: NaiveDate,
}

/// What to do with an import row, given the previously recorded quantity
/// (if any) for its `hos_guid` at this facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    /// Not seen before: allocate via FEFO and create a new dispense record
    Allocate,
    /// Seen with the same quantity: no ledger change
    Skip,
    /// Seen with a different quantity: cancel the prior record, allocate fresh
    Reallocate,
}

/// Classify an import row against the previously recorded quantity.
pub fn classify_import_row(existing_quantity: Option<i64>, quantity_requested: i64) -> RowAction {
    match existing_quantity {
        None => RowAction::Allocate,
        Some(prior) if prior == quantity_requested => RowAction::Skip,
        Some(_) => RowAction::Reallocate,
    }
}

/// Sort rows into processing order: by dispense date, then original file
/// position. Keeps FEFO allocation deterministic across a batch.
pub fn processing_order(rows: &[ImportRow]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by_key(|&i| (rows[i].dispense_date, i));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_the_decision_table() {
        assert_eq!(classify_import_row(None, 5), RowAction::Allocate);
        assert_eq!(classify_import_row(Some(5), 5), RowAction::Skip);
        assert_eq!(classify_import_row(Some(5), 8), RowAction::Reallocate);
    }

    #[test]
    fn processing_order_is_date_then_file_position() {
        let row = |guid: &str, date: &str| ImportRow {
            hos_guid: guid.to_string(),
            medicine_code: "PARA500".to_string(),
            quantity_requested: 1,
            dispense_date: date.parse().unwrap(),
        };
        let rows = vec![
            row("b", "2024-02-01"),
            row("a", "2024-01-01"),
            row("c", "2024-01-01"),
        ];
        assert_eq!(processing_order(&rows), vec![1, 2, 0]);
    }
}
