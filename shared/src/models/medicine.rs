//! Medicine stock classification

use serde::{Deserialize, Serialize};

/// Stock level classification for the facility inventory overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Out,
    Low,
    Normal,
}

/// Classify total on-hand stock against the medicine's reorder point.
pub fn classify_stock_status(quantity_on_hand: i64, reorder_point: i64) -> StockStatus {
    if quantity_on_hand <= 0 {
        StockStatus::Out
    } else if quantity_on_hand <= reorder_point {
        StockStatus::Low
    } else {
        StockStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_thresholds() {
        assert_eq!(classify_stock_status(0, 10), StockStatus::Out);
        assert_eq!(classify_stock_status(10, 10), StockStatus::Low);
        assert_eq!(classify_stock_status(11, 10), StockStatus::Normal);
    }
}
