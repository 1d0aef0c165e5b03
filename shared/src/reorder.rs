//! Min/max reorder level calculation
//!
//! A best-effort heuristic: average daily consumption over a lookback window,
//! scaled by the medicine's lead time (min) and review period (max - min).
//! Failures for individual medicines leave existing values untouched rather
//! than zeroing them out.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calculated reorder thresholds for one medicine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    pub min_stock: i64,
    pub max_stock: i64,
}

/// Derive min/max stock levels from consumption history.
///
/// `total_dispensed` is the summed dispensed quantity over `lookback_days`
/// (net of reversals). Returns `None` when there is nothing to base the
/// calculation on — no consumption, an empty window, or a medicine with no
/// lead time configured — in which case existing values are kept.
pub fn calc_min_max(
    total_dispensed: i64,
    lookback_days: i64,
    lead_time_days: i64,
    review_period_days: i64,
) -> Option<MinMax> {
    if total_dispensed <= 0 || lookback_days <= 0 || lead_time_days <= 0 {
        return None;
    }
    let min_stock = ceil_div(total_dispensed * lead_time_days, lookback_days);
    let max_stock = min_stock + ceil_div(total_dispensed * review_period_days.max(0), lookback_days);
    Some(MinMax {
        min_stock,
        max_stock,
    })
}

/// Suggested quantity for an auto-generated requisition item: refill to max
/// when stock has fallen below min (falling back to min when no max is set).
/// Zero means no requisition is needed.
pub fn suggest_requisition_quantity(current_stock: i64, min_stock: i64, max_stock: i64) -> i64 {
    if min_stock <= 0 || current_stock >= min_stock {
        return 0;
    }
    let target = if max_stock > current_stock {
        max_stock
    } else {
        min_stock
    };
    target - current_stock
}

/// A medicine suggested for requisition, with the computed quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequisitionSuggestion {
    pub medicine_id: Uuid,
    pub medicine_code: String,
    pub generic_name: String,
    pub strength: Option<String>,
    pub unit: String,
    pub min_stock: i64,
    pub max_stock: i64,
    pub quantity_on_hand: i64,
    pub quantity_to_request: i64,
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_scales_daily_consumption() {
        // 90 units over 90 days = 1/day; lead 7 days, review 30 days
        let mm = calc_min_max(90, 90, 7, 30).unwrap();
        assert_eq!(mm, MinMax { min_stock: 7, max_stock: 37 });
    }

    #[test]
    fn no_history_leaves_values_unchanged() {
        assert!(calc_min_max(0, 90, 7, 30).is_none());
        assert!(calc_min_max(90, 90, 0, 30).is_none());
    }

    #[test]
    fn suggestion_refills_to_max() {
        assert_eq!(suggest_requisition_quantity(3, 10, 40), 37);
        assert_eq!(suggest_requisition_quantity(3, 10, 0), 7);
        assert_eq!(suggest_requisition_quantity(12, 10, 40), 0);
    }
}
