//! FEFO (First-Expired, First-Out) allocation planning
//!
//! Given the lots currently on hand for one medicine at one facility, the
//! planner decides which lots a requested quantity is taken from. The plan is
//! computed without touching the ledger; it only becomes effective when the
//! stock movement recorder applies it inside a database transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Snapshot of a single lot's availability at planning time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotAvailability {
    pub lot_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_on_hand: i64,
}

/// One slice of an allocation plan: take `quantity` from `lot_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub lot_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
}

/// Whether lots past their expiry date may be drawn from.
///
/// The source workflow deliberately dispenses from expired lots for write-off
/// purposes (`DispenseType::ExpiredWriteOff`), so exclusion is an explicit
/// caller decision rather than a built-in rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredLotPolicy {
    Include,
    Exclude,
}

/// Allocation failure: the facility does not hold enough stock
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient stock: requested {requested}, available {available}")]
pub struct StockShortfall {
    pub requested: i64,
    pub available: i64,
}

impl StockShortfall {
    /// Quantity that could not be covered
    pub fn shortfall(&self) -> i64 {
        self.requested - self.available
    }
}

/// Validate an explicitly named lot draw against that lot's on-hand stock.
///
/// Explicit allocations bypass FEFO planning, so the availability check the
/// planner would have done happens here instead.
pub fn check_explicit_draw(quantity_on_hand: i64, requested: i64) -> Result<(), StockShortfall> {
    if requested > quantity_on_hand {
        return Err(StockShortfall {
            requested,
            available: quantity_on_hand.max(0),
        });
    }
    Ok(())
}

/// Plan a FEFO allocation of `quantity_needed` units across `lots`.
///
/// Lots are consumed earliest expiry first, ties broken by `lot_id` ascending
/// so the plan is deterministic regardless of input order. Lots with zero
/// stock are skipped; expired lots are skipped only under
/// [`ExpiredLotPolicy::Exclude`]. If total availability is short the planner
/// fails atomically and returns the shortfall — no partial plan is produced.
pub fn plan_fefo(
    lots: &[LotAvailability],
    quantity_needed: i64,
    policy: ExpiredLotPolicy,
    today: NaiveDate,
) -> Result<Vec<AllocationSlice>, StockShortfall> {
    let mut eligible: Vec<&LotAvailability> = lots
        .iter()
        .filter(|lot| lot.quantity_on_hand > 0)
        .filter(|lot| match policy {
            ExpiredLotPolicy::Include => true,
            ExpiredLotPolicy::Exclude => lot.expiry_date >= today,
        })
        .collect();
    eligible.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then(a.lot_id.cmp(&b.lot_id))
    });

    let available: i64 = eligible.iter().map(|lot| lot.quantity_on_hand).sum();
    if available < quantity_needed {
        return Err(StockShortfall {
            requested: quantity_needed,
            available,
        });
    }

    let mut remaining = quantity_needed;
    let mut plan = Vec::new();
    for lot in eligible {
        if remaining <= 0 {
            break;
        }
        let take = remaining.min(lot.quantity_on_hand);
        plan.push(AllocationSlice {
            lot_id: lot.lot_id,
            lot_number: lot.lot_number.clone(),
            expiry_date: lot.expiry_date,
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(n: u128, expiry: &str, qty: i64) -> LotAvailability {
        LotAvailability {
            lot_id: Uuid::from_u128(n),
            lot_number: format!("LOT-{n:03}"),
            expiry_date: expiry.parse().unwrap(),
            quantity_on_hand: qty,
        }
    }

    #[test]
    fn splits_across_lots_earliest_expiry_first() {
        let lots = vec![lot(2, "2025-06-01", 20), lot(1, "2025-01-01", 10)];
        let today = "2024-06-01".parse().unwrap();
        let plan = plan_fefo(&lots, 15, ExpiredLotPolicy::Include, today).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].lot_id, plan[0].quantity), (Uuid::from_u128(1), 10));
        assert_eq!((plan[1].lot_id, plan[1].quantity), (Uuid::from_u128(2), 5));
    }

    #[test]
    fn shortfall_is_reported_without_partial_plan() {
        let lots = vec![lot(1, "2025-01-01", 10), lot(2, "2025-06-01", 20)];
        let today = "2024-06-01".parse().unwrap();
        let err = plan_fefo(&lots, 35, ExpiredLotPolicy::Include, today).unwrap_err();
        assert_eq!(err.shortfall(), 5);
        assert_eq!(err.available, 30);
    }

    #[test]
    fn explicit_draw_reports_shortfall_not_negative_balance() {
        assert_eq!(check_explicit_draw(10, 10), Ok(()));
        let err = check_explicit_draw(3, 8).unwrap_err();
        assert_eq!(err.shortfall(), 5);
        assert_eq!(err.available, 3);
    }

    #[test]
    fn exclude_policy_skips_expired_lots() {
        let lots = vec![lot(1, "2023-12-31", 10), lot(2, "2025-06-01", 20)];
        let today = "2024-06-01".parse().unwrap();
        let plan = plan_fefo(&lots, 5, ExpiredLotPolicy::Exclude, today).unwrap();
        assert_eq!(plan[0].lot_id, Uuid::from_u128(2));
    }
}
