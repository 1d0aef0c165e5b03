//! FEFO allocation tests
//!
//! Tests for the allocation planner:
//! - Earliest-expiry-first ordering with lot id tie-break
//! - Splitting a request across lots
//! - Atomic failure on shortfall
//! - Expired lot policy

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use shared::allocation::{plan_fefo, ExpiredLotPolicy, LotAvailability};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn lot(n: u128, expiry: &str, qty: i64) -> LotAvailability {
    LotAvailability {
        lot_id: Uuid::from_u128(n),
        lot_number: format!("LOT-{:03}", n),
        expiry_date: date(expiry),
        quantity_on_hand: qty,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A request covered by the earliest lot touches only that lot
    #[test]
    fn test_single_lot_covers_request() {
        let lots = vec![lot(1, "2025-01-01", 10), lot(2, "2025-06-01", 20)];
        let plan = plan_fefo(&lots, 10, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lot_id, Uuid::from_u128(1));
        assert_eq!(plan[0].quantity, 10);
    }

    /// 15 units against [10 @ 2025-01-01, 20 @ 2025-06-01] drains the first
    /// lot and takes 5 from the second
    #[test]
    fn test_split_across_lots() {
        let lots = vec![lot(1, "2025-01-01", 10), lot(2, "2025-06-01", 20)];
        let plan = plan_fefo(&lots, 15, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].lot_id, plan[0].quantity), (Uuid::from_u128(1), 10));
        assert_eq!((plan[1].lot_id, plan[1].quantity), (Uuid::from_u128(2), 5));
    }

    /// Input order does not matter; expiry date decides
    #[test]
    fn test_input_order_is_irrelevant() {
        let lots = vec![lot(2, "2025-06-01", 20), lot(1, "2025-01-01", 10)];
        let plan = plan_fefo(&lots, 5, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!(plan[0].lot_id, Uuid::from_u128(1));
    }

    /// Same expiry date: lower lot id wins the tie
    #[test]
    fn test_tie_break_on_lot_id() {
        let lots = vec![lot(7, "2025-03-01", 10), lot(3, "2025-03-01", 10)];
        let plan = plan_fefo(&lots, 10, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!(plan[0].lot_id, Uuid::from_u128(3));
    }

    /// Empty lots never appear in a plan
    #[test]
    fn test_zero_stock_lots_are_skipped() {
        let lots = vec![lot(1, "2025-01-01", 0), lot(2, "2025-06-01", 20)];
        let plan = plan_fefo(&lots, 5, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lot_id, Uuid::from_u128(2));
    }

    /// 35 units against 30 available fails atomically with the shortfall
    #[test]
    fn test_shortfall_fails_whole_request() {
        let lots = vec![lot(1, "2025-01-01", 10), lot(2, "2025-06-01", 20)];
        let err = plan_fefo(&lots, 35, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap_err();

        assert_eq!(err.requested, 35);
        assert_eq!(err.available, 30);
        assert_eq!(err.shortfall(), 5);
    }

    /// No stock at all: shortfall equals the full request
    #[test]
    fn test_no_stock_at_all() {
        let err = plan_fefo(&[], 5, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap_err();

        assert_eq!(err.requested, 5);
        assert_eq!(err.available, 0);
    }

    /// Under Exclude, expired lots neither contribute to the plan nor to the
    /// available total
    #[test]
    fn test_exclude_policy_removes_expired_from_availability() {
        let lots = vec![lot(1, "2023-12-31", 50), lot(2, "2025-06-01", 20)];
        let today = date("2024-06-01");

        let err = plan_fefo(&lots, 30, ExpiredLotPolicy::Exclude, today).unwrap_err();
        assert_eq!(err.available, 20);

        let plan = plan_fefo(&lots, 20, ExpiredLotPolicy::Exclude, today).unwrap();
        assert_eq!(plan[0].lot_id, Uuid::from_u128(2));
    }

    /// Under Include (the write-off workflow), the expired lot is drawn first
    /// because it expires earliest
    #[test]
    fn test_include_policy_drains_expired_first() {
        let lots = vec![lot(1, "2023-12-31", 50), lot(2, "2025-06-01", 20)];
        let plan = plan_fefo(&lots, 60, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        assert_eq!((plan[0].lot_id, plan[0].quantity), (Uuid::from_u128(1), 50));
        assert_eq!((plan[1].lot_id, plan[1].quantity), (Uuid::from_u128(2), 10));
    }

    /// A lot expiring today still counts as not expired
    #[test]
    fn test_lot_expiring_today_is_usable() {
        let lots = vec![lot(1, "2024-06-01", 10)];
        let plan = plan_fefo(&lots, 5, ExpiredLotPolicy::Exclude, date("2024-06-01")).unwrap();

        assert_eq!(plan[0].quantity, 5);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn lots_strategy() -> impl Strategy<Value = Vec<LotAvailability>> {
        prop::collection::vec((0i64..=200i64, 0i64..=1000i64), 1..8).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (day_offset, qty))| {
                    let base = date("2024-01-01");
                    LotAvailability {
                        lot_id: Uuid::from_u128(i as u128 + 1),
                        lot_number: format!("LOT-{:03}", i + 1),
                        expiry_date: base + chrono::Duration::days(day_offset),
                        quantity_on_hand: qty,
                    }
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Conservation: a successful plan allocates exactly the requested
        /// quantity, in positive slices no larger than the lot's stock
        #[test]
        fn prop_plan_conserves_quantity(
            lots in lots_strategy(),
            requested in 1i64..=500i64,
        ) {
            let today = date("2024-06-01");
            if let Ok(plan) = plan_fefo(&lots, requested, ExpiredLotPolicy::Include, today) {
                let total: i64 = plan.iter().map(|s| s.quantity).sum();
                prop_assert_eq!(total, requested);

                for slice in &plan {
                    prop_assert!(slice.quantity > 0);
                    let source = lots.iter().find(|l| l.lot_id == slice.lot_id).unwrap();
                    prop_assert!(slice.quantity <= source.quantity_on_hand);
                }
            }
        }

        /// Plan slices are strictly FEFO-ordered
        #[test]
        fn prop_plan_is_fefo_ordered(
            lots in lots_strategy(),
            requested in 1i64..=500i64,
        ) {
            let today = date("2024-06-01");
            if let Ok(plan) = plan_fefo(&lots, requested, ExpiredLotPolicy::Include, today) {
                for pair in plan.windows(2) {
                    prop_assert!(
                        (pair[0].expiry_date, pair[0].lot_id)
                            < (pair[1].expiry_date, pair[1].lot_id)
                    );
                }
            }
        }

        /// Success or failure depends only on the available total
        #[test]
        fn prop_outcome_matches_availability(
            lots in lots_strategy(),
            requested in 1i64..=500i64,
        ) {
            let today = date("2024-06-01");
            let available: i64 = lots.iter().map(|l| l.quantity_on_hand.max(0)).sum();
            let result = plan_fefo(&lots, requested, ExpiredLotPolicy::Include, today);

            if available >= requested {
                prop_assert!(result.is_ok());
            } else {
                let err = result.unwrap_err();
                prop_assert_eq!(err.available, available);
                prop_assert_eq!(err.shortfall(), requested - available);
            }
        }

        /// The plan is invariant under permutation of the input lots
        #[test]
        fn prop_plan_is_deterministic(
            lots in lots_strategy(),
            requested in 1i64..=500i64,
        ) {
            let today = date("2024-06-01");
            let forward = plan_fefo(&lots, requested, ExpiredLotPolicy::Include, today);

            let mut reversed = lots.clone();
            reversed.reverse();
            let backward = plan_fefo(&reversed, requested, ExpiredLotPolicy::Include, today);

            prop_assert_eq!(forward, backward);
        }
    }
}
