//! Lot ledger tests
//!
//! Tests for balance arithmetic behind the stock movement recorder:
//! - Non-negative balance invariant
//! - Running balance reconstruction from the movement log

use proptest::prelude::*;

use shared::ledger::{apply_quantity_change, running_balances};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Receipts increase, dispenses decrease
    #[test]
    fn test_signed_changes() {
        assert_eq!(apply_quantity_change(10, 5).unwrap(), 15);
        assert_eq!(apply_quantity_change(10, -4).unwrap(), 6);
    }

    /// Draining a lot to exactly zero is allowed
    #[test]
    fn test_drain_to_zero() {
        assert_eq!(apply_quantity_change(7, -7).unwrap(), 0);
    }

    /// One unit below zero is rejected with the offending values
    #[test]
    fn test_overdraw_is_rejected() {
        let err = apply_quantity_change(7, -8).unwrap_err();
        assert_eq!(err.current, 7);
        assert_eq!(err.quantity_change, -8);
    }

    /// Running balances follow the movement log in order
    #[test]
    fn test_running_balances() {
        let changes = [50, -20, 30, -15];
        assert_eq!(running_balances(0, &changes), vec![50, 30, 60, 45]);
    }

    /// An opening balance carries into the window
    #[test]
    fn test_running_balances_with_opening() {
        assert_eq!(running_balances(100, &[-30, -70]), vec![70, 0]);
    }

    /// No movements: no balances
    #[test]
    fn test_running_balances_empty() {
        assert!(running_balances(42, &[]).is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Conservation: the final balance equals opening plus the sum of all
        /// movements
        #[test]
        fn prop_final_balance_is_sum_of_movements(
            opening in 0i64..=10_000i64,
            changes in prop::collection::vec(-500i64..=500i64, 1..50),
        ) {
            let balances = running_balances(opening, &changes);
            let expected: i64 = opening + changes.iter().sum::<i64>();
            prop_assert_eq!(*balances.last().unwrap(), expected);
        }

        /// Each step moves by exactly the logged change
        #[test]
        fn prop_each_step_matches_its_change(
            opening in 0i64..=10_000i64,
            changes in prop::collection::vec(-500i64..=500i64, 1..50),
        ) {
            let balances = running_balances(opening, &changes);
            let mut previous = opening;
            for (balance, change) in balances.iter().zip(changes.iter()) {
                prop_assert_eq!(*balance, previous + change);
                previous = *balance;
            }
        }

        /// apply_quantity_change never returns a negative balance
        #[test]
        fn prop_no_negative_balance(
            current in 0i64..=10_000i64,
            change in -20_000i64..=20_000i64,
        ) {
            match apply_quantity_change(current, change) {
                Ok(next) => {
                    prop_assert!(next >= 0);
                    prop_assert_eq!(next, current + change);
                }
                Err(err) => {
                    prop_assert!(current + change < 0);
                    prop_assert_eq!(err.current, current);
                }
            }
        }
    }
}
