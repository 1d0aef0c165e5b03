//! Bulk-import reconciliation tests
//!
//! Tests for the row decision table and batch ordering:
//! - Unseen / same-quantity / changed-quantity classification
//! - Idempotent re-import
//! - Deterministic processing order
//! - Cancellation round-trip over the allocation plan
//! - Status lifecycle guard against double reversal

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use shared::reconcile::{classify_import_row, processing_order, ImportRow, RowAction};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn row(guid: &str, code: &str, qty: i64, dispense_date: &str) -> ImportRow {
    ImportRow {
        hos_guid: guid.to_string(),
        medicine_code: code.to_string(),
        quantity_requested: qty,
        dispense_date: date(dispense_date),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// The three-way decision table
    #[test]
    fn test_row_classification() {
        assert_eq!(classify_import_row(None, 10), RowAction::Allocate);
        assert_eq!(classify_import_row(Some(10), 10), RowAction::Skip);
        assert_eq!(classify_import_row(Some(10), 15), RowAction::Reallocate);
        assert_eq!(classify_import_row(Some(15), 10), RowAction::Reallocate);
    }

    /// Rows are processed by dispense date, then file position
    #[test]
    fn test_processing_order() {
        let rows = vec![
            row("c", "PARA500", 5, "2024-02-10"),
            row("a", "PARA500", 5, "2024-02-01"),
            row("b", "AMOX250", 5, "2024-02-01"),
        ];

        assert_eq!(processing_order(&rows), vec![1, 2, 0]);
    }

    /// Re-importing an applied batch classifies every row as Skip
    #[test]
    fn test_reimport_is_idempotent() {
        let batch = vec![
            row("g1", "PARA500", 10, "2024-02-01"),
            row("g2", "AMOX250", 4, "2024-02-01"),
        ];

        // First pass: nothing recorded yet
        for r in &batch {
            assert_eq!(
                classify_import_row(None, r.quantity_requested),
                RowAction::Allocate
            );
        }

        // Second pass: recorded quantities match the file
        for r in &batch {
            assert_eq!(
                classify_import_row(Some(r.quantity_requested), r.quantity_requested),
                RowAction::Skip
            );
        }
    }

    /// A corrected export with one changed quantity reallocates only that row
    #[test]
    fn test_corrected_quantity_triggers_reallocate() {
        let recorded = 10;
        assert_eq!(classify_import_row(Some(recorded), 10), RowAction::Skip);
        assert_eq!(
            classify_import_row(Some(recorded), 12),
            RowAction::Reallocate
        );
    }
}

// ============================================================================
// Cancellation Round-Trip
// ============================================================================

#[cfg(test)]
mod cancellation_tests {
    use super::*;
    use shared::allocation::{plan_fefo, ExpiredLotPolicy, LotAvailability};
    use shared::ledger::apply_quantity_change;
    use shared::lifecycle::{check_cancellable, CancelRejection, RecordStatus};

    fn lot(n: u128, expiry: &str, qty: i64) -> LotAvailability {
        LotAvailability {
            lot_id: Uuid::from_u128(n),
            lot_number: format!("LOT-{:03}", n),
            expiry_date: date(expiry),
            quantity_on_hand: qty,
        }
    }

    /// Applying a plan and then reversing it restores every lot exactly —
    /// the reallocate path (reverse prior, allocate fresh) depends on this
    #[test]
    fn test_reversal_restores_original_lots() {
        let mut lots = vec![
            lot(1, "2025-01-01", 10),
            lot(2, "2025-06-01", 20),
            lot(3, "2025-09-01", 15),
        ];
        let original: Vec<i64> = lots.iter().map(|l| l.quantity_on_hand).collect();

        let plan = plan_fefo(&lots, 25, ExpiredLotPolicy::Include, date("2024-06-01")).unwrap();

        // Apply the dispense
        for slice in &plan {
            let lot = lots.iter_mut().find(|l| l.lot_id == slice.lot_id).unwrap();
            lot.quantity_on_hand =
                apply_quantity_change(lot.quantity_on_hand, -slice.quantity).unwrap();
        }
        let dispensed: i64 = original.iter().sum::<i64>()
            - lots.iter().map(|l| l.quantity_on_hand).sum::<i64>();
        assert_eq!(dispensed, 25);

        // Reverse it, each unit back to the lot it came from
        for slice in &plan {
            let lot = lots.iter_mut().find(|l| l.lot_id == slice.lot_id).unwrap();
            lot.quantity_on_hand =
                apply_quantity_change(lot.quantity_on_hand, slice.quantity).unwrap();
        }

        let restored: Vec<i64> = lots.iter().map(|l| l.quantity_on_hand).collect();
        assert_eq!(restored, original);
    }

    /// Both terminal states already carry their reversal movements, so
    /// neither may be cancelled again
    #[test]
    fn test_terminal_statuses_reject_cancellation() {
        assert_eq!(check_cancellable(RecordStatus::Normal), Ok(()));
        assert_eq!(
            check_cancellable(RecordStatus::Cancelled),
            Err(CancelRejection::AlreadyCancelled)
        );
        assert_eq!(
            check_cancellable(RecordStatus::UpdatedFromImport),
            Err(CancelRejection::Superseded)
        );
    }

    /// A re-import with a changed quantity reverses the prior record and
    /// allocates fresh. Cancelling the superseded record afterwards must be
    /// rejected, otherwise its stock would be restored a second time.
    #[test]
    fn test_cancel_after_supersede_cannot_restore_twice() {
        let mut on_hand = 10i64;

        // Import row dispenses 5
        on_hand = apply_quantity_change(on_hand, -5).unwrap();
        assert_eq!(on_hand, 5);

        // Re-import with quantity 8: reverse the prior record, allocate fresh
        on_hand = apply_quantity_change(on_hand, 5).unwrap();
        on_hand = apply_quantity_change(on_hand, -8).unwrap();
        assert_eq!(on_hand, 2);

        // The superseded record fails the lifecycle guard, so no further
        // reversal reaches the ledger and the balance stays at 2
        assert_eq!(
            check_cancellable(RecordStatus::UpdatedFromImport),
            Err(CancelRejection::Superseded)
        );
        assert_eq!(on_hand, 2);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn rows_strategy() -> impl Strategy<Value = Vec<ImportRow>> {
        prop::collection::vec((0i64..=60i64, 1i64..=100i64), 1..20).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (day_offset, qty))| ImportRow {
                    hos_guid: format!("guid-{:04}", i),
                    medicine_code: "PARA500".to_string(),
                    quantity_requested: qty,
                    dispense_date: date("2024-01-01") + chrono::Duration::days(day_offset),
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Skip if and only if the recorded quantity matches
        #[test]
        fn prop_skip_only_on_exact_match(
            existing in prop::option::of(1i64..=100i64),
            requested in 1i64..=100i64,
        ) {
            let action = classify_import_row(existing, requested);
            match existing {
                None => prop_assert_eq!(action, RowAction::Allocate),
                Some(prior) if prior == requested => prop_assert_eq!(action, RowAction::Skip),
                Some(_) => prop_assert_eq!(action, RowAction::Reallocate),
            }
        }

        /// The processing order is a permutation sorted by (date, position)
        #[test]
        fn prop_processing_order_is_sorted_permutation(rows in rows_strategy()) {
            let order = processing_order(&rows);

            let mut seen = order.clone();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..rows.len()).collect::<Vec<_>>());

            for pair in order.windows(2) {
                let a = (&rows[pair[0]].dispense_date, pair[0]);
                let b = (&rows[pair[1]].dispense_date, pair[1]);
                prop_assert!(a < b);
            }
        }
    }
}
