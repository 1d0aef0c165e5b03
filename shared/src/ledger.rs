//! Lot ledger arithmetic
//!
//! The stock movement recorder is the only component allowed to change a
//! lot's `quantity_on_hand`. The invariant it protects: the balance equals the
//! sum of all signed movements against the lot, and never goes below zero.

use thiserror::Error;

/// Applying a movement would drive the lot balance below zero.
///
/// This is a defensive invariant check; hitting it means a bug or a race
/// upstream and must abort the enclosing transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("movement of {quantity_change} would drive balance {current} below zero")]
pub struct NegativeBalance {
    pub current: i64,
    pub quantity_change: i64,
}

/// Compute the balance after applying a signed quantity change.
pub fn apply_quantity_change(current: i64, quantity_change: i64) -> Result<i64, NegativeBalance> {
    let next = current + quantity_change;
    if next < 0 {
        return Err(NegativeBalance {
            current,
            quantity_change,
        });
    }
    Ok(next)
}

/// Fold a movement history into running balances, starting from
/// `opening_balance`. Returns the balance after each movement, in order.
/// Used by the audit-trail view to recompute balances from the log.
pub fn running_balances(opening_balance: i64, changes: &[i64]) -> Vec<i64> {
    changes
        .iter()
        .scan(opening_balance, |balance, change| {
            *balance += change;
            Some(*balance)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overdraw() {
        let err = apply_quantity_change(5, -6).unwrap_err();
        assert_eq!(err.current, 5);
        assert!(apply_quantity_change(5, -5).is_ok());
    }

    #[test]
    fn running_balances_track_the_log() {
        assert_eq!(running_balances(10, &[5, -3, -12]), vec![15, 12, 0]);
    }
}
