//! Dispense record status lifecycle
//!
//! A record starts `normal` and ends in exactly one terminal state:
//! `cancelled` by a manual cancellation, or `updated_from_import` when a
//! re-imported row with a different quantity superseded it. Entering either
//! terminal state appends the reversal movements that restore the record's
//! stock, so a record may be reversed at most once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Normal,
    Cancelled,
    UpdatedFromImport,
}

/// Why a record in its current status cannot be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRejection {
    AlreadyCancelled,
    Superseded,
}

/// Only `normal` records may be cancelled. Both terminal states have
/// already had their stock restored; reversing again would inflate it.
pub fn check_cancellable(status: RecordStatus) -> Result<(), CancelRejection> {
    match status {
        RecordStatus::Normal => Ok(()),
        RecordStatus::Cancelled => Err(CancelRejection::AlreadyCancelled),
        RecordStatus::UpdatedFromImport => Err(CancelRejection::Superseded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_normal_is_cancellable() {
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
}
