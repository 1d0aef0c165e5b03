//! Stock movement recorder
//!
//! The single choke point for lot balance mutation. Every receipt, dispense,
//! reversal and adjustment flows through [`apply_movement`], which locks the
//! target lot row, re-checks the balance invariant and appends an immutable
//! movement record in the same transaction. No other component is permitted
//! to touch `lots.quantity_on_hand`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Movement categories recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods receipt against an approved requisition
    ReceiptRequisition,
    /// Direct goods receipt (no requisition)
    ReceiptDirect,
    /// Manual/FEFO dispense
    Dispense,
    /// Dispense originating from a bulk import batch
    DispenseImport,
    /// Compensating movement restoring stock to its original lot
    Reversal,
    /// Manual stock adjustment
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::ReceiptRequisition => "receipt_requisition",
            MovementType::ReceiptDirect => "receipt_direct",
            MovementType::Dispense => "dispense",
            MovementType::DispenseImport => "dispense_import",
            MovementType::Reversal => "reversal",
            MovementType::Adjustment => "adjustment",
        }
    }
}

/// A movement to be applied to the ledger
#[derive(Debug)]
pub struct NewMovement<'a> {
    pub hcode: &'a str,
    pub medicine_id: Uuid,
    pub lot_id: Uuid,
    pub movement_type: MovementType,
    /// Signed: positive for receipts/reversals, negative for dispenses
    pub quantity_change: i64,
    pub reference_document: &'a str,
    pub hos_guid: Option<&'a str>,
    pub user_id: Uuid,
    pub remarks: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// Apply a movement inside the caller's transaction.
///
/// Locks the lot row, verifies the resulting balance stays non-negative,
/// updates `quantity_on_hand` and appends the movement row carrying the
/// post-movement balance. Returns the movement id.
pub async fn apply_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement: NewMovement<'_>,
) -> AppResult<Uuid> {
    // Serialize writers on this lot
    let row = sqlx::query_as::<_, (String, i64)>(
        "SELECT lot_number, quantity_on_hand FROM lots WHERE id = $1 AND hcode = $2 FOR UPDATE",
    )
    .bind(movement.lot_id)
    .bind(movement.hcode)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;

    let (lot_number, quantity_on_hand) = row;

    let balance_after =
        shared::ledger::apply_quantity_change(quantity_on_hand, movement.quantity_change)
            .map_err(|_| AppError::NegativeBalance {
                lot_number: lot_number.clone(),
            })?;

    sqlx::query("UPDATE lots SET quantity_on_hand = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance_after)
        .bind(movement.lot_id)
        .execute(&mut **tx)
        .await?;

    let movement_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO stock_movements (
            hcode, medicine_id, lot_id, movement_type, quantity_change, balance_after,
            reference_document, hos_guid, user_id, remarks, transaction_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(movement.hcode)
    .bind(movement.medicine_id)
    .bind(movement.lot_id)
    .bind(movement.movement_type)
    .bind(movement.quantity_change)
    .bind(balance_after)
    .bind(movement.reference_document)
    .bind(movement.hos_guid)
    .bind(movement.user_id)
    .bind(&movement.remarks)
    .bind(movement.transaction_date)
    .fetch_one(&mut **tx)
    .await?;

    Ok(movement_id)
}

/// Whether a database error is transient contention worth retrying:
/// serialization failure, deadlock, or a unique violation from two
/// transactions drawing the same daily document number.
pub fn is_transient_contention(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(sqlx::Error::Database(db_err)) => matches!(
            db_err.code().as_deref(),
            Some("40001") | Some("40P01") | Some("23505")
        ),
        _ => false,
    }
}
