//! Inventory views
//!
//! Read-only queries over the catalog, lots and movement log: the facility
//! stock overview, per-medicine lot breakdown in FEFO order, and the
//! per-medicine audit trail with running balances recomputed from the log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    classify_stock_status, LotStockView, MedicineStockSummary, MovementHistoryEntry,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Audit trail of one medicine over a date window
#[derive(Debug, Serialize)]
pub struct MovementHistory {
    pub medicine_id: Uuid,
    pub medicine_code: String,
    /// Balance carried into the window
    pub opening_balance: i64,
    pub closing_balance: i64,
    pub entries: Vec<MovementHistoryEntry>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    medicine_id: Uuid,
    medicine_code: String,
    generic_name: String,
    strength: Option<String>,
    unit: String,
    reorder_point: i64,
    quantity_on_hand: i64,
}

#[derive(sqlx::FromRow)]
struct LotRow {
    lot_id: Uuid,
    lot_number: String,
    expiry_date: NaiveDate,
    quantity_on_hand: i64,
    received_date: NaiveDate,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    movement_id: Uuid,
    transaction_date: DateTime<Utc>,
    movement_type: String,
    lot_number: String,
    expiry_date: NaiveDate,
    quantity_change: i64,
    reference_document: String,
    hos_guid: Option<String>,
    user_full_name: String,
    remarks: Option<String>,
}

pub struct InventoryService {
    db: PgPool,
}

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stock overview of every active medicine at the facility, with the
    /// stock status classified against each medicine's reorder point
    pub async fn stock_summary(&self, hcode: &str) -> AppResult<Vec<MedicineStockSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                m.id AS medicine_id,
                m.medicine_code,
                m.generic_name,
                m.strength,
                m.unit,
                m.reorder_point,
                COALESCE(SUM(l.quantity_on_hand), 0) AS quantity_on_hand
            FROM medicines m
            LEFT JOIN lots l ON l.medicine_id = m.id AND l.hcode = m.hcode
            WHERE m.hcode = $1 AND m.is_active = true
            GROUP BY m.id
            ORDER BY m.medicine_code
            "#,
        )
        .bind(hcode)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MedicineStockSummary {
                status: classify_stock_status(row.quantity_on_hand, row.reorder_point),
                medicine_id: row.medicine_id,
                medicine_code: row.medicine_code,
                generic_name: row.generic_name,
                strength: row.strength,
                unit: row.unit,
                reorder_point: row.reorder_point,
                quantity_on_hand: row.quantity_on_hand,
            })
            .collect())
    }

    /// Lots currently holding stock for one medicine, FEFO order — the same
    /// order the allocator would consume them
    pub async fn medicine_lots(
        &self,
        hcode: &str,
        medicine_id: Uuid,
    ) -> AppResult<Vec<LotStockView>> {
        self.require_medicine(hcode, medicine_id).await?;

        let rows = sqlx::query_as::<_, LotRow>(
            r#"
            SELECT
                id AS lot_id,
                lot_number,
                expiry_date,
                quantity_on_hand,
                created_at::date AS received_date
            FROM lots
            WHERE hcode = $1 AND medicine_id = $2 AND quantity_on_hand > 0
            ORDER BY expiry_date ASC, id ASC
            "#,
        )
        .bind(hcode)
        .bind(medicine_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LotStockView {
                lot_id: row.lot_id,
                lot_number: row.lot_number,
                expiry_date: row.expiry_date,
                quantity_on_hand: row.quantity_on_hand,
                received_date: row.received_date,
            })
            .collect())
    }

    /// Movement audit trail for one medicine with running balances.
    ///
    /// The opening balance is the sum of all movements before the window, so
    /// the running balance agrees with the lot balances at every point.
    pub async fn movement_history(
        &self,
        hcode: &str,
        medicine_id: Uuid,
        query: &HistoryQuery,
    ) -> AppResult<MovementHistory> {
        let medicine_code = self.require_medicine(hcode, medicine_id).await?;

        let opening_balance = match query.start_date {
            Some(start) => sqlx::query_scalar::<_, Option<i64>>(
                r#"
                SELECT SUM(quantity_change) FROM stock_movements
                WHERE hcode = $1 AND medicine_id = $2 AND transaction_date::date < $3
                "#,
            )
            .bind(hcode)
            .bind(medicine_id)
            .bind(start)
            .fetch_one(&self.db)
            .await?
            .unwrap_or(0),
            None => 0,
        };

        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT
                sm.id AS movement_id,
                sm.transaction_date,
                sm.movement_type::text AS movement_type,
                l.lot_number,
                l.expiry_date,
                sm.quantity_change,
                sm.reference_document,
                sm.hos_guid,
                u.full_name AS user_full_name,
                sm.remarks
            FROM stock_movements sm
            JOIN lots l ON l.id = sm.lot_id
            JOIN users u ON u.id = sm.user_id
            WHERE sm.hcode = $1 AND sm.medicine_id = $2
              AND ($3::date IS NULL OR sm.transaction_date::date >= $3)
              AND ($4::date IS NULL OR sm.transaction_date::date <= $4)
            ORDER BY sm.transaction_date ASC, sm.created_at ASC
            "#,
        )
        .bind(hcode)
        .bind(medicine_id)
        .bind(query.start_date)
        .bind(query.end_date)
        .fetch_all(&self.db)
        .await?;

        let changes: Vec<i64> = rows.iter().map(|r| r.quantity_change).collect();
        let balances = shared::ledger::running_balances(opening_balance, &changes);

        let entries: Vec<MovementHistoryEntry> = rows
            .into_iter()
            .zip(balances.iter())
            .map(|(row, &balance_after)| MovementHistoryEntry {
                movement_id: row.movement_id,
                transaction_date: row.transaction_date,
                movement_type: row.movement_type,
                lot_number: row.lot_number,
                expiry_date: row.expiry_date,
                quantity_change: row.quantity_change,
                balance_before: balance_after - row.quantity_change,
                balance_after,
                reference_document: row.reference_document,
                hos_guid: row.hos_guid,
                user_full_name: row.user_full_name,
                remarks: row.remarks,
            })
            .collect();

        let closing_balance = balances.last().copied().unwrap_or(opening_balance);

        Ok(MovementHistory {
            medicine_id,
            medicine_code,
            opening_balance,
            closing_balance,
            entries,
        })
    }

    async fn require_medicine(&self, hcode: &str, medicine_id: Uuid) -> AppResult<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT medicine_code FROM medicines WHERE id = $1 AND hcode = $2",
        )
        .bind(medicine_id)
        .bind(hcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Medicine".to_string()))
    }
}
