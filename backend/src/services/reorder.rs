//! Reorder level calculation and requisition suggestions
//!
//! Recomputes each medicine's min/max stock levels from consumption history
//! (dispenses net of reversals) and suggests refill-to-max quantities for
//! auto-generated requisitions. Medicines without usable history keep their
//! existing levels.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use shared::reorder::{calc_min_max, suggest_requisition_quantity, RequisitionSuggestion};

use crate::config::StockConfig;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct MinMaxQuery {
    /// Consumption window in days; falls back to the configured default
    pub lookback_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MinMaxRunSummary {
    pub lookback_days: i64,
    pub updated: Vec<UpdatedLevel>,
    /// Medicines left untouched for lack of history or lead time
    pub skipped: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedLevel {
    pub medicine_id: Uuid,
    pub medicine_code: String,
    pub total_dispensed: i64,
    pub min_stock: i64,
    pub max_stock: i64,
}

#[derive(sqlx::FromRow)]
struct ConsumptionRow {
    medicine_id: Uuid,
    medicine_code: String,
    lead_time_days: i32,
    review_period_days: i32,
    total_dispensed: i64,
}

#[derive(sqlx::FromRow)]
struct SuggestionRow {
    medicine_id: Uuid,
    medicine_code: String,
    generic_name: String,
    strength: Option<String>,
    unit: String,
    min_stock: i64,
    max_stock: i64,
    quantity_on_hand: i64,
}

pub struct ReorderService {
    db: PgPool,
    stock: StockConfig,
}

impl ReorderService {
    pub fn new(db: PgPool, stock: StockConfig) -> Self {
        Self { db, stock }
    }

    /// Recalculate min/max stock levels for every active medicine at the
    /// facility from its consumption over the lookback window.
    pub async fn recalculate_levels(
        &self,
        hcode: &str,
        query: &MinMaxQuery,
    ) -> AppResult<MinMaxRunSummary> {
        let lookback_days = query
            .lookback_days
            .filter(|&days| days > 0)
            .unwrap_or(self.stock.min_max_lookback_days);
        let window_start = Utc::now() - Duration::days(lookback_days);

        // Dispenses are negative movements and reversals positive, so the
        // negated sum over both is net consumption
        let rows = sqlx::query_as::<_, ConsumptionRow>(
            r#"
            SELECT
                m.id AS medicine_id,
                m.medicine_code,
                m.lead_time_days,
                m.review_period_days,
                COALESCE(-SUM(sm.quantity_change), 0) AS total_dispensed
            FROM medicines m
            LEFT JOIN stock_movements sm
                ON sm.medicine_id = m.id
               AND sm.hcode = m.hcode
               AND sm.movement_type IN ('dispense', 'dispense_import', 'reversal')
               AND sm.transaction_date >= $2
            WHERE m.hcode = $1 AND m.is_active = true
            GROUP BY m.id
            ORDER BY m.medicine_code
            "#,
        )
        .bind(hcode)
        .bind(window_start)
        .fetch_all(&self.db)
        .await?;

        let mut summary = MinMaxRunSummary {
            lookback_days,
            updated: Vec::new(),
            skipped: 0,
        };

        for row in rows {
            match calc_min_max(
                row.total_dispensed,
                lookback_days,
                i64::from(row.lead_time_days),
                i64::from(row.review_period_days),
            ) {
                Some(levels) => {
                    sqlx::query(
                        "UPDATE medicines SET min_stock = $1, max_stock = $2, updated_at = NOW() WHERE id = $3",
                    )
                    .bind(levels.min_stock)
                    .bind(levels.max_stock)
                    .bind(row.medicine_id)
                    .execute(&self.db)
                    .await?;

                    summary.updated.push(UpdatedLevel {
                        medicine_id: row.medicine_id,
                        medicine_code: row.medicine_code,
                        total_dispensed: row.total_dispensed,
                        min_stock: levels.min_stock,
                        max_stock: levels.max_stock,
                    });
                }
                None => summary.skipped += 1,
            }
        }

        tracing::info!(
            hcode = %hcode,
            lookback_days,
            updated = summary.updated.len(),
            skipped = summary.skipped,
            "min/max recalculation finished"
        );

        Ok(summary)
    }

    /// Medicines whose stock has fallen below min, with the refill-to-max
    /// quantity for an auto-generated requisition
    pub async fn suggest_requisition(&self, hcode: &str) -> AppResult<Vec<RequisitionSuggestion>> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT
                m.id AS medicine_id,
                m.medicine_code,
                m.generic_name,
                m.strength,
                m.unit,
                m.min_stock,
                m.max_stock,
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

        let suggestions = rows
            .into_iter()
            .filter_map(|row| {
                let quantity =
                    suggest_requisition_quantity(row.quantity_on_hand, row.min_stock, row.max_stock);
                (quantity > 0).then(|| RequisitionSuggestion {
                    medicine_id: row.medicine_id,
                    medicine_code: row.medicine_code,
                    generic_name: row.generic_name,
                    strength: row.strength,
                    unit: row.unit,
                    min_stock: row.min_stock,
                    max_stock: row.max_stock,
                    quantity_on_hand: row.quantity_on_hand,
                    quantity_to_request: quantity,
                })
            })
            .collect();

        Ok(suggestions)
    }
}
