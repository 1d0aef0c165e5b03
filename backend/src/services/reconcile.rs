//! Bulk-import reconciliation engine
//!
//! Hospital information systems export dispense lines keyed by an external
//! `hos_guid`. Re-importing the same file, or a corrected version of it, must
//! converge on the exported quantities without double-dispensing: unseen rows
//! are allocated fresh, unchanged rows are skipped, changed rows replace the
//! prior dispense through a reversal plus a fresh FEFO allocation.
//!
//! Each row runs in its own transaction so one bad row never poisons the
//! rest of the batch.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::reconcile::{classify_import_row, processing_order, ImportRow, RowAction};

use crate::config::StockConfig;
use crate::error::{AppError, AppResult};
use crate::services::dispense::{
    DispenseInput, DispenseItemInput, DispenseRecord, DispenseService, DispenseStatus,
    DispenseType,
};
use crate::services::ledger;

use shared::models::document::DISPENSE_IMPORT_PREFIX;

#[derive(Debug, Deserialize)]
pub struct ImportBatchInput {
    pub rows: Vec<ImportRow>,
}

/// Outcome buckets for one import batch
#[derive(Debug, Default, Serialize)]
pub struct ReconcileSummary {
    /// Newly allocated rows
    pub processed: Vec<ProcessedRow>,
    /// Rows already recorded with the same quantity; no ledger change
    pub skipped_same_quantity: Vec<String>,
    /// Rows whose prior dispense was reversed and re-allocated
    pub updated: Vec<UpdatedRow>,
    /// Rows that could not be applied
    pub failed: Vec<FailedRow>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedRow {
    pub hos_guid: String,
    pub dispense_record_number: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedRow {
    pub hos_guid: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub dispense_record_number: String,
}

#[derive(Debug, Serialize)]
pub struct FailedRow {
    pub hos_guid: String,
    pub medicine_code: String,
    pub reason: String,
}

impl ReconcileSummary {
    pub fn applied_count(&self) -> usize {
        self.processed.len() + self.skipped_same_quantity.len() + self.updated.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.has_failures() && self.applied_count() == 0
    }
}

pub struct ReconcileService {
    db: PgPool,
    stock: StockConfig,
}

impl ReconcileService {
    pub fn new(db: PgPool, stock: StockConfig) -> Self {
        Self { db, stock }
    }

    /// Reconcile one import batch against the facility's recorded dispenses.
    ///
    /// Rows are processed in (dispense_date, file position) order so FEFO
    /// allocation stays deterministic across the batch. Returns the summary
    /// regardless of per-row failures; the handler maps bucket counts to the
    /// response status.
    pub async fn reconcile(
        &self,
        hcode: &str,
        user_id: Uuid,
        input: ImportBatchInput,
    ) -> AppResult<ReconcileSummary> {
        if input.rows.is_empty() {
            return Err(AppError::Validation {
                field: "rows".to_string(),
                message: "Import batch contains no rows".to_string(),
                message_th: "ไฟล์นำเข้าไม่มีรายการข้อมูล".to_string(),
            });
        }

        let dispense = DispenseService::new(self.db.clone(), self.stock.clone());
        let mut summary = ReconcileSummary::default();

        for index in processing_order(&input.rows) {
            let row = &input.rows[index];

            if let Err(reason) = validate_row(row) {
                summary.failed.push(FailedRow {
                    hos_guid: row.hos_guid.clone(),
                    medicine_code: row.medicine_code.clone(),
                    reason,
                });
                continue;
            }

            match self.process_row(&dispense, hcode, user_id, row).await {
                Ok(outcome) => match outcome {
                    RowOutcome::Allocated(record) => summary.processed.push(ProcessedRow {
                        hos_guid: row.hos_guid.clone(),
                        dispense_record_number: record.dispense_record_number,
                        quantity: row.quantity_requested,
                    }),
                    RowOutcome::Skipped => {
                        summary.skipped_same_quantity.push(row.hos_guid.clone())
                    }
                    RowOutcome::Reallocated {
                        previous_quantity,
                        record,
                    } => summary.updated.push(UpdatedRow {
                        hos_guid: row.hos_guid.clone(),
                        previous_quantity,
                        new_quantity: row.quantity_requested,
                        dispense_record_number: record.dispense_record_number,
                    }),
                },
                Err(err) => {
                    tracing::warn!(
                        hcode = %hcode,
                        hos_guid = %row.hos_guid,
                        error = %err,
                        "import row failed"
                    );
                    summary.failed.push(FailedRow {
                        hos_guid: row.hos_guid.clone(),
                        medicine_code: row.medicine_code.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Process one row in its own transaction, retrying on lock contention.
    async fn process_row(
        &self,
        dispense: &DispenseService,
        hcode: &str,
        user_id: Uuid,
        row: &ImportRow,
    ) -> AppResult<RowOutcome> {
        let mut attempt = 0;
        loop {
            let mut tx = self.db.begin().await?;
            match self
                .process_row_tx(&mut tx, dispense, hcode, user_id, row)
                .await
            {
                Ok(outcome) => {
                    tx.commit().await?;
                    return Ok(outcome);
                }
                Err(err) if ledger::is_transient_contention(&err) => {
                    tx.rollback().await?;
                    attempt += 1;
                    if attempt > self.stock.lock_retry_attempts {
                        return Err(err);
                    }
                }
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err);
                }
            }
        }
    }

    async fn process_row_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        dispense: &DispenseService,
        hcode: &str,
        user_id: Uuid,
        row: &ImportRow,
    ) -> AppResult<RowOutcome> {
        let medicine_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM medicines WHERE hcode = $1 AND medicine_code = $2 AND is_active = true",
        )
        .bind(hcode)
        .bind(&row.medicine_code)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Medicine {}", row.medicine_code)))?;

        // Prior live records for this external row, locked for the duration
        let prior_records = sqlx::query_as::<_, DispenseRecord>(
            r#"
            SELECT * FROM dispense_records
            WHERE hcode = $1 AND hos_guid = $2 AND status = 'normal'
            ORDER BY created_at
            FOR UPDATE
            "#,
        )
        .bind(hcode)
        .bind(&row.hos_guid)
        .fetch_all(&mut **tx)
        .await?;

        let existing_quantity = if prior_records.is_empty() {
            None
        } else {
            let mut total = 0_i64;
            for record in &prior_records {
                let sum = sqlx::query_scalar::<_, Option<i64>>(
                    "SELECT SUM(quantity_dispensed) FROM dispense_items WHERE dispense_record_id = $1",
                )
                .bind(record.id)
                .fetch_one(&mut **tx)
                .await?;
                total += sum.unwrap_or(0);
            }
            Some(total)
        };

        match classify_import_row(existing_quantity, row.quantity_requested) {
            RowAction::Skip => Ok(RowOutcome::Skipped),
            RowAction::Allocate => {
                let record = self
                    .allocate_row(tx, dispense, hcode, user_id, medicine_id, row)
                    .await?;
                Ok(RowOutcome::Allocated(record))
            }
            RowAction::Reallocate => {
                for record in &prior_records {
                    dispense
                        .reverse_record_tx(tx, record, user_id, DispenseStatus::UpdatedFromImport)
                        .await?;
                }
                let record = self
                    .allocate_row(tx, dispense, hcode, user_id, medicine_id, row)
                    .await?;
                Ok(RowOutcome::Reallocated {
                    previous_quantity: existing_quantity.unwrap_or(0),
                    record,
                })
            }
        }
    }

    async fn allocate_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        dispense: &DispenseService,
        hcode: &str,
        user_id: Uuid,
        medicine_id: Uuid,
        row: &ImportRow,
    ) -> AppResult<DispenseRecord> {
        let input = DispenseInput {
            dispense_date: row.dispense_date,
            dispense_type: DispenseType::BulkImport,
            remarks: None,
            exclude_expired_lots: None,
            items: vec![DispenseItemInput {
                medicine_id,
                quantity: row.quantity_requested,
                lots: None,
            }],
        };

        dispense
            .create_dispense_tx(
                tx,
                hcode,
                user_id,
                DISPENSE_IMPORT_PREFIX,
                Some(&row.hos_guid),
                &input,
            )
            .await
    }
}

enum RowOutcome {
    Allocated(DispenseRecord),
    Skipped,
    Reallocated {
        previous_quantity: i64,
        record: DispenseRecord,
    },
}

fn validate_row(row: &ImportRow) -> Result<(), String> {
    if row.hos_guid.trim().is_empty() {
        return Err("hos_guid must not be empty".to_string());
    }
    shared::validate_medicine_code(&row.medicine_code)?;
    shared::validate_positive_quantity(row.quantity_requested)?;
    Ok(())
}
