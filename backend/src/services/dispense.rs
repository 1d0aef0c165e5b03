//! Dispense transaction manager
//!
//! One contract for every way stock leaves the facility: outpatient,
//! inpatient, internal-unit transfers, expired write-offs and bulk imports.
//! Allocation defaults to FEFO; callers who already know the physical lots
//! (e.g. counted expired stock) pass them explicitly per item. Cancellation
//! never deletes ledger rows, it appends compensating reversal movements.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::allocation::{check_explicit_draw, plan_fefo, ExpiredLotPolicy, LotAvailability};
use shared::lifecycle::{check_cancellable, CancelRejection, RecordStatus};
use shared::models::document::{format_document_number, next_sequence, DISPENSE_PREFIX};

use crate::config::StockConfig;
use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, MovementType, NewMovement};

/// Lifecycle of a dispense record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispense_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispenseStatus {
    Normal,
    Cancelled,
    /// Superseded by a re-imported row with a different quantity
    UpdatedFromImport,
}

impl DispenseStatus {
    fn lifecycle(self) -> RecordStatus {
        match self {
            DispenseStatus::Normal => RecordStatus::Normal,
            DispenseStatus::Cancelled => RecordStatus::Cancelled,
            DispenseStatus::UpdatedFromImport => RecordStatus::UpdatedFromImport,
        }
    }
}

/// Workflow a dispense belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispense_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispenseType {
    Outpatient,
    Inpatient,
    InternalUnit,
    ExpiredWriteOff,
    BulkImport,
}

/// Dispense record header
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DispenseRecord {
    pub id: Uuid,
    pub hcode: String,
    pub dispense_record_number: String,
    pub dispense_date: NaiveDate,
    pub dispense_type: DispenseType,
    pub status: DispenseStatus,
    /// External row identity for bulk-imported dispenses
    pub hos_guid: Option<String>,
    pub dispenser_id: Uuid,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record header enriched for list views
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DispenseRecordSummary {
    pub id: Uuid,
    pub dispense_record_number: String,
    pub dispense_date: NaiveDate,
    pub dispense_type: DispenseType,
    pub status: DispenseStatus,
    pub dispenser_name: Option<String>,
    pub item_count: i64,
    pub total_quantity: i64,
    pub remarks: Option<String>,
}

/// One allocated line of a record, joined with medicine and lot
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DispenseItemDetail {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_code: String,
    pub medicine_name: String,
    pub unit: String,
    pub lot_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_dispensed: i64,
}

/// Record plus its allocated lines
#[derive(Debug, Serialize)]
pub struct DispenseRecordDetail {
    #[serde(flatten)]
    pub record: DispenseRecord,
    pub items: Vec<DispenseItemDetail>,
}

#[derive(Debug, Deserialize)]
pub struct DispenseInput {
    pub dispense_date: NaiveDate,
    pub dispense_type: DispenseType,
    pub remarks: Option<String>,
    /// Per-request override of the facility's expired-lot policy
    pub exclude_expired_lots: Option<bool>,
    pub items: Vec<DispenseItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct DispenseItemInput {
    pub medicine_id: Uuid,
    pub quantity: i64,
    /// When present, bypasses FEFO and draws exactly these lots
    pub lots: Option<Vec<ExplicitLotInput>>,
}

#[derive(Debug, Deserialize)]
pub struct ExplicitLotInput {
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDispenseInput {
    pub dispense_date: Option<NaiveDate>,
    pub dispense_type: Option<DispenseType>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DispenseListQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<DispenseStatus>,
}

pub struct DispenseService {
    db: PgPool,
    stock: StockConfig,
}

impl DispenseService {
    pub fn new(db: PgPool, stock: StockConfig) -> Self {
        Self { db, stock }
    }

    /// Create a dispense record, allocating stock for every item.
    ///
    /// The whole record succeeds or fails as one transaction: a shortfall on
    /// any item rolls back every allocation already made. Lot-lock contention
    /// is retried a bounded number of times.
    pub async fn create_dispense(
        &self,
        hcode: &str,
        user_id: Uuid,
        input: DispenseInput,
    ) -> AppResult<DispenseRecordDetail> {
        self.validate_input(&input)?;

        let mut attempt = 0;
        let record = loop {
            let mut tx = self.db.begin().await?;
            match self
                .create_dispense_tx(&mut tx, hcode, user_id, DISPENSE_PREFIX, None, &input)
                .await
            {
                Ok(record) => {
                    tx.commit().await?;
                    break record;
                }
                Err(err) if ledger::is_transient_contention(&err) => {
                    tx.rollback().await?;
                    attempt += 1;
                    if attempt > self.stock.lock_retry_attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        hcode = %hcode,
                        attempt,
                        "lot lock contention during dispense, retrying"
                    );
                }
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err);
                }
            }
        };

        let items = self.fetch_record_items(record.id).await?;
        Ok(DispenseRecordDetail { record, items })
    }

    /// Create a record and allocate all its items inside an open transaction.
    /// Used directly by the bulk-import reconciler, which manages its own
    /// per-row transactions.
    pub(crate) async fn create_dispense_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hcode: &str,
        user_id: Uuid,
        number_prefix: &str,
        hos_guid: Option<&str>,
        input: &DispenseInput,
    ) -> AppResult<DispenseRecord> {
        let record_number =
            next_document_number(tx, number_prefix, hcode, input.dispense_date).await?;

        let record = sqlx::query_as::<_, DispenseRecord>(
            r#"
            INSERT INTO dispense_records (
                hcode, dispense_record_number, dispense_date, dispense_type,
                status, hos_guid, dispenser_id, remarks
            )
            VALUES ($1, $2, $3, $4, 'normal', $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(hcode)
        .bind(&record_number)
        .bind(input.dispense_date)
        .bind(input.dispense_type)
        .bind(hos_guid)
        .bind(user_id)
        .bind(&input.remarks)
        .fetch_one(&mut **tx)
        .await?;

        let movement_type = match input.dispense_type {
            DispenseType::BulkImport => MovementType::DispenseImport,
            _ => MovementType::Dispense,
        };
        let policy = self.expired_lot_policy(input);
        let transaction_date = business_timestamp(input.dispense_date);

        for item in &input.items {
            match &item.lots {
                Some(lots) => {
                    self.allocate_explicit(
                        tx,
                        hcode,
                        &record,
                        item,
                        lots,
                        movement_type,
                        transaction_date,
                        user_id,
                    )
                    .await?
                }
                None => {
                    self.allocate_fefo(
                        tx,
                        hcode,
                        &record,
                        item,
                        policy,
                        movement_type,
                        transaction_date,
                        user_id,
                    )
                    .await?
                }
            }
        }

        Ok(record)
    }

    /// FEFO allocation for one item: lock this medicine's lots, plan, apply.
    #[allow(clippy::too_many_arguments)]
    async fn allocate_fefo(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hcode: &str,
        record: &DispenseRecord,
        item: &DispenseItemInput,
        policy: ExpiredLotPolicy,
        movement_type: MovementType,
        transaction_date: DateTime<Utc>,
        user_id: Uuid,
    ) -> AppResult<()> {
        let medicine_code = self
            .medicine_code_tx(tx, hcode, item.medicine_id)
            .await?;

        // Lock every candidate lot up front so concurrent dispenses see a
        // consistent snapshot of this medicine's stock
        let lots = sqlx::query_as::<_, (Uuid, String, NaiveDate, i64)>(
            r#"
            SELECT id, lot_number, expiry_date, quantity_on_hand
            FROM lots
            WHERE hcode = $1 AND medicine_id = $2 AND quantity_on_hand > 0
            ORDER BY expiry_date ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(hcode)
        .bind(item.medicine_id)
        .fetch_all(&mut **tx)
        .await?;

        let availability: Vec<LotAvailability> = lots
            .into_iter()
            .map(|(lot_id, lot_number, expiry_date, quantity_on_hand)| LotAvailability {
                lot_id,
                lot_number,
                expiry_date,
                quantity_on_hand,
            })
            .collect();

        let plan = plan_fefo(
            &availability,
            item.quantity,
            policy,
            record.dispense_date,
        )
        .map_err(|shortfall| AppError::InsufficientStock {
            medicine_code: medicine_code.clone(),
            requested: shortfall.requested,
            available: shortfall.available,
        })?;

        for slice in plan {
            ledger::apply_movement(
                tx,
                NewMovement {
                    hcode,
                    medicine_id: item.medicine_id,
                    lot_id: slice.lot_id,
                    movement_type,
                    quantity_change: -slice.quantity,
                    reference_document: &record.dispense_record_number,
                    hos_guid: record.hos_guid.as_deref(),
                    user_id,
                    remarks: None,
                    transaction_date,
                },
            )
            .await?;

            insert_dispense_item(tx, record.id, item.medicine_id, slice.lot_id, slice.quantity)
                .await?;
        }

        Ok(())
    }

    /// Explicit-lot allocation: the caller names the exact lots and per-lot
    /// quantities. Their sum must equal the item quantity.
    #[allow(clippy::too_many_arguments)]
    async fn allocate_explicit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hcode: &str,
        record: &DispenseRecord,
        item: &DispenseItemInput,
        lots: &[ExplicitLotInput],
        movement_type: MovementType,
        transaction_date: DateTime<Utc>,
        user_id: Uuid,
    ) -> AppResult<()> {
        let total: i64 = lots.iter().map(|l| l.quantity).sum();
        if total != item.quantity {
            return Err(AppError::Validation {
                field: "items.lots".to_string(),
                message: format!(
                    "Explicit lot quantities sum to {} but item quantity is {}",
                    total, item.quantity
                ),
                message_th: "ยอดรวมของ Lot ที่ระบุไม่ตรงกับจำนวนจ่าย".to_string(),
            });
        }

        let medicine_code = self
            .medicine_code_tx(tx, hcode, item.medicine_id)
            .await?;

        for explicit in lots {
            shared::validate_lot_number(&explicit.lot_number).map_err(|msg| {
                AppError::Validation {
                    field: "items.lots.lot_number".to_string(),
                    message: msg.to_string(),
                    message_th: "หมายเลข Lot ไม่ถูกต้อง".to_string(),
                }
            })?;

            let (lot_id, quantity_on_hand) = sqlx::query_as::<_, (Uuid, i64)>(
                r#"
                SELECT id, quantity_on_hand FROM lots
                WHERE hcode = $1 AND medicine_id = $2 AND lot_number = $3 AND expiry_date = $4
                FOR UPDATE
                "#,
            )
            .bind(hcode)
            .bind(item.medicine_id)
            .bind(&explicit.lot_number)
            .bind(explicit.expiry_date)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Lot {} ({}) of {}",
                    explicit.lot_number, explicit.expiry_date, medicine_code
                ))
            })?;

            // Check the locked lot covers the draw, so an overdraw surfaces
            // as a shortfall instead of tripping the ledger's balance guard
            check_explicit_draw(quantity_on_hand, explicit.quantity).map_err(|shortfall| {
                AppError::InsufficientStock {
                    medicine_code: medicine_code.clone(),
                    requested: shortfall.requested,
                    available: shortfall.available,
                }
            })?;

            ledger::apply_movement(
                tx,
                NewMovement {
                    hcode,
                    medicine_id: item.medicine_id,
                    lot_id,
                    movement_type,
                    quantity_change: -explicit.quantity,
                    reference_document: &record.dispense_record_number,
                    hos_guid: record.hos_guid.as_deref(),
                    user_id,
                    remarks: None,
                    transaction_date,
                },
            )
            .await?;

            insert_dispense_item(tx, record.id, item.medicine_id, lot_id, explicit.quantity)
                .await?;
        }

        Ok(())
    }

    /// Cancel a dispense record, restoring every unit to the lot it came from.
    /// Only `normal` records qualify: a cancelled or import-superseded record
    /// has already had its reversal movements appended, and a second reversal
    /// would put stock back twice.
    pub async fn cancel_dispense(
        &self,
        hcode: &str,
        user_id: Uuid,
        record_id: Uuid,
    ) -> AppResult<DispenseRecord> {
        let mut tx = self.db.begin().await?;

        let record = sqlx::query_as::<_, DispenseRecord>(
            "SELECT * FROM dispense_records WHERE id = $1 AND hcode = $2 FOR UPDATE",
        )
        .bind(record_id)
        .bind(hcode)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Dispense record".to_string()))?;

        check_cancellable(record.status.lifecycle()).map_err(|rejection| match rejection {
            CancelRejection::AlreadyCancelled => {
                AppError::AlreadyCancelled(record.dispense_record_number.clone())
            }
            CancelRejection::Superseded => AppError::InvalidStateTransition(format!(
                "Record {} was superseded by an import and cannot be cancelled",
                record.dispense_record_number
            )),
        })?;

        let cancelled = self
            .reverse_record_tx(&mut tx, &record, user_id, DispenseStatus::Cancelled)
            .await?;

        tx.commit().await?;
        Ok(cancelled)
    }

    /// Append reversal movements for every item of `record` and move the
    /// record to `new_status`. The caller must hold the record row lock.
    pub(crate) async fn reverse_record_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &DispenseRecord,
        user_id: Uuid,
        new_status: DispenseStatus,
    ) -> AppResult<DispenseRecord> {
        let items = sqlx::query_as::<_, (Uuid, Uuid, i64)>(
            "SELECT medicine_id, lot_id, quantity_dispensed FROM dispense_items WHERE dispense_record_id = $1",
        )
        .bind(record.id)
        .fetch_all(&mut **tx)
        .await?;

        let transaction_date = Utc::now();
        for (medicine_id, lot_id, quantity_dispensed) in items {
            ledger::apply_movement(
                tx,
                NewMovement {
                    hcode: &record.hcode,
                    medicine_id,
                    lot_id,
                    movement_type: MovementType::Reversal,
                    quantity_change: quantity_dispensed,
                    reference_document: &record.dispense_record_number,
                    hos_guid: record.hos_guid.as_deref(),
                    user_id,
                    remarks: None,
                    transaction_date,
                },
            )
            .await?;
        }

        let updated = sqlx::query_as::<_, DispenseRecord>(
            "UPDATE dispense_records SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(new_status)
        .bind(record.id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(updated)
    }

    /// List dispense records for a facility, newest first
    pub async fn list_dispenses(
        &self,
        hcode: &str,
        query: &DispenseListQuery,
    ) -> AppResult<Vec<DispenseRecordSummary>> {
        let records = sqlx::query_as::<_, DispenseRecordSummary>(
            r#"
            SELECT
                dr.id,
                dr.dispense_record_number,
                dr.dispense_date,
                dr.dispense_type,
                dr.status,
                u.full_name AS dispenser_name,
                COUNT(di.id) AS item_count,
                COALESCE(SUM(di.quantity_dispensed), 0) AS total_quantity,
                dr.remarks
            FROM dispense_records dr
            LEFT JOIN users u ON u.id = dr.dispenser_id
            LEFT JOIN dispense_items di ON di.dispense_record_id = dr.id
            WHERE dr.hcode = $1
              AND ($2::date IS NULL OR dr.dispense_date >= $2)
              AND ($3::date IS NULL OR dr.dispense_date <= $3)
              AND ($4::dispense_status IS NULL OR dr.status = $4)
            GROUP BY dr.id, u.full_name
            ORDER BY dr.dispense_date DESC, dr.dispense_record_number DESC
            "#,
        )
        .bind(hcode)
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(records)
    }

    /// Fetch one record with its allocated lines
    pub async fn get_dispense(
        &self,
        hcode: &str,
        record_id: Uuid,
    ) -> AppResult<DispenseRecordDetail> {
        let record = sqlx::query_as::<_, DispenseRecord>(
            "SELECT * FROM dispense_records WHERE id = $1 AND hcode = $2",
        )
        .bind(record_id)
        .bind(hcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Dispense record".to_string()))?;

        let items = self.fetch_record_items(record.id).await?;
        Ok(DispenseRecordDetail { record, items })
    }

    /// Update header fields of a normal-status record. Allocations are not
    /// touched; quantity changes require cancel + re-dispense. The status
    /// guard lives inside the UPDATE itself so a concurrent cancellation
    /// cannot slip between a check and the write.
    pub async fn update_dispense(
        &self,
        hcode: &str,
        record_id: Uuid,
        input: UpdateDispenseInput,
    ) -> AppResult<DispenseRecord> {
        let updated = sqlx::query_as::<_, DispenseRecord>(
            r#"
            UPDATE dispense_records
            SET dispense_date = COALESCE($1, dispense_date),
                dispense_type = COALESCE($2, dispense_type),
                remarks = COALESCE($3, remarks),
                updated_at = NOW()
            WHERE id = $4 AND hcode = $5 AND status = 'normal'
            RETURNING *
            "#,
        )
        .bind(input.dispense_date)
        .bind(input.dispense_type)
        .bind(input.remarks)
        .bind(record_id)
        .bind(hcode)
        .fetch_optional(&self.db)
        .await?;

        if let Some(record) = updated {
            return Ok(record);
        }

        // Zero rows: either the record does not exist or it left the
        // normal state. Re-read to tell the two apart.
        let existing = sqlx::query_as::<_, DispenseRecord>(
            "SELECT * FROM dispense_records WHERE id = $1 AND hcode = $2",
        )
        .bind(record_id)
        .bind(hcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Dispense record".to_string()))?;

        Err(AppError::InvalidStateTransition(format!(
            "Record {} is not editable in its current status",
            existing.dispense_record_number
        )))
    }

    fn expired_lot_policy(&self, input: &DispenseInput) -> ExpiredLotPolicy {
        // Write-offs exist to clear expired stock, so the exclusion knob
        // never applies to them
        if input.dispense_type == DispenseType::ExpiredWriteOff {
            return ExpiredLotPolicy::Include;
        }
        let exclude = input
            .exclude_expired_lots
            .unwrap_or(!self.stock.dispense_from_expired_lots);
        if exclude {
            ExpiredLotPolicy::Exclude
        } else {
            ExpiredLotPolicy::Include
        }
    }

    fn validate_input(&self, input: &DispenseInput) -> AppResult<()> {
        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "At least one item is required".to_string(),
                message_th: "ต้องระบุรายการยาอย่างน้อย 1 รายการ".to_string(),
            });
        }
        if input.dispense_type == DispenseType::BulkImport {
            return Err(AppError::Validation {
                field: "dispense_type".to_string(),
                message: "Bulk-import dispenses are created through the import endpoint"
                    .to_string(),
                message_th: "รายการนำเข้าต้องส่งผ่านช่องทางนำเข้าข้อมูล".to_string(),
            });
        }
        for item in &input.items {
            shared::validate_positive_quantity(item.quantity).map_err(|msg| {
                AppError::Validation {
                    field: "items.quantity".to_string(),
                    message: msg.to_string(),
                    message_th: "จำนวนจ่ายต้องมากกว่า 0".to_string(),
                }
            })?;
        }
        Ok(())
    }

    async fn medicine_code_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hcode: &str,
        medicine_id: Uuid,
    ) -> AppResult<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT medicine_code FROM medicines WHERE id = $1 AND hcode = $2 AND is_active = true",
        )
        .bind(medicine_id)
        .bind(hcode)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Medicine".to_string()))
    }

    async fn fetch_record_items(&self, record_id: Uuid) -> AppResult<Vec<DispenseItemDetail>> {
        let items = sqlx::query_as::<_, DispenseItemDetail>(
            r#"
            SELECT
                di.id,
                di.medicine_id,
                m.medicine_code,
                m.generic_name AS medicine_name,
                m.unit,
                di.lot_id,
                l.lot_number,
                l.expiry_date,
                di.quantity_dispensed
            FROM dispense_items di
            JOIN medicines m ON m.id = di.medicine_id
            JOIN lots l ON l.id = di.lot_id
            WHERE di.dispense_record_id = $1
            ORDER BY m.medicine_code, l.expiry_date
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }
}

/// Issue the next per-facility per-day document number for `prefix`.
/// Sequences are compared numerically; string order breaks past 999.
async fn next_document_number(
    tx: &mut Transaction<'_, Postgres>,
    prefix: &str,
    hcode: &str,
    date: NaiveDate,
) -> AppResult<String> {
    let pattern = format!("{}-{}-{}-%", prefix, hcode, date.format("%y%m%d"));
    let issued = sqlx::query_scalar::<_, String>(
        r#"
        SELECT dispense_record_number FROM dispense_records
        WHERE hcode = $1 AND dispense_record_number LIKE $2
        "#,
    )
    .bind(hcode)
    .bind(&pattern)
    .fetch_all(&mut **tx)
    .await?;

    let sequence = next_sequence(issued.iter().map(String::as_str));
    Ok(format_document_number(prefix, hcode, date, sequence))
}

async fn insert_dispense_item(
    tx: &mut Transaction<'_, Postgres>,
    record_id: Uuid,
    medicine_id: Uuid,
    lot_id: Uuid,
    quantity: i64,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO dispense_items (dispense_record_id, medicine_id, lot_id, quantity_dispensed)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(record_id)
    .bind(medicine_id)
    .bind(lot_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Combine the business date with the current wall-clock time so movements
/// within a day keep their ordering.
fn business_timestamp(date: NaiveDate) -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_naive_utc_and_offset(date.and_time(now.time()), Utc)
}
