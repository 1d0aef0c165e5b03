//! Goods receiving
//!
//! Records receipt vouchers (against an approved requisition or direct) and
//! tops up lots: an incoming line lands on the existing lot with the same
//! (medicine, lot number, expiry date) or creates the lot at zero and lets
//! the ledger apply the increase.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::document::GOODS_RECEIPT_PREFIX;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, MovementType, NewMovement};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GoodsReceiptVoucher {
    pub id: Uuid,
    pub hcode: String,
    pub voucher_number: String,
    pub received_date: NaiveDate,
    pub requisition_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub invoice_number: Option<String>,
    pub received_by: Uuid,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct GoodsReceiptVoucherSummary {
    pub id: Uuid,
    pub voucher_number: String,
    pub received_date: NaiveDate,
    pub requisition_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub receiver_name: Option<String>,
    pub item_count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct GoodsReceiptItemDetail {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_code: String,
    pub medicine_name: String,
    pub unit: String,
    pub lot_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_received: i64,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct GoodsReceiptDetail {
    #[serde(flatten)]
    pub voucher: GoodsReceiptVoucher,
    pub items: Vec<GoodsReceiptItemDetail>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReceiptInput {
    pub received_date: NaiveDate,
    /// Present when receiving against an approved requisition
    pub requisition_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub invoice_number: Option<String>,
    pub remarks: Option<String>,
    pub items: Vec<ReceiptItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptItemInput {
    pub medicine_id: Uuid,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub quantity_received: i64,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptListQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub struct ReceivingService {
    db: PgPool,
}

impl ReceivingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a goods receipt: one voucher, its items, and a positive ledger
    /// movement per line. All-or-nothing.
    pub async fn create_receipt(
        &self,
        hcode: &str,
        user_id: Uuid,
        input: CreateReceiptInput,
    ) -> AppResult<GoodsReceiptDetail> {
        self.validate_input(&input)?;

        let mut tx = self.db.begin().await?;

        let voucher_number =
            next_receipt_number(&mut tx, hcode, input.received_date).await?;

        let voucher = sqlx::query_as::<_, GoodsReceiptVoucher>(
            r#"
            INSERT INTO goods_receipt_vouchers (
                hcode, voucher_number, received_date, requisition_id,
                supplier_name, invoice_number, received_by, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(hcode)
        .bind(&voucher_number)
        .bind(input.received_date)
        .bind(input.requisition_id)
        .bind(&input.supplier_name)
        .bind(&input.invoice_number)
        .bind(user_id)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await?;

        let movement_type = if input.requisition_id.is_some() {
            MovementType::ReceiptRequisition
        } else {
            MovementType::ReceiptDirect
        };
        let transaction_date = Utc::now();

        for item in &input.items {
            let lot_id =
                find_or_create_lot(&mut tx, hcode, item.medicine_id, &item.lot_number, item.expiry_date)
                    .await?;

            ledger::apply_movement(
                &mut tx,
                NewMovement {
                    hcode,
                    medicine_id: item.medicine_id,
                    lot_id,
                    movement_type,
                    quantity_change: item.quantity_received,
                    reference_document: &voucher_number,
                    hos_guid: None,
                    user_id,
                    remarks: None,
                    transaction_date,
                },
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO goods_receipt_items (
                    voucher_id, medicine_id, lot_id, quantity_received, unit_price
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(voucher.id)
            .bind(item.medicine_id)
            .bind(lot_id)
            .bind(item.quantity_received)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let items = self.fetch_voucher_items(voucher.id).await?;
        Ok(GoodsReceiptDetail { voucher, items })
    }

    /// List receipt vouchers for a facility, newest first
    pub async fn list_receipts(
        &self,
        hcode: &str,
        query: &ReceiptListQuery,
    ) -> AppResult<Vec<GoodsReceiptVoucherSummary>> {
        let vouchers = sqlx::query_as::<_, GoodsReceiptVoucherSummary>(
            r#"
            SELECT
                v.id,
                v.voucher_number,
                v.received_date,
                v.requisition_id,
                v.supplier_name,
                u.full_name AS receiver_name,
                COUNT(i.id) AS item_count,
                COALESCE(SUM(i.quantity_received), 0) AS total_quantity
            FROM goods_receipt_vouchers v
            LEFT JOIN users u ON u.id = v.received_by
            LEFT JOIN goods_receipt_items i ON i.voucher_id = v.id
            WHERE v.hcode = $1
              AND ($2::date IS NULL OR v.received_date >= $2)
              AND ($3::date IS NULL OR v.received_date <= $3)
            GROUP BY v.id, u.full_name
            ORDER BY v.received_date DESC, v.voucher_number DESC
            "#,
        )
        .bind(hcode)
        .bind(query.start_date)
        .bind(query.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(vouchers)
    }

    /// Fetch one voucher with its received lines
    pub async fn get_receipt(
        &self,
        hcode: &str,
        voucher_id: Uuid,
    ) -> AppResult<GoodsReceiptDetail> {
        let voucher = sqlx::query_as::<_, GoodsReceiptVoucher>(
            "SELECT * FROM goods_receipt_vouchers WHERE id = $1 AND hcode = $2",
        )
        .bind(voucher_id)
        .bind(hcode)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Goods receipt voucher".to_string()))?;

        let items = self.fetch_voucher_items(voucher.id).await?;
        Ok(GoodsReceiptDetail { voucher, items })
    }

    fn validate_input(&self, input: &CreateReceiptInput) -> AppResult<()> {
        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "At least one item is required".to_string(),
                message_th: "ต้องระบุรายการรับอย่างน้อย 1 รายการ".to_string(),
            });
        }
        for item in &input.items {
            shared::validate_positive_quantity(item.quantity_received).map_err(|msg| {
                AppError::Validation {
                    field: "items.quantity_received".to_string(),
                    message: msg.to_string(),
                    message_th: "จำนวนรับต้องมากกว่า 0".to_string(),
                }
            })?;
            shared::validate_lot_number(&item.lot_number).map_err(|msg| AppError::Validation {
                field: "items.lot_number".to_string(),
                message: msg.to_string(),
                message_th: "หมายเลข Lot ไม่ถูกต้อง".to_string(),
            })?;
        }
        Ok(())
    }

    async fn fetch_voucher_items(
        &self,
        voucher_id: Uuid,
    ) -> AppResult<Vec<GoodsReceiptItemDetail>> {
        let items = sqlx::query_as::<_, GoodsReceiptItemDetail>(
            r#"
            SELECT
                i.id,
                i.medicine_id,
                m.medicine_code,
                m.generic_name AS medicine_name,
                m.unit,
                i.lot_id,
                l.lot_number,
                l.expiry_date,
                i.quantity_received,
                i.unit_price
            FROM goods_receipt_items i
            JOIN medicines m ON m.id = i.medicine_id
            JOIN lots l ON l.id = i.lot_id
            WHERE i.voucher_id = $1
            ORDER BY m.medicine_code, l.expiry_date
            "#,
        )
        .bind(voucher_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }
}

/// Find the lot identified by (medicine, lot number, expiry date) or create
/// it with zero stock. The ledger applies the actual quantity so the receipt
/// shows up as a movement like everything else.
async fn find_or_create_lot(
    tx: &mut Transaction<'_, Postgres>,
    hcode: &str,
    medicine_id: Uuid,
    lot_number: &str,
    expiry_date: NaiveDate,
) -> AppResult<Uuid> {
    let existing = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM lots
        WHERE hcode = $1 AND medicine_id = $2 AND lot_number = $3 AND expiry_date = $4
        FOR UPDATE
        "#,
    )
    .bind(hcode)
    .bind(medicine_id)
    .bind(lot_number)
    .bind(expiry_date)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO lots (hcode, medicine_id, lot_number, expiry_date, quantity_on_hand)
        VALUES ($1, $2, $3, $4, 0)
        RETURNING id
        "#,
    )
    .bind(hcode)
    .bind(medicine_id)
    .bind(lot_number)
    .bind(expiry_date)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Issue the next GRN voucher number for the facility and day.
/// Sequences are compared numerically; string order breaks past 999.
async fn next_receipt_number(
    tx: &mut Transaction<'_, Postgres>,
    hcode: &str,
    date: NaiveDate,
) -> AppResult<String> {
    use shared::models::document::{format_document_number, next_sequence};

    let pattern = format!("{}-{}-{}-%", GOODS_RECEIPT_PREFIX, hcode, date.format("%y%m%d"));
    let issued = sqlx::query_scalar::<_, String>(
        r#"
        SELECT voucher_number FROM goods_receipt_vouchers
        WHERE hcode = $1 AND voucher_number LIKE $2
        "#,
    )
    .bind(hcode)
    .bind(&pattern)
    .fetch_all(&mut **tx)
    .await?;

    let sequence = next_sequence(issued.iter().map(String::as_str));
    Ok(format_document_number(GOODS_RECEIPT_PREFIX, hcode, date, sequence))
}
