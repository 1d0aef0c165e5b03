//! Error handling for the MedStock backend
//!
//! Provides consistent error responses in Thai and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock errors
    #[error("Insufficient stock for {medicine_code}: requested {requested}, available {available}")]
    InsufficientStock {
        medicine_code: String,
        requested: i64,
        available: i64,
    },

    #[error("Negative balance on lot {lot_number}")]
    NegativeBalance { lot_number: String },

    #[error("Dispense record {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<i64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation {
                field,
                message,
                message_th,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_th: message_th.clone(),
                    field: Some(field.clone()),
                    shortfall: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_th: format!("ไม่พบ {}", resource),
                    field: None,
                    shortfall: None,
                },
            ),
            AppError::InsufficientStock {
                medicine_code,
                requested,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message_en: format!(
                        "Insufficient stock for {}: requested {}, available {}",
                        medicine_code, requested, available
                    ),
                    message_th: format!(
                        "ยา {} มีไม่เพียงพอในคลัง (ต้องการ {} คงเหลือ {})",
                        medicine_code, requested, available
                    ),
                    field: None,
                    shortfall: Some(requested - available),
                },
            ),
            AppError::NegativeBalance { lot_number } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "NEGATIVE_BALANCE".to_string(),
                    message_en: format!(
                        "Movement would drive lot {} below zero stock",
                        lot_number
                    ),
                    message_th: format!("ยอดคงเหลือของ Lot {} จะติดลบ", lot_number),
                    field: None,
                    shortfall: None,
                },
            ),
            AppError::AlreadyCancelled(doc) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "ALREADY_CANCELLED".to_string(),
                    message_en: format!("Dispense record {} is already cancelled", doc),
                    message_th: format!("เอกสารตัดจ่าย {} ถูกยกเลิกไปแล้ว", doc),
                    field: None,
                    shortfall: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_th: format!("ไม่สามารถเปลี่ยนสถานะได้: {}", msg),
                    field: None,
                    shortfall: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_th: "เกิดข้อผิดพลาดกับฐานข้อมูล".to_string(),
                    field: None,
                    shortfall: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_th: "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                    field: None,
                    shortfall: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
