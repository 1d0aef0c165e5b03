//! Shared types and core stock algorithms for the MedStock platform
//!
//! This crate contains the domain models and the pure FEFO allocation,
//! ledger, reconciliation and reorder logic shared between the backend
//! and its test suites.

pub mod allocation;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod reconcile;
pub mod reorder;
pub mod validation;

pub use models::*;
pub use validation::*;
