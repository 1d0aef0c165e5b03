//! Domain models for the MedStock platform

pub mod document;
pub mod inventory;
pub mod medicine;

pub use document::*;
pub use inventory::*;
pub use medicine::*;
