//! Validation utilities for the MedStock platform
//!
//! Input checks shared by the dispense, receiving and import paths.

// ============================================================================
// Facility and catalog codes
// ============================================================================

/// Validate a facility code (hcode): 5 digits, as issued by the ministry
/// registry (e.g. "10711" for the central hospital, "09362" for a clinic).
pub fn validate_hcode(hcode: &str) -> Result<(), &'static str> {
    if hcode.len() != 5 {
        return Err("Facility code must be exactly 5 characters");
    }
    if !hcode.chars().all(|c| c.is_ascii_digit()) {
        return Err("Facility code must be numeric");
    }
    Ok(())
}

/// Validate a medicine code: 1-24 characters, alphanumeric plus `-`/`.`
pub fn validate_medicine_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Medicine code must not be empty");
    }
    if code.len() > 24 {
        return Err("Medicine code must be at most 24 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err("Medicine code contains invalid characters");
    }
    Ok(())
}

/// Validate a lot number as printed on the batch label
pub fn validate_lot_number(lot_number: &str) -> Result<(), &'static str> {
    let trimmed = lot_number.trim();
    if trimmed.is_empty() {
        return Err("Lot number must not be empty");
    }
    if trimmed.len() > 50 {
        return Err("Lot number must be at most 50 characters");
    }
    Ok(())
}

// ============================================================================
// Quantities
// ============================================================================

/// Validate a requested/received quantity: strictly positive
pub fn validate_positive_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hcode_must_be_five_digits() {
        assert!(validate_hcode("10711").is_ok());
        assert!(validate_hcode("1071").is_err());
        assert!(validate_hcode("1071a").is_err());
    }

    #[test]
    fn medicine_code_charset() {
        assert!(validate_medicine_code("PARA500").is_ok());
        assert!(validate_medicine_code("AMOX-250.CAP").is_ok());
        assert!(validate_medicine_code("").is_err());
        assert!(validate_medicine_code("BAD CODE").is_err());
    }

    #[test]
    fn quantities_are_strictly_positive() {
        assert!(validate_positive_quantity(1).is_ok());
        assert!(validate_positive_quantity(0).is_err());
        assert!(validate_positive_quantity(-3).is_err());
    }
}
