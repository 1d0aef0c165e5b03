//! Document numbering
//!
//! Dispense records and goods receipt vouchers carry human-readable numbers
//! sequenced per facility per day, e.g. `DSP-09362-250114-003`.

use chrono::NaiveDate;

/// Number prefix per document kind
pub const DISPENSE_PREFIX: &str = "DSP";
pub const DISPENSE_IMPORT_PREFIX: &str = "DSPEXC";
pub const GOODS_RECEIPT_PREFIX: &str = "GRN";

/// Format a document number: `{prefix}-{hcode}-{yymmdd}-{seq:03}`
pub fn format_document_number(prefix: &str, hcode: &str, date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}-{}-{}-{:03}",
        prefix,
        hcode,
        date.format("%y%m%d"),
        sequence
    )
}

/// Extract the trailing sequence from a document number, if well-formed.
/// Used to continue the daily sequence from the latest issued number.
pub fn parse_sequence(document_number: &str) -> Option<u32> {
    document_number.rsplit('-').next()?.parse().ok()
}

/// Next daily sequence given every number already issued for the day.
///
/// Sequences are compared numerically, not as strings: once a facility
/// passes 999 documents the number grows to four digits and `"999"` sorts
/// after `"1000"` lexicographically.
pub fn next_sequence<'a>(issued: impl IntoIterator<Item = &'a str>) -> u32 {
    issued
        .into_iter()
        .filter_map(parse_sequence)
        .max()
        .unwrap_or(0)
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_the_sequence() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap();
        let number = format_document_number(DISPENSE_PREFIX, "09362", date, 3);
        assert_eq!(number, "DSP-09362-250114-003");
        assert_eq!(parse_sequence(&number), Some(3));
        assert_eq!(parse_sequence("garbage"), None);
    }

    #[test]
    fn sequence_grows_past_three_digits() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap();
        let number = format_document_number(DISPENSE_PREFIX, "09362", date, 1000);
        assert_eq!(number, "DSP-09362-250114-1000");
        assert_eq!(parse_sequence(&number), Some(1000));
    }

    #[test]
    fn next_sequence_compares_numerically() {
        // "999" sorts after "1000" as a string; the max must be numeric
        let issued = ["DSP-09362-250114-1000", "DSP-09362-250114-999"];
        assert_eq!(next_sequence(issued), 1001);
        assert_eq!(next_sequence([]), 1);
    }
}
