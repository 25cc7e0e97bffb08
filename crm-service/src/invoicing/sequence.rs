//! Invoice identifier sequence: `INV0001` through `INV9999`.

use super::error::InvoiceError;

pub const INVOICE_PREFIX: &str = "INV";
const SUFFIX_WIDTH: usize = 4;
pub const MAX_SEQUENCE: u32 = 9999;

/// Format a sequence number as an invoice identifier.
pub fn format_invoice_id(sequence: u32) -> String {
    format!("{}{:0width$}", INVOICE_PREFIX, sequence, width = SUFFIX_WIDTH)
}

/// Sequence number of a well-formed identifier.
pub fn parse_invoice_id(invoice_id: &str) -> Option<u32> {
    let suffix = invoice_id.strip_prefix(INVOICE_PREFIX)?;
    if suffix.len() != SUFFIX_WIDTH || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Identifier following the last persisted one.
///
/// Only race free while the caller holds the storage transaction that read
/// `last`.
pub fn next_invoice_id(last: Option<&str>) -> Result<String, InvoiceError> {
    let last = match last.map(str::trim) {
        None | Some("") => return Ok(format_invoice_id(1)),
        Some(last) => last,
    };

    let sequence = parse_invoice_id(last)
        .ok_or_else(|| InvoiceError::CorruptSequenceState(last.to_string()))?;
    if sequence >= MAX_SEQUENCE {
        return Err(InvoiceError::SequenceExhausted(last.to_string()));
    }
    Ok(format_invoice_id(sequence + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_identifier() {
        assert_eq!(next_invoice_id(None).unwrap(), "INV0001");
        assert_eq!(next_invoice_id(Some("")).unwrap(), "INV0001");
    }

    #[test]
    fn test_increments_suffix() {
        assert_eq!(next_invoice_id(Some("INV0001")).unwrap(), "INV0002");
        assert_eq!(next_invoice_id(Some("INV0099")).unwrap(), "INV0100");
        assert_eq!(next_invoice_id(Some("INV9998")).unwrap(), "INV9999");
    }

    #[test]
    fn test_ceiling_is_fatal() {
        let err = next_invoice_id(Some("INV9999")).unwrap_err();
        assert!(matches!(err, InvoiceError::SequenceExhausted(ref id) if id == "INV9999"));
    }

    #[test]
    fn test_corrupt_identifiers() {
        for last in ["INVABCD", "INV12", "INV00001", "XYZ0001", "INV-001", "inv0001"] {
            let err = next_invoice_id(Some(last)).unwrap_err();
            assert!(
                matches!(err, InvoiceError::CorruptSequenceState(_)),
                "{last} should be corrupt"
            );
        }
    }

    #[test]
    fn test_parse_round_trips_format() {
        assert_eq!(parse_invoice_id(&format_invoice_id(42)), Some(42));
        assert_eq!(parse_invoice_id("INV+123"), None);
    }
}
