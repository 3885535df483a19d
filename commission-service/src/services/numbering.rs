//! Invoice number allocation.
//!
//! Numbers look like `INV-2025-0001`: a 4-digit, zero-padded sequence scoped
//! to the current calendar year at allocation time. The sequence lives in the
//! `invoice_sequences` table and is advanced with a single atomic upsert on
//! the caller's transaction, so two concurrent creations can never observe
//! the same value. Existing invoice rows are never scanned to infer the next
//! number.

use agency_core::error::AppError;
use sqlx::{Postgres, Transaction};

/// Format a number for the given year and sequence value. Sequences past
/// 9999 widen naturally; uniqueness comes from the counter, not the padding.
pub fn format_invoice_number(year: i32, seq: i64) -> String {
    format!("INV-{}-{:04}", year, seq)
}

/// Parse an invoice number back into (year, sequence). Used by tests and
/// diagnostics; allocation never round-trips through parsing.
pub fn parse_invoice_number(number: &str) -> Option<(i32, i64)> {
    let rest = number.strip_prefix("INV-")?;
    let (year, seq) = rest.split_once('-')?;
    if seq.len() < 4 {
        return None;
    }
    Some((year.parse().ok()?, seq.parse().ok()?))
}

/// Allocate the next invoice number for `year` on an open transaction.
///
/// The upsert takes a row-level lock on the year's counter, so the
/// read-modify-write is one atomic unit. The number only becomes visible if
/// the surrounding invoice transaction commits; a rollback leaves a gap in
/// the sequence but never a duplicate.
pub async fn allocate_invoice_number(
    tx: &mut Transaction<'_, Postgres>,
    year: i32,
) -> Result<String, AppError> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoice_sequences (year, last_seq)
        VALUES ($1, 1)
        ON CONFLICT (year) DO UPDATE SET last_seq = invoice_sequences.last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(year)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to allocate invoice number: {}", e))
    })?;

    Ok(format_invoice_number(year, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded_to_four_digits() {
        assert_eq!(format_invoice_number(2025, 1), "INV-2025-0001");
        assert_eq!(format_invoice_number(2025, 42), "INV-2025-0042");
        assert_eq!(format_invoice_number(2026, 9999), "INV-2026-9999");
    }

    #[test]
    fn sequences_past_9999_widen() {
        assert_eq!(format_invoice_number(2025, 10000), "INV-2025-10000");
    }

    #[test]
    fn parse_round_trips_format() {
        assert_eq!(parse_invoice_number("INV-2025-0007"), Some((2025, 7)));
        assert_eq!(parse_invoice_number("INV-2025-12345"), Some((2025, 12345)));
    }

    #[test]
    fn parse_rejects_malformed_numbers() {
        assert_eq!(parse_invoice_number("INV-2025"), None);
        assert_eq!(parse_invoice_number("RCP-2025-0001"), None);
        assert_eq!(parse_invoice_number("INV-2025-1"), None);
        assert_eq!(parse_invoice_number("INV-20xx-0001"), None);
    }
}
