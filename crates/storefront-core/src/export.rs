//! # Purchase Export Contract
//!
//! The downstream reporting consumer receives finalized purchase lines and
//! renders them as delimited text. Only the data contract lives here; how
//! the file travels (download endpoint, batch drop) is the caller's concern.
//!
//! ## Format
//! Tab-delimited rows with a header line, prefixed with a UTF-8 BOM so
//! spreadsheet applications detect the encoding instead of mangling
//! multi-byte product names. Optional tax columns are left blank when the
//! source order predates tax capture.
//!
//! Date-range requests must be validated with [`validate_report_range`]
//! BEFORE querying: inverted ranges and spans over 18 months are a
//! boundary-contract violation, not something to silently truncate.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::error::{ValidationError, ValidationResult};
use crate::money::{Money, TaxRate};

/// Longest report span accepted, in months.
pub const MAX_REPORT_SPAN_MONTHS: u32 = 18;

/// UTF-8 byte order mark emitted as the encoding marker.
const UTF8_BOM: &str = "\u{feff}";

// =============================================================================
// Purchase Line
// =============================================================================

/// One finalized order line, flattened for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    /// Set once fulfilment confirms delivery.
    pub delivery_date: Option<NaiveDate>,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Line amount before tax.
    pub amount: Money,
    pub is_consignment: bool,
    /// Tax columns are optional: legacy rows may predate tax capture.
    pub tax_rate: Option<TaxRate>,
    pub tax_amount: Option<Money>,
    pub amount_with_tax: Option<Money>,
}

// =============================================================================
// Rendering
// =============================================================================

/// Renders purchase lines as tab-delimited text with a BOM marker.
///
/// Field order matches the header row; consumers key on position, so the
/// column set is append-only.
pub fn render_purchase_lines(lines: &[PurchaseLine]) -> String {
    let mut out = String::with_capacity(64 + lines.len() * 96);
    out.push_str(UTF8_BOM);
    out.push_str(
        "order_number\torder_date\tdelivery_date\tproduct_code\tproduct_name\t\
         quantity\tunit_price\tamount\tconsignment\ttax_rate\ttax_amount\tamount_with_tax\r\n",
    );

    for line in lines {
        let delivery = line
            .delivery_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let tax_rate = line
            .tax_rate
            .map(|r| format!("{:.2}", r.percentage()))
            .unwrap_or_default();
        let tax_amount = line.tax_amount.map(|m| m.to_string()).unwrap_or_default();
        let amount_with_tax = line
            .amount_with_tax
            .map(|m| m.to_string())
            .unwrap_or_default();

        // write! to a String cannot fail
        let _ = write!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\r\n",
            line.order_number,
            line.order_date.format("%Y-%m-%d"),
            delivery,
            line.product_code,
            sanitize_field(&line.product_name),
            line.quantity,
            line.unit_price,
            line.amount,
            if line.is_consignment { "1" } else { "0" },
            tax_rate,
            tax_amount,
            amount_with_tax,
        );
    }

    out
}

/// Strips delimiter and line-break characters from free-text fields.
fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\t' || c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

// =============================================================================
// Range Validation
// =============================================================================

/// Validates an export date range.
///
/// ## Rules
/// - `start <= end`
/// - span no longer than [`MAX_REPORT_SPAN_MONTHS`]
pub fn validate_report_range(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidDateRange {
            reason: format!("start {} is after end {}", start, end),
        });
    }

    let limit = start
        .checked_add_months(Months::new(MAX_REPORT_SPAN_MONTHS))
        .ok_or_else(|| ValidationError::InvalidDateRange {
            reason: "start date out of range".to_string(),
        })?;

    if end > limit {
        return Err(ValidationError::InvalidDateRange {
            reason: format!("span exceeds {} months", MAX_REPORT_SPAN_MONTHS),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> PurchaseLine {
        PurchaseLine {
            order_number: "RETAIL-1700000000000-123456".to_string(),
            order_date: "2026-01-15T09:30:00Z".parse().unwrap(),
            delivery_date: NaiveDate::from_ymd_opt(2026, 1, 20),
            product_code: "WIDGET-01".to_string(),
            product_name: "Widget\tDeluxe".to_string(),
            quantity: 10,
            unit_price: Money::from_cents(1000),
            amount: Money::from_cents(10_000),
            is_consignment: true,
            tax_rate: Some(TaxRate::from_bps(1000)),
            tax_amount: Some(Money::from_cents(1000)),
            amount_with_tax: Some(Money::from_cents(11_000)),
        }
    }

    #[test]
    fn test_render_starts_with_bom_and_header() {
        let out = render_purchase_lines(&[line()]);
        assert!(out.starts_with('\u{feff}'));
        assert!(out.contains("order_number\torder_date"));
    }

    #[test]
    fn test_render_row_fields() {
        let out = render_purchase_lines(&[line()]);
        let row = out.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields.len(), 12);
        assert_eq!(fields[0], "RETAIL-1700000000000-123456");
        assert_eq!(fields[1], "2026-01-15");
        assert_eq!(fields[2], "2026-01-20");
        assert_eq!(fields[5], "10");
        assert_eq!(fields[6], "10.00");
        assert_eq!(fields[8], "1");
        assert_eq!(fields[9], "10.00"); // percent
        assert_eq!(fields[11], "110.00");
    }

    #[test]
    fn test_render_sanitizes_embedded_delimiters() {
        let out = render_purchase_lines(&[line()]);
        let row = out.lines().nth(1).unwrap();
        assert!(row.split('\t').any(|f| f == "Widget Deluxe"));
    }

    #[test]
    fn test_render_blank_optional_columns() {
        let mut l = line();
        l.delivery_date = None;
        l.tax_rate = None;
        l.tax_amount = None;
        l.amount_with_tax = None;
        let out = render_purchase_lines(&[l]);
        let row = out.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields[2], "");
        assert_eq!(fields[9], "");
        assert_eq!(fields[11], "");
    }

    #[test]
    fn test_range_rejects_inverted() {
        let start = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(validate_report_range(start, end).is_err());
    }

    #[test]
    fn test_range_rejects_over_18_months() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // 2024-01-01 + 18 months = 2025-07-01, the last acceptable end date
        let at_limit = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(validate_report_range(start, at_limit).is_ok());

        let over = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        assert!(validate_report_range(start, over).is_err());
    }

    #[test]
    fn test_range_accepts_single_day() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert!(validate_report_range(day, day).is_ok());
    }
}
