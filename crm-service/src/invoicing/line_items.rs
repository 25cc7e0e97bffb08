//! Line item validation and the line total calculation.
//!
//! Submitted forms carry one array per column. Rows are validated in
//! submission order and their money columns are recomputed from quantity and
//! unit price; the client's subtotal, tax and total are only cross-checked.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{InvoiceError, LineField};
use crate::models::CreateLineItem;

/// Flat tax applied to every line: 10%.
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Raw parallel arrays as submitted, one entry per row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLineItems {
    #[serde(default)]
    pub item: Vec<String>,
    #[serde(default)]
    pub quantity: Vec<String>,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: Vec<String>,
    #[serde(default)]
    pub subtotal: Vec<String>,
    #[serde(default)]
    pub tax: Vec<String>,
    #[serde(default)]
    pub total: Vec<String>,
}

impl RawLineItems {
    /// Number of rows, or `None` when the columns disagree.
    pub fn row_count(&self) -> Option<usize> {
        let rows = self.item.len();
        let columns = [
            self.quantity.len(),
            self.unit_price.len(),
            self.subtotal.len(),
            self.tax.len(),
            self.total.len(),
        ];
        columns.iter().all(|len| *len == rows).then_some(rows)
    }

    fn row(&self, index: usize) -> [(LineField, &str); 6] {
        [
            (LineField::Item, self.item[index].trim()),
            (LineField::Quantity, self.quantity[index].trim()),
            (LineField::UnitPrice, self.unit_price[index].trim()),
            (LineField::Subtotal, self.subtotal[index].trim()),
            (LineField::Tax, self.tax[index].trim()),
            (LineField::Total, self.total[index].trim()),
        ]
    }
}

/// Money columns of one line, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// subtotal = quantity x unit price, tax = subtotal x 10%, total = subtotal + tax.
///
/// `None` when an amount exceeds the decimal range.
pub fn calculate_line(quantity: i32, unit_price: Decimal) -> Option<LineTotals> {
    let subtotal = round_cents(Decimal::from(quantity).checked_mul(unit_price)?);
    let tax = round_cents(subtotal.checked_mul(TAX_RATE)?);
    Some(LineTotals {
        subtotal,
        tax,
        total: subtotal.checked_add(tax)?,
    })
}

fn parse_quantity(value: &str, row: usize) -> Result<i32, InvoiceError> {
    match value.parse::<i32>() {
        Ok(quantity) if quantity >= 0 => Ok(quantity),
        _ => Err(InvoiceError::InvalidQuantity { row }),
    }
}

fn parse_amount(value: &str, field: LineField, row: usize) -> Result<Decimal, InvoiceError> {
    match Decimal::from_str(value) {
        Ok(amount) if !amount.is_sign_negative() => Ok(amount),
        _ => Err(InvoiceError::InvalidNumeric { field, row }),
    }
}

/// Turn the submitted arrays into line items, preserving row order.
///
/// Error rows are one-based. The invoice total across all rows must stay
/// within the decimal range.
pub fn validate_line_items(raw: &RawLineItems) -> Result<Vec<CreateLineItem>, InvoiceError> {
    let rows = match raw.row_count() {
        Some(rows) if rows > 0 => rows,
        _ => return Err(InvoiceError::MissingFields { row: None }),
    };

    let mut items = Vec::with_capacity(rows);
    let mut invoice_total = Decimal::ZERO;
    for index in 0..rows {
        let row = index + 1;
        let fields = raw.row(index);
        if fields.iter().any(|(_, value)| value.is_empty()) {
            return Err(InvoiceError::MissingFields { row: Some(row) });
        }
        let [(_, item), (_, quantity), (_, unit_price), (_, subtotal), (_, tax), (_, total)] =
            fields;

        let quantity = parse_quantity(quantity, row)?;
        let unit_price = parse_amount(unit_price, LineField::UnitPrice, row)?;
        let submitted = LineTotals {
            subtotal: parse_amount(subtotal, LineField::Subtotal, row)?,
            tax: parse_amount(tax, LineField::Tax, row)?,
            total: parse_amount(total, LineField::Total, row)?,
        };

        let computed = calculate_line(quantity, unit_price)
            .ok_or(InvoiceError::AmountOutOfRange { row })?;
        invoice_total = invoice_total
            .checked_add(computed.total)
            .ok_or(InvoiceError::AmountOutOfRange { row })?;
        if submitted != computed {
            debug!(
                row,
                submitted_total = %submitted.total,
                computed_total = %computed.total,
                "Submitted line totals differ from computed values"
            );
        }

        items.push(CreateLineItem {
            item: item.to_string(),
            quantity,
            unit_price,
            subtotal: computed.subtotal,
            tax: computed.tax,
            total: computed.total,
        });
    }

    Ok(items)
}
