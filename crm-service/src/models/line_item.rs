//! Line item model for crm-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted line item, owned by an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub invoice_id: String,
    /// Zero-based submission order within the invoice.
    pub position: i32,
    pub item: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Validated line item that has not been assigned to an invoice yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLineItem {
    pub item: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl CreateLineItem {
    /// Attach the item to a committed invoice header.
    pub fn assign(&self, invoice_id: &str, position: i32) -> LineItem {
        LineItem {
            invoice_id: invoice_id.to_string(),
            position,
            item: self.item.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }
}

impl LineItem {
    /// Value of the item without its invoice assignment.
    pub fn to_create(&self) -> CreateLineItem {
        CreateLineItem {
            item: self.item.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }
}
