//! Invoice model for crm-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Address, CreateLineItem, LineItem, PaymentStatus};

/// Invoice aggregate: header row plus its line items.
///
/// Customer fields are denormalized at creation time and do not follow later
/// edits of the customer record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub customer_id: i32,
    pub customer_name: String,
    pub company_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    #[sqlx(try_from = "i16")]
    pub payment_status: PaymentStatus,
    pub created_utc: DateTime<Utc>,
    #[sqlx(skip)]
    pub customer_address: Option<Address>,
    #[sqlx(skip)]
    pub line_items: Vec<LineItem>,
}

/// Sum that yields `None` instead of panicking past the decimal range.
fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

impl Invoice {
    pub fn subtotal(&self) -> Option<Decimal> {
        checked_sum(self.line_items.iter().map(|item| item.subtotal))
    }

    pub fn tax_total(&self) -> Option<Decimal> {
        checked_sum(self.line_items.iter().map(|item| item.tax))
    }

    pub fn total(&self) -> Option<Decimal> {
        checked_sum(self.line_items.iter().map(|item| item.total))
    }
}

/// Invoice ready for persistence. The identifier is assigned inside the
/// storage transaction, never before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoice {
    pub customer_id: i32,
    pub customer_name: String,
    pub company_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_status: PaymentStatus,
    pub line_items: Vec<CreateLineItem>,
}

impl CreateInvoice {
    /// Header as it will read back once stored under `invoice_id`.
    pub fn to_invoice(&self, invoice_id: &str, created_utc: DateTime<Utc>) -> Invoice {
        Invoice {
            invoice_id: invoice_id.to_string(),
            invoice_number: invoice_id.to_string(),
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
            company_name: self.company_name.clone(),
            customer_phone: self.customer_phone.clone(),
            customer_email: self.customer_email.clone(),
            payment_status: self.payment_status,
            created_utc,
            customer_address: None,
            line_items: Vec::new(),
        }
    }

    pub fn total(&self) -> Option<Decimal> {
        checked_sum(self.line_items.iter().map(|item| item.total))
    }
}
