//! Assembles a storable invoice from the customer record, the request's
//! overrides and the validated line items.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::InvoiceError;
use crate::models::{CreateInvoice, CreateLineItem, Customer, PaymentStatus};

pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Optional header values supplied with the request. Blank values are
/// treated as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceOverrides {
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub due_date: Option<String>,
}

fn pick(override_value: Option<&String>, default: String) -> String {
    match override_value.map(|v| v.trim()) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InvoiceBuilder {
    payment_terms_days: u32,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_TERMS_DAYS)
    }
}

impl InvoiceBuilder {
    pub fn new(payment_terms_days: u32) -> Self {
        Self { payment_terms_days }
    }

    /// Explicit due date, or `today` plus the payment terms.
    pub fn due_date(
        &self,
        requested: Option<&str>,
        today: NaiveDate,
    ) -> Result<NaiveDate, InvoiceError> {
        match requested.map(str::trim) {
            Some(value) if !value.is_empty() => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| InvoiceError::InvalidDueDate(value.to_string())),
            _ => today
                .checked_add_days(Days::new(u64::from(self.payment_terms_days)))
                .ok_or_else(|| {
                    InvoiceError::InvalidDueDate(format!(
                        "{} + {} days",
                        today, self.payment_terms_days
                    ))
                }),
        }
    }

    /// `customer` is the directory's answer for `customer_id`; `None` means
    /// the customer does not exist. `due_date` comes from [`Self::due_date`],
    /// resolved before the directory is consulted.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        customer_id: i32,
        customer: Option<Customer>,
        overrides: &InvoiceOverrides,
        payment_status: PaymentStatus,
        line_items: Vec<CreateLineItem>,
        today: NaiveDate,
        due_date: NaiveDate,
    ) -> Result<CreateInvoice, InvoiceError> {
        let customer = customer.ok_or(InvoiceError::CustomerNotFound(customer_id))?;
        let default_name = customer.full_name();

        Ok(CreateInvoice {
            customer_id,
            customer_name: pick(overrides.customer_name.as_ref(), default_name),
            company_name: pick(overrides.company_name.as_ref(), customer.company_name),
            customer_phone: pick(overrides.phone.as_ref(), customer.phone),
            customer_email: pick(overrides.email.as_ref(), customer.email),
            invoice_date: today,
            due_date,
            payment_status,
            line_items,
        })
    }
}
