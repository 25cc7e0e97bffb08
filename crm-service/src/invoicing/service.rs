//! Invoice operations exposed to the request boundary.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::builder::{InvoiceBuilder, InvoiceOverrides, DEFAULT_PAYMENT_TERMS_DAYS};
use super::coordinator::InvoiceCoordinator;
use super::error::{InvoiceError, LineField};
use super::line_items::{calculate_line, validate_line_items, LineTotals, RawLineItems};
use super::reader::InvoiceReader;
use crate::models::{Invoice, PaymentStatus};
use crate::services::metrics::ERRORS_TOTAL;
use crate::services::{CustomerDirectory, InvoiceStore};

/// Submitted invoice form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(flatten)]
    pub overrides: InvoiceOverrides,
    #[serde(flatten)]
    pub line_items: RawLineItems,
}

/// Single line to price without storing anything.
#[derive(Debug, Clone, Deserialize)]
pub struct CalculateLineRequest {
    pub quantity: String,
    #[serde(alias = "unitPrice")]
    pub unit_price: String,
}

#[derive(Debug, Clone, Copy)]
pub struct InvoiceSettings {
    pub payment_terms_days: u32,
    /// Whole-operation attempts when the identifier collides with a
    /// concurrent writer.
    pub create_attempts: u32,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            create_attempts: 3,
        }
    }
}

#[derive(Clone)]
pub struct InvoiceService {
    customers: Arc<dyn CustomerDirectory>,
    builder: InvoiceBuilder,
    coordinator: InvoiceCoordinator,
    reader: InvoiceReader,
    create_attempts: u32,
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        customers: Arc<dyn CustomerDirectory>,
        settings: InvoiceSettings,
    ) -> Self {
        Self {
            builder: InvoiceBuilder::new(settings.payment_terms_days),
            coordinator: InvoiceCoordinator::new(store.clone()),
            reader: InvoiceReader::new(store, customers.clone()),
            customers,
            create_attempts: settings.create_attempts.max(1),
        }
    }

    /// Validate, build and persist an invoice. Returns the new identifier.
    ///
    /// Input is fully validated before storage is touched.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<String, InvoiceError> {
        let result = self.try_create_invoice(request).await;
        if let Err(e) = &result {
            ERRORS_TOTAL.with_label_values(&[e.error_type()]).inc();
        }
        result
    }

    async fn try_create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<String, InvoiceError> {
        let customer_id: i32 = request
            .customer_id
            .trim()
            .parse()
            .map_err(|_| InvoiceError::InvalidCustomerId(request.customer_id.clone()))?;
        let payment_status = PaymentStatus::parse_submitted(request.payment_status.as_deref())?;
        let line_items = validate_line_items(&request.line_items)?;
        let today = Utc::now().date_naive();
        let due_date = self
            .builder
            .due_date(request.overrides.due_date.as_deref(), today)?;

        let customer = self.customers.find_customer(customer_id).await?;
        let invoice = self.builder.build(
            customer_id,
            customer,
            &request.overrides,
            payment_status,
            line_items,
            today,
            due_date,
        )?;

        let mut attempt = 1;
        loop {
            match self.coordinator.persist(&invoice).await {
                Ok(invoice_id) => {
                    info!(invoice_id = %invoice_id, attempt, "Invoice created");
                    return Ok(invoice_id);
                }
                Err(e) if e.is_conflict() && attempt < self.create_attempts => {
                    warn!(error = %e, attempt, "Invoice identifier conflict; retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, InvoiceError> {
        self.reader.get_invoice(invoice_id).await
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, InvoiceError> {
        self.reader.list_invoices().await
    }

    /// Price a single line with the same rules used when storing invoices.
    pub fn calculate_line(&self, request: &CalculateLineRequest) -> Result<LineTotals, InvoiceError> {
        let quantity = match request.quantity.trim().parse::<i32>() {
            Ok(quantity) if quantity >= 0 => quantity,
            _ => return Err(InvoiceError::InvalidQuantity { row: 1 }),
        };
        let unit_price = match Decimal::from_str(request.unit_price.trim()) {
            Ok(price) if !price.is_sign_negative() => price,
            _ => {
                return Err(InvoiceError::InvalidNumeric {
                    field: LineField::UnitPrice,
                    row: 1,
                })
            }
        };
        calculate_line(quantity, unit_price).ok_or(InvoiceError::AmountOutOfRange { row: 1 })
    }
}
