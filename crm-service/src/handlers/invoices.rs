//! Invoice endpoints. Request bodies carry the submitted form values as
//! strings; all parsing and validation happens in the invoicing layer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;

use crate::invoicing::{CalculateLineRequest, CreateInvoiceRequest, LineTotals};
use crate::models::{Invoice, PaymentStatus};
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct CreateInvoiceResponse {
    pub invoice_id: String,
}

/// Header fields shown in invoice listings.
#[derive(Debug, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub customer_id: i32,
    pub customer_name: String,
    pub payment_status: PaymentStatus,
}

impl From<Invoice> for InvoiceSummary {
    fn from(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number,
            invoice_date: invoice.invoice_date,
            due_date: invoice.due_date,
            customer_id: invoice.customer_id,
            customer_name: invoice.customer_name,
            payment_status: invoice.payment_status,
        }
    }
}

/// Full aggregate with its totals.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl TryFrom<Invoice> for InvoiceResponse {
    type Error = AppError;

    fn try_from(invoice: Invoice) -> Result<Self, Self::Error> {
        let out_of_range = || {
            AppError::InternalError(anyhow::anyhow!(
                "totals of invoice {} exceed the decimal range",
                invoice.invoice_id
            ))
        };
        let subtotal = invoice.subtotal().ok_or_else(out_of_range)?;
        let tax = invoice.tax_total().ok_or_else(out_of_range)?;
        let total = invoice.total().ok_or_else(out_of_range)?;
        Ok(Self {
            invoice,
            subtotal,
            tax,
            total,
        })
    }
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<CreateInvoiceResponse>), AppError> {
    let invoice_id = state.invoices.create_invoice(&request).await?;
    Ok((StatusCode::CREATED, Json(CreateInvoiceResponse { invoice_id })))
}

pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let invoices = state.invoices.list_invoices().await?;
    Ok(Json(invoices.into_iter().map(InvoiceSummary::from).collect()))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state.invoices.get_invoice(&invoice_id).await?;
    Ok(Json(InvoiceResponse::try_from(invoice)?))
}

pub async fn calculate_line(
    State(state): State<AppState>,
    Json(request): Json<CalculateLineRequest>,
) -> Result<Json<LineTotals>, AppError> {
    Ok(Json(state.invoices.calculate_line(&request)?))
}
