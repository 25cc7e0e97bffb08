//! HTTP handlers for crm-service.

pub mod health;
pub mod invoices;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{calculate_line, create_invoice, get_invoice, list_invoices};
