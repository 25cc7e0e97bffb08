//! Storage seam for invoices and the customer records they are built from.
//!
//! `InvoiceStore` hands out `InvoiceTransaction`s; a transaction that is
//! dropped without `commit` must leave no trace in the store.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Address, CreateInvoice, CreateLineItem, Customer, Invoice, LineItem};

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("transaction already closed")]
    TransactionClosed,

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

/// Write-side unit of work covering one invoice header and its items.
#[async_trait]
pub trait InvoiceTransaction: Send {
    /// Highest invoice identifier visible to this transaction.
    async fn last_invoice_id(&mut self) -> Result<Option<String>, StoreError>;

    async fn insert_invoice(
        &mut self,
        invoice_id: &str,
        invoice: &CreateInvoice,
    ) -> Result<(), StoreError>;

    async fn insert_line_item(
        &mut self,
        invoice_id: &str,
        position: i32,
        item: &CreateLineItem,
    ) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Invoice persistence.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InvoiceTransaction>, StoreError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StoreError>;

    /// Items of an invoice in the order they were inserted.
    async fn get_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>, StoreError>;

    /// Invoice headers ordered by identifier.
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Customer lookups owned by the wider CRM.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, customer_id: i32) -> Result<Option<Customer>, StoreError>;

    async fn find_address(&self, customer_id: i32) -> Result<Option<Address>, StoreError>;
}
