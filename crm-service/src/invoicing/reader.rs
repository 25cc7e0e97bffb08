//! Reassembles invoice aggregates for display and export.

use std::sync::Arc;

use tracing::{instrument, warn};

use super::error::InvoiceError;
use crate::models::Invoice;
use crate::services::{CustomerDirectory, InvoiceStore};

#[derive(Clone)]
pub struct InvoiceReader {
    store: Arc<dyn InvoiceStore>,
    customers: Arc<dyn CustomerDirectory>,
}

impl InvoiceReader {
    pub fn new(store: Arc<dyn InvoiceStore>, customers: Arc<dyn CustomerDirectory>) -> Self {
        Self { store, customers }
    }

    /// Header, line items in persisted order, and the customer's address.
    ///
    /// Runs outside any transaction and may miss a commit that is still in
    /// flight. A failed address lookup leaves the address empty.
    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, InvoiceError> {
        let mut invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| InvoiceError::InvoiceNotFound(invoice_id.to_string()))?;

        invoice.line_items = self.store.get_line_items(invoice_id).await?;
        invoice.customer_address = match self.customers.find_address(invoice.customer_id).await {
            Ok(address) => address,
            Err(e) => {
                warn!(
                    customer_id = invoice.customer_id,
                    error = %e,
                    "Address lookup failed; returning invoice without address"
                );
                None
            }
        };

        Ok(invoice)
    }

    /// Invoice headers ordered by identifier, without line items.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, InvoiceError> {
        Ok(self.store.list_invoices().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, CreateInvoice, CreateLineItem, PaymentStatus};
    use crate::services::{FaultPlan, MemoryStore};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn seeded(store: &MemoryStore, invoice_id: &str, items: &[&str]) {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let draft = CreateInvoice {
            customer_id: 7,
            customer_name: "Ada Lovelace".to_string(),
            company_name: String::new(),
            customer_phone: String::new(),
            customer_email: "a@x.com".to_string(),
            invoice_date: date,
            due_date: date,
            payment_status: PaymentStatus::Paid,
            line_items: Vec::new(),
        };
        let mut invoice = draft.to_invoice(invoice_id, Utc::now());
        invoice.line_items = items
            .iter()
            .enumerate()
            .map(|(position, name)| {
                CreateLineItem {
                    item: name.to_string(),
                    quantity: 1,
                    unit_price: Decimal::ONE,
                    subtotal: Decimal::ONE,
                    tax: Decimal::new(10, 2),
                    total: Decimal::new(110, 2),
                }
                .assign(invoice_id, position as i32)
            })
            .collect();
        store.seed_invoice(invoice);
    }

    fn reader(store: &MemoryStore) -> InvoiceReader {
        InvoiceReader::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_reassembles_aggregate() {
        let store = MemoryStore::new();
        seeded(&store, "INV0001", &["Setup", "Hosting"]);
        store.insert_address(Address {
            customer_id: 7,
            city: "London".to_string(),
            ..Default::default()
        });

        let invoice = reader(&store).get_invoice("INV0001").await.unwrap();

        assert_eq!(invoice.payment_status, PaymentStatus::Paid);
        let names: Vec<_> = invoice.line_items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(names, vec!["Setup", "Hosting"]);
        assert_eq!(invoice.total(), Some(Decimal::new(220, 2)));
        assert_eq!(invoice.customer_address.unwrap().city, "London");
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let store = MemoryStore::new();
        let err = reader(&store).get_invoice("INV0404").await.unwrap_err();
        assert!(matches!(err, InvoiceError::InvoiceNotFound(ref id) if id == "INV0404"));
    }

    #[tokio::test]
    async fn test_address_failure_is_tolerated() {
        let store = MemoryStore::new();
        seeded(&store, "INV0001", &["Setup"]);
        store.set_faults(FaultPlan {
            fail_address_lookup: true,
            ..Default::default()
        });

        let invoice = reader(&store).get_invoice("INV0001").await.unwrap();
        assert!(invoice.customer_address.is_none());
        assert_eq!(invoice.line_items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_identifier() {
        let store = MemoryStore::new();
        seeded(&store, "INV0002", &[]);
        seeded(&store, "INV0001", &["Setup"]);

        let ids: Vec<_> = reader(&store)
            .list_invoices()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.invoice_id)
            .collect();
        assert_eq!(ids, vec!["INV0001", "INV0002"]);
    }
}
