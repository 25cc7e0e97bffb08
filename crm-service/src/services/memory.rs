//! In-memory storage with the same transactional contract as PostgreSQL.
//!
//! Intended for tests/dev. Writers are serialized by an async mutex held for
//! the whole transaction; staged rows become visible only on commit.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::models::{Address, CreateInvoice, CreateLineItem, Customer, Invoice, LineItem};
use crate::services::store::{CustomerDirectory, InvoiceStore, InvoiceTransaction, StoreError};

/// Failures to inject into subsequent operations. Stays armed until replaced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_begin: bool,
    pub fail_header_insert: bool,
    /// Fail inserting the line item at this zero-based position.
    pub fail_item_insert_at: Option<usize>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_address_lookup: bool,
    /// Number of `last_invoice_id` reads that report the identifier before
    /// the real last one, as a racing writer would observe.
    pub stale_reads: usize,
}

/// Transaction outcome counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    invoices: BTreeMap<String, Invoice>,
    items: HashMap<String, Vec<LineItem>>,
    customers: HashMap<i32, Customer>,
    addresses: HashMap<i32, Address>,
    faults: FaultPlan,
    stats: TransactionStats,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    writer: Arc<AsyncMutex<()>>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

/// In-memory invoice store and customer directory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_customer(&self, customer: Customer) {
        if let Ok(mut state) = self.shared.lock() {
            state.customers.insert(customer.customer_id, customer);
        }
    }

    pub fn insert_address(&self, address: Address) {
        if let Ok(mut state) = self.shared.lock() {
            state.addresses.insert(address.customer_id, address);
        }
    }

    /// Store an already-committed invoice, bypassing the transaction path.
    pub fn seed_invoice(&self, mut invoice: Invoice) {
        if let Ok(mut state) = self.shared.lock() {
            let items = std::mem::take(&mut invoice.line_items);
            invoice.customer_address = None;
            state.items.insert(invoice.invoice_id.clone(), items);
            state.invoices.insert(invoice.invoice_id.clone(), invoice);
        }
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        if let Ok(mut state) = self.shared.lock() {
            state.faults = faults;
        }
    }

    pub fn stats(&self) -> TransactionStats {
        self.shared
            .lock()
            .map(|state| state.stats)
            .unwrap_or_default()
    }

    pub fn invoice_count(&self) -> usize {
        self.shared
            .lock()
            .map(|state| state.invoices.len())
            .unwrap_or_default()
    }

    pub fn line_item_count(&self) -> usize {
        self.shared
            .lock()
            .map(|state| state.items.values().map(Vec::len).sum())
            .unwrap_or_default()
    }
}

/// Staged writes of one in-memory transaction.
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    _writer: OwnedMutexGuard<()>,
    header: Option<Invoice>,
    items: Vec<LineItem>,
    open: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed)
        }
    }

    fn discard(&mut self) {
        self.header = None;
        self.items.clear();
        self.open = false;
    }
}

#[async_trait]
impl InvoiceTransaction for MemoryTransaction {
    async fn last_invoice_id(&mut self) -> Result<Option<String>, StoreError> {
        self.ensure_open()?;
        let mut state = self.shared.lock()?;

        let mut ids = state.invoices.keys().rev();
        let last = ids.next().cloned();
        let previous = ids.next().cloned();

        if state.faults.stale_reads > 0 {
            state.faults.stale_reads -= 1;
            return Ok(previous);
        }

        Ok(last)
    }

    async fn insert_invoice(
        &mut self,
        invoice_id: &str,
        invoice: &CreateInvoice,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let state = self.shared.lock()?;

        if state.faults.fail_header_insert {
            return Err(StoreError::Unavailable(
                "injected invoice insert failure".to_string(),
            ));
        }
        if state.invoices.contains_key(invoice_id)
            || self.header.as_ref().is_some_and(|h| h.invoice_id == invoice_id)
        {
            return Err(StoreError::UniqueViolation(format!(
                "duplicate key value violates unique constraint \"invoices_pkey\": {}",
                invoice_id
            )));
        }
        drop(state);

        self.header = Some(invoice.to_invoice(invoice_id, Utc::now()));
        Ok(())
    }

    async fn insert_line_item(
        &mut self,
        invoice_id: &str,
        position: i32,
        item: &CreateLineItem,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let state = self.shared.lock()?;

        let fail_at = state.faults.fail_item_insert_at;
        if fail_at.is_some() && fail_at == usize::try_from(position).ok() {
            return Err(StoreError::Unavailable(format!(
                "injected line item insert failure at position {}",
                position
            )));
        }
        let has_header = state.invoices.contains_key(invoice_id)
            || self.header.as_ref().is_some_and(|h| h.invoice_id == invoice_id);
        if !has_header {
            return Err(StoreError::Unavailable(format!(
                "foreign key violation: invoice {} does not exist",
                invoice_id
            )));
        }
        drop(state);

        self.items.push(item.assign(invoice_id, position));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut state = self.shared.lock()?;

        if state.faults.fail_commit {
            return Err(StoreError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        if let Some(header) = self.header.take() {
            let items = std::mem::take(&mut self.items);
            state.items.insert(header.invoice_id.clone(), items);
            state.invoices.insert(header.invoice_id.clone(), header);
        }
        state.stats.committed += 1;
        drop(state);

        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Ok(());
        }
        self.discard();

        let mut state = self.shared.lock()?;
        state.stats.rolled_back += 1;
        if state.faults.fail_rollback {
            return Err(StoreError::Unavailable(
                "injected rollback failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.open {
            self.discard();
            if let Ok(mut state) = self.shared.lock() {
                state.stats.rolled_back += 1;
            }
            debug!("In-memory transaction dropped while open; staged writes discarded");
        }
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn InvoiceTransaction>, StoreError> {
        let fail_begin = self.shared.lock()?.faults.fail_begin;
        if fail_begin {
            return Err(StoreError::Unavailable(
                "injected begin failure".to_string(),
            ));
        }

        let writer = self.shared.writer.clone().lock_owned().await;
        self.shared.lock()?.stats.begun += 1;

        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            _writer: writer,
            header: None,
            items: Vec::new(),
            open: true,
        }))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.shared.lock()?.invoices.get(invoice_id).cloned())
    }

    async fn get_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>, StoreError> {
        let mut items = self
            .shared
            .lock()?
            .items
            .get(invoice_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self.shared.lock()?.invoices.values().cloned().collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.shared.lock().map(|_| ())
    }
}

#[async_trait]
impl CustomerDirectory for MemoryStore {
    async fn find_customer(&self, customer_id: i32) -> Result<Option<Customer>, StoreError> {
        Ok(self.shared.lock()?.customers.get(&customer_id).cloned())
    }

    async fn find_address(&self, customer_id: i32) -> Result<Option<Address>, StoreError> {
        let state = self.shared.lock()?;
        if state.faults.fail_address_lookup {
            return Err(StoreError::Unavailable(
                "injected address lookup failure".to_string(),
            ));
        }
        Ok(state.addresses.get(&customer_id).cloned())
    }
}
