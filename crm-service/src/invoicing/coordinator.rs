//! Atomic persistence of an invoice header and its line items.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use tracing::{error, info, instrument, warn};

use super::error::InvoiceError;
use super::sequence::next_invoice_id;
use crate::models::CreateInvoice;
use crate::services::metrics::{ERRORS_TOTAL, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL};
use crate::services::{InvoiceStore, InvoiceTransaction, StoreError};

/// Lifecycle of a unit of work. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// Scoped storage transaction.
///
/// Every early return drops the guard; if it is still `Open` at that point
/// the underlying transaction is dropped uncommitted and the store rolls it
/// back.
pub struct UnitOfWork {
    tx: Box<dyn InvoiceTransaction>,
    state: TxState,
}

impl UnitOfWork {
    pub async fn begin(store: &dyn InvoiceStore) -> Result<Self, InvoiceError> {
        let tx = store.begin().await.map_err(InvoiceError::BeginFailed)?;
        Ok(Self {
            tx,
            state: TxState::Open,
        })
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn tx(&mut self) -> &mut dyn InvoiceTransaction {
        self.tx.as_mut()
    }

    pub async fn commit(&mut self) -> Result<(), StoreError> {
        if self.state != TxState::Open {
            return Err(StoreError::TransactionClosed);
        }
        self.tx.commit().await?;
        self.state = TxState::Committed;
        Ok(())
    }

    /// Roll back an open transaction. The unit of work is terminal afterwards
    /// even when the rollback itself fails.
    pub async fn rollback(&mut self) -> Result<(), StoreError> {
        if self.state != TxState::Open {
            return Ok(());
        }
        self.state = TxState::RolledBack;
        INVOICES_TOTAL.with_label_values(&["rolled_back"]).inc();

        match self.tx.rollback().await {
            Ok(()) => {
                warn!("Invoice transaction rolled back");
                Ok(())
            }
            Err(e) => {
                ERRORS_TOTAL.with_label_values(&["rollback_failed"]).inc();
                error!(error = %e, "Invoice transaction rollback failed; final state unknown");
                Err(e)
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == TxState::Open {
            INVOICES_TOTAL.with_label_values(&["rolled_back"]).inc();
            warn!("Invoice transaction dropped before completion; rolling back");
        }
    }
}

/// Writes invoices inside a single storage transaction. Never retries.
#[derive(Clone)]
pub struct InvoiceCoordinator {
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceCoordinator {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    /// Assign the next identifier and persist header plus items, returning
    /// the identifier once committed.
    #[instrument(
        skip(self, invoice),
        fields(
            customer_id = invoice.customer_id,
            item_count = invoice.line_items.len(),
            invoice_id = tracing::field::Empty
        )
    )]
    pub async fn persist(&self, invoice: &CreateInvoice) -> Result<String, InvoiceError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;

        let last = match uow.tx().last_invoice_id().await {
            Ok(last) => last,
            Err(source) => {
                let rollback_error = uow.rollback().await.err();
                return Err(InvoiceError::InvoiceInsertFailed {
                    source,
                    rollback_error,
                });
            }
        };

        let invoice_id = match next_invoice_id(last.as_deref()) {
            Ok(invoice_id) => invoice_id,
            Err(err) => {
                error!(error = %err, "Cannot derive next invoice identifier");
                return Err(match uow.rollback().await {
                    Ok(()) => err,
                    Err(rollback_error) => InvoiceError::SequenceRollbackFailed {
                        source: Box::new(err),
                        rollback_error,
                    },
                });
            }
        };
        tracing::Span::current().record("invoice_id", invoice_id.as_str());

        if let Err(source) = uow.tx().insert_invoice(&invoice_id, invoice).await {
            let rollback_error = uow.rollback().await.err();
            return Err(InvoiceError::InvoiceInsertFailed {
                source,
                rollback_error,
            });
        }

        for (index, item) in invoice.line_items.iter().enumerate() {
            let position = index as i32;
            if let Err(source) = uow.tx().insert_line_item(&invoice_id, position, item).await {
                let rollback_error = uow.rollback().await.err();
                return Err(InvoiceError::ItemInsertFailed {
                    index,
                    source,
                    rollback_error,
                });
            }
        }

        if let Err(source) = uow.commit().await {
            let rollback_error = uow.rollback().await.err();
            return Err(InvoiceError::CommitFailed {
                source,
                rollback_error,
            });
        }

        INVOICES_TOTAL.with_label_values(&["committed"]).inc();
        match invoice.total() {
            Some(total) => {
                INVOICE_AMOUNT_TOTAL.inc_by(total.to_f64().unwrap_or_default());
                info!(total = %total, "Invoice committed");
            }
            None => warn!("Invoice committed with a total past the decimal range"),
        }

        Ok(invoice_id)
    }
}
