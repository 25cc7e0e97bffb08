//! Invoice subsystem errors.

use service_core::error::AppError;
use std::fmt;
use thiserror::Error;
use tracing::error;

use crate::models::PaymentStatusError;
use crate::services::StoreError;

/// Submitted line item column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    Item,
    Quantity,
    UnitPrice,
    Subtotal,
    Tax,
    Total,
}

impl LineField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineField::Item => "item",
            LineField::Quantity => "quantity",
            LineField::UnitPrice => "unit price",
            LineField::Subtotal => "subtotal",
            LineField::Tax => "tax",
            LineField::Total => "total",
        }
    }
}

impl fmt::Display for LineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn row_note(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" for item {}", row),
        None => String::new(),
    }
}

fn rollback_note(rollback_error: &Option<StoreError>) -> String {
    match rollback_error {
        Some(err) => format!(" (rollback failed: {}; transaction state unknown)", err),
        None => String::new(),
    }
}

/// Errors raised while creating or reading invoices.
///
/// Row numbers in validation errors are one-based, matching what the user
/// sees on the form. `ItemInsertFailed::index` is the zero-based position.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("line item form values are missing or empty{}", row_note(.row))]
    MissingFields { row: Option<usize> },

    #[error("invalid quantity for item {row}")]
    InvalidQuantity { row: usize },

    #[error("invalid {field} for item {row}")]
    InvalidNumeric { field: LineField, row: usize },

    #[error("amount out of range for item {row}")]
    AmountOutOfRange { row: usize },

    #[error("invalid payment status: {0}")]
    InvalidPaymentStatus(#[from] PaymentStatusError),

    #[error("invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDueDate(String),

    #[error("invalid customer id '{0}'")]
    InvalidCustomerId(String),

    #[error("customer {0} not found")]
    CustomerNotFound(i32),

    #[error("invoice {0} not found")]
    InvoiceNotFound(String),

    #[error("invoice sequence state is corrupt: last identifier is '{0}'")]
    CorruptSequenceState(String),

    #[error("invoice sequence exhausted after {0}; the identifier format must be widened")]
    SequenceExhausted(String),

    /// A sequence error whose transaction then failed to roll back. When the
    /// rollback succeeds the sequence error is returned bare.
    #[error("{source} (rollback failed: {rollback_error}; transaction state unknown)")]
    SequenceRollbackFailed {
        #[source]
        source: Box<InvoiceError>,
        rollback_error: StoreError,
    },

    #[error("failed to begin invoice transaction: {0}")]
    BeginFailed(#[source] StoreError),

    #[error("failed to insert invoice header: {source}{}", rollback_note(.rollback_error))]
    InvoiceInsertFailed {
        #[source]
        source: StoreError,
        rollback_error: Option<StoreError>,
    },

    #[error("failed to insert line item {index}: {source}{}", rollback_note(.rollback_error))]
    ItemInsertFailed {
        index: usize,
        #[source]
        source: StoreError,
        rollback_error: Option<StoreError>,
    },

    #[error("failed to commit invoice transaction: {source}{}", rollback_note(.rollback_error))]
    CommitFailed {
        #[source]
        source: StoreError,
        rollback_error: Option<StoreError>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl InvoiceError {
    /// Malformed input; reported to the caller, never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InvoiceError::MissingFields { .. }
                | InvoiceError::InvalidQuantity { .. }
                | InvoiceError::InvalidNumeric { .. }
                | InvoiceError::AmountOutOfRange { .. }
                | InvoiceError::InvalidPaymentStatus(_)
                | InvoiceError::InvalidDueDate(_)
                | InvoiceError::InvalidCustomerId(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InvoiceError::CustomerNotFound(_) | InvoiceError::InvoiceNotFound(_)
        )
    }

    /// The header insert hit an existing identifier. Rerunning the whole
    /// creation derives a fresh identifier.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            InvoiceError::InvoiceInsertFailed { source, rollback_error: None }
                if source.is_unique_violation()
        )
    }

    /// A rollback was attempted and failed, so the transaction's final state
    /// is unknown.
    pub fn rollback_failed(&self) -> bool {
        matches!(
            self,
            InvoiceError::InvoiceInsertFailed {
                rollback_error: Some(_),
                ..
            } | InvoiceError::ItemInsertFailed {
                rollback_error: Some(_),
                ..
            } | InvoiceError::CommitFailed {
                rollback_error: Some(_),
                ..
            } | InvoiceError::SequenceRollbackFailed { .. }
        )
    }

    /// Label for the errors metric.
    pub fn error_type(&self) -> &'static str {
        match self {
            e if e.is_validation() => "validation",
            e if e.is_not_found() => "not_found",
            e if e.rollback_failed() => "rollback_failed",
            InvoiceError::CorruptSequenceState(_) => "corrupt_sequence",
            InvoiceError::SequenceExhausted(_) => "sequence_exhausted",
            InvoiceError::BeginFailed(_) => "begin_failed",
            InvoiceError::InvoiceInsertFailed { .. } => "invoice_insert_failed",
            InvoiceError::ItemInsertFailed { .. } => "item_insert_failed",
            InvoiceError::CommitFailed { .. } => "commit_failed",
            _ => "storage",
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        if err.is_validation() {
            AppError::BadRequest(anyhow::anyhow!(err.to_string()))
        } else if err.is_not_found() {
            AppError::NotFound(anyhow::anyhow!(err.to_string()))
        } else if err.is_conflict() {
            AppError::Conflict(anyhow::anyhow!(
                "invoice identifier was taken by a concurrent request, retry"
            ))
        } else if err.rollback_failed() {
            error!(error = %err, "Invoice transaction left in unknown state");
            AppError::InternalError(anyhow::Error::new(err))
        } else {
            match err {
                InvoiceError::SequenceExhausted(_) | InvoiceError::CorruptSequenceState(_) => {
                    AppError::InternalError(anyhow::Error::new(err))
                }
                other => AppError::DatabaseError(anyhow::Error::new(other)),
            }
        }
    }
}
