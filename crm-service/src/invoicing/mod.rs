//! Invoice creation and retrieval.
//!
//! A create request flows through the line item validator, the aggregate
//! builder and the transaction coordinator (which derives the identifier
//! inside the storage transaction). The reader reloads committed invoices.

pub mod builder;
pub mod coordinator;
pub mod error;
pub mod line_items;
pub mod reader;
pub mod sequence;
pub mod service;

pub use builder::{InvoiceBuilder, InvoiceOverrides};
pub use coordinator::{InvoiceCoordinator, TxState, UnitOfWork};
pub use error::{InvoiceError, LineField};
pub use line_items::{calculate_line, validate_line_items, LineTotals, RawLineItems, TAX_RATE};
pub use reader::InvoiceReader;
pub use sequence::next_invoice_id;
pub use service::{CalculateLineRequest, CreateInvoiceRequest, InvoiceService, InvoiceSettings};
