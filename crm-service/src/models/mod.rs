//! Domain models for crm-service.

mod customer;
mod invoice;
mod line_item;
mod payment_status;

pub use customer::{Address, Customer};
pub use invoice::{CreateInvoice, Invoice};
pub use line_item::{CreateLineItem, LineItem};
pub use payment_status::{PaymentStatus, PaymentStatusError};
