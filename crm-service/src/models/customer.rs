//! Customer header and address records, read from the CRM tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Customer fields copied onto an invoice at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    /// Display name used as the invoice's default customer name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Postal address of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub customer_id: i32,
    pub unit_number: String,
    pub street_number: String,
    pub street_name: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
}
