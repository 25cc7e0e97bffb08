//! crm-service: invoice creation, persistence and retrieval for the CRM.

pub mod config;
pub mod handlers;
pub mod invoicing;
pub mod models;
pub mod services;
pub mod startup;
