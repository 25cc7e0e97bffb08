//! PostgreSQL storage for crm-service.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::models::{Address, CreateInvoice, CreateLineItem, Customer, Invoice, LineItem};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{CustomerDirectory, InvoiceStore, InvoiceTransaction, StoreError};

/// Advisory lock key serializing invoice identifier derivation.
const INVOICE_SEQUENCE_LOCK: i64 = 0x0C12_1A0C;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "crm-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Open PostgreSQL transaction. Dropping it without `commit` rolls back.
pub struct PgInvoiceTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgInvoiceTransaction {
    fn open(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl InvoiceTransaction for PgInvoiceTransaction {
    async fn last_invoice_id(&mut self) -> Result<Option<String>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["last_invoice_id"])
            .start_timer();

        let tx = self.open()?;
        let last = sqlx::query_scalar::<_, String>(
            "SELECT invoice_id FROM invoices ORDER BY invoice_id DESC LIMIT 1",
        )
        .fetch_optional(&mut **tx)
        .await?;

        timer.observe_duration();

        Ok(last)
    }

    async fn insert_invoice(
        &mut self,
        invoice_id: &str,
        invoice: &CreateInvoice,
    ) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let tx = self.open()?;
        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, invoice_date, due_date, customer_id,
                customer_name, company_name, customer_phone, customer_email, payment_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invoice_id)
        .bind(invoice_id)
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(&invoice.company_name)
        .bind(&invoice.customer_phone)
        .bind(&invoice.customer_email)
        .bind(invoice.payment_status.code())
        .execute(&mut **tx)
        .await?;

        timer.observe_duration();

        debug!(invoice_id = %invoice_id, "Invoice header inserted");

        Ok(())
    }

    async fn insert_line_item(
        &mut self,
        invoice_id: &str,
        position: i32,
        item: &CreateLineItem,
    ) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_line_item"])
            .start_timer();

        let tx = self.open()?;
        sqlx::query(
            r#"
            INSERT INTO item_lists (invoice_id, position, item, quantity, unit_price, subtotal, tax, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invoice_id)
        .bind(position)
        .bind(&item.item)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.subtotal)
        .bind(item.tax)
        .bind(item.total)
        .execute(&mut **tx)
        .await?;

        timer.observe_duration();

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        // A failed commit drops the transaction, which queues a rollback on
        // the connection before it returns to the pool.
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn InvoiceTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(INVOICE_SEQUENCE_LOCK)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgInvoiceTransaction { tx: Some(tx) }))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, invoice_date, due_date, customer_id, customer_name,
                company_name, customer_phone, customer_email, payment_status, created_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn get_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT invoice_id, position, item, quantity, unit_price, subtotal, tax, total
            FROM item_lists
            WHERE invoice_id = $1
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(items)
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, invoice_date, due_date, customer_id, customer_name,
                company_name, customer_phone, customer_email, payment_status, created_utc
            FROM invoices
            ORDER BY invoice_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for Database {
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn find_customer(&self, customer_id: i32) -> Result<Option<Customer>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, first_name, last_name, company_name, email, phone
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn find_address(&self, customer_id: i32) -> Result<Option<Address>, StoreError> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            SELECT customer_id, unit_number, street_number, street_name, city, state, postcode
            FROM addresses
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }
}
