#![allow(dead_code)]

use crm_service::config::{CrmConfig, DatabaseConfig, InvoicingConfig, StorageBackend};
use crm_service::models::Customer;
use crm_service::services::{Database, MemoryStore};
use crm_service::startup::{Application, Storage};
use service_core::config::Config as CoreConfig;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: MemoryStore,
    pub client: reqwest::Client,
}

fn test_config(storage: StorageBackend, database_url: String) -> CrmConfig {
    CrmConfig {
        common: CoreConfig { port: 0 },
        service_name: "crm-service-test".to_string(),
        log_level: "info".to_string(),
        otlp_endpoint: None,
        storage,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 5,
            min_connections: 1,
        },
        invoicing: InvoicingConfig {
            payment_terms_days: 30,
            create_attempts: 3,
        },
    }
}

fn ada() -> Customer {
    Customer {
        customer_id: 7,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        company_name: "Analytical Engines".to_string(),
        email: "a@x.com".to_string(),
        phone: "555-0100".to_string(),
    }
}

/// Start the application in the background and wait until `/health` answers.
async fn serve(config: CrmConfig, storage: Storage) -> (String, u16, reqwest::Client) {
    let app = Application::build_with_storage(config, storage)
        .await
        .expect("Failed to build test application");

    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for the server by polling the health endpoint
    let client = reqwest::Client::new();
    let health_url = format!("{}/health", address);
    for _ in 0..50 {
        if client.get(&health_url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    (address, port, client)
}

impl TestApp {
    /// Spawn the service on a random port over in-memory storage holding
    /// customer 7 (`a@x.com`).
    pub async fn spawn() -> Self {
        let store = MemoryStore::new();
        store.insert_customer(ada());

        let config = test_config(StorageBackend::Memory, String::new());
        let (address, port, client) = serve(config, Storage::Memory(store.clone())).await;

        TestApp {
            address,
            port,
            store,
            client,
        }
    }

    pub async fn post_invoice(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/invoices", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// The service over PostgreSQL at `TEST_DATABASE_URL`, migrated and emptied,
/// holding customer 7 with a London address.
pub struct PgTestApp {
    pub address: String,
    pub db: Database,
    pub client: reqwest::Client,
}

pub fn test_database_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run the PostgreSQL tests")
}

impl PgTestApp {
    pub async fn spawn() -> Self {
        let config = test_config(StorageBackend::Postgres, test_database_url());
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to migrate test database");

        sqlx::query("TRUNCATE item_lists, invoices, addresses, customers CASCADE")
            .execute(db.pool())
            .await
            .expect("Failed to clean test database");

        let customer = ada();
        sqlx::query(
            r#"
            INSERT INTO customers (customer_id, first_name, last_name, company_name, email, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.customer_id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(db.pool())
        .await
        .expect("Failed to insert test customer");
        sqlx::query("INSERT INTO addresses (customer_id, city) VALUES ($1, $2)")
            .bind(customer.customer_id)
            .bind("London")
            .execute(db.pool())
            .await
            .expect("Failed to insert test address");

        let (address, _, client) = serve(config, Storage::Postgres(db.clone())).await;

        PgTestApp {
            address,
            db,
            client,
        }
    }

    pub async fn post_invoice(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/invoices", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn invoice_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(self.db.pool())
            .await
            .expect("Failed to count invoices")
    }
}

/// One "Setup" line: 2 x 50.00.
pub fn setup_invoice() -> serde_json::Value {
    serde_json::json!({
        "customer_id": "7",
        "item": ["Setup"],
        "quantity": ["2"],
        "unit_price": ["50.00"],
        "subtotal": ["100.00"],
        "tax": ["10.00"],
        "total": ["110.00"]
    })
}
