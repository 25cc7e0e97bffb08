use std::sync::Arc;
use std::time::Duration;

use crm_service::invoicing::{
    CreateInvoiceRequest, InvoiceCoordinator, InvoiceService, InvoiceSettings, RawLineItems,
    UnitOfWork,
};
use crm_service::models::{CreateInvoice, Customer, PaymentStatus};
use crm_service::services::{InvoiceStore, MemoryStore};
use chrono::NaiveDate;

fn customer_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_customer(Customer {
        customer_id: 7,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        company_name: String::new(),
        email: "a@x.com".to_string(),
        phone: String::new(),
    });
    store
}

fn request(item: &str) -> CreateInvoiceRequest {
    let one = |v: &str| vec![v.to_string()];
    CreateInvoiceRequest {
        customer_id: "7".to_string(),
        line_items: RawLineItems {
            item: one(item),
            quantity: one("1"),
            unit_price: one("10"),
            subtotal: one("10"),
            tax: one("1"),
            total: one("11"),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn concurrent_creators_get_distinct_sequential_identifiers() {
    let store = customer_store();
    let service = InvoiceService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        InvoiceSettings::default(),
    );

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.create_invoice(&request(&format!("item {}", i))).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();

    let expected: Vec<_> = (1..=10).map(|n| format!("INV{:04}", n)).collect();
    assert_eq!(ids, expected);
    assert_eq!(store.line_item_count(), 10);
}

#[tokio::test]
async fn cancelled_creation_leaves_store_usable() {
    let store = customer_store();
    let coordinator = InvoiceCoordinator::new(Arc::new(store.clone()));
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let invoice = CreateInvoice {
        customer_id: 7,
        customer_name: "Ada Lovelace".to_string(),
        company_name: String::new(),
        customer_phone: String::new(),
        customer_email: "a@x.com".to_string(),
        invoice_date: date,
        due_date: date,
        payment_status: PaymentStatus::Unpaid,
        line_items: Vec::new(),
    };

    // A writer holding the store blocks the next creation until it is cancelled.
    let holder = UnitOfWork::begin(&store).await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(50), coordinator.persist(&invoice)).await;
    assert!(blocked.is_err());
    drop(holder);

    let id = coordinator.persist(&invoice).await.unwrap();
    assert_eq!(id, "INV0001");
    assert!(store.get_invoice("INV0001").await.unwrap().is_some());
    assert_eq!(store.stats().rolled_back, 1);
}
