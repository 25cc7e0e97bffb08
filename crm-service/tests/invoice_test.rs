mod common;

use chrono::{Days, NaiveDate, Utc};
use common::{setup_invoice, TestApp};
use crm_service::services::FaultPlan;
use reqwest::StatusCode;
use serde_json::{json, Value};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "crm-service");
}

#[tokio::test]
async fn readiness_and_metrics_are_served() {
    let app = TestApp::spawn().await;

    assert!(app.get("/ready").await.status().is_success());

    app.post_invoice(&setup_invoice()).await;
    let metrics = app.get("/metrics").await.text().await.unwrap();
    assert!(metrics.contains("crm_invoices_total"));
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn create_invoice_computes_totals_and_defaults() {
    let app = TestApp::spawn().await;

    let response = app.post_invoice(&setup_invoice()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invoice_id"], "INV0001");

    let invoice: Value = app.get("/invoices/INV0001").await.json().await.unwrap();
    assert_eq!(invoice["invoice_number"], "INV0001");
    assert_eq!(invoice["customer_email"], "a@x.com");
    assert_eq!(invoice["customer_name"], "Ada Lovelace");
    assert_eq!(invoice["payment_status"], "unpaid");
    assert_eq!(invoice["line_items"][0]["item"], "Setup");
    assert_eq!(invoice["line_items"][0]["subtotal"], "100.00");
    assert_eq!(invoice["line_items"][0]["tax"], "10.00");
    assert_eq!(invoice["line_items"][0]["total"], "110.00");
    assert_eq!(invoice["total"], "110.00");

    let due: NaiveDate = invoice["due_date"].as_str().unwrap().parse().unwrap();
    let today = Utc::now().date_naive();
    // Tolerate a run that straddles midnight UTC.
    assert!(due == today + Days::new(30) || due == today + Days::new(29));
}

#[tokio::test]
async fn overrides_replace_customer_defaults() {
    let app = TestApp::spawn().await;
    let mut body = setup_invoice();
    body["email"] = json!("billing@x.com");
    body["due_date"] = json!("2030-06-30");
    body["payment_status"] = json!("1");

    let response = app.post_invoice(&body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let invoice: Value = app.get("/invoices/INV0001").await.json().await.unwrap();
    assert_eq!(invoice["customer_email"], "billing@x.com");
    assert_eq!(invoice["company_name"], "Analytical Engines");
    assert_eq!(invoice["due_date"], "2030-06-30");
    assert_eq!(invoice["payment_status"], "pending");
}

#[tokio::test]
async fn identical_submissions_create_distinct_invoices() {
    let app = TestApp::spawn().await;

    let first: Value = app.post_invoice(&setup_invoice()).await.json().await.unwrap();
    let second: Value = app.post_invoice(&setup_invoice()).await.json().await.unwrap();

    assert_eq!(first["invoice_id"], "INV0001");
    assert_eq!(second["invoice_id"], "INV0002");
}

#[tokio::test]
async fn out_of_range_payment_status_is_rejected_before_storage() {
    let app = TestApp::spawn().await;
    let mut body = setup_invoice();
    body["payment_status"] = json!("5");

    let response = app.post_invoice(&body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("payment status"));
    assert_eq!(app.store.stats().begun, 0);
}

#[tokio::test]
async fn malformed_line_item_names_the_row() {
    let app = TestApp::spawn().await;
    let body = json!({
        "customer_id": "7",
        "item": ["Setup", "Hosting"],
        "quantity": ["2", "lots"],
        "unit_price": ["50", "10"],
        "subtotal": ["100", "10"],
        "tax": ["10", "1"],
        "total": ["110", "11"]
    });

    let response = app.post_invoice(&body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid quantity for item 2");
}

#[tokio::test]
async fn unknown_customer_is_not_found() {
    let app = TestApp::spawn().await;
    let mut body = setup_invoice();
    body["customer_id"] = json!("404");

    let response = app.post_invoice(&body).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_failure_is_generic_and_leaves_nothing_behind() {
    let app = TestApp::spawn().await;
    app.store.set_faults(FaultPlan {
        fail_item_insert_at: Some(0),
        ..Default::default()
    });

    let response = app.post_invoice(&setup_invoice()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Database error");
    assert_eq!(app.store.invoice_count(), 0);
    assert_eq!(
        app.get("/invoices/INV0001").await.status(),
        StatusCode::NOT_FOUND
    );
}

// =============================================================================
// Read
// =============================================================================

#[tokio::test]
async fn list_invoices_in_identifier_order() {
    let app = TestApp::spawn().await;
    for _ in 0..3 {
        app.post_invoice(&setup_invoice()).await;
    }

    let invoices: Value = app.get("/invoices").await.json().await.unwrap();
    let ids: Vec<_> = invoices
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["invoice_id"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(ids, vec!["INV0001", "INV0002", "INV0003"]);
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.get("/invoices/INV0999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn calculate_line_previews_totals() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/invoices/calculate", app.address))
        .json(&json!({ "quantity": "2", "unitPrice": "50.00" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["subtotal"], "100.00");
    assert_eq!(body["tax"], "10.00");
    assert_eq!(body["total"], "110.00");
}
