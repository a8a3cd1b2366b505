use commerce_client::memory::{simple_order, InMemoryPlatform, Operation};
use returns_hex::application::return_service::ReturnService;
use returns_hex::inbound::http::{HttpServer, HttpServerConfig};
use returns_repo::memory::InMemoryRepo;
use returns_types::domain::return_request::ReturnRequest;
use rust_decimal::Decimal;
use serde_json::Value;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn start(platform: InMemoryPlatform) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let config = HttpServerConfig {
        port: port.to_string(),
    };
    let service = ReturnService::new(InMemoryRepo::new(), platform);
    let server = HttpServer::new(service, config).await.unwrap();
    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });

    // Give the server a moment to start.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    (format!("http://127.0.0.1:{}", port), handle)
}

fn seeded_platform() -> InMemoryPlatform {
    let platform = InMemoryPlatform::new();
    platform.seed_order(simple_order(
        1001,
        "USD",
        Some(Decimal::new(599, 2)),
        &[("Mug", 1, Decimal::new(2500, 2)), ("Bowl", 1, Decimal::new(1500, 2))],
    ));
    platform
}

fn no_redirects() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn form_submission_redirects_to_detail() {
    let (addr, handle) = start(seeded_platform()).await;
    let client = no_redirects();

    let res = client
        .post(format!("{}/returns", addr))
        .form(&[
            ("customerId", "cust-9"),
            ("orderId", "1001"),
            ("reason", "defective"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::SEE_OTHER);
    let location = res
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(location.starts_with("/returns/"));

    let detail: ReturnRequest = client
        .get(format!("{}{}", addr, location))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(detail.refunded);
    assert_eq!(detail.refund_amount, Some(Decimal::new(4000, 2)));
    assert_eq!(detail.workflow_state.to_string(), "completed");

    let list: Vec<ReturnRequest> = client
        .get(format!("{}/returns", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);

    handle.abort();
}

#[tokio::test]
async fn json_submission_reports_warnings() {
    let platform = seeded_platform();
    platform.fail(Operation::UpdateNote, "note rejected");
    let (addr, handle) = start(platform).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/returns", addr))
        .json(&serde_json::json!({
            "customer_id": "cust-1",
            "order_id": "1001",
            "reason": "wrong_item"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["warnings"][0]["step"], "update_note");
    assert_eq!(body["refund"]["status"], "success");
    assert_eq!(body["refund"]["amount"], "40.00");
    assert_eq!(body["return_request"]["workflow_state"], "completed");

    handle.abort();
}

#[tokio::test]
async fn error_statuses() {
    let platform = seeded_platform();
    platform.reject_refund(
        "gid://shopify/Order/1001",
        vec![returns_types::domain::commerce::UserError {
            field: vec!["orderId".into()],
            message: "Order cannot be refunded".into(),
        }],
    );
    let (addr, handle) = start(platform.clone()).await;
    let client = no_redirects();

    let form = |order: &'static str, reason: &'static str| {
        [("customerId", "c"), ("orderId", order), ("reason", reason)]
    };

    let res = client
        .post(format!("{}/returns", addr))
        .form(&form("1001", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/returns", addr))
        .form(&form("424242", "defective"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid order");

    let res = client
        .post(format!("{}/returns", addr))
        .form(&form("1001", "defective"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Order cannot be refunded");

    platform.fail(Operation::FetchOrder, "upstream exploded");
    let res = client
        .post(format!("{}/returns", addr))
        .form(&form("1001", "defective"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "internal error");

    let res = client
        .get(format!("{}/returns/not-a-uuid", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/returns/{}", addr, uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn malformed_submissions_are_json_bad_requests() {
    let platform = seeded_platform();
    let (addr, handle) = start(platform.clone()).await;
    let client = no_redirects();

    let res = client
        .post(format!("{}/returns", addr))
        .form(&[("customerId", "c"), ("orderId", "1001")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("reason"));

    let res = client
        .post(format!("{}/api/returns", addr))
        .json(&serde_json::json!({ "customer_id": "c", "order_id": "1001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    let res = client
        .post(format!("{}/api/returns", addr))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    let res = client
        .post(format!("{}/returns", addr))
        .form(&[("customerId", "c"), ("orderId", "abc"), ("reason", "other")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid order");

    assert_eq!(platform.call_count(Operation::FetchOrder), 0);

    handle.abort();
}

#[tokio::test]
async fn read_endpoints() {
    let platform = seeded_platform();
    platform.seed_product(returns_types::domain::product::ProductInput {
        shopify_id: "501".into(),
        title: "Mug".into(),
        description: Some("Stoneware".into()),
        price: Some(Decimal::new(2500, 2)),
        image_url: None,
        product_type: Some("Kitchen".into()),
    });
    let (addr, handle) = start(platform).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let reasons: Value = client
        .get(format!("{}/returns/reasons", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reasons[0]["code"], "defective");

    let orders: Value = client
        .get(format!("{}/orders?first=10", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
    assert_eq!(orders[0]["customer"], "Guest");

    let preview = client
        .get(format!(
            "{}/orders/1001/return?items=gid://shopify/LineItem/10011",
            addr
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(preview.status(), reqwest::StatusCode::OK);
    let preview: Value = preview.json().await.unwrap();
    assert_eq!(preview["total_refund_amount"], "25.00");

    let res = client
        .get(format!("{}/orders/1001/return", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let synced: Value = client
        .post(format!("{}/products/sync", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(synced["synced"], 1);

    let products: Value = client
        .get(format!("{}/products", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(products[0]["shopify_id"], "501");

    let report: Value = client
        .get(format!("{}/analytics", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["total_orders"], 1);
    assert_eq!(report["total_products"], 1);
    assert_eq!(report["summary"]["total_requests"], 0);

    handle.abort();
}
