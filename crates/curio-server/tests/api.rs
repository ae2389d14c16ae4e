//! HTTP API integration tests over the local Rocket client.

use curio_config::{CurioConfig, RateLimitsConfig};
use curio_core::agent::MockDiscoveryAgent;
use pretty_assertions::assert_eq;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};
use std::sync::Arc;

async fn client_with(config: CurioConfig) -> Client {
    let rocket = curio_server::build(config, Arc::new(MockDiscoveryAgent::new()));
    Client::tracked(rocket).await.expect("rocket client")
}

async fn client() -> Client {
    client_with(CurioConfig::builder().rate_limits(RateLimitsConfig {
        enabled: false,
        ..RateLimitsConfig::default()
    }).build())
    .await
}

async fn create_session(client: &Client) -> String {
    let response = client.post("/api/sessions").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    body["session_id"].as_str().expect("session_id").to_string()
}

#[rocket::async_test]
async fn health_reports_healthy() {
    let client = client().await;
    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["status"], json!("healthy"));
    assert!(body["version"].is_string());
}

#[rocket::async_test]
async fn session_lifecycle_and_context_rehydration() {
    let client = client().await;
    let session_id = create_session(&client).await;

    let response = client
        .get(format!("/api/sessions/{session_id}/context"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["session_id"].as_str(), Some(session_id.as_str()));
    assert_eq!(body["context"]["search_history"], json!([]));
    assert_eq!(body["cart_summary"]["total_items"], json!(0));

    let response = client
        .get("/api/sessions/00000000-0000-0000-0000-000000000000/context")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["error"]["code"], json!("SESSION_EXPIRED"));
}

#[rocket::async_test]
async fn direct_function_endpoints_share_executor_semantics() {
    let client = client().await;
    let session_id = create_session(&client).await;

    let response = client
        .post("/api/functions/search_products")
        .header(ContentType::JSON)
        .body(
            json!({ "session_id": session_id, "query": "wireless headphones" }).to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let search: Value = response.into_json().await.expect("json body");
    assert_eq!(search["success"], json!(true));
    let product_id = search["data"]["results"][0]["id"]
        .as_str()
        .expect("result id")
        .to_string();

    let response = client
        .post("/api/functions/show_product_details")
        .header(ContentType::JSON)
        .body(json!({ "session_id": session_id, "product_id": product_id }).to_string())
        .dispatch()
        .await;
    let details: Value = response.into_json().await.expect("json body");
    assert_eq!(details["success"], json!(true));
    assert_eq!(details["data"]["product"]["id"].as_str(), Some(product_id.as_str()));

    let response = client
        .post("/api/functions/add_to_cart")
        .header(ContentType::JSON)
        .body(
            json!({ "session_id": session_id, "product_id": product_id, "quantity": 1000 })
                .to_string(),
        )
        .dispatch()
        .await;
    let failed_add: Value = response.into_json().await.expect("json body");
    assert_eq!(failed_add["success"], json!(false));
    assert_eq!(failed_add["error"]["code"], json!("INSUFFICIENT_STOCK"));

    // The failed add left the cart untouched.
    let response = client
        .get(format!("/api/cart/{session_id}"))
        .dispatch()
        .await;
    let cart: Value = response.into_json().await.expect("json body");
    assert_eq!(cart["cart_summary"]["total_items"], json!(0));
}

#[rocket::async_test]
async fn hallucinated_ids_surface_suggestions_over_http() {
    let client = client().await;
    let session_id = create_session(&client).await;

    client
        .post("/api/functions/search_products")
        .header(ContentType::JSON)
        .body(json!({ "session_id": session_id, "query": "wireless headphones" }).to_string())
        .dispatch()
        .await;

    let response = client
        .post("/api/functions/show_product_details")
        .header(ContentType::JSON)
        .body(
            json!({ "session_id": session_id, "product_id": "prod_does_not_exist" }).to_string(),
        )
        .dispatch()
        .await;
    let details: Value = response.into_json().await.expect("json body");
    assert_eq!(details["success"], json!(false));
    assert_eq!(details["error"]["code"], json!("INVALID_PRODUCT_ID"));
    assert!(
        !details["error"]["details"]["suggestions"]
            .as_array()
            .expect("suggestions")
            .is_empty()
    );
}

#[rocket::async_test]
async fn message_submission_validates_sessions_and_bodies() {
    let client = client().await;
    let session_id = create_session(&client).await;

    let response = client
        .post(format!("/api/chat/{session_id}/message"))
        .header(ContentType::JSON)
        .body(json!({ "message": "find headphones" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["success"], json!(true));
    assert!(body["message_id"].is_string());

    let response = client
        .post(format!("/api/chat/{session_id}/message"))
        .header(ContentType::JSON)
        .body(json!({ "message": "   " }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .post("/api/chat/00000000-0000-0000-0000-000000000000/message")
        .header(ContentType::JSON)
        .body(json!({ "message": "hello" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn session_creation_is_rate_limited() {
    let client = client_with(
        CurioConfig::builder()
            .rate_limits(RateLimitsConfig {
                enabled: true,
                create_session_per_minute: 2,
                ..RateLimitsConfig::default()
            })
            .build(),
    )
    .await;

    for _ in 0..2 {
        let response = client.post("/api/sessions").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }
    let response = client.post("/api/sessions").dispatch().await;
    assert_eq!(response.status(), Status::TooManyRequests);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["error"]["code"], json!("RATE_LIMITED"));
}
