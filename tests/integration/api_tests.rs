//! API integration tests against a running server
//!
//! Start the server with `RUN_MODE=development` so the bootstrap
//! administrator exists, then run: cargo test -- --ignored

use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

async fn login(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to get an administrator token
async fn admin_token(client: &Client) -> String {
    login(client, "admin", "admin-password").await
}

/// Register a fresh reader and return (user id, token)
async fn reader(client: &Client) -> (i64, String) {
    let username = format!("reader-{}", Uuid::new_v4().simple());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "username": username, "password": "reader-password" }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();
    (id, login(client, &username, "reader-password").await)
}

/// 13 digit ISBN unique enough for repeated runs
fn random_isbn() -> String {
    let n = Uuid::new_v4().as_u128() % 10_000_000_000_000;
    format!("{:013}", n)
}

/// Create an author and a book, returning the book id
async fn create_book(client: &Client, token: &str) -> i64 {
    let response = client
        .post(format!("{}/authors", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "firstname": "Julio",
            "lastname": "Cortázar",
            "birth_date": "1914-08-26",
            "nationality": "Argentine"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let author: Value = response.json().await.unwrap();

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": "Rayuela",
            "isbn": random_isbn(),
            "publication_date": "1963-06-28",
            "page_count": 600,
            "author_id": author["id"],
            "price": "24.50"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let book: Value = response.json().await.unwrap();
    assert_eq!(book["status"], "available");
    book["id"].as_i64().unwrap()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_write_catalog() {
    let client = Client::new();
    let (_, token) = reader(&client).await;

    let response = client
        .post(format!("{}/categories", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": "Poesía" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_logout_revokes_token() {
    let client = Client::new();
    let (_, token) = reader(&client).await;

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_flow() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (user_id, token) = reader(&client).await;
    let book_id = create_book(&client, &admin).await;

    // Borrow
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.unwrap();
    assert_eq!(loan["user_id"].as_i64(), Some(user_id));
    assert_eq!(loan["active"], true);
    let due = (Utc::now().date_naive() + Duration::days(15)).to_string();
    assert_eq!(loan["expected_return"], due.as_str());
    let loan_id = loan["id"].as_i64().unwrap();

    // The book is now out
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let book: Value = response.json().await.unwrap();
    assert_eq!(book["status"], "borrowed");

    // A second borrow of the same copy is refused
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "BookNotAvailable");

    // Stats reflect the active loan
    let response = client
        .get(format!("{}/loans/stats/self", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["activeCount"], 1);
    assert_eq!(stats["overdueCount"], 0);

    // Return without confirmation is rejected
    let response = client
        .patch(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Return on time: no fee
    let response = client
        .patch(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "returned");
    assert_eq!(body["fine"], 0);

    // Returning twice is a conflict
    let response = client
        .patch(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({ "confirm": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "AlreadyReturned");
}

#[tokio::test]
#[ignore]
async fn test_loan_limit() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, token) = reader(&client).await;

    for _ in 0..3 {
        let book_id = create_book(&client, &admin).await;
        let response = client
            .post(format!("{}/loans", BASE_URL))
            .bearer_auth(&token)
            .json(&json!({ "book_id": book_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let book_id = create_book(&client, &admin).await;
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "MaxLoansReached");
}

#[tokio::test]
#[ignore]
async fn test_admin_stats_require_admin() {
    let client = Client::new();
    let (user_id, token) = reader(&client).await;

    let response = client
        .get(format!("{}/loans/stats/admin/{}", BASE_URL, user_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = admin_token(&client).await;
    let response = client
        .get(format!("{}/loans/stats/admin/{}", BASE_URL, user_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["activeCount"], 0);
    assert_eq!(stats["totalFines"], 0);
}
