mod common;

use anyhow::Result;
use axum::http::{header, StatusCode};
use serde_json::Value;

use common::{Caller, TestApp};

fn id_of(body: &Value) -> String {
    body["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn owner_sees_order_and_stranger_gets_not_found() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    let bob = Caller::new("bob", &["Customer"]);

    let created = app.post("/api/order", &alice.token, r#"{"quantity": 2, "notes": "gift"}"#).await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["user_id"], alice.id.to_string());
    let id = id_of(&created.body);

    let location = created.headers.get(header::LOCATION).unwrap().to_str()?;
    assert_eq!(location, format!("localhost:8080/api/order/{}", id));

    let own = app.get(&format!("/api/order/{}", id), &alice.token).await?;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["notes"], "gift");

    let other = app.get(&format!("/api/order/{}", id), &bob.token).await?;
    assert_eq!(other.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn list_is_scoped_to_the_caller() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    let bob = Caller::new("bob", &["Customer"]);

    for _ in 0..3 {
        app.post("/api/order", &alice.token, r#"{"quantity": 1}"#).await?;
    }
    app.post("/api/order", &bob.token, r#"{"quantity": 1}"#).await?;

    let res = app.get("/api/order", &bob.token).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["count"], 1);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn global_permission_sees_every_order() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    let auditor = Caller::new("auditor", &["Auditor"]);

    let created = app.post("/api/order", &alice.token, r#"{"quantity": 1}"#).await?;
    let id = id_of(&created.body);

    let list = app.get("/api/order", &auditor.token).await?;
    assert_eq!(list.body["count"], 1);

    let one = app.get(&format!("/api/order/{}", id), &auditor.token).await?;
    assert_eq!(one.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn pagination_clamps_junk_parameters() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    for _ in 0..7 {
        app.post("/api/order", &alice.token, r#"{"quantity": 1}"#).await?;
    }

    let res = app.get("/api/order?page=0&page_size=-5", &alice.token).await?;
    assert_eq!(res.body["page"], 1);
    assert_eq!(res.body["page_size"], 2);
    assert_eq!(res.body["count"], 7);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 2);

    let res = app.get("/api/order?page=2&page_size=999", &alice.token).await?;
    assert_eq!(res.body["page_size"], 5);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 2);

    let res = app.get("/api/order?page=abc&page_size=xyz", &alice.token).await?;
    assert_eq!((res.body["page"].as_i64(), res.body["page_size"].as_i64()), (Some(1), Some(2)));

    let res = app.get("/api/order?page=50", &alice.token).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["count"], 7);
    assert!(res.body["data"].as_array().unwrap().is_empty());

    let huge = "99999999999999999999";
    let res = app
        .get(&format!("/api/order?page={}&page_size={}", huge, huge), &alice.token)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["page_size"], 5);
    assert!(res.body["data"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn update_persists_path_id_and_replaces_fields() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);

    let created = app.post("/api/order", &alice.token, r#"{"quantity": 1, "notes": "ring twice"}"#).await?;
    let id = id_of(&created.body);

    let body = format!(r#"{{"id": "{}", "quantity": 3}}"#, uuid::Uuid::new_v4());
    let updated = app.put(&format!("/api/order/{}", id), &alice.token, &body).await?;

    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["id"], id);
    assert_eq!(updated.body["quantity"], 3);
    assert_eq!(updated.body["notes"], "");
    assert_eq!(updated.body["user_id"], alice.id.to_string());
    assert_eq!(updated.body["created_at"], created.body["created_at"]);
    Ok(())
}

#[tokio::test]
async fn update_cannot_transfer_ownership() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    let bob = Caller::new("bob", &["Customer"]);

    let created = app.post("/api/order", &alice.token, r#"{"quantity": 1}"#).await?;
    let id = id_of(&created.body);

    let body = format!(r#"{{"quantity": 1, "user_id": "{}"}}"#, bob.id);
    let updated = app.put(&format!("/api/order/{}", id), &alice.token, &body).await?;
    assert_eq!(updated.body["user_id"], alice.id.to_string());

    let stranger = app.put(&format!("/api/order/{}", id), &bob.token, &body).await?;
    assert_eq!(stranger.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_then_get_is_not_found() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);
    let bob = Caller::new("bob", &["Customer"]);

    let created = app.post("/api/order", &alice.token, r#"{"quantity": 1}"#).await?;
    let id = id_of(&created.body);
    let uri = format!("/api/order/{}", id);

    let foreign = app.delete(&uri, &bob.token).await?;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let deleted = app.delete(&uri, &alice.token).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(deleted.headers.get("entity").unwrap(), id.as_str());

    let gone = app.get(&uri, &alice.token).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn global_products_are_shared() -> Result<()> {
    let app = TestApp::new();
    let clerk = Caller::new("clerk", &["Clerk"]);
    let alice = Caller::new("alice", &["Customer"]);

    let created = app
        .post("/api/product", &clerk.token, r#"{"name": "lamp", "price": "19.99"}"#)
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(created.body.get("user_id").is_none());

    let list = app.get("/api/product", &alice.token).await?;
    assert_eq!(list.body["count"], 1);
    assert_eq!(list.body["data"][0]["name"], "lamp");

    let denied = app.post("/api/product", &alice.token, r#"{"name": "x"}"#).await?;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn bad_requests_are_reported() -> Result<()> {
    let app = TestApp::new();
    let alice = Caller::new("alice", &["Customer"]);

    let bad_id = app.get("/api/order/42", &alice.token).await?;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

    let invalid = app.post("/api/order", &alice.token, r#"{"quantity": 0}"#).await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.body["error"].as_str().unwrap().contains("quantity"));

    let malformed = app.post("/api/order", &alice.token, "{quantity").await?;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.row_count("order").await, 0);
    Ok(())
}
