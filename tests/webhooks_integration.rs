use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use payview::api::stripe::sign_hmac_sha256_hex;
use payview::api::webhooks::stripe_webhook;
use payview::ledger;

mod support;

const WEBHOOK_SECRET: &str = "whsec_integration_test";

fn signature_header(body: &str) -> String {
    let ts = Utc::now().timestamp();
    let mac = sign_hmac_sha256_hex(WEBHOOK_SECRET, &format!("{ts}.{body}"));
    format!("t={ts},v1={mac}")
}

fn completed_event(session_id: &str, file_id: Uuid, buyer_id: Option<Uuid>) -> String {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_intent": "pi_test_123",
                "metadata": {
                    "file_id": file_id.to_string(),
                    "buyer_user_id": buyer_id.map(|b| b.to_string()).unwrap_or_default()
                }
            }
        }
    })
    .to_string()
}

async fn seed_pending(
    pool: &sqlx::PgPool,
    fixture: &support::Seeded,
    session_id: &str,
) -> payview::models::Transaction {
    ledger::create_pending_transaction(
        pool,
        ledger::NewPendingTransaction {
            file_id: fixture.file_id,
            buyer_id: Some(fixture.buyer_id),
            seller_id: fixture.seller_id,
            buyer_email: None,
            stripe_session_id: session_id.to_string(),
            amount_cents: 1999,
            currency: "usd".to_string(),
            platform_fee_cents: 100,
            access_expires_at: None,
        },
    )
    .await
    .expect("create pending tx")
}

#[actix_web::test]
async fn completed_webhook_transitions_transaction_and_bumps_aggregates() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let fixture = support::seed_purchase_fixture(pool).await;
    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    seed_pending(pool, &fixture, &session_id).await;

    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = completed_event(&session_id, fixture.file_id, Some(fixture.buyer_id));
    let value = signature_header(&body);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", value))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let row = sqlx::query(
        "SELECT status, completed_at, stripe_payment_intent_id FROM transactions WHERE stripe_session_id = $1",
    )
    .bind(&session_id)
    .fetch_one(pool)
    .await
    .expect("select tx");
    assert_eq!(row.get::<String, _>("status"), "completed");
    assert!(row
        .get::<Option<chrono::DateTime<Utc>>, _>("completed_at")
        .is_some());
    assert_eq!(
        row.get::<Option<String>, _>("stripe_payment_intent_id").as_deref(),
        Some("pi_test_123")
    );

    let profile = sqlx::query(
        "SELECT total_sales_count, total_earnings_cents FROM profiles WHERE user_id = $1",
    )
    .bind(fixture.seller_id)
    .fetch_one(pool)
    .await
    .expect("select profile");
    assert_eq!(profile.get::<i32, _>("total_sales_count"), 1);
    assert_eq!(profile.get::<i64, _>("total_earnings_cents"), 1899);

    let file = sqlx::query("SELECT purchase_count, total_revenue_cents FROM files WHERE id = $1")
        .bind(fixture.file_id)
        .fetch_one(pool)
        .await
        .expect("select file");
    assert_eq!(file.get::<i32, _>("purchase_count"), 1);
    assert_eq!(file.get::<i64, _>("total_revenue_cents"), 1999);
}

#[actix_web::test]
async fn duplicate_delivery_completes_exactly_once() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let fixture = support::seed_purchase_fixture(pool).await;
    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    seed_pending(pool, &fixture, &session_id).await;

    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = completed_event(&session_id, fixture.file_id, Some(fixture.buyer_id));
    for _ in 0..3 {
        let value = signature_header(&body);
        let req = TestRequest::post()
            .uri("/webhook/stripe")
            .insert_header(("stripe-signature", value))
            .insert_header(("content-type", "application/json"))
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let profile = sqlx::query(
        "SELECT total_sales_count, total_earnings_cents FROM profiles WHERE user_id = $1",
    )
    .bind(fixture.seller_id)
    .fetch_one(pool)
    .await
    .expect("select profile");
    assert_eq!(profile.get::<i32, _>("total_sales_count"), 1);
    assert_eq!(profile.get::<i64, _>("total_earnings_cents"), 1899);

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE stripe_session_id = $1 AND status = 'completed'",
    )
    .bind(&session_id)
    .fetch_one(pool)
    .await
    .expect("count");
    assert_eq!(completed, 1);
}

#[actix_web::test]
async fn bad_signature_is_rejected_and_mutates_nothing() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let fixture = support::seed_purchase_fixture(pool).await;
    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    seed_pending(pool, &fixture, &session_id).await;

    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = completed_event(&session_id, fixture.file_id, Some(fixture.buyer_id));
    let ts = Utc::now().timestamp();
    let forged = sign_hmac_sha256_hex("some-other-secret", &format!("{ts}.{body}"));
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", format!("t={ts},v1={forged}")))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let status: String =
        sqlx::query_scalar("SELECT status FROM transactions WHERE stripe_session_id = $1")
            .bind(&session_id)
            .fetch_one(pool)
            .await
            .expect("select tx");
    assert_eq!(status, "pending");
}

#[actix_web::test]
async fn account_updated_overwrites_onboarding_flag() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let fixture = support::seed_purchase_fixture(pool).await;

    let account_id: String =
        sqlx::query_scalar("SELECT stripe_account_id FROM profiles WHERE user_id = $1")
            .bind(fixture.seller_id)
            .fetch_one(pool)
            .await
            .expect("select account id");

    // Flag starts true in the fixture; a half-onboarded account clears it.
    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "account.updated",
        "data": {
            "object": {
                "id": account_id,
                "details_submitted": true,
                "charges_enabled": false
            }
        }
    })
    .to_string();
    let value = signature_header(&body);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", value))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let complete: bool = sqlx::query_scalar(
        "SELECT stripe_onboarding_complete FROM profiles WHERE user_id = $1",
    )
    .bind(fixture.seller_id)
    .fetch_one(pool)
    .await
    .expect("select flag");
    assert!(!complete);
}

#[actix_web::test]
async fn unknown_event_type_is_acked() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = json!({
        "id": "evt_future",
        "type": "some.future.event",
        "data": { "object": {} }
    })
    .to_string();
    let value = signature_header(&body);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", value))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let payload: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(payload["received"], json!(true));
}

#[actix_web::test]
async fn expired_session_fails_pending_transaction() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let fixture = support::seed_purchase_fixture(pool).await;
    let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
    seed_pending(pool, &fixture, &session_id).await;

    let state = web::Data::new(support::build_state(pool.clone(), WEBHOOK_SECRET).await);
    let app = test::init_service(App::new().app_data(state.clone()).service(stripe_webhook)).await;

    let body = json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.expired",
        "data": { "object": { "id": session_id } }
    })
    .to_string();
    let value = signature_header(&body);
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("stripe-signature", value))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let status: String =
        sqlx::query_scalar("SELECT status FROM transactions WHERE stripe_session_id = $1")
            .bind(&session_id)
            .fetch_one(pool)
            .await
            .expect("select tx");
    assert_eq!(status, "failed");
}
