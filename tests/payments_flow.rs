mod common;

use std::collections::HashMap;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct IntentData {
    intent_id: String,
    client_secret: String,
    subtotal: f64,
    discount_amount: f64,
    total_amount: f64,
    line_items: Vec<LineItemData>,
}

#[derive(Deserialize)]
struct LineItemData {
    #[allow(dead_code)]
    label: String,
    #[allow(dead_code)]
    amount: f64,
}

#[derive(Deserialize)]
struct ConfirmData {
    payment: PaymentData,
    line_items: Vec<PersistedLineItemData>,
    package_order: Option<PackageOrderData>,
}

#[derive(Deserialize)]
struct PaymentData {
    id: Uuid,
    amount: f64,
    discount_amount: f64,
    voucher_id: Option<Uuid>,
    status: String,
}

#[derive(Deserialize)]
struct PersistedLineItemData {
    label: String,
    amount: f64,
}

#[derive(Deserialize)]
struct PackageOrderData {
    id: Uuid,
    user_id: Uuid,
    virtual_prototype_status: String,
    sell_sheet_status: String,
    sell_sheet_locked: bool,
}

async fn payment_count(app: &TestApp) -> Result<i64> {
    app.with_conn(|conn| {
        use backend::schema::payments::dsl::payments;
        Ok(payments.select(count_star()).first(conn)?)
    })
    .await
}

#[tokio::test]
async fn confirm_rejects_anything_but_succeeded() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    app.insert_user("client@example.com", "clientpass", "client")
        .await?;
    let token = app.login_token("client@example.com", "clientpass").await?;

    app.gateway()
        .seed_intent(
            "pi_incomplete",
            "requires_payment_method",
            49500,
            HashMap::new(),
        )
        .await;

    let response = app
        .post_json(
            "/api/payments/confirm",
            &json!({ "payment_intent_id": "pi_incomplete" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(payment_count(&app).await?, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn create_intent_and_confirm_persist_a_complete_record_set() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    app.insert_user("admin@example.com", "adminpass", "admin")
        .await?;
    let client_id = app
        .insert_user("client@example.com", "clientpass", "client")
        .await?;

    let admin_token = app.login_token("admin@example.com", "adminpass").await?;
    let client_token = app.login_token("client@example.com", "clientpass").await?;

    app.insert_product("sell_sheet", None, 495.0).await?;
    app.insert_product("rush_delivery", None, 99.0).await?;
    app.post_json(
        "/api/vouchers",
        &json!({ "code": "SAVE50", "discount_type": "fixed", "discount_value": 50.0 }),
        Some(&admin_token),
    )
    .await?;

    let intent = app
        .post_json(
            "/api/payments/create-intent",
            &json!({
                "product_key": "sell_sheet",
                "add_ons": ["rush_delivery"],
                "voucher_code": "SAVE50",
                "department": "consumer_products"
            }),
            Some(&client_token),
        )
        .await?;
    assert_eq!(intent.status(), StatusCode::OK);
    let intent: IntentData = serde_json::from_slice(&body_to_vec(intent.into_body()).await?)?;
    assert_eq!(intent.subtotal, 594.0);
    assert_eq!(intent.discount_amount, 50.0);
    assert_eq!(intent.total_amount, 544.0);
    assert_eq!(intent.line_items.len(), 2);
    assert!(!intent.client_secret.is_empty());

    // The gateway was asked for integer cents.
    let gateway_intent = app.gateway().intent(&intent.intent_id).await.unwrap();
    assert_eq!(gateway_intent.amount_cents, 54400);

    let confirm = app
        .post_json(
            "/api/payments/confirm",
            &json!({ "payment_intent_id": intent.intent_id }),
            Some(&client_token),
        )
        .await?;
    assert_eq!(confirm.status(), StatusCode::CREATED);
    let confirm: ConfirmData = serde_json::from_slice(&body_to_vec(confirm.into_body()).await?)?;
    assert_eq!(confirm.payment.amount, 544.0);
    assert_eq!(confirm.payment.discount_amount, 50.0);
    assert_eq!(confirm.payment.status, "succeeded");
    assert!(confirm.payment.voucher_id.is_some());
    assert_eq!(confirm.line_items.len(), 2);
    assert!(confirm
        .line_items
        .iter()
        .any(|item| item.label == "Sell Sheet" && item.amount == 495.0));
    assert!(confirm.package_order.is_none());

    // Redemption happened with the payment, not at quote time.
    let payment_id = confirm.payment.id;
    let (used_count, usage_rows) = app
        .with_conn(move |conn| {
            use backend::schema::voucher_codes::dsl as vc;
            use backend::schema::voucher_usages::dsl as vu;
            let used: i32 = vc::voucher_codes
                .filter(vc::code.eq("SAVE50"))
                .select(vc::used_count)
                .first(conn)?;
            let usages: i64 = vu::voucher_usages
                .filter(vu::user_id.eq(client_id))
                .filter(vu::payment_id.eq(payment_id))
                .select(count_star())
                .first(conn)?;
            Ok((used, usages))
        })
        .await?;
    assert_eq!(used_count, 1);
    assert_eq!(usage_rows, 1);

    // Confirming the same intent again replays the stored result.
    let replay = app
        .post_json(
            "/api/payments/confirm",
            &json!({ "payment_intent_id": intent.intent_id }),
            Some(&client_token),
        )
        .await?;
    assert_eq!(replay.status(), StatusCode::OK);
    assert_eq!(payment_count(&app).await?, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn design_package_purchase_provisions_order_and_queues_email() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    let client_id = app
        .insert_user("buyer@example.com", "buyerpass", "client")
        .await?;
    let token = app.login_token("buyer@example.com", "buyerpass").await?;

    app.insert_product("design_package", None, 1500.0).await?;
    app.insert_template(
        "design_package_confirmation",
        "Your design package is ready to start",
        "<p>Thanks! Track it here: {{access_url}}</p>",
    )
    .await?;

    let intent = app
        .post_json(
            "/api/payments/create-intent",
            &json!({ "product_key": "design_package" }),
            Some(&token),
        )
        .await?;
    let intent: IntentData = serde_json::from_slice(&body_to_vec(intent.into_body()).await?)?;
    assert_eq!(intent.total_amount, 1500.0);

    let confirm = app
        .post_json(
            "/api/payments/confirm",
            &json!({ "payment_intent_id": intent.intent_id }),
            Some(&token),
        )
        .await?;
    assert_eq!(confirm.status(), StatusCode::CREATED);
    let confirm: ConfirmData = serde_json::from_slice(&body_to_vec(confirm.into_body()).await?)?;

    let order = confirm.package_order.expect("design package order expected");
    assert_eq!(order.user_id, client_id);
    assert_eq!(order.virtual_prototype_status, "not_started");
    assert_eq!(order.sell_sheet_status, "not_started");
    assert!(order.sell_sheet_locked);

    // The confirmation email is an outbox row, committed with the
    // payment.
    let queued = app.outbox_jobs_by_type("send-email").await?;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, "queued");
    assert_eq!(
        queued[0].payload["template_key"],
        "design_package_confirmation"
    );
    assert_eq!(queued[0].payload["recipient"], "buyer@example.com");

    // The signed access link resolves without a session.
    let package_token = app
        .state
        .jwt
        .generate_package_token(order.id, client_id)?;
    let claim = app
        .get(
            &format!("/api/design-package-orders/claim/{package_token}"),
            None,
        )
        .await?;
    assert_eq!(claim.status(), StatusCode::OK);

    let bogus = app
        .get("/api/design-package-orders/claim/not-a-token", None)
        .await?;
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn failed_notifications_are_replayable_from_the_log() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    app.insert_user("manager@example.com", "managerpass", "manager")
        .await?;
    let manager_token = app.login_token("manager@example.com", "managerpass").await?;

    // A logged failed attempt pointing at its outbox payload.
    let log_id = app
        .with_conn(|conn| {
            let job = backend::outbox::enqueue_job(
                conn,
                backend::outbox::JOB_SEND_EMAIL,
                json!({
                    "template_key": "design_package_confirmation",
                    "recipient": "buyer@example.com",
                    "params": {}
                }),
                None,
            )?;
            let log = backend::models::NewEmailLog {
                id: Uuid::new_v4(),
                outbox_id: Some(job.id),
                recipient: "buyer@example.com".to_string(),
                subject: "Your design package is ready to start".to_string(),
                status: "failed".to_string(),
                error: Some("simulated mail API outage".to_string()),
            };
            diesel::insert_into(backend::schema::email_logs::table)
                .values(&log)
                .execute(conn)?;
            Ok(log.id)
        })
        .await?;

    let resend = app
        .post_json(
            &format!("/api/email-logs/{log_id}/resend"),
            &json!({}),
            Some(&manager_token),
        )
        .await?;
    assert_eq!(resend.status(), StatusCode::ACCEPTED);

    // Replay enqueues a fresh outbox row; the original is untouched.
    let queued = app.outbox_jobs_by_type("send-email").await?;
    assert_eq!(queued.len(), 2);

    app.cleanup().await?;
    Ok(())
}
