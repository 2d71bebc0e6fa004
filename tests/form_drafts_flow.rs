mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{acquire_db_lock, body_to_vec, TestApp};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct DraftData {
    form_id: String,
    payload: serde_json::Value,
}

#[tokio::test]
async fn autosaved_drafts_round_trip_per_user() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    app.insert_user("alice@example.com", "alicepass", "client")
        .await?;
    app.insert_user("bob@example.com", "bobpass", "client")
        .await?;

    let alice_token = app.login_token("alice@example.com", "alicepass").await?;
    let bob_token = app.login_token("bob@example.com", "bobpass").await?;

    let save = app
        .put_json(
            "/api/form-drafts/job-intake",
            &json!({ "title": "Half-finished sell sheet", "quantity": 3 }),
            Some(&alice_token),
        )
        .await?;
    assert_eq!(save.status(), StatusCode::OK);

    let load = app
        .get("/api/form-drafts/job-intake", Some(&alice_token))
        .await?;
    assert_eq!(load.status(), StatusCode::OK);
    let draft: DraftData = serde_json::from_slice(&body_to_vec(load.into_body()).await?)?;
    assert_eq!(draft.form_id, "job-intake");
    assert_eq!(draft.payload["title"], "Half-finished sell sheet");

    // Keyed per user: Bob has no draft under the same form id.
    let bobs = app
        .get("/api/form-drafts/job-intake", Some(&bob_token))
        .await?;
    assert_eq!(bobs.status(), StatusCode::NOT_FOUND);

    let delete = app
        .delete("/api/form-drafts/job-intake", Some(&alice_token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    let gone = app
        .get("/api/form-drafts/job-intake", Some(&alice_token))
        .await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn expired_drafts_vanish_on_read() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    let alice = app
        .insert_user("alice@example.com", "alicepass", "client")
        .await?;
    let token = app.login_token("alice@example.com", "alicepass").await?;

    let save = app
        .put_json(
            "/api/form-drafts/job-intake",
            &json!({ "title": "Stale draft" }),
            Some(&token),
        )
        .await?;
    assert_eq!(save.status(), StatusCode::OK);

    // Age the row past the 7-day window.
    app.with_conn(move |conn| {
        use backend::schema::form_drafts::dsl::{expires_at, form_drafts, user_id};
        diesel::update(form_drafts.filter(user_id.eq(alice)))
            .set(expires_at.eq((Utc::now() - Duration::days(1)).naive_utc()))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    let load = app.get("/api/form-drafts/job-intake", Some(&token)).await?;
    assert_eq!(load.status(), StatusCode::NOT_FOUND);

    // The expired row was cleaned up, not just hidden.
    let remaining: i64 = app
        .with_conn(|conn| {
            use backend::schema::form_drafts::dsl::form_drafts;
            Ok(form_drafts.select(count_star()).first(conn)?)
        })
        .await?;
    assert_eq!(remaining, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn draft_payload_must_be_an_object() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    app.insert_user("alice@example.com", "alicepass", "client")
        .await?;
    let token = app.login_token("alice@example.com", "alicepass").await?;

    let save = app
        .put_json("/api/form-drafts/job-intake", &json!("just a string"), Some(&token))
        .await?;
    assert_eq!(save.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}
