mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct AssignmentData {
    id: Uuid,
    job_type: String,
    designer_id: Uuid,
    priority: i32,
    is_active: bool,
}

#[derive(Deserialize)]
struct JobEnvelope {
    job: JobData,
}

#[derive(Deserialize)]
struct JobData {
    designer_id: Option<Uuid>,
}

#[tokio::test]
async fn bucket_replacement_deactivates_but_keeps_history() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    let d1 = app
        .insert_user("designer1@example.com", "designerpass", "designer")
        .await?;
    let d2 = app
        .insert_user("designer2@example.com", "designerpass", "designer")
        .await?;
    app.insert_user("admin@example.com", "adminpass", "admin")
        .await?;
    app.insert_user("client@example.com", "clientpass", "client")
        .await?;

    let admin_token = app.login_token("admin@example.com", "adminpass").await?;
    let client_token = app.login_token("client@example.com", "clientpass").await?;

    let first = app
        .post_json(
            "/api/designer-assignments",
            &json!({ "job_type": "sell_sheets", "designer_ids": [d1, d2] }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(first.status(), StatusCode::OK);
    let first_set: Vec<AssignmentData> =
        serde_json::from_slice(&body_to_vec(first.into_body()).await?)?;
    assert_eq!(first_set.len(), 2);
    assert_eq!(first_set[0].designer_id, d1);
    assert_eq!(first_set[0].priority, 0);
    assert_eq!(first_set[1].designer_id, d2);
    assert_eq!(first_set[1].priority, 1);

    let job = app
        .post_json(
            "/api/jobs",
            &json!({ "title": "Sheet A", "package_type": "sell_sheet" }),
            Some(&client_token),
        )
        .await?;
    let job: JobEnvelope = serde_json::from_slice(&body_to_vec(job.into_body()).await?)?;
    assert_eq!(job.job.designer_id, Some(d1));

    // Replace [d1, d2] with [d2].
    let second = app
        .post_json(
            "/api/designer-assignments",
            &json!({ "job_type": "sell_sheets", "designer_ids": [d2] }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(second.status(), StatusCode::OK);

    let job = app
        .post_json(
            "/api/jobs",
            &json!({ "title": "Sheet B", "package_type": "sell_sheet" }),
            Some(&client_token),
        )
        .await?;
    let job: JobEnvelope = serde_json::from_slice(&body_to_vec(job.into_body()).await?)?;
    assert_eq!(job.job.designer_id, Some(d2));

    // Old rows survive, deactivated, for history.
    let all = app
        .get(
            "/api/designer-assignments?job_type=sell_sheets&include_inactive=true",
            Some(&admin_token),
        )
        .await?;
    let all: Vec<AssignmentData> = serde_json::from_slice(&body_to_vec(all.into_body()).await?)?;
    assert_eq!(all.len(), 3);
    assert_eq!(all.iter().filter(|row| row.is_active).count(), 1);
    assert!(all
        .iter()
        .filter(|row| !row.is_active)
        .any(|row| row.designer_id == d1));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn assignment_management_is_admin_only() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(());
    };

    let d1 = app
        .insert_user("designer@example.com", "designerpass", "designer")
        .await?;
    app.insert_user("admin@example.com", "adminpass", "admin")
        .await?;
    app.insert_user("client@example.com", "clientpass", "client")
        .await?;

    let admin_token = app.login_token("admin@example.com", "adminpass").await?;
    let client_token = app.login_token("client@example.com", "clientpass").await?;

    let denied = app
        .post_json(
            "/api/designer-assignments",
            &json!({ "job_type": "line_drawings", "designer_ids": [d1] }),
            Some(&client_token),
        )
        .await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let unknown_bucket = app
        .post_json(
            "/api/designer-assignments",
            &json!({ "job_type": "posters", "designer_ids": [d1] }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(unknown_bucket.status(), StatusCode::BAD_REQUEST);

    let replace = app
        .post_json(
            "/api/designer-assignments",
            &json!({ "job_type": "line_drawings", "designer_ids": [d1] }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(replace.status(), StatusCode::OK);
    let rows: Vec<AssignmentData> =
        serde_json::from_slice(&body_to_vec(replace.into_body()).await?)?;
    assert_eq!(rows.len(), 1);

    // DELETE deactivates the row rather than erasing it.
    let deactivate = app
        .delete(
            &format!("/api/designer-assignments?id={}", rows[0].id),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(deactivate.status(), StatusCode::NO_CONTENT);

    let remaining = app
        .get(
            "/api/designer-assignments?job_type=line_drawings",
            Some(&admin_token),
        )
        .await?;
    let remaining: Vec<AssignmentData> =
        serde_json::from_slice(&body_to_vec(remaining.into_body()).await?)?;
    assert!(remaining.is_empty());

    let with_inactive = app
        .get(
            "/api/designer-assignments?job_type=line_drawings&include_inactive=true",
            Some(&admin_token),
        )
        .await?;
    let with_inactive: Vec<AssignmentData> =
        serde_json::from_slice(&body_to_vec(with_inactive.into_body()).await?)?;
    assert_eq!(with_inactive.len(), 1);
    assert_eq!(with_inactive[0].job_type, "line_drawings");
    assert!(!with_inactive[0].is_active);

    app.cleanup().await?;
    Ok(())
}
