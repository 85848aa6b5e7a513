mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{acquire_db_lock, json_body, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

struct StatusSet {
    claim_in_progress: Uuid,
    claim_closed: Uuid,
    ticket_closed: Uuid,
}

async fn seed_statuses(app: &TestApp) -> Result<StatusSet> {
    app.insert_status("claim", "Новая", "open").await?;
    let claim_in_progress = app.insert_status("claim", "В работе", "in_progress").await?;
    app.insert_status("claim", "На проверке", "checking").await?;
    let claim_closed = app.insert_status("claim", "Закрыта", "closed").await?;

    app.insert_status("defect", "Новый", "open").await?;
    app.insert_status("defect", "В работе", "in_progress").await?;
    app.insert_status("defect", "На проверке", "checking").await?;
    app.insert_status("defect", "Закрыт", "closed").await?;

    app.insert_status("ticket", "Новая", "open").await?;
    let ticket_closed = app.insert_status("ticket", "Закрыта", "closed").await?;

    Ok(StatusSet {
        claim_in_progress,
        claim_closed,
        ticket_closed,
    })
}

async fn create_claim(app: &TestApp, number: &str) -> Result<Uuid> {
    let response = app
        .post_json(
            "/api/claims",
            &json!({ "number": number, "title": format!("Claim {number}") }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_id(json_body(response.into_body()).await?)
}

async fn create_defect(app: &TestApp, description: &str) -> Result<Uuid> {
    let response = app
        .post_json("/api/defects", &json!({ "description": description }))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_id(json_body(response.into_body()).await?)
}

async fn attach_defects(app: &TestApp, claim_id: Uuid, defect_ids: &[Uuid]) -> Result<()> {
    let defects: Vec<Value> = defect_ids
        .iter()
        .map(|id| json!({ "defect_id": id }))
        .collect();
    let response = app
        .post_json(
            &format!("/api/claims/{claim_id}/defects"),
            &json!({ "defects": defects }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

async fn claim_status_kind(app: &TestApp, claim_id: Uuid) -> Result<String> {
    let response = app.get(&format!("/api/claims/{claim_id}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    status_kind(json_body(response.into_body()).await?)
}

async fn defect_status_kind(app: &TestApp, defect_id: Uuid) -> Result<String> {
    let response = app.get(&format!("/api/defects/{defect_id}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    status_kind(json_body(response.into_body()).await?)
}

fn extract_id(body: Value) -> Result<Uuid> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .context("response has no id")?;
    Ok(id.parse()?)
}

fn status_kind(body: Value) -> Result<String> {
    body.pointer("/status/kind")
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("response has no status kind")
}

#[tokio::test]
async fn closing_a_claim_closes_its_defects() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let statuses = seed_statuses(&app).await?;
    let claim_id = create_claim(&app, "CL-1").await?;
    let defect_a = create_defect(&app, "cracked facade").await?;
    let defect_b = create_defect(&app, "leaking roof").await?;
    attach_defects(&app, claim_id, &[defect_a, defect_b]).await?;

    // A non-closed status change leaves the defects alone.
    let response = app
        .patch_json(
            &format!("/api/claims/{claim_id}"),
            &json!({ "status_id": statuses.claim_in_progress }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(defect_status_kind(&app, defect_a).await?, "open");
    assert_eq!(defect_status_kind(&app, defect_b).await?, "open");

    let response = app
        .patch_json(
            &format!("/api/claims/{claim_id}"),
            &json!({ "status_id": statuses.claim_closed }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(defect_status_kind(&app, defect_a).await?, "closed");
    assert_eq!(defect_status_kind(&app, defect_b).await?, "closed");

    app.cleanup().await
}

#[tokio::test]
async fn claim_promotes_only_after_every_defect_is_fixed() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    seed_statuses(&app).await?;
    let claim_id = create_claim(&app, "CL-2").await?;
    let defect_a = create_defect(&app, "broken window").await?;
    let defect_b = create_defect(&app, "damp basement").await?;
    attach_defects(&app, claim_id, &[defect_a, defect_b]).await?;

    let response = app
        .post_json(
            &format!("/api/defects/{defect_a}/fix"),
            &json!({ "brigade": "north crew" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // One defect still open, so the claim stays put.
    assert_eq!(defect_status_kind(&app, defect_a).await?, "checking");
    assert_eq!(claim_status_kind(&app, claim_id).await?, "open");

    let response = app
        .post_json(&format!("/api/defects/{defect_b}/fix"), &json!({}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(claim_status_kind(&app, claim_id).await?, "checking");

    app.cleanup().await
}

#[tokio::test]
async fn cancelling_a_fix_demotes_the_checking_claim() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    seed_statuses(&app).await?;
    let claim_id = create_claim(&app, "CL-3").await?;
    let defect_id = create_defect(&app, "uneven floor").await?;
    attach_defects(&app, claim_id, &[defect_id]).await?;

    let response = app
        .post_json(&format!("/api/defects/{defect_id}/fix"), &json!({}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(claim_status_kind(&app, claim_id).await?, "checking");

    let response = app.delete(&format!("/api/defects/{defect_id}/fix")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(defect_status_kind(&app, defect_id).await?, "in_progress");
    assert_eq!(claim_status_kind(&app, claim_id).await?, "in_progress");

    app.cleanup().await
}

#[tokio::test]
async fn closing_a_ticket_closes_its_defects_and_completes_claims() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let statuses = seed_statuses(&app).await?;
    let claim_id = create_claim(&app, "CL-4").await?;
    let defect_a = create_defect(&app, "missing insulation").await?;
    let defect_b = create_defect(&app, "loose railing").await?;
    attach_defects(&app, claim_id, &[defect_a, defect_b]).await?;

    let response = app
        .post_json(
            "/api/tickets",
            &json!({ "title": "remediation run", "defect_ids": [defect_a, defect_b] }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let ticket_id = extract_id(json_body(response.into_body()).await?)?;

    let response = app
        .patch_json(
            &format!("/api/tickets/{ticket_id}"),
            &json!({ "status_id": statuses.ticket_closed }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(defect_status_kind(&app, defect_a).await?, "closed");
    assert_eq!(defect_status_kind(&app, defect_b).await?, "closed");
    assert_eq!(claim_status_kind(&app, claim_id).await?, "checking");

    app.cleanup().await
}

#[tokio::test]
async fn fixing_a_shared_defect_promotes_only_the_complete_claim() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    seed_statuses(&app).await?;
    let claim_one = create_claim(&app, "CL-7").await?;
    let claim_two = create_claim(&app, "CL-8").await?;
    let shared = create_defect(&app, "shared settling crack").await?;
    let extra = create_defect(&app, "open drainage issue").await?;
    attach_defects(&app, claim_one, &[shared, extra]).await?;
    attach_defects(&app, claim_two, &[shared]).await?;

    let response = app
        .post_json(&format!("/api/defects/{shared}/fix"), &json!({}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(claim_status_kind(&app, claim_two).await?, "checking");
    assert_eq!(claim_status_kind(&app, claim_one).await?, "open");

    app.cleanup().await
}

#[tokio::test]
async fn claim_without_defects_is_never_auto_promoted() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    seed_statuses(&app).await?;
    let bare_claim = create_claim(&app, "CL-5").await?;
    let other_claim = create_claim(&app, "CL-6").await?;
    let defect_id = create_defect(&app, "peeling paint").await?;
    attach_defects(&app, other_claim, &[defect_id]).await?;

    let response = app
        .post_json(&format!("/api/defects/{defect_id}/fix"), &json!({}))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(claim_status_kind(&app, other_claim).await?, "checking");
    assert_eq!(claim_status_kind(&app, bare_claim).await?, "open");

    app.cleanup().await
}
