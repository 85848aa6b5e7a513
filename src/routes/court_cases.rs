use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::attachments::{self, Owner};
use crate::engine::EntityKind;
use crate::error::{AppError, AppResult};
use crate::models::{CourtCase, NewCourtCase};
use crate::schema::court_cases;
use crate::state::AppState;

use super::attachments::AttachmentResponse;
use super::claims::ListQuery;
use super::to_iso;

#[derive(Deserialize)]
pub struct CreateCourtCaseRequest {
    pub number: String,
    pub court: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCourtCaseRequest {
    pub number: Option<String>,
    pub court: Option<String>,
}

#[derive(Serialize)]
pub struct CourtCaseResponse {
    pub id: Uuid,
    pub number: String,
    pub court: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub attachments: Vec<AttachmentResponse>,
}

pub async fn list_court_cases(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<CourtCaseResponse>>> {
    let mut conn = state.db()?;
    let (offset, limit) = params.range();

    let base: Vec<CourtCase> = court_cases::table
        .order(court_cases::created_at.desc())
        .offset(offset)
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(hydrate_court_cases(&mut conn, base)?))
}

pub async fn get_court_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> AppResult<Json<CourtCaseResponse>> {
    let mut conn = state.db()?;
    let case: CourtCase = court_cases::table.find(case_id).first(&mut conn)?;
    let mut hydrated = hydrate_court_cases(&mut conn, vec![case])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn create_court_case(
    State(state): State<AppState>,
    Json(payload): Json<CreateCourtCaseRequest>,
) -> AppResult<(StatusCode, Json<CourtCaseResponse>)> {
    let number = payload.number.trim().to_string();
    if number.is_empty() {
        return Err(AppError::bad_request("number must not be empty"));
    }

    let mut conn = state.db()?;
    let row = NewCourtCase {
        id: Uuid::new_v4(),
        number,
        court: payload.court,
        created_by: None,
    };
    diesel::insert_into(court_cases::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: CourtCase = court_cases::table.find(row.id).first(&mut conn)?;
    let mut hydrated = hydrate_court_cases(&mut conn, vec![created])?;
    let response = hydrated.pop().ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_court_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(payload): Json<UpdateCourtCaseRequest>,
) -> AppResult<Json<CourtCaseResponse>> {
    let mut conn = state.db()?;
    let existing: CourtCase = court_cases::table.find(case_id).first(&mut conn)?;

    let number = payload.number.unwrap_or(existing.number);
    let court = payload.court.or(existing.court);

    diesel::update(court_cases::table.find(case_id))
        .set((
            court_cases::number.eq(&number),
            court_cases::court.eq(court.as_deref()),
            court_cases::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)?;

    let updated: CourtCase = court_cases::table.find(case_id).first(&mut conn)?;
    let mut hydrated = hydrate_court_cases(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn delete_court_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    attachments::cascade_delete_for_owner(
        &mut conn,
        state.storage.as_ref(),
        Owner::new(EntityKind::CourtCase, case_id),
    )
    .await?;

    let deleted = diesel::delete(court_cases::table.find(case_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(case_id = %case_id, "court case deleted with cascade");
    Ok(StatusCode::NO_CONTENT)
}

fn hydrate_court_cases(
    conn: &mut PgConnection,
    base: Vec<CourtCase>,
) -> AppResult<Vec<CourtCaseResponse>> {
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let case_ids: Vec<Uuid> = base.iter().map(|case| case.id).collect();
    let attachments_map =
        attachments::load_attachments_for_owners(conn, EntityKind::CourtCase, &case_ids)?;

    Ok(base
        .into_iter()
        .map(|case| CourtCaseResponse {
            id: case.id,
            number: case.number,
            court: case.court,
            created_by: case.created_by,
            created_at: to_iso(case.created_at),
            updated_at: to_iso(case.updated_at),
            attachments: attachments_map
                .get(&case.id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(AttachmentResponse::from)
                .collect(),
        })
        .collect())
}
