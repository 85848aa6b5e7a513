use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::attachments::{self, Owner};
use crate::engine::cascade::{self, DefectFix};
use crate::engine::paging::{fetch_by_chunks, IN_LIST_CHUNK};
use crate::engine::{EngineError, EntityKind, StatusKind};
use crate::error::{AppError, AppResult};
use crate::models::{Defect, NewDefect, Status};
use crate::schema::{claim_defects, defects, statuses};
use crate::state::AppState;

use super::attachments::AttachmentResponse;
use super::claims::{ByIdsRequest, ListQuery};
use super::statuses::StatusResponse;
use super::to_iso;

#[derive(Deserialize)]
pub struct CreateDefectRequest {
    pub description: String,
    pub status_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateDefectRequest {
    pub description: Option<String>,
    pub status_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct FixDefectRequest {
    pub brigade: Option<String>,
    pub contractor: Option<String>,
    pub fixed_by: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DefectResponse {
    pub id: Uuid,
    pub description: String,
    pub status: Option<StatusResponse>,
    pub brigade: Option<String>,
    pub contractor: Option<String>,
    pub fixed_at: Option<String>,
    pub fixed_by: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub attachments: Vec<AttachmentResponse>,
}

pub async fn list_defects(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<DefectResponse>>> {
    let mut conn = state.db()?;
    let (offset, limit) = params.range();

    let base: Vec<Defect> = defects::table
        .order(defects::created_at.desc())
        .offset(offset)
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(hydrate_defects(&mut conn, base)?))
}

pub async fn defects_by_ids(
    State(state): State<AppState>,
    Json(payload): Json<ByIdsRequest>,
) -> AppResult<Json<Vec<DefectResponse>>> {
    let mut conn = state.db()?;

    let base: Vec<Defect> = fetch_by_chunks(&payload.ids, IN_LIST_CHUNK, |chunk| {
        defects::table
            .filter(defects::id.eq_any(chunk))
            .load(&mut conn)
            .map_err(AppError::from)
    })?;

    Ok(Json(hydrate_defects(&mut conn, base)?))
}

pub async fn get_defect(
    State(state): State<AppState>,
    Path(defect_id): Path<Uuid>,
) -> AppResult<Json<DefectResponse>> {
    let mut conn = state.db()?;
    let defect: Defect = defects::table.find(defect_id).first(&mut conn)?;
    let mut hydrated = hydrate_defects(&mut conn, vec![defect])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn create_defect(
    State(state): State<AppState>,
    Json(payload): Json<CreateDefectRequest>,
) -> AppResult<(StatusCode, Json<DefectResponse>)> {
    let description = payload.description.trim().to_string();
    if description.is_empty() {
        return Err(AppError::bad_request("description must not be empty"));
    }

    let mut conn = state.db()?;
    let status_id = match payload.status_id {
        Some(id) => id,
        None => {
            crate::engine::status::require_status(&mut conn, EntityKind::Defect, StatusKind::Open)?
                .id
        }
    };

    let row = NewDefect {
        id: Uuid::new_v4(),
        description,
        status_id,
        created_by: None,
    };
    diesel::insert_into(defects::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Defect = defects::table.find(row.id).first(&mut conn)?;
    let mut hydrated = hydrate_defects(&mut conn, vec![created])?;
    let response = hydrated.pop().ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_defect(
    State(state): State<AppState>,
    Path(defect_id): Path<Uuid>,
    Json(payload): Json<UpdateDefectRequest>,
) -> AppResult<Json<DefectResponse>> {
    let mut conn = state.db()?;
    let existing: Defect = defects::table.find(defect_id).first(&mut conn)?;

    let description = payload.description.unwrap_or(existing.description);
    let status_id = payload.status_id.unwrap_or(existing.status_id);

    diesel::update(defects::table.find(defect_id))
        .set((
            defects::description.eq(&description),
            defects::status_id.eq(status_id),
            defects::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)?;

    let updated: Defect = defects::table.find(defect_id).first(&mut conn)?;
    let mut hydrated = hydrate_defects(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn delete_defect(
    State(state): State<AppState>,
    Path(defect_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    attachments::cascade_delete_for_owner(
        &mut conn,
        state.storage.as_ref(),
        Owner::new(EntityKind::Defect, defect_id),
    )
    .await?;

    let deleted = conn.transaction::<_, EngineError, _>(|conn| {
        diesel::delete(claim_defects::table.filter(claim_defects::defect_id.eq(defect_id)))
            .execute(conn)
            .map_err(|err| {
                EngineError::store(EntityKind::Defect, defect_id, "claim join delete", err)
            })?;
        diesel::delete(defects::table.find(defect_id))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Defect, defect_id, "defect delete", err))
    })?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(defect_id = %defect_id, "defect deleted with cascade");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn fix_defect(
    State(state): State<AppState>,
    Path(defect_id): Path<Uuid>,
    Json(payload): Json<FixDefectRequest>,
) -> AppResult<Json<DefectResponse>> {
    let mut conn = state.db()?;
    cascade::fix_defect(
        &mut conn,
        defect_id,
        DefectFix {
            brigade: payload.brigade,
            contractor: payload.contractor,
            fixed_by: payload.fixed_by,
        },
    )?;

    let updated: Defect = defects::table.find(defect_id).first(&mut conn)?;
    let mut hydrated = hydrate_defects(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn cancel_defect_fix(
    State(state): State<AppState>,
    Path(defect_id): Path<Uuid>,
) -> AppResult<Json<DefectResponse>> {
    let mut conn = state.db()?;
    cascade::cancel_defect_fix(&mut conn, defect_id)?;

    let updated: Defect = defects::table.find(defect_id).first(&mut conn)?;
    let mut hydrated = hydrate_defects(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

fn hydrate_defects(
    conn: &mut PgConnection,
    base: Vec<Defect>,
) -> AppResult<Vec<DefectResponse>> {
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let defect_ids: Vec<Uuid> = base.iter().map(|defect| defect.id).collect();
    let attachments_map =
        attachments::load_attachments_for_owners(conn, EntityKind::Defect, &defect_ids)?;

    let mut status_ids: Vec<Uuid> = base.iter().map(|defect| defect.status_id).collect();
    status_ids.sort();
    status_ids.dedup();
    let status_rows: Vec<Status> = fetch_by_chunks(&status_ids, IN_LIST_CHUNK, |chunk| {
        statuses::table
            .filter(statuses::id.eq_any(chunk))
            .load(conn)
            .map_err(AppError::from)
    })?;
    let status_map: HashMap<Uuid, Status> = status_rows
        .into_iter()
        .map(|status| (status.id, status))
        .collect();

    Ok(base
        .into_iter()
        .map(|defect| {
            let status = status_map
                .get(&defect.status_id)
                .cloned()
                .map(StatusResponse::from);
            DefectResponse {
                id: defect.id,
                description: defect.description,
                status,
                brigade: defect.brigade,
                contractor: defect.contractor,
                fixed_at: defect.fixed_at.map(to_iso),
                fixed_by: defect.fixed_by,
                created_by: defect.created_by,
                created_at: to_iso(defect.created_at),
                updated_at: to_iso(defect.updated_at),
                attachments: attachments_map
                    .get(&defect.id)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(AttachmentResponse::from)
                    .collect(),
            }
        })
        .collect())
}
