use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::attachments::{self, Owner};
use crate::engine::cascade;
use crate::engine::links::LinkScope;
use crate::engine::paging::{fetch_by_chunks, IN_LIST_CHUNK, PAGE_SIZE};
use crate::engine::{links, EngineError, EntityKind, StatusKind};
use crate::error::{AppError, AppResult};
use crate::models::{Claim, Defect, NewClaim, NewClaimDefect, NewClaimUnit, Status, Unit};
use crate::schema::{claim_defects, claim_links, claim_units, claims, statuses, units};
use crate::state::AppState;

use super::attachments::AttachmentResponse;
use super::statuses::StatusResponse;
use super::to_iso;
use super::units::UnitResponse;

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListQuery {
    /// Offset/limit for one base page. The limit is capped at the store
    /// page bound; anything larger would be silently truncated anyway.
    pub fn range(&self) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(50).clamp(1, PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);
        ((page - 1) * per_page, per_page)
    }
}

#[derive(Deserialize)]
pub struct CreateClaimRequest {
    pub number: String,
    pub title: String,
    pub status_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateClaimRequest {
    pub number: Option<String>,
    pub title: Option<String>,
    pub status_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ByIdsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct ClaimDefectInput {
    pub defect_id: Uuid,
    #[serde(default)]
    pub pre_trial_claim: bool,
}

#[derive(Deserialize)]
pub struct SetClaimDefectsRequest {
    pub defects: Vec<ClaimDefectInput>,
}

#[derive(Deserialize)]
pub struct SetClaimUnitsRequest {
    pub unit_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct ClaimDefectSummary {
    pub id: Uuid,
    pub description: String,
    pub status: Option<StatusResponse>,
    pub pre_trial_claim: bool,
}

#[derive(Serialize)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub number: String,
    pub title: String,
    pub status: Option<StatusResponse>,
    pub created_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub units: Vec<UnitResponse>,
    pub defects: Vec<ClaimDefectSummary>,
    pub attachments: Vec<AttachmentResponse>,
    pub parent_id: Option<Uuid>,
}

pub async fn list_claims(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<ClaimResponse>>> {
    let mut conn = state.db()?;
    let (offset, limit) = params.range();

    let base: Vec<Claim> = claims::table
        .order(claims::created_at.desc())
        .offset(offset)
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(hydrate_claims(&mut conn, base)?))
}

pub async fn claims_by_ids(
    State(state): State<AppState>,
    Json(payload): Json<ByIdsRequest>,
) -> AppResult<Json<Vec<ClaimResponse>>> {
    let mut conn = state.db()?;

    let base: Vec<Claim> = fetch_by_chunks(&payload.ids, IN_LIST_CHUNK, |chunk| {
        claims::table
            .filter(claims::id.eq_any(chunk))
            .load(&mut conn)
            .map_err(AppError::from)
    })?;

    Ok(Json(hydrate_claims(&mut conn, base)?))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
) -> AppResult<Json<ClaimResponse>> {
    let mut conn = state.db()?;
    let claim: Claim = claims::table.find(claim_id).first(&mut conn)?;
    let mut hydrated = hydrate_claims(&mut conn, vec![claim])?;
    hydrated
        .pop()
        .map(Json)
        .ok_or_else(AppError::not_found)
}

pub async fn create_claim(
    State(state): State<AppState>,
    Json(payload): Json<CreateClaimRequest>,
) -> AppResult<(StatusCode, Json<ClaimResponse>)> {
    let number = payload.number.trim().to_string();
    if number.is_empty() {
        return Err(AppError::bad_request("number must not be empty"));
    }

    let mut conn = state.db()?;
    let status_id = match payload.status_id {
        Some(id) => id,
        None => {
            crate::engine::status::require_status(&mut conn, EntityKind::Claim, StatusKind::Open)?
                .id
        }
    };

    let row = NewClaim {
        id: Uuid::new_v4(),
        number,
        title: payload.title.trim().to_string(),
        status_id,
        created_by: None,
    };
    diesel::insert_into(claims::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Claim = claims::table.find(row.id).first(&mut conn)?;
    let mut hydrated = hydrate_claims(&mut conn, vec![created])?;
    let response = hydrated.pop().ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<UpdateClaimRequest>,
) -> AppResult<Json<ClaimResponse>> {
    let mut conn = state.db()?;
    let existing: Claim = claims::table.find(claim_id).first(&mut conn)?;

    let number = payload.number.unwrap_or(existing.number);
    let title = payload.title.unwrap_or(existing.title);
    let status_id = payload.status_id.unwrap_or(existing.status_id);
    let status_changed = status_id != existing.status_id;

    diesel::update(claims::table.find(claim_id))
        .set((
            claims::number.eq(&number),
            claims::title.eq(&title),
            claims::status_id.eq(status_id),
            claims::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)?;

    // Moving a claim to a closed status closes every joined defect.
    if status_changed {
        let closed = cascade::close_dependents_for_parent(
            &mut conn,
            claim_id,
            status_id,
            EntityKind::Claim,
            EntityKind::Defect,
        )?;
        if closed > 0 {
            info!(claim_id = %claim_id, closed, "claim close cascaded to defects");
        }
    }

    let updated: Claim = claims::table.find(claim_id).first(&mut conn)?;
    let mut hydrated = hydrate_claims(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn delete_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    // Attachments go first so neither storage objects nor join rows can
    // outlive the owner.
    attachments::cascade_delete_for_owner(
        &mut conn,
        state.storage.as_ref(),
        Owner::new(EntityKind::Claim, claim_id),
    )
    .await?;

    let deleted = conn.transaction::<_, EngineError, _>(|conn| {
        diesel::delete(claim_defects::table.filter(claim_defects::claim_id.eq(claim_id)))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "defect join delete", err))?;
        diesel::delete(claim_units::table.filter(claim_units::claim_id.eq(claim_id)))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "unit join delete", err))?;
        links::unlink_all(conn, LinkScope::Claim, claim_id)?;
        diesel::delete(claims::table.find(claim_id))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "claim delete", err))
    })?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(claim_id = %claim_id, "claim deleted with cascade");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the claim's defect associations.
pub async fn set_claim_defects(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<SetClaimDefectsRequest>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    claims::table.find(claim_id).first::<Claim>(&mut conn)?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(claim_defects::table.filter(claim_defects::claim_id.eq(claim_id)))
            .execute(conn)?;

        let rows: Vec<NewClaimDefect> = payload
            .defects
            .iter()
            .map(|input| NewClaimDefect {
                claim_id,
                defect_id: input.defect_id,
                pre_trial_claim: input.pre_trial_claim,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(claim_defects::table)
                .values(&rows)
                .execute(conn)?;
        }
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the claim's unit associations.
pub async fn set_claim_units(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<SetClaimUnitsRequest>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    claims::table.find(claim_id).first::<Claim>(&mut conn)?;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(claim_units::table.filter(claim_units::claim_id.eq(claim_id)))
            .execute(conn)?;

        let rows: Vec<NewClaimUnit> = payload
            .unit_ids
            .iter()
            .map(|unit_id| NewClaimUnit {
                claim_id,
                unit_id: *unit_id,
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(claim_units::table)
                .values(&rows)
                .execute(conn)?;
        }
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Join composition for claim list views: one base page, then one chunked
/// round trip per relation, each folded into a map keyed by claim id.
fn hydrate_claims(
    conn: &mut PgConnection,
    base: Vec<Claim>,
) -> AppResult<Vec<ClaimResponse>> {
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let claim_ids: Vec<Uuid> = base.iter().map(|claim| claim.id).collect();

    let unit_rows: Vec<(Uuid, Unit)> = fetch_by_chunks(&claim_ids, IN_LIST_CHUNK, |chunk| {
        claim_units::table
            .inner_join(units::table)
            .filter(claim_units::claim_id.eq_any(chunk))
            .select((claim_units::claim_id, units::all_columns))
            .load(conn)
            .map_err(AppError::from)
    })?;
    let mut units_map: HashMap<Uuid, Vec<Unit>> = HashMap::new();
    for (claim_id, unit) in unit_rows {
        units_map.entry(claim_id).or_default().push(unit);
    }

    let defect_rows: Vec<(Uuid, bool, Defect)> =
        fetch_by_chunks(&claim_ids, IN_LIST_CHUNK, |chunk| {
            claim_defects::table
                .inner_join(crate::schema::defects::table)
                .filter(claim_defects::claim_id.eq_any(chunk))
                .select((
                    claim_defects::claim_id,
                    claim_defects::pre_trial_claim,
                    crate::schema::defects::all_columns,
                ))
                .load(conn)
                .map_err(AppError::from)
        })?;

    let attachments_map =
        attachments::load_attachments_for_owners(conn, EntityKind::Claim, &claim_ids)?;

    let parent_rows: Vec<(Uuid, Uuid)> = fetch_by_chunks(&claim_ids, IN_LIST_CHUNK, |chunk| {
        claim_links::table
            .filter(claim_links::child_id.eq_any(chunk))
            .select((claim_links::child_id, claim_links::parent_id))
            .load(conn)
            .map_err(AppError::from)
    })?;
    let parent_map: HashMap<Uuid, Uuid> = parent_rows.into_iter().collect();

    // One status fetch covers claims and their defects.
    let mut status_ids: Vec<Uuid> = base.iter().map(|claim| claim.status_id).collect();
    status_ids.extend(defect_rows.iter().map(|(_, _, defect)| defect.status_id));
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

    let mut defects_map: HashMap<Uuid, Vec<ClaimDefectSummary>> = HashMap::new();
    for (claim_id, pre_trial_claim, defect) in defect_rows {
        let status = status_map
            .get(&defect.status_id)
            .cloned()
            .map(StatusResponse::from);
        defects_map.entry(claim_id).or_default().push(ClaimDefectSummary {
            id: defect.id,
            description: defect.description,
            status,
            pre_trial_claim,
        });
    }

    let mut response = Vec::with_capacity(base.len());
    for claim in base {
        let status = status_map
            .get(&claim.status_id)
            .cloned()
            .map(StatusResponse::from);
        response.push(ClaimResponse {
            id: claim.id,
            number: claim.number,
            title: claim.title,
            status,
            created_by: claim.created_by,
            created_at: to_iso(claim.created_at),
            updated_at: to_iso(claim.updated_at),
            units: units_map
                .remove(&claim.id)
                .unwrap_or_default()
                .into_iter()
                .map(UnitResponse::from)
                .collect(),
            defects: defects_map.remove(&claim.id).unwrap_or_default(),
            attachments: attachments_map
                .get(&claim.id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(AttachmentResponse::from)
                .collect(),
            parent_id: parent_map.get(&claim.id).copied(),
        });
    }

    Ok(response)
}
