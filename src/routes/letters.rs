use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::attachments::{self, Owner};
use crate::engine::links::{self, LinkScope};
use crate::engine::{EngineError, EntityKind};
use crate::error::{AppError, AppResult};
use crate::models::{Letter, NewLetter};
use crate::schema::letters;
use crate::state::AppState;

use super::attachments::AttachmentResponse;
use super::claims::ListQuery;
use super::to_iso;

#[derive(Deserialize)]
pub struct CreateLetterRequest {
    pub subject: String,
    pub number: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
pub struct UpdateLetterRequest {
    pub subject: Option<String>,
    pub number: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct LetterResponse {
    pub id: Uuid,
    pub subject: String,
    pub number: Option<String>,
    pub sent_at: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub attachments: Vec<AttachmentResponse>,
    pub parent_id: Option<Uuid>,
}

pub async fn list_letters(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<LetterResponse>>> {
    let mut conn = state.db()?;
    let (offset, limit) = params.range();

    let base: Vec<Letter> = letters::table
        .order(letters::created_at.desc())
        .offset(offset)
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(hydrate_letters(&mut conn, base)?))
}

pub async fn get_letter(
    State(state): State<AppState>,
    Path(letter_id): Path<Uuid>,
) -> AppResult<Json<LetterResponse>> {
    let mut conn = state.db()?;
    let letter: Letter = letters::table.find(letter_id).first(&mut conn)?;
    let mut hydrated = hydrate_letters(&mut conn, vec![letter])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn create_letter(
    State(state): State<AppState>,
    Json(payload): Json<CreateLetterRequest>,
) -> AppResult<(StatusCode, Json<LetterResponse>)> {
    let subject = payload.subject.trim().to_string();
    if subject.is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }

    let mut conn = state.db()?;
    let row = NewLetter {
        id: Uuid::new_v4(),
        subject,
        number: payload.number,
        sent_at: payload.sent_at,
        created_by: None,
    };
    diesel::insert_into(letters::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Letter = letters::table.find(row.id).first(&mut conn)?;
    let mut hydrated = hydrate_letters(&mut conn, vec![created])?;
    let response = hydrated.pop().ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_letter(
    State(state): State<AppState>,
    Path(letter_id): Path<Uuid>,
    Json(payload): Json<UpdateLetterRequest>,
) -> AppResult<Json<LetterResponse>> {
    let mut conn = state.db()?;
    let existing: Letter = letters::table.find(letter_id).first(&mut conn)?;

    let subject = payload.subject.unwrap_or(existing.subject);
    let number = payload.number.or(existing.number);
    let sent_at = payload.sent_at.or(existing.sent_at);

    diesel::update(letters::table.find(letter_id))
        .set((
            letters::subject.eq(&subject),
            letters::number.eq(number.as_deref()),
            letters::sent_at.eq(sent_at),
            letters::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)?;

    let updated: Letter = letters::table.find(letter_id).first(&mut conn)?;
    let mut hydrated = hydrate_letters(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn delete_letter(
    State(state): State<AppState>,
    Path(letter_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    attachments::cascade_delete_for_owner(
        &mut conn,
        state.storage.as_ref(),
        Owner::new(EntityKind::Letter, letter_id),
    )
    .await?;

    let deleted = conn.transaction::<_, EngineError, _>(|conn| {
        links::unlink_all(conn, LinkScope::Letter, letter_id)?;
        diesel::delete(letters::table.find(letter_id))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Letter, letter_id, "letter delete", err))
    })?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(letter_id = %letter_id, "letter deleted with cascade");
    Ok(StatusCode::NO_CONTENT)
}

fn hydrate_letters(
    conn: &mut PgConnection,
    base: Vec<Letter>,
) -> AppResult<Vec<LetterResponse>> {
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let letter_ids: Vec<Uuid> = base.iter().map(|letter| letter.id).collect();
    let attachments_map =
        attachments::load_attachments_for_owners(conn, EntityKind::Letter, &letter_ids)?;

    let edges = links::list_edges(conn, LinkScope::Letter)?;
    let parent_map = links::LinkMap::from_edges(&edges);

    Ok(base
        .into_iter()
        .map(|letter| LetterResponse {
            id: letter.id,
            subject: letter.subject,
            number: letter.number,
            sent_at: letter.sent_at.map(to_iso),
            created_by: letter.created_by,
            created_at: to_iso(letter.created_at),
            updated_at: to_iso(letter.updated_at),
            attachments: attachments_map
                .get(&letter.id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(AttachmentResponse::from)
                .collect(),
            parent_id: parent_map.parent_of(letter.id),
        })
        .collect())
}
