use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::attachments::{self, Owner};
use crate::engine::cascade;
use crate::engine::links::{self, LinkScope};
use crate::engine::paging::{fetch_by_chunks, IN_LIST_CHUNK};
use crate::engine::{EngineError, EntityKind, StatusKind};
use crate::error::{AppError, AppResult};
use crate::models::{NewTicket, Status, Ticket};
use crate::schema::{statuses, tickets};
use crate::state::AppState;

use super::attachments::AttachmentResponse;
use super::claims::ListQuery;
use super::statuses::StatusResponse;
use super::to_iso;

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub status_id: Option<Uuid>,
    #[serde(default)]
    pub defect_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub status_id: Option<Uuid>,
    pub defect_ids: Option<Vec<Uuid>>,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub status: Option<StatusResponse>,
    pub defect_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub attachments: Vec<AttachmentResponse>,
    pub parent_id: Option<Uuid>,
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<TicketResponse>>> {
    let mut conn = state.db()?;
    let (offset, limit) = params.range();

    let base: Vec<Ticket> = tickets::table
        .order(tickets::created_at.desc())
        .offset(offset)
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(hydrate_tickets(&mut conn, base)?))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> AppResult<Json<TicketResponse>> {
    let mut conn = state.db()?;
    let ticket: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;
    let mut hydrated = hydrate_tickets(&mut conn, vec![ticket])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn create_ticket(
    State(state): State<AppState>,
    Json(payload): Json<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<TicketResponse>)> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let mut conn = state.db()?;
    let status_id = match payload.status_id {
        Some(id) => id,
        None => {
            crate::engine::status::require_status(&mut conn, EntityKind::Ticket, StatusKind::Open)?
                .id
        }
    };

    let row = NewTicket {
        id: Uuid::new_v4(),
        title,
        status_id,
        defect_ids: payload.defect_ids,
        created_by: None,
    };
    diesel::insert_into(tickets::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Ticket = tickets::table.find(row.id).first(&mut conn)?;
    let mut hydrated = hydrate_tickets(&mut conn, vec![created])?;
    let response = hydrated.pop().ok_or_else(AppError::not_found)?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<UpdateTicketRequest>,
) -> AppResult<Json<TicketResponse>> {
    let mut conn = state.db()?;
    let existing: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;

    let title = payload.title.unwrap_or(existing.title);
    let status_id = payload.status_id.unwrap_or(existing.status_id);
    let defect_ids = payload.defect_ids.unwrap_or(existing.defect_ids);
    let status_changed = status_id != existing.status_id;

    diesel::update(tickets::table.find(ticket_id))
        .set((
            tickets::title.eq(&title),
            tickets::status_id.eq(status_id),
            tickets::defect_ids.eq(&defect_ids[..]),
            tickets::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)?;

    if status_changed {
        let closed = cascade::cascade_ticket_close(&mut conn, ticket_id, status_id)?;
        if closed > 0 {
            info!(ticket_id = %ticket_id, closed, "ticket close cascaded to defects");
        }
    }

    let updated: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;
    let mut hydrated = hydrate_tickets(&mut conn, vec![updated])?;
    hydrated.pop().map(Json).ok_or_else(AppError::not_found)
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    attachments::cascade_delete_for_owner(
        &mut conn,
        state.storage.as_ref(),
        Owner::new(EntityKind::Ticket, ticket_id),
    )
    .await?;

    let deleted = conn.transaction::<_, EngineError, _>(|conn| {
        links::unlink_all(conn, LinkScope::Ticket, ticket_id)?;
        diesel::delete(tickets::table.find(ticket_id))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Ticket, ticket_id, "ticket delete", err))
    })?;

    if deleted == 0 {
        return Err(AppError::not_found());
    }

    info!(ticket_id = %ticket_id, "ticket deleted with cascade");
    Ok(StatusCode::NO_CONTENT)
}

fn hydrate_tickets(
    conn: &mut PgConnection,
    base: Vec<Ticket>,
) -> AppResult<Vec<TicketResponse>> {
    if base.is_empty() {
        return Ok(Vec::new());
    }

    let ticket_ids: Vec<Uuid> = base.iter().map(|ticket| ticket.id).collect();
    let attachments_map =
        attachments::load_attachments_for_owners(conn, EntityKind::Ticket, &ticket_ids)?;

    let edges = links::list_edges(conn, LinkScope::Ticket)?;
    let parent_map = links::LinkMap::from_edges(&edges);

    let mut status_ids: Vec<Uuid> = base.iter().map(|ticket| ticket.status_id).collect();
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
        .map(|ticket| {
            let status = status_map
                .get(&ticket.status_id)
                .cloned()
                .map(StatusResponse::from);
            TicketResponse {
                id: ticket.id,
                title: ticket.title,
                status,
                defect_ids: ticket.defect_ids,
                created_by: ticket.created_by,
                created_at: to_iso(ticket.created_at),
                updated_at: to_iso(ticket.updated_at),
                attachments: attachments_map
                    .get(&ticket.id)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(AttachmentResponse::from)
                    .collect(),
                parent_id: parent_map.parent_of(ticket.id),
            }
        })
        .collect())
}
