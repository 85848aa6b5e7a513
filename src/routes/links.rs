use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::links::{self, LinkEdge, LinkScope};
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LinkRequest {
    pub child_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct LinkResponse {
    pub linked: usize,
}

#[derive(Serialize)]
pub struct EdgeResponse {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
}

impl From<LinkEdge> for EdgeResponse {
    fn from(edge: LinkEdge) -> Self {
        Self {
            id: edge.id,
            parent_id: edge.parent_id,
            child_id: edge.child_id,
        }
    }
}

async fn link_scope(
    state: AppState,
    scope: LinkScope,
    parent_id: Uuid,
    payload: LinkRequest,
) -> AppResult<Json<LinkResponse>> {
    let mut conn = state.db()?;
    let linked = links::link(&mut conn, scope, parent_id, &payload.child_ids)?;
    Ok(Json(LinkResponse { linked }))
}

async fn unlink_scope(state: AppState, scope: LinkScope, child_id: Uuid) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    links::unlink(&mut conn, scope, child_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_scope(state: AppState, scope: LinkScope) -> AppResult<Json<Vec<EdgeResponse>>> {
    let mut conn = state.db()?;
    let edges = links::list_edges(&mut conn, scope)?;
    Ok(Json(edges.into_iter().map(EdgeResponse::from).collect()))
}

pub async fn link_claims(
    State(state): State<AppState>,
    Path(parent_id): Path<Uuid>,
    Json(payload): Json<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    link_scope(state, LinkScope::Claim, parent_id, payload).await
}

pub async fn unlink_claim(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    unlink_scope(state, LinkScope::Claim, child_id).await
}

pub async fn list_claim_links(State(state): State<AppState>) -> AppResult<Json<Vec<EdgeResponse>>> {
    list_scope(state, LinkScope::Claim).await
}

pub async fn link_letters(
    State(state): State<AppState>,
    Path(parent_id): Path<Uuid>,
    Json(payload): Json<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    link_scope(state, LinkScope::Letter, parent_id, payload).await
}

pub async fn unlink_letter(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    unlink_scope(state, LinkScope::Letter, child_id).await
}

pub async fn list_letter_links(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<EdgeResponse>>> {
    list_scope(state, LinkScope::Letter).await
}

pub async fn link_tickets(
    State(state): State<AppState>,
    Path(parent_id): Path<Uuid>,
    Json(payload): Json<LinkRequest>,
) -> AppResult<Json<LinkResponse>> {
    link_scope(state, LinkScope::Ticket, parent_id, payload).await
}

pub async fn unlink_ticket(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    unlink_scope(state, LinkScope::Ticket, child_id).await
}

pub async fn list_ticket_links(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<EdgeResponse>>> {
    list_scope(state, LinkScope::Ticket).await
}
