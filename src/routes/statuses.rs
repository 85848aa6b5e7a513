use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{EntityKind, StatusKind};
use crate::error::{AppError, AppResult};
use crate::models::{NewStatus, Status};
use crate::schema::statuses;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusListQuery {
    pub entity: Option<EntityKind>,
}

#[derive(Deserialize)]
pub struct CreateStatusRequest {
    pub entity: EntityKind,
    pub name: String,
    pub color: Option<String>,
    /// Explicit semantic kind. When absent it is derived from the display
    /// name once, at creation; cascades only ever read the stored kind.
    pub kind: Option<StatusKind>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub entity: String,
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
}

impl From<Status> for StatusResponse {
    fn from(status: Status) -> Self {
        Self {
            id: status.id,
            entity: status.entity,
            name: status.name,
            color: status.color,
            kind: status.kind,
        }
    }
}

pub async fn list_statuses(
    State(state): State<AppState>,
    Query(params): Query<StatusListQuery>,
) -> AppResult<Json<Vec<StatusResponse>>> {
    let mut conn = state.db()?;

    let mut query = statuses::table.into_boxed();
    if let Some(entity) = params.entity {
        query = query.filter(statuses::entity.eq(entity.as_str()));
    }

    let rows: Vec<Status> = query.order(statuses::created_at.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(StatusResponse::from).collect()))
}

pub async fn create_status(
    State(state): State<AppState>,
    Json(payload): Json<CreateStatusRequest>,
) -> AppResult<(StatusCode, Json<StatusResponse>)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let kind = match payload.kind {
        Some(kind) => kind,
        None => StatusKind::from_display_name(&name).ok_or_else(|| {
            AppError::bad_request(format!(
                "cannot derive a status kind from \"{name}\"; pass kind explicitly"
            ))
        })?,
    };

    let mut conn = state.db()?;
    let row = NewStatus {
        id: Uuid::new_v4(),
        entity: payload.entity.as_str().to_string(),
        name,
        color: payload.color,
        kind: kind.as_str().to_string(),
    };
    diesel::insert_into(statuses::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Status = statuses::table.find(row.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(StatusResponse::from(created))))
}
