use axum::extract::{Json, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewUnit, Unit};
use crate::schema::units;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct UnitResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Unit> for UnitResponse {
    fn from(unit: Unit) -> Self {
        Self {
            id: unit.id,
            name: unit.name,
        }
    }
}

pub async fn list_units(State(state): State<AppState>) -> AppResult<Json<Vec<UnitResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Unit> = units::table.order(units::name.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UnitResponse::from).collect()))
}

pub async fn create_unit(
    State(state): State<AppState>,
    Json(payload): Json<CreateUnitRequest>,
) -> AppResult<(StatusCode, Json<UnitResponse>)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let row = NewUnit {
        id: Uuid::new_v4(),
        name,
    };
    diesel::insert_into(units::table)
        .values(&row)
        .execute(&mut conn)?;

    let created: Unit = units::table.find(row.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(UnitResponse::from(created))))
}
