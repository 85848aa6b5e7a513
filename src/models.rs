use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = statuses)]
pub struct Status {
    pub id: Uuid,
    pub entity: String,
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = statuses)]
pub struct NewStatus {
    pub id: Uuid,
    pub entity: String,
    pub name: String,
    pub color: Option<String>,
    pub kind: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = claims)]
pub struct Claim {
    pub id: Uuid,
    pub number: String,
    pub title: String,
    pub status_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = claims)]
pub struct NewClaim {
    pub id: Uuid,
    pub number: String,
    pub title: String,
    pub status_id: Uuid,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = defects)]
pub struct Defect {
    pub id: Uuid,
    pub description: String,
    pub status_id: Uuid,
    pub brigade: Option<String>,
    pub contractor: Option<String>,
    pub fixed_at: Option<NaiveDateTime>,
    pub fixed_by: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = defects)]
pub struct NewDefect {
    pub id: Uuid,
    pub description: String,
    pub status_id: Uuid,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub status_id: Uuid,
    pub defect_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub id: Uuid,
    pub title: String,
    pub status_id: Uuid,
    pub defect_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = letters)]
pub struct Letter {
    pub id: Uuid,
    pub subject: String,
    pub number: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = letters)]
pub struct NewLetter {
    pub id: Uuid,
    pub subject: String,
    pub number: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = court_cases)]
pub struct CourtCase {
    pub id: Uuid,
    pub number: String,
    pub court: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = court_cases)]
pub struct NewCourtCase {
    pub id: Uuid,
    pub number: String,
    pub court: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = units)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = units)]
pub struct NewUnit {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = attachments)]
pub struct Attachment {
    pub id: Uuid,
    pub storage_path: String,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub id: Uuid,
    pub storage_path: String,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = claim_defects)]
pub struct NewClaimDefect {
    pub claim_id: Uuid,
    pub defect_id: Uuid,
    pub pre_trial_claim: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = claim_units)]
pub struct NewClaimUnit {
    pub claim_id: Uuid,
    pub unit_id: Uuid,
}
