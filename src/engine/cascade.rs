//! Status cascades between related records.
//!
//! A claim's status is a pure function of its joined defects: once every
//! defect is checking or closed the claim moves to checking, and when a
//! fix is withdrawn the claim falls back to in-progress. The completion
//! state is recomputed from scratch on every fix/unfix event rather than
//! tracked incrementally, so a missed event cannot leave a stale counter
//! behind. Each public operation runs inside one transaction.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::paging::{fetch_by_chunks, IN_LIST_CHUNK};
use crate::engine::status::{self, EntityKind, StatusKind};
use crate::models::Ticket;
use crate::schema::{claim_defects, claims, defects, statuses, tickets};

#[derive(Debug, Clone, Default)]
pub struct DefectFix {
    pub brigade: Option<String>,
    pub contractor: Option<String>,
    pub fixed_by: Option<Uuid>,
}

/// When a parent record moves to a closed status, closes every child
/// joined to it. A non-closed status, or a child kind with no closed
/// status configured, makes this a no-op. Parent/child pairs without a
/// join relation affect nothing.
pub fn close_dependents_for_parent(
    conn: &mut PgConnection,
    parent_id: Uuid,
    new_status_id: Uuid,
    parent_kind: EntityKind,
    child_kind: EntityKind,
) -> EngineResult<usize> {
    conn.transaction(|conn| {
        let new_status = status::load_status(conn, parent_kind, new_status_id)?;
        if StatusKind::parse(&new_status.kind) != Some(StatusKind::Closed) {
            return Ok(0);
        }

        let Some(closed_child) = status::find_status(conn, child_kind, StatusKind::Closed)? else {
            debug!(
                parent_kind = %parent_kind,
                child_kind = %child_kind,
                "no closed status for child kind, skipping dependent close"
            );
            return Ok(0);
        };

        let child_ids: Vec<Uuid> = match (parent_kind, child_kind) {
            (EntityKind::Claim, EntityKind::Defect) => claim_defects::table
                .filter(claim_defects::claim_id.eq(parent_id))
                .select(claim_defects::defect_id)
                .load(conn)
                .map_err(|err| {
                    EngineError::store(parent_kind, parent_id, "dependent lookup", err)
                })?,
            (EntityKind::Ticket, EntityKind::Defect) => {
                load_ticket(conn, parent_id)?.defect_ids
            }
            _ => Vec::new(),
        };

        if child_ids.is_empty() {
            return Ok(0);
        }

        let updated = diesel::update(defects::table.filter(defects::id.eq_any(&child_ids)))
            .set((
                defects::status_id.eq(closed_child.id),
                defects::updated_at.eq(now()),
            ))
            .execute(conn)
            .map_err(|err| EngineError::store(parent_kind, parent_id, "dependent close", err))?;

        info!(
            parent_kind = %parent_kind,
            parent_id = %parent_id,
            closed = updated,
            "dependents closed with parent"
        );
        Ok(updated)
    })
}

/// Records a remediation and moves the defect to checking, then promotes
/// every referencing claim whose defects are now all complete.
pub fn fix_defect(conn: &mut PgConnection, defect_id: Uuid, fix: DefectFix) -> EngineResult<()> {
    conn.transaction(|conn| {
        let checking = status::require_status(conn, EntityKind::Defect, StatusKind::Checking)?;

        let updated = diesel::update(defects::table.find(defect_id))
            .set((
                defects::brigade.eq(fix.brigade),
                defects::contractor.eq(fix.contractor),
                defects::fixed_at.eq(Some(now())),
                defects::fixed_by.eq(fix.fixed_by),
                defects::status_id.eq(checking.id),
                defects::updated_at.eq(now()),
            ))
            .execute(conn)
            .map_err(|err| EngineError::store(EntityKind::Defect, defect_id, "defect fix", err))?;
        if updated == 0 {
            return Err(EngineError::not_found(EntityKind::Defect, defect_id));
        }

        reevaluate_claims_of_defect(conn, defect_id)
    })
}

/// Withdraws a remediation: clears the fix fields, reverts the defect to
/// in-progress, and demotes any referencing claim that is no longer fully
/// complete.
pub fn cancel_defect_fix(conn: &mut PgConnection, defect_id: Uuid) -> EngineResult<()> {
    conn.transaction(|conn| {
        let in_progress =
            status::require_status(conn, EntityKind::Defect, StatusKind::InProgress)?;

        let updated = diesel::update(defects::table.find(defect_id))
            .set((
                defects::brigade.eq(None::<String>),
                defects::contractor.eq(None::<String>),
                defects::fixed_at.eq(None::<NaiveDateTime>),
                defects::fixed_by.eq(None::<Uuid>),
                defects::status_id.eq(in_progress.id),
                defects::updated_at.eq(now()),
            ))
            .execute(conn)
            .map_err(|err| {
                EngineError::store(EntityKind::Defect, defect_id, "defect fix cancel", err)
            })?;
        if updated == 0 {
            return Err(EngineError::not_found(EntityKind::Defect, defect_id));
        }

        reevaluate_claims_of_defect(conn, defect_id)
    })
}

/// When a ticket moves to a closed status, closes every defect in its
/// embedded defect-id array.
pub fn cascade_ticket_close(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    new_status_id: Uuid,
) -> EngineResult<usize> {
    conn.transaction(|conn| {
        let new_status = status::load_status(conn, EntityKind::Ticket, new_status_id)?;
        if StatusKind::parse(&new_status.kind) != Some(StatusKind::Closed) {
            return Ok(0);
        }

        let ticket = load_ticket(conn, ticket_id)?;
        if ticket.defect_ids.is_empty() {
            return Ok(0);
        }

        let closed = status::require_status(conn, EntityKind::Defect, StatusKind::Closed)?;
        let updated =
            diesel::update(defects::table.filter(defects::id.eq_any(&ticket.defect_ids)))
                .set((
                    defects::status_id.eq(closed.id),
                    defects::updated_at.eq(now()),
                ))
                .execute(conn)
                .map_err(|err| {
                    EngineError::store(EntityKind::Ticket, ticket_id, "ticket defect close", err)
                })?;

        // Closing defects can complete their claims too.
        let mut claim_ids: Vec<Uuid> =
            fetch_by_chunks(&ticket.defect_ids, IN_LIST_CHUNK, |chunk| {
                claim_defects::table
                    .filter(claim_defects::defect_id.eq_any(chunk))
                    .select(claim_defects::claim_id)
                    .load(conn)
                    .map_err(|err| {
                        EngineError::store(EntityKind::Ticket, ticket_id, "claim scan", err)
                    })
            })?;
        claim_ids.sort();
        claim_ids.dedup();
        for claim_id in claim_ids {
            reevaluate_claim(conn, claim_id)?;
        }

        info!(ticket_id = %ticket_id, closed = updated, "ticket close cascaded to defects");
        Ok(updated)
    })
}

/// Full re-scan of every claim joined to the defect. Promotes complete
/// claims to checking and demotes claims sitting at checking that are no
/// longer complete.
fn reevaluate_claims_of_defect(conn: &mut PgConnection, defect_id: Uuid) -> EngineResult<()> {
    let claim_ids: Vec<Uuid> = claim_defects::table
        .filter(claim_defects::defect_id.eq(defect_id))
        .select(claim_defects::claim_id)
        .load(conn)
        .map_err(|err| EngineError::store(EntityKind::Defect, defect_id, "claim scan", err))?;

    for claim_id in claim_ids {
        reevaluate_claim(conn, claim_id)?;
    }
    Ok(())
}

fn reevaluate_claim(conn: &mut PgConnection, claim_id: Uuid) -> EngineResult<()> {
    let defect_ids: Vec<Uuid> = claim_defects::table
        .filter(claim_defects::claim_id.eq(claim_id))
        .select(claim_defects::defect_id)
        .load(conn)
        .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "defect list scan", err))?;

    // A claim with no joined defects is never auto-promoted; the vacuous
    // "all complete" would otherwise promote it on any unrelated re-scan.
    if defect_ids.is_empty() {
        return Ok(());
    }

    let kinds: Vec<String> = fetch_by_chunks(&defect_ids, IN_LIST_CHUNK, |chunk| {
        defects::table
            .inner_join(statuses::table)
            .filter(defects::id.eq_any(chunk))
            .select(statuses::kind)
            .load(conn)
            .map_err(|err| {
                EngineError::store(EntityKind::Claim, claim_id, "defect status scan", err)
            })
    })?;

    let all_complete = kinds
        .iter()
        .all(|kind| StatusKind::parse(kind).is_some_and(StatusKind::is_complete));

    let current_kind: String = claims::table
        .inner_join(statuses::table)
        .filter(claims::id.eq(claim_id))
        .select(statuses::kind)
        .first(conn)
        .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "claim status load", err))?;

    if all_complete {
        let checking = status::require_status(conn, EntityKind::Claim, StatusKind::Checking)?;
        if current_kind != StatusKind::Checking.as_str() {
            set_claim_status(conn, claim_id, checking.id)?;
            info!(claim_id = %claim_id, "claim promoted to checking");
        }
    } else if current_kind == StatusKind::Checking.as_str() {
        let in_progress = status::require_status(conn, EntityKind::Claim, StatusKind::InProgress)?;
        set_claim_status(conn, claim_id, in_progress.id)?;
        info!(claim_id = %claim_id, "claim demoted to in-progress");
    }

    Ok(())
}

fn set_claim_status(conn: &mut PgConnection, claim_id: Uuid, status_id: Uuid) -> EngineResult<()> {
    diesel::update(claims::table.find(claim_id))
        .set((claims::status_id.eq(status_id), claims::updated_at.eq(now())))
        .execute(conn)
        .map_err(|err| EngineError::store(EntityKind::Claim, claim_id, "claim status update", err))?;
    Ok(())
}

fn load_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> EngineResult<Ticket> {
    tickets::table
        .find(ticket_id)
        .first::<Ticket>(conn)
        .optional()
        .map_err(|err| EngineError::store(EntityKind::Ticket, ticket_id, "ticket load", err))?
        .ok_or(EngineError::not_found(EntityKind::Ticket, ticket_id))
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
