//! Attachment lifecycle: binary objects shared by five owner kinds.
//!
//! The store has no constraint tying an attachment row to its owner
//! joins, so the pairing is enforced by construction here: the row and
//! its joins are written in one transaction, and removed in one
//! transaction, with the physical delete issued first so a partial
//! failure leaves re-runnable rows instead of leaked objects.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::paging::{fetch_by_chunks, fetch_paged, IN_LIST_CHUNK, PAGE_SIZE};
use crate::engine::status::EntityKind;
use crate::models::{Attachment, NewAttachment};
use crate::schema::{
    attachments, claim_attachments, court_case_attachments, defect_attachments,
    letter_attachments, ticket_attachments,
};
use crate::storage::{ObjectStorage, StorageError};
use crate::utils::slug::slugify_filename;

pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60);

/// The record an attachment operation is bound to.
#[derive(Debug, Clone, Copy)]
pub struct Owner {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl Owner {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug)]
pub struct NewUpload {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub description: Option<String>,
}

/// Collision-resistant object key: owner prefix, millisecond stamp,
/// transliterated filename.
pub fn storage_key(owner: Owner, original_name: &str, stamp_millis: i64) -> String {
    format!(
        "{}/{}/{}_{}",
        owner.kind.as_str(),
        owner.id,
        stamp_millis,
        slugify_filename(original_name)
    )
}

/// Uploads each file and records it against the owner. Bytes go to the
/// binary store first; the attachment rows and owner joins land together
/// in one transaction only after every upload succeeded.
pub async fn add_attachments(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    owner: Owner,
    uploads: Vec<NewUpload>,
    created_by: Option<Uuid>,
) -> EngineResult<Vec<Attachment>> {
    if uploads.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let stamp = Utc::now().timestamp_millis();
        let key = storage_key(owner, &upload.original_name, stamp);
        storage
            .put_object(&key, upload.bytes, upload.mime_type.clone())
            .await
            .map_err(|err| storage_error("attachment upload", err))?;

        rows.push(NewAttachment {
            id: Uuid::new_v4(),
            storage_path: key,
            original_name: upload.original_name,
            mime_type: upload.mime_type,
            description: upload.description,
            created_by,
        });
    }

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let created = conn.transaction::<_, EngineError, _>(|conn| {
        diesel::insert_into(attachments::table)
            .values(&rows)
            .execute(conn)
            .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment insert", err))?;

        insert_owner_joins(conn, owner, &ids)
            .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment join insert", err))?;

        attachments::table
            .filter(attachments::id.eq_any(&ids))
            .order(attachments::created_at.asc())
            .load::<Attachment>(conn)
            .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment reload", err))
    })?;

    info!(
        owner_kind = %owner.kind,
        owner_id = %owner.id,
        count = created.len(),
        "attachments added"
    );
    Ok(created)
}

/// Removes the given attachments from an owner: one batched physical
/// delete, then rows and joins in one transaction. Ids that resolve to no
/// row are skipped. An empty id list issues no store call at all.
pub async fn remove_attachments(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    owner: Owner,
    attachment_ids: &[Uuid],
) -> EngineResult<usize> {
    if attachment_ids.is_empty() {
        return Ok(0);
    }

    let resolved: Vec<(Uuid, String)> =
        fetch_by_chunks(attachment_ids, IN_LIST_CHUNK, |chunk| {
            attachments::table
                .filter(attachments::id.eq_any(chunk))
                .select((attachments::id, attachments::storage_path))
                .load(conn)
                .map_err(|err| {
                    EngineError::store(owner.kind, owner.id, "attachment path lookup", err)
                })
        })?;

    let keys: Vec<String> = resolved.iter().map(|(_, path)| path.clone()).collect();
    if !keys.is_empty() {
        storage
            .delete_objects(&keys)
            .await
            .map_err(|err| storage_error("attachment object delete", err))?;
    }

    let resolved_ids: Vec<Uuid> = resolved.into_iter().map(|(id, _)| id).collect();
    let removed = conn.transaction::<_, EngineError, _>(|conn| {
        delete_owner_joins(conn, owner, attachment_ids)
            .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment join delete", err))?;

        diesel::delete(attachments::table.filter(attachments::id.eq_any(&resolved_ids)))
            .execute(conn)
            .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment row delete", err))
    })?;

    info!(
        owner_kind = %owner.kind,
        owner_id = %owner.id,
        removed,
        "attachments removed"
    );
    Ok(removed)
}

/// Deletes every attachment joined to the owner. Runs before the owner
/// row itself is deleted so no storage object or join row is left behind.
pub async fn cascade_delete_for_owner(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    owner: Owner,
) -> EngineResult<usize> {
    let ids = attachment_ids_for_owner(conn, owner)?;
    remove_attachments(conn, storage, owner, &ids).await
}

pub async fn signed_url(
    storage: &dyn ObjectStorage,
    path: &str,
    download_name: Option<&str>,
) -> EngineResult<String> {
    storage
        .presign_get_object(path, SIGNED_URL_TTL, download_name)
        .await
        .map_err(|err| storage_error("signed URL", err))
}

/// Preview token. Never forces a download filename.
pub async fn preview_url(storage: &dyn ObjectStorage, path: &str) -> EngineResult<String> {
    storage
        .presign_get_object(path, SIGNED_URL_TTL, None)
        .await
        .map_err(|err| storage_error("preview URL", err))
}

/// Updates only the free-text description.
pub fn update_description(
    conn: &mut PgConnection,
    attachment_id: Uuid,
    description: Option<String>,
) -> EngineResult<Attachment> {
    let updated = diesel::update(attachments::table.find(attachment_id))
        .set(attachments::description.eq(description))
        .execute(conn)
        .map_err(|err| EngineError::store_step("attachment description update", err))?;
    if updated == 0 {
        return Err(EngineError::NotFound {
            kind: "attachment",
            id: attachment_id,
        });
    }

    attachments::table
        .find(attachment_id)
        .first::<Attachment>(conn)
        .map_err(|err| EngineError::store_step("attachment reload", err))
}

pub fn load_attachment(conn: &mut PgConnection, attachment_id: Uuid) -> EngineResult<Attachment> {
    attachments::table
        .find(attachment_id)
        .first::<Attachment>(conn)
        .optional()
        .map_err(|err| EngineError::store_step("attachment load", err))?
        .ok_or(EngineError::NotFound {
            kind: "attachment",
            id: attachment_id,
        })
}

/// Every attachment id joined to the owner, fetched page by page.
pub fn attachment_ids_for_owner(conn: &mut PgConnection, owner: Owner) -> EngineResult<Vec<Uuid>> {
    fetch_paged(PAGE_SIZE, |offset, limit| {
        match owner.kind {
            EntityKind::Claim => claim_attachments::table
                .filter(claim_attachments::claim_id.eq(owner.id))
                .select(claim_attachments::attachment_id)
                .order(claim_attachments::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            EntityKind::Defect => defect_attachments::table
                .filter(defect_attachments::defect_id.eq(owner.id))
                .select(defect_attachments::attachment_id)
                .order(defect_attachments::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            EntityKind::Ticket => ticket_attachments::table
                .filter(ticket_attachments::ticket_id.eq(owner.id))
                .select(ticket_attachments::attachment_id)
                .order(ticket_attachments::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            EntityKind::Letter => letter_attachments::table
                .filter(letter_attachments::letter_id.eq(owner.id))
                .select(letter_attachments::attachment_id)
                .order(letter_attachments::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            EntityKind::CourtCase => court_case_attachments::table
                .filter(court_case_attachments::court_case_id.eq(owner.id))
                .select(court_case_attachments::attachment_id)
                .order(court_case_attachments::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
        }
        .map_err(|err| EngineError::store(owner.kind, owner.id, "attachment join scan", err))
    })
}

/// Join-composition helper for list views: one chunked round trip, a map
/// from owner id to its attachments.
pub fn load_attachments_for_owners(
    conn: &mut PgConnection,
    kind: EntityKind,
    owner_ids: &[Uuid],
) -> EngineResult<HashMap<Uuid, Vec<Attachment>>> {
    let rows: Vec<(Uuid, Attachment)> = fetch_by_chunks(owner_ids, IN_LIST_CHUNK, |chunk| {
        match kind {
            EntityKind::Claim => claim_attachments::table
                .inner_join(attachments::table)
                .filter(claim_attachments::claim_id.eq_any(chunk))
                .select((claim_attachments::claim_id, attachments::all_columns))
                .load(conn),
            EntityKind::Defect => defect_attachments::table
                .inner_join(attachments::table)
                .filter(defect_attachments::defect_id.eq_any(chunk))
                .select((defect_attachments::defect_id, attachments::all_columns))
                .load(conn),
            EntityKind::Ticket => ticket_attachments::table
                .inner_join(attachments::table)
                .filter(ticket_attachments::ticket_id.eq_any(chunk))
                .select((ticket_attachments::ticket_id, attachments::all_columns))
                .load(conn),
            EntityKind::Letter => letter_attachments::table
                .inner_join(attachments::table)
                .filter(letter_attachments::letter_id.eq_any(chunk))
                .select((letter_attachments::letter_id, attachments::all_columns))
                .load(conn),
            EntityKind::CourtCase => court_case_attachments::table
                .inner_join(attachments::table)
                .filter(court_case_attachments::court_case_id.eq_any(chunk))
                .select((
                    court_case_attachments::court_case_id,
                    attachments::all_columns,
                ))
                .load(conn),
        }
        .map_err(|err| EngineError::store_step("attachment hydration", err))
    })?;

    let mut map: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
    for (owner_id, attachment) in rows {
        map.entry(owner_id).or_default().push(attachment);
    }
    Ok(map)
}

fn insert_owner_joins(
    conn: &mut PgConnection,
    owner: Owner,
    attachment_ids: &[Uuid],
) -> QueryResult<usize> {
    match owner.kind {
        EntityKind::Claim => {
            let rows: Vec<_> = attachment_ids
                .iter()
                .map(|id| {
                    (
                        claim_attachments::claim_id.eq(owner.id),
                        claim_attachments::attachment_id.eq(*id),
                    )
                })
                .collect();
            diesel::insert_into(claim_attachments::table)
                .values(&rows)
                .execute(conn)
        }
        EntityKind::Defect => {
            let rows: Vec<_> = attachment_ids
                .iter()
                .map(|id| {
                    (
                        defect_attachments::defect_id.eq(owner.id),
                        defect_attachments::attachment_id.eq(*id),
                    )
                })
                .collect();
            diesel::insert_into(defect_attachments::table)
                .values(&rows)
                .execute(conn)
        }
        EntityKind::Ticket => {
            let rows: Vec<_> = attachment_ids
                .iter()
                .map(|id| {
                    (
                        ticket_attachments::ticket_id.eq(owner.id),
                        ticket_attachments::attachment_id.eq(*id),
                    )
                })
                .collect();
            diesel::insert_into(ticket_attachments::table)
                .values(&rows)
                .execute(conn)
        }
        EntityKind::Letter => {
            let rows: Vec<_> = attachment_ids
                .iter()
                .map(|id| {
                    (
                        letter_attachments::letter_id.eq(owner.id),
                        letter_attachments::attachment_id.eq(*id),
                    )
                })
                .collect();
            diesel::insert_into(letter_attachments::table)
                .values(&rows)
                .execute(conn)
        }
        EntityKind::CourtCase => {
            let rows: Vec<_> = attachment_ids
                .iter()
                .map(|id| {
                    (
                        court_case_attachments::court_case_id.eq(owner.id),
                        court_case_attachments::attachment_id.eq(*id),
                    )
                })
                .collect();
            diesel::insert_into(court_case_attachments::table)
                .values(&rows)
                .execute(conn)
        }
    }
}

fn delete_owner_joins(
    conn: &mut PgConnection,
    owner: Owner,
    attachment_ids: &[Uuid],
) -> QueryResult<usize> {
    match owner.kind {
        EntityKind::Claim => diesel::delete(
            claim_attachments::table
                .filter(claim_attachments::claim_id.eq(owner.id))
                .filter(claim_attachments::attachment_id.eq_any(attachment_ids)),
        )
        .execute(conn),
        EntityKind::Defect => diesel::delete(
            defect_attachments::table
                .filter(defect_attachments::defect_id.eq(owner.id))
                .filter(defect_attachments::attachment_id.eq_any(attachment_ids)),
        )
        .execute(conn),
        EntityKind::Ticket => diesel::delete(
            ticket_attachments::table
                .filter(ticket_attachments::ticket_id.eq(owner.id))
                .filter(ticket_attachments::attachment_id.eq_any(attachment_ids)),
        )
        .execute(conn),
        EntityKind::Letter => diesel::delete(
            letter_attachments::table
                .filter(letter_attachments::letter_id.eq(owner.id))
                .filter(letter_attachments::attachment_id.eq_any(attachment_ids)),
        )
        .execute(conn),
        EntityKind::CourtCase => diesel::delete(
            court_case_attachments::table
                .filter(court_case_attachments::court_case_id.eq(owner.id))
                .filter(court_case_attachments::attachment_id.eq_any(attachment_ids)),
        )
        .execute(conn),
    }
}

fn storage_error(step: &str, err: StorageError) -> EngineError {
    match err {
        StorageError::BucketMissing { bucket } => EngineError::BucketMissing { bucket },
        StorageError::Other(source) => EngineError::storage(step, source),
    }
}

#[cfg(test)]
mod tests {
    use super::{storage_key, Owner};
    use crate::engine::status::EntityKind;
    use uuid::Uuid;

    #[test]
    fn storage_key_carries_owner_prefix_stamp_and_slug() {
        let id = Uuid::new_v4();
        let key = storage_key(Owner::new(EntityKind::Defect, id), "отчёт 1.pdf", 1700000000123);
        assert_eq!(key, format!("defect/{id}/1700000000123_otchet_1.pdf"));
    }

    #[test]
    fn storage_keys_differ_by_stamp_for_identical_names() {
        let id = Uuid::new_v4();
        let owner = Owner::new(EntityKind::Claim, id);
        let first = storage_key(owner, "scan.jpg", 1);
        let second = storage_key(owner, "scan.jpg", 2);
        assert_ne!(first, second);
    }
}
