//! Single-parent link graphs. Claims, letters and tickets each keep a
//! parent/child edge table over their own record type; at most one edge
//! exists per child. Depth is 1 in current usage, but nothing stops a
//! child from appearing as a parent elsewhere.

use std::collections::HashMap;

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::paging::{fetch_paged, PAGE_SIZE};
use crate::schema::{claim_links, letter_links, ticket_links};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    Claim,
    Letter,
    Ticket,
}

impl LinkScope {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkScope::Claim => "claim",
            LinkScope::Letter => "letter",
            LinkScope::Ticket => "ticket",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkEdge {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
}

/// Points every child at `parent_id`, dropping whatever edges the children
/// had before regardless of their current parent. Replace, not merge.
pub fn link(
    conn: &mut PgConnection,
    scope: LinkScope,
    parent_id: Uuid,
    child_ids: &[Uuid],
) -> EngineResult<usize> {
    if child_ids.is_empty() {
        return Ok(0);
    }

    conn.transaction(|conn| {
        match scope {
            LinkScope::Claim => {
                diesel::delete(
                    claim_links::table.filter(claim_links::child_id.eq_any(child_ids)),
                )
                .execute(conn)
                .map_err(|err| link_error(scope, parent_id, "edge replace delete", err))?;

                let rows: Vec<_> = child_ids
                    .iter()
                    .map(|child_id| {
                        (
                            claim_links::id.eq(Uuid::new_v4()),
                            claim_links::parent_id.eq(parent_id),
                            claim_links::child_id.eq(*child_id),
                        )
                    })
                    .collect();
                diesel::insert_into(claim_links::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|err| link_error(scope, parent_id, "edge insert", err))
            }
            LinkScope::Letter => {
                diesel::delete(
                    letter_links::table.filter(letter_links::child_id.eq_any(child_ids)),
                )
                .execute(conn)
                .map_err(|err| link_error(scope, parent_id, "edge replace delete", err))?;

                let rows: Vec<_> = child_ids
                    .iter()
                    .map(|child_id| {
                        (
                            letter_links::id.eq(Uuid::new_v4()),
                            letter_links::parent_id.eq(parent_id),
                            letter_links::child_id.eq(*child_id),
                        )
                    })
                    .collect();
                diesel::insert_into(letter_links::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|err| link_error(scope, parent_id, "edge insert", err))
            }
            LinkScope::Ticket => {
                diesel::delete(
                    ticket_links::table.filter(ticket_links::child_id.eq_any(child_ids)),
                )
                .execute(conn)
                .map_err(|err| link_error(scope, parent_id, "edge replace delete", err))?;

                let rows: Vec<_> = child_ids
                    .iter()
                    .map(|child_id| {
                        (
                            ticket_links::id.eq(Uuid::new_v4()),
                            ticket_links::parent_id.eq(parent_id),
                            ticket_links::child_id.eq(*child_id),
                        )
                    })
                    .collect();
                diesel::insert_into(ticket_links::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(|err| link_error(scope, parent_id, "edge insert", err))
            }
        }
    })
}

/// Deletes the edge (if any) pointing at `child_id`.
pub fn unlink(conn: &mut PgConnection, scope: LinkScope, child_id: Uuid) -> EngineResult<usize> {
    match scope {
        LinkScope::Claim => {
            diesel::delete(claim_links::table.filter(claim_links::child_id.eq(child_id)))
                .execute(conn)
        }
        LinkScope::Letter => {
            diesel::delete(letter_links::table.filter(letter_links::child_id.eq(child_id)))
                .execute(conn)
        }
        LinkScope::Ticket => {
            diesel::delete(ticket_links::table.filter(ticket_links::child_id.eq(child_id)))
                .execute(conn)
        }
    }
    .map_err(|err| link_error(scope, child_id, "edge delete", err))
}

/// Drops every edge touching `record_id`, as parent or child. Part of the
/// destructive cascade when a record is deleted.
pub fn unlink_all(conn: &mut PgConnection, scope: LinkScope, record_id: Uuid) -> EngineResult<usize> {
    match scope {
        LinkScope::Claim => diesel::delete(
            claim_links::table.filter(
                claim_links::child_id
                    .eq(record_id)
                    .or(claim_links::parent_id.eq(record_id)),
            ),
        )
        .execute(conn),
        LinkScope::Letter => diesel::delete(
            letter_links::table.filter(
                letter_links::child_id
                    .eq(record_id)
                    .or(letter_links::parent_id.eq(record_id)),
            ),
        )
        .execute(conn),
        LinkScope::Ticket => diesel::delete(
            ticket_links::table.filter(
                ticket_links::child_id
                    .eq(record_id)
                    .or(ticket_links::parent_id.eq(record_id)),
            ),
        )
        .execute(conn),
    }
    .map_err(|err| link_error(scope, record_id, "edge cleanup", err))
}

/// Full edge set for a scope, fetched page by page. Callers build a
/// [`LinkMap`] from it for O(1) parent lookups.
pub fn list_edges(conn: &mut PgConnection, scope: LinkScope) -> EngineResult<Vec<LinkEdge>> {
    fetch_paged(PAGE_SIZE, |offset, limit| {
        let rows: Vec<(Uuid, Uuid, Uuid)> = match scope {
            LinkScope::Claim => claim_links::table
                .select((claim_links::id, claim_links::parent_id, claim_links::child_id))
                .order(claim_links::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            LinkScope::Letter => letter_links::table
                .select((
                    letter_links::id,
                    letter_links::parent_id,
                    letter_links::child_id,
                ))
                .order(letter_links::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
            LinkScope::Ticket => ticket_links::table
                .select((
                    ticket_links::id,
                    ticket_links::parent_id,
                    ticket_links::child_id,
                ))
                .order(ticket_links::created_at.asc())
                .offset(offset)
                .limit(limit)
                .load(conn),
        }
        .map_err(|err| EngineError::store_step("edge list", err))?;

        Ok(rows
            .into_iter()
            .map(|(id, parent_id, child_id)| LinkEdge {
                id,
                parent_id,
                child_id,
            })
            .collect())
    })
}

/// Adjacency map keyed by child id. The single-parent invariant makes a
/// plain map sufficient; no graph structure needed.
#[derive(Debug, Default)]
pub struct LinkMap {
    parents: HashMap<Uuid, Uuid>,
}

impl LinkMap {
    pub fn from_edges(edges: &[LinkEdge]) -> Self {
        let parents = edges
            .iter()
            .map(|edge| (edge.child_id, edge.parent_id))
            .collect();
        Self { parents }
    }

    pub fn parent_of(&self, child_id: Uuid) -> Option<Uuid> {
        self.parents.get(&child_id).copied()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

fn link_error(scope: LinkScope, id: Uuid, step: &str, source: diesel::result::Error) -> EngineError {
    EngineError::Store {
        context: format!("{step} failed for {} link {id}", scope.as_str()),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkEdge, LinkMap};
    use uuid::Uuid;

    fn edge(parent: Uuid, child: Uuid) -> LinkEdge {
        LinkEdge {
            id: Uuid::new_v4(),
            parent_id: parent,
            child_id: child,
        }
    }

    #[test]
    fn map_resolves_parents_by_child() {
        let parent_a = Uuid::new_v4();
        let parent_b = Uuid::new_v4();
        let child_one = Uuid::new_v4();
        let child_two = Uuid::new_v4();

        let map = LinkMap::from_edges(&[edge(parent_a, child_one), edge(parent_b, child_two)]);

        assert_eq!(map.parent_of(child_one), Some(parent_a));
        assert_eq!(map.parent_of(child_two), Some(parent_b));
        assert_eq!(map.parent_of(parent_a), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn empty_edge_set_builds_empty_map() {
        let map = LinkMap::from_edges(&[]);
        assert!(map.is_empty());
        assert_eq!(map.parent_of(Uuid::new_v4()), None);
    }
}
