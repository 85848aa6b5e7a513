use std::fmt;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::error::{EngineError, EngineResult};
use crate::models::Status;
use crate::schema::statuses;

/// Business record kinds. Doubles as the scope tag on status rows and as
/// the owner discriminator for attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Claim,
    Defect,
    Ticket,
    Letter,
    CourtCase,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Claim => "claim",
            EntityKind::Defect => "defect",
            EntityKind::Ticket => "ticket",
            EntityKind::Letter => "letter",
            EntityKind::CourtCase => "court_case",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured semantic kind stored alongside each status row. Replaces
/// re-parsing localized display names on every cascade call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Open,
    InProgress,
    Checking,
    Closed,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Open => "open",
            StatusKind::InProgress => "in_progress",
            StatusKind::Checking => "checking",
            StatusKind::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(StatusKind::Open),
            "in_progress" => Some(StatusKind::InProgress),
            "checking" => Some(StatusKind::Checking),
            "closed" => Some(StatusKind::Closed),
            _ => None,
        }
    }

    /// Derives a kind from a localized display name. Used exactly once,
    /// when a status row is created without an explicit kind; cascades
    /// never call this.
    pub fn from_display_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        const KEYWORDS: &[(&str, StatusKind)] = &[
            ("closed", StatusKind::Closed),
            ("закрыт", StatusKind::Closed),
            ("checking", StatusKind::Checking),
            ("провер", StatusKind::Checking),
            ("in progress", StatusKind::InProgress),
            ("in-progress", StatusKind::InProgress),
            ("в работе", StatusKind::InProgress),
            ("open", StatusKind::Open),
            ("нов", StatusKind::Open),
        ];
        KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, kind)| *kind)
    }

    /// Whether a defect in this state counts toward its claims' completion.
    pub fn is_complete(self) -> bool {
        matches!(self, StatusKind::Checking | StatusKind::Closed)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the status row of a semantic kind for an entity. Duplicate
/// rows are not structurally prevented; the oldest row wins.
pub fn find_status(
    conn: &mut PgConnection,
    entity: EntityKind,
    kind: StatusKind,
) -> EngineResult<Option<Status>> {
    statuses::table
        .filter(statuses::entity.eq(entity.as_str()))
        .filter(statuses::kind.eq(kind.as_str()))
        .order(statuses::created_at.asc())
        .first::<Status>(conn)
        .optional()
        .map_err(|err| EngineError::store_step("status lookup", err))
}

/// Like [`find_status`] but treats an absent row as a hard error, for the
/// cascade steps that cannot proceed without a target status.
pub fn require_status(
    conn: &mut PgConnection,
    entity: EntityKind,
    kind: StatusKind,
) -> EngineResult<Status> {
    find_status(conn, entity, kind)?
        .ok_or(EngineError::MissingStatus { entity, kind })
}

/// Loads a status row by id, mapping an unknown id to NotFound against the
/// entity the caller was working on.
pub fn load_status(
    conn: &mut PgConnection,
    entity: EntityKind,
    status_id: Uuid,
) -> EngineResult<Status> {
    statuses::table
        .find(status_id)
        .first::<Status>(conn)
        .optional()
        .map_err(|err| EngineError::store(entity, status_id, "status load", err))?
        .ok_or(EngineError::not_found(entity, status_id))
}

#[cfg(test)]
mod tests {
    use super::StatusKind;

    #[test]
    fn derives_kind_from_english_names() {
        assert_eq!(
            StatusKind::from_display_name("Closed"),
            Some(StatusKind::Closed)
        );
        assert_eq!(
            StatusKind::from_display_name("Checking in progress"),
            Some(StatusKind::Checking)
        );
        assert_eq!(
            StatusKind::from_display_name("IN PROGRESS"),
            Some(StatusKind::InProgress)
        );
    }

    #[test]
    fn derives_kind_from_cyrillic_names() {
        assert_eq!(
            StatusKind::from_display_name("Закрыто"),
            Some(StatusKind::Closed)
        );
        assert_eq!(
            StatusKind::from_display_name("На проверке"),
            Some(StatusKind::Checking)
        );
        assert_eq!(
            StatusKind::from_display_name("В работе"),
            Some(StatusKind::InProgress)
        );
    }

    #[test]
    fn unknown_names_have_no_kind() {
        assert_eq!(StatusKind::from_display_name("Pending review"), None);
    }

    #[test]
    fn completion_covers_checking_and_closed() {
        assert!(StatusKind::Checking.is_complete());
        assert!(StatusKind::Closed.is_complete());
        assert!(!StatusKind::Open.is_complete());
        assert!(!StatusKind::InProgress.is_complete());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            StatusKind::Open,
            StatusKind::InProgress,
            StatusKind::Checking,
            StatusKind::Closed,
        ] {
            assert_eq!(StatusKind::parse(kind.as_str()), Some(kind));
        }
    }
}
