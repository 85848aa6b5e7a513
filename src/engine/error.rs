use thiserror::Error;
use uuid::Uuid;

use crate::engine::status::{EntityKind, StatusKind};

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure kinds surfaced by the engine. Each variant carries enough
/// context (entity kind, id, step name) for the caller to report which
/// part of a multi-step operation went wrong.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A statement against the relational store failed.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: diesel::result::Error,
    },

    /// A call against the binary store failed.
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// The configured bucket does not exist. A deployment defect, not a
    /// transient fault.
    #[error("storage bucket \"{bucket}\" does not exist")]
    BucketMissing { bucket: String },

    /// A referenced row resolved to nothing where one was expected.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// No status row of the required semantic kind exists for an entity.
    #[error("no \"{kind}\" status configured for entity \"{entity}\"")]
    MissingStatus {
        entity: EntityKind,
        kind: StatusKind,
    },
}

impl EngineError {
    pub fn store(
        entity: EntityKind,
        id: Uuid,
        step: &str,
        source: diesel::result::Error,
    ) -> Self {
        EngineError::Store {
            context: format!("{step} failed for {entity} {id}"),
            source,
        }
    }

    pub fn store_step(step: &str, source: diesel::result::Error) -> Self {
        EngineError::Store {
            context: format!("{step} failed"),
            source,
        }
    }

    pub fn storage(step: &str, source: anyhow::Error) -> Self {
        EngineError::Storage {
            context: format!("{step} failed"),
            source,
        }
    }

    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        EngineError::NotFound {
            kind: kind.as_str(),
            id,
        }
    }
}

// Lets engine functions run inside `conn.transaction`, where diesel maps
// BEGIN/COMMIT failures through `From`.
impl From<diesel::result::Error> for EngineError {
    fn from(source: diesel::result::Error) -> Self {
        EngineError::Store {
            context: "transaction failed".to_string(),
            source,
        }
    }
}
