//! Cross-entity consistency and attachment lifecycle logic.
//!
//! Everything here operates on plain pooled connections and the
//! [`crate::storage::ObjectStorage`] trait; HTTP concerns stay in
//! `crate::routes`. Multi-step writes run inside a single database
//! transaction so a mid-sequence failure never leaves half a cascade
//! behind.

pub mod attachments;
pub mod cascade;
pub mod error;
pub mod links;
pub mod paging;
pub mod status;

pub use error::{EngineError, EngineResult};
pub use status::{EntityKind, StatusKind};
