//! # bpm-core
//!
//! Core types, traits, and the transactional validation core for bpm-admin.
//!
//! This crate provides the resource models, the caller identity, the storage
//! capability traits that backends implement, and the validation core that
//! runs every mutation as one atomic, fully checked unit.

pub mod error;
pub mod identity;
pub mod logging;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod models;
pub mod pagination;
pub mod patch;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use identity::{Identity, IdentityResolver, OrgScope, GLOBAL_ORGANIZATION};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryStore;
pub use models::*;
pub use pagination::{Page, PageRequest};
pub use patch::Patch;
pub use traits::*;
