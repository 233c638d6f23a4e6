//! Resource model and lifecycle engine
//!
//! [`LdpEngine`] implements the LDP operations on a logical resource:
//! create/replace, delete (tombstones), purge, versioning, revert and
//! resurrect, enforcing single-subject payloads, referential integrity,
//! server-managed-term policy and containment semantics.

pub mod engine;
pub mod kind;
pub mod srv_mgd;

pub use crate::store::layout::ImrOptions;
pub use engine::{DeleteOptions, LdpEngine, ResourceHeaders};
pub use kind::{ContainerKind, ResourceKind};
pub use srv_mgd::SrvMgdTerms;
