//! Cairn LDP Repository Core
//!
//! A Linked Data Platform repository core with Fedora-style semantics:
//! resource-centric named-graph storage, a transactional lifecycle engine
//! and post-commit event notifications.
//!
//! # Architecture
//!
//! - `rdf`: RDF terms, namespaces and the `TripleSet` algebra built on oxrdf
//! - `tbox`: deterministic URN/URI conversions and graph canonicalization
//! - `store`: the triple store adapter seam and the resource-centric layout
//!   that routes each triple of a resource into its admin/struct/main graph
//! - `model`: the lifecycle engine: create/replace, delete (tombstones),
//!   purge, versioning, revert, resurrect, containment and pairtree segments
//! - `tx`: per-request context, transaction combinator and changelog
//! - `event`: post-commit event fan-out, one event per modified subject
//!
//! Every write operation decomposes into read-modify-write steps across
//! several named graphs; the transaction combinator guarantees that they all
//! commit or all roll back, and that events are only emitted after a commit.
//!
//! # Example
//!
//! ```rust
//! use cairn::config::RepoConfig;
//! use cairn::model::LdpEngine;
//! use cairn::rdf::graph::TripleSet;
//! use cairn::store::MemoryStore;
//!
//! let engine = LdpEngine::new(MemoryStore::new(), RepoConfig::default());
//! engine.bootstrap().unwrap();
//!
//! let payload = TripleSet::parse_turtle(
//!     "<> a <http://www.w3.org/ns/ldp#Container> .",
//!     Some("info:fcres:pomegranate"),
//! ).unwrap();
//! engine.create_or_replace("pomegranate", payload, false).unwrap();
//!
//! let gr = engine.get("pomegranate").unwrap();
//! assert!(!gr.is_empty());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod rdf;
pub mod store;
pub mod tbox;
pub mod tx;

// Re-export main types for convenience
pub use config::{MgdTermHandling, RefIntegrity, RepoConfig};
pub use error::{RepoError, RepoResult};
pub use event::{EventBus, EventKind, ResourceEvent};
pub use model::{
    ContainerKind, DeleteOptions, ImrOptions, LdpEngine, ResourceHeaders, ResourceKind,
};
pub use rdf::graph::TripleSet;
pub use store::{MemoryStore, RsrcCentricLayout, TripleStore};
pub use tbox::Toolbox;
pub use tx::{ChangelogEntry, EventMeta, RequestCtx};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
