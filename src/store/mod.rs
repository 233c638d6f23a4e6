//! Storage: the triple store adapter seam and the resource-centric layout
//!
//! [`TripleStore`] abstracts a transactional quad store; [`MemoryStore`]
//! is the in-memory implementation. [`RsrcCentricLayout`] sits on top and
//! routes each triple of a logical resource into its admin/struct/main
//! named graph.

pub mod layout;
pub mod triplestore;

pub use layout::{GraphDest, RsrcCentricLayout};
pub use triplestore::{MemoryStore, TripleStore};
