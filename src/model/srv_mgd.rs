//! Server-managed term tables
//!
//! Subjects, predicates and RDF types a client payload may not set itself.
//! The membership predicates (`ldp:membershipResource` and friends) are
//! deliberately absent: they are user-settable even though they route to
//! the admin graph.

use crate::rdf::namespace as nsc;
use oxrdf::NamedNode;
use rustc_hash::FxHashSet;

/// Lookup tables for server-managed subjects, predicates and types.
pub struct SrvMgdTerms {
    subjects: FxHashSet<NamedNode>,
    predicates: FxHashSet<NamedNode>,
    types: FxHashSet<NamedNode>,
}

impl SrvMgdTerms {
    pub fn new() -> Self {
        let subjects = [nsc::root_urn(), nsc::meta_graph(), nsc::hist_graph()]
            .into_iter()
            .collect();

        let mut predicates: FxHashSet<NamedNode> = [
            "created",
            "createdBy",
            "lastModified",
            "lastModifiedBy",
            "hasParent",
            "hasVersion",
            "hasVersions",
            "hasVersionLabel",
        ]
        .into_iter()
        .map(nsc::fcrepo)
        .collect();
        predicates.insert(nsc::premis("hasMessageDigest"));
        predicates.insert(nsc::iana("describedBy"));
        predicates.insert(nsc::ldp("contains"));
        predicates.insert(nsc::fcsystem_contains());
        predicates.insert(nsc::tombstone_pred());
        predicates.insert(nsc::fragment_of());

        let mut types: FxHashSet<NamedNode> =
            ["Resource", "Binary", "Container", "Pairtree", "Version"]
                .into_iter()
                .map(nsc::fcrepo)
                .collect();
        types.insert(nsc::tombstone_type());

        Self {
            subjects,
            predicates,
            types,
        }
    }

    pub fn is_subject(&self, s: &NamedNode) -> bool {
        self.subjects.contains(s)
    }

    pub fn is_predicate(&self, p: &NamedNode) -> bool {
        self.predicates.contains(p)
    }

    pub fn is_type(&self, t: &NamedNode) -> bool {
        self.types.contains(t)
    }
}

impl Default for SrvMgdTerms {
    fn default() -> Self {
        Self::new()
    }
}
