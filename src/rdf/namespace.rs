//! Repository namespaces
//!
//! The closed `info:` URN namespaces used for internal resource and graph
//! naming, plus the external vocabularies the repository speaks. These are
//! stable: changing any of them invalidates a populated store.

use oxrdf::NamedNode;

/// Internal resource URNs: `info:fcres:<uid>`
pub const FCRES: &str = "info:fcres:";
/// System URNs (root node, meta/historic graphs, tombstone terms)
pub const FCSYSTEM: &str = "info:fcsystem:";
/// Per-resource server-managed graph: `info:fcadmin:<uid>`
pub const FCADMIN: &str = "info:fcadmin:";
/// Per-resource user-triple graph: `info:fcmain:<uid>`
pub const FCMAIN: &str = "info:fcmain:";
/// Per-resource containment graph: `info:fcstruct:<uid>`
pub const FCSTRUCT: &str = "info:fcstruct:";

pub const FCREPO: &str = "http://fedora.info/definitions/v4/repository#";
pub const LDP: &str = "http://www.w3.org/ns/ldp#";
pub const PREMIS: &str = "http://www.loc.gov/premis/rdf/v1#";
pub const PCDM: &str = "http://pcdm.org/models#";
pub const IANA: &str = "http://www.iana.org/assignments/relation/";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

pub fn fcres(uid: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{FCRES}{uid}"))
}

pub fn fcsystem(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{FCSYSTEM}{local}"))
}

pub fn fcrepo(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{FCREPO}{local}"))
}

pub fn ldp(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{LDP}{local}"))
}

pub fn premis(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{PREMIS}{local}"))
}

pub fn pcdm(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{PCDM}{local}"))
}

pub fn iana(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{IANA}{local}"))
}

pub fn foaf(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{FOAF}{local}"))
}

pub fn rdf_type() -> NamedNode {
    NamedNode::new_unchecked(format!("{RDF}type"))
}

pub fn xsd_date_time() -> NamedNode {
    NamedNode::new_unchecked(format!("{XSD}dateTime"))
}

// Reserved URNs

/// The repository root node
pub fn root_urn() -> NamedNode {
    fcsystem("root")
}

/// Discovery graph registering every live per-resource graph
pub fn meta_graph() -> NamedNode {
    fcsystem("meta")
}

/// History graph registering version snapshots
pub fn hist_graph() -> NamedNode {
    fcsystem("historic")
}

/// `rdf:type` object marking a buried resource
pub fn tombstone_type() -> NamedNode {
    fcsystem("Tombstone")
}

/// Predicate pointing a buried descendant at its ancestor's tombstone
pub fn tombstone_pred() -> NamedNode {
    fcsystem("tombstone")
}

/// Predicate linking a hash-fragment subject to its resource
pub fn fragment_of() -> NamedNode {
    fcsystem("fragmentOf")
}

/// Non-LDP containment link used by pairtree segments
pub fn fcsystem_contains() -> NamedNode {
    fcsystem("contains")
}

pub fn primary_topic() -> NamedNode {
    foaf("primaryTopic")
}

/// Internal URN for a uid; the empty (root) uid yields the root node URN
pub fn urn(uid: &str) -> NamedNode {
    if uid.is_empty() {
        root_urn()
    } else {
        fcres(uid)
    }
}

/// Extract a resource uid from an internal URN.
///
/// `info:fcres:<uid>` yields the uid, the root URN yields the empty uid.
/// Anything else (external URIs, other namespaces) yields `None`.
pub fn uid_from_urn(urn: &NamedNode) -> Option<String> {
    if *urn == root_urn() {
        Some(String::new())
    } else {
        urn.as_str().strip_prefix(FCRES).map(str::to_string)
    }
}
