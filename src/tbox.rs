//! URN/URI toolbox
//!
//! Deterministic conversions between the external URIs rooted at the
//! configured webroot and the internal `info:` URNs, plus the canonical
//! graph digest. All conversions are pure; the toolbox holds nothing but
//! the webroot.

use crate::rdf::namespace as nsc;
use crate::rdf::TripleSet;
use oxrdf::{NamedNode, Subject, Term, Triple};
use sha1::{Digest, Sha1};

/// URN/URI conversion toolbox
#[derive(Debug, Clone)]
pub struct Toolbox {
    webroot: String,
}

impl Toolbox {
    /// Create a toolbox for a webroot URL (trailing slash tolerated)
    pub fn new(webroot: &str) -> Self {
        Self {
            webroot: webroot.trim_end_matches('/').to_string(),
        }
    }

    pub fn webroot(&self) -> &str {
        &self.webroot
    }

    /// Extract the uid from an external URI or an internal resource URN.
    ///
    /// The webroot itself maps to the empty (root) uid; the root URN maps
    /// to `None` (it has no external uid form of its own). External URIs
    /// outside the webroot also map to `None`.
    pub fn uri_to_uid(&self, uri: &NamedNode) -> Option<String> {
        let s = uri.as_str();
        if *uri == nsc::root_urn() {
            None
        } else if s == self.webroot {
            Some(String::new())
        } else if let Some(uid) = s.strip_prefix(&format!("{}/", self.webroot)) {
            Some(uid.trim_end_matches('/').to_string())
        } else {
            s.strip_prefix(nsc::FCRES).map(str::to_string)
        }
    }

    /// External URI for a uid; the empty uid yields the webroot itself
    pub fn uid_to_uri(&self, uid: &str) -> NamedNode {
        if uid.is_empty() {
            NamedNode::new_unchecked(self.webroot.clone())
        } else {
            NamedNode::new_unchecked(format!("{}/{}", self.webroot, uid))
        }
    }

    /// Internal URN for a uid; the empty uid yields the root node URN
    pub fn uid_to_urn(&self, uid: &str) -> NamedNode {
        nsc::urn(uid)
    }

    /// Localize a single URI string (trailing slash tolerated).
    ///
    /// URIs outside the webroot come back unchanged.
    pub fn localize_uri_string(&self, s: &str) -> String {
        let trimmed = s.trim_end_matches('/');
        if trimmed == self.webroot {
            nsc::root_urn().as_str().to_string()
        } else if let Some(uid) = trimmed.strip_prefix(&format!("{}/", self.webroot)) {
            format!("{}{}", nsc::FCRES, uid)
        } else {
            s.to_string()
        }
    }

    /// Rewrite every occurrence of the webroot in a textual RDF payload to
    /// the internal URN form. External URIs are untouched.
    pub fn localize_string(&self, text: &str) -> String {
        text.replace(
            &format!("{}/", self.webroot),
            nsc::FCRES,
        )
        .replace(&self.webroot, nsc::root_urn().as_str())
    }

    /// Inverse of [`localize_string`](Self::localize_string)
    pub fn globalize_string(&self, text: &str) -> String {
        text.replace(nsc::root_urn().as_str(), &self.webroot)
            .replace(nsc::FCRES, &format!("{}/", self.webroot))
    }

    /// Localize a term: webroot-based URIs become internal URNs
    pub fn localize_term(&self, term: &NamedNode) -> NamedNode {
        NamedNode::new_unchecked(self.localize_uri_string(term.as_str()))
    }

    /// Globalize a term: internal URNs become webroot-based URIs
    pub fn globalize_term(&self, term: &NamedNode) -> NamedNode {
        let s = term.as_str();
        if *term == nsc::root_urn() {
            NamedNode::new_unchecked(self.webroot.clone())
        } else if let Some(uid) = s.strip_prefix(nsc::FCRES) {
            NamedNode::new_unchecked(format!("{}/{}", self.webroot, uid))
        } else {
            term.clone()
        }
    }

    /// Localize every webroot-based IRI in a graph
    pub fn localize_triples(&self, gr: &TripleSet) -> TripleSet {
        gr.iter().map(|t| self.map_triple(t, |n| self.localize_term(n))).collect()
    }

    /// Globalize every internal URN in a graph
    pub fn globalize_triples(&self, gr: &TripleSet) -> TripleSet {
        gr.iter().map(|t| self.map_triple(t, |n| self.globalize_term(n))).collect()
    }

    fn map_triple(&self, t: &Triple, f: impl Fn(&NamedNode) -> NamedNode) -> Triple {
        let subject = match &t.subject {
            Subject::NamedNode(n) => Subject::NamedNode(f(n)),
            other => other.clone(),
        };
        let object = match &t.object {
            Term::NamedNode(n) => Term::NamedNode(f(n)),
            other => other.clone(),
        };
        Triple::new(subject, f(&t.predicate), object)
    }

    /// Canonical digest of a graph: SHA-1 over the sorted N-Triples form.
    ///
    /// Insensitive to triple order, sensitive to any triple content change.
    pub fn rdf_cksum(&self, gr: &TripleSet) -> String {
        let mut hasher = Sha1::new();
        hasher.update(gr.to_canonical_ntriples().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
