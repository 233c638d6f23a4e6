//! In-memory triple sets
//!
//! The repository manipulates resources as plain sets of triples with set
//! algebra (`|`, `&`, `-`). Deltas between a stored resource and a provided
//! payload are computed with these operators, and the result is routed to
//! the per-resource named graphs by the store layout.

use crate::error::{RepoError, RepoResult};
use oxrdf::{BlankNode, Literal, NamedNode, Subject, Term, Triple};
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleParser};
use rustc_hash::FxHashSet;
use std::fmt;
use std::io::{BufReader, Cursor};

/// A set of triples with set algebra and pattern scans.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TripleSet(FxHashSet<Triple>);

impl TripleSet {
    /// Create a new empty triple set
    pub fn new() -> Self {
        Self(FxHashSet::default())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a triple; returns false if it was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.0.insert(triple)
    }

    /// Convenience insert from term parts
    pub fn add(&mut self, subject: impl Into<Subject>, predicate: NamedNode, object: impl Into<Term>) {
        self.0.insert(Triple::new(subject, predicate, object));
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.0.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.0.contains(triple)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.0.iter()
    }

    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) {
        self.0.extend(triples);
    }

    /// Scan triples matching a pattern; `None` matches anything
    pub fn triples_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Vec<&Triple> {
        self.0
            .iter()
            .filter(|t| {
                subject.map_or(true, |s| &t.subject == s)
                    && predicate.map_or(true, |p| &t.predicate == p)
                    && object.map_or(true, |o| &t.object == o)
            })
            .collect()
    }

    /// First object for a (subject, predicate) pair, if any
    pub fn value(&self, subject: &Subject, predicate: &NamedNode) -> Option<&Term> {
        self.0
            .iter()
            .find(|t| &t.subject == subject && &t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// First IRI object for a (subject, predicate) pair, if any
    pub fn value_named(&self, subject: &Subject, predicate: &NamedNode) -> Option<NamedNode> {
        self.objects(subject, predicate).into_iter().find_map(|o| match o {
            Term::NamedNode(n) => Some(n.clone()),
            _ => None,
        })
    }

    /// First literal object for a (subject, predicate) pair, as its lexical value
    pub fn value_literal(&self, subject: &Subject, predicate: &NamedNode) -> Option<String> {
        self.objects(subject, predicate).into_iter().find_map(|o| match o {
            Term::Literal(l) => Some(l.value().to_string()),
            _ => None,
        })
    }

    /// All objects for a (subject, predicate) pair
    pub fn objects(&self, subject: &Subject, predicate: &NamedNode) -> Vec<&Term> {
        self.0
            .iter()
            .filter(|t| &t.subject == subject && &t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    /// All distinct subjects
    pub fn subjects(&self) -> Vec<Subject> {
        let set: FxHashSet<&Subject> = self.0.iter().map(|t| &t.subject).collect();
        set.into_iter().cloned().collect()
    }

    /// All distinct subjects of triples carrying the given object
    pub fn subjects_with_object(&self, object: &Term) -> Vec<Subject> {
        let set: FxHashSet<&Subject> = self
            .0
            .iter()
            .filter(|t| &t.object == object)
            .map(|t| &t.subject)
            .collect();
        set.into_iter().cloned().collect()
    }

    /// All distinct predicates
    pub fn predicates(&self) -> Vec<NamedNode> {
        let set: FxHashSet<&NamedNode> = self.0.iter().map(|t| &t.predicate).collect();
        set.into_iter().cloned().collect()
    }

    /// All `rdf:type` objects of a subject
    pub fn types_of(&self, subject: &Subject) -> Vec<NamedNode> {
        let rdf_type = super::namespace::rdf_type();
        self.objects(subject, &rdf_type)
            .into_iter()
            .filter_map(|o| match o {
                Term::NamedNode(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_type(&self, subject: &Subject, rdf_type: &NamedNode) -> bool {
        self.0.contains(&Triple::new(
            subject.clone(),
            super::namespace::rdf_type(),
            rdf_type.clone(),
        ))
    }

    /// Replace all objects of (subject, predicate) with a single value
    pub fn replace_value(&mut self, subject: Subject, predicate: NamedNode, object: Term) {
        self.remove_matching(Some(&subject), Some(&predicate), None);
        self.0.insert(Triple::new(subject, predicate, object));
    }

    /// Remove every triple matching a pattern; returns how many were removed
    pub fn remove_matching(
        &mut self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> usize {
        let doomed: Vec<Triple> = self
            .triples_matching(subject, predicate, object)
            .into_iter()
            .cloned()
            .collect();
        for t in &doomed {
            self.0.remove(t);
        }
        doomed.len()
    }

    /// Rewrite every subject equal to `from` (or a hash fragment of it) so
    /// that it is rooted at `to` instead. Predicates and objects are left
    /// untouched.
    pub fn rewrite_subject(&self, from: &NamedNode, to: &NamedNode) -> TripleSet {
        let frag_prefix = format!("{}#", from.as_str());
        self.0
            .iter()
            .map(|t| {
                let subject = match &t.subject {
                    Subject::NamedNode(n) if n == from => Subject::NamedNode(to.clone()),
                    Subject::NamedNode(n) => match n.as_str().strip_prefix(&frag_prefix) {
                        Some(frag) => Subject::NamedNode(NamedNode::new_unchecked(format!(
                            "{}#{}",
                            to.as_str(),
                            frag
                        ))),
                        None => t.subject.clone(),
                    },
                    other => other.clone(),
                };
                Triple::new(subject, t.predicate.clone(), t.object.clone())
            })
            .collect()
    }

    /// Parse a Turtle payload, resolving relative IRIs against `base`
    pub fn parse_turtle(input: &str, base: Option<&str>) -> RepoResult<TripleSet> {
        let base_iri = match base {
            Some(b) => Some(
                oxiri::Iri::parse(b.to_string())
                    .map_err(|e| RepoError::Parse(format!("invalid base IRI {b}: {e}")))?,
            ),
            None => None,
        };
        let reader = BufReader::new(Cursor::new(input));
        let mut parser = TurtleParser::new(reader, base_iri);

        let mut out = TripleSet::new();
        let res: Result<(), TurtleError> = parser.parse_all(&mut |t| {
            out.insert(Triple::new(
                convert_subject(t.subject),
                NamedNode::new_unchecked(t.predicate.iri),
                convert_term(t.object),
            ));
            Ok(())
        });
        match res {
            Ok(()) => Ok(out),
            Err(e) => Err(RepoError::Parse(e.to_string())),
        }
    }

    /// Canonical N-Triples serialization: one sorted line per triple.
    ///
    /// Insensitive to triple order, sensitive to any content change; this is
    /// the canonicalization under the repository message digest.
    pub fn to_canonical_ntriples(&self) -> String {
        let mut lines: Vec<String> = self
            .0
            .iter()
            .map(|t| format!("{} {} {} .", t.subject, t.predicate, t.object))
            .collect();
        lines.sort_unstable();
        lines.join("\n")
    }
}

impl fmt::Debug for TripleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TripleSet({} triples)", self.0.len())
    }
}

impl FromIterator<Triple> for TripleSet {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for TripleSet {
    type Item = Triple;
    type IntoIter = <FxHashSet<Triple> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TripleSet {
    type Item = &'a Triple;
    type IntoIter = std::collections::hash_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::BitOr for &TripleSet {
    type Output = TripleSet;

    fn bitor(self, rhs: &TripleSet) -> TripleSet {
        TripleSet(self.0.union(&rhs.0).cloned().collect())
    }
}

impl std::ops::Sub for &TripleSet {
    type Output = TripleSet;

    fn sub(self, rhs: &TripleSet) -> TripleSet {
        TripleSet(self.0.difference(&rhs.0).cloned().collect())
    }
}

impl std::ops::BitAnd for &TripleSet {
    type Output = TripleSet;

    fn bitand(self, rhs: &TripleSet) -> TripleSet {
        TripleSet(self.0.intersection(&rhs.0).cloned().collect())
    }
}

fn convert_subject(s: rio_api::model::Subject<'_>) -> Subject {
    match s {
        rio_api::model::Subject::NamedNode(n) => {
            Subject::NamedNode(NamedNode::new_unchecked(n.iri))
        }
        rio_api::model::Subject::BlankNode(b) => {
            Subject::BlankNode(BlankNode::new_unchecked(b.id))
        }
        #[allow(unreachable_patterns)]
        _ => panic!("RDF-star subjects not supported"),
    }
}

fn convert_term(o: rio_api::model::Term<'_>) -> Term {
    match o {
        rio_api::model::Term::NamedNode(n) => Term::NamedNode(NamedNode::new_unchecked(n.iri)),
        rio_api::model::Term::BlankNode(b) => Term::BlankNode(BlankNode::new_unchecked(b.id)),
        rio_api::model::Term::Literal(l) => Term::Literal(match l {
            rio_api::model::Literal::Simple { value } => Literal::new_simple_literal(value),
            rio_api::model::Literal::LanguageTaggedString { value, language } => {
                Literal::new_language_tagged_literal_unchecked(value, language)
            }
            rio_api::model::Literal::Typed { value, datatype } => {
                Literal::new_typed_literal(value, NamedNode::new_unchecked(datatype.iri))
            }
        }),
        #[allow(unreachable_patterns)]
        _ => panic!("RDF-star objects not supported"),
    }
}
