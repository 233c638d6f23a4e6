//! Resource kind classification
//!
//! The LDP resource and container variants as a tagged value derived from a
//! resource's RDF types. The engine operates on this classification rather
//! than on the stored type set directly.

use crate::rdf::namespace as nsc;
use oxrdf::NamedNode;

/// LDP container variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Basic,
    /// Projects a membership triple onto a target resource per added member
    Direct,
    /// Like direct, but the membership object is looked up in the member's
    /// own payload via `ldp:insertedContentRelation`
    Indirect,
}

/// Resource kind: RDF source (optionally a container) or binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    RdfSource { container: Option<ContainerKind> },
    NonRdfSource,
}

impl ResourceKind {
    /// Derive the kind from a resource's RDF types.
    ///
    /// The most specific container variant wins; anything that is not
    /// declared a non-RDF source is an RDF source.
    pub fn from_types<'a>(types: impl IntoIterator<Item = &'a NamedNode>) -> Self {
        let mut container = None;
        for t in types {
            if *t == nsc::ldp("NonRDFSource") {
                return ResourceKind::NonRdfSource;
            }
            if *t == nsc::ldp("IndirectContainer") {
                container = Some(ContainerKind::Indirect);
            } else if *t == nsc::ldp("DirectContainer")
                && container != Some(ContainerKind::Indirect)
            {
                container = Some(ContainerKind::Direct);
            } else if (*t == nsc::ldp("Container") || *t == nsc::ldp("BasicContainer"))
                && container.is_none()
            {
                container = Some(ContainerKind::Basic);
            }
        }
        ResourceKind::RdfSource { container }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ResourceKind::RdfSource { container: Some(_) })
    }

    pub fn container(&self) -> Option<ContainerKind> {
        match self {
            ResourceKind::RdfSource { container } => *container,
            ResourceKind::NonRdfSource => None,
        }
    }
}
