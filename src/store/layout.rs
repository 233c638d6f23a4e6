//! Resource-centric graph store layout
//!
//! Each logical resource is materialized across up to three named graphs:
//!
//! - `fcadmin:<uid>`: server-managed predicates and RDF types
//! - `fcstruct:<uid>`: containment predicates only
//! - `fcmain:<uid>`: everything else (user triples)
//!
//! A static attribute map routes every triple to exactly one destination.
//! The discovery graph `fcsystem:meta` registers each live per-resource
//! graph via `foaf:primaryTopic`, which is the sole mechanism for
//! enumerating live resources and for scoping inbound queries. Version
//! snapshots live in `fcadmin:<uid>:<ver>` / `fcmain:<uid>:<ver>` graphs
//! registered in `fcsystem:historic`.
//!
//! Method naming conventions, kept from the store layout tradition:
//! `get_` returns resource data, `ask_` returns a boolean.

use crate::error::{RepoError, RepoResult};
use crate::rdf::namespace as nsc;
use crate::rdf::TripleSet;
use crate::store::TripleStore;
use oxrdf::{NamedNode, Subject, Term, Triple};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

/// Label segment of version container URNs (`fcres:<uid>/fcr:versions/<v>`)
pub const VER_CONT_LABEL: &str = "fcr:versions";

/// Destination graph family for a routed triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphDest {
    Admin,
    Struct,
    Main,
}

/// Static predicate/type classification deciding the destination graph of
/// every triple. The map is total and disjoint: unmapped triples go to the
/// main (user) graph.
struct AttrRouter {
    pred_routes: FxHashMap<NamedNode, GraphDest>,
    type_routes: FxHashMap<NamedNode, GraphDest>,
    rdf_type: NamedNode,
}

impl AttrRouter {
    fn new() -> Self {
        let mut pred_routes = FxHashMap::default();
        let mut type_routes = FxHashMap::default();

        // Server-managed predicates.
        for p in [
            "created",
            "createdBy",
            "hasParent",
            "lastModified",
            "lastModifiedBy",
            "hasVersion",
            "hasVersions",
            "hasVersionLabel",
        ] {
            pred_routes.insert(nsc::fcrepo(p), GraphDest::Admin);
        }
        // The following three are set by the user but still in this group
        // for convenience.
        for p in [
            "membershipResource",
            "hasMemberRelation",
            "insertedContentRelation",
        ] {
            pred_routes.insert(nsc::ldp(p), GraphDest::Admin);
        }
        pred_routes.insert(nsc::iana("describedBy"), GraphDest::Admin);
        pred_routes.insert(nsc::premis("hasMessageDigest"), GraphDest::Admin);
        pred_routes.insert(nsc::premis("hasSize"), GraphDest::Admin);
        pred_routes.insert(nsc::tombstone_pred(), GraphDest::Admin);

        // Containment predicates, in a separate graph for optimization
        // purposes.
        pred_routes.insert(nsc::fcsystem_contains(), GraphDest::Struct);
        pred_routes.insert(nsc::ldp("contains"), GraphDest::Struct);
        pred_routes.insert(nsc::pcdm("hasMember"), GraphDest::Struct);

        // Server-managed RDF types.
        for t in ["Binary", "Container", "Pairtree", "Resource"] {
            type_routes.insert(nsc::fcrepo(t), GraphDest::Admin);
        }
        for t in [
            "BasicContainer",
            "Container",
            "DirectContainer",
            "IndirectContainer",
            "NonRDFSource",
            "RDFSource",
            "Resource",
        ] {
            type_routes.insert(nsc::ldp(t), GraphDest::Admin);
        }
        type_routes.insert(nsc::tombstone_type(), GraphDest::Admin);

        Self {
            pred_routes,
            type_routes,
            rdf_type: nsc::rdf_type(),
        }
    }

    fn route(&self, t: &Triple) -> GraphDest {
        if let Some(dest) = self.pred_routes.get(&t.predicate) {
            return *dest;
        }
        if t.predicate == self.rdf_type {
            if let Term::NamedNode(o) = &t.object {
                if let Some(dest) = self.type_routes.get(o) {
                    return *dest;
                }
            }
        }
        GraphDest::Main
    }
}

/// Graph URI for a destination family, resource uid and optional version
pub fn graph_uri(dest: GraphDest, uid: &str, ver_uid: Option<&str>) -> NamedNode {
    let ns = match dest {
        GraphDest::Admin => nsc::FCADMIN,
        GraphDest::Struct => nsc::FCSTRUCT,
        GraphDest::Main => nsc::FCMAIN,
    };
    match ver_uid {
        Some(v) => NamedNode::new_unchecked(format!("{ns}{uid}:{v}")),
        None => NamedNode::new_unchecked(format!("{ns}{uid}")),
    }
}

/// URN of a version snapshot of a resource
pub fn version_urn(uid: &str, ver_uid: &str) -> NamedNode {
    nsc::fcres(&format!("{uid}/{VER_CONT_LABEL}/{ver_uid}"))
}

/// Options for extracting an in-memory resource
#[derive(Debug, Clone)]
pub struct ImrOptions {
    /// Fail on absent or tombstoned resources
    pub strict: bool,
    /// Union the inbound relationships into the result
    pub incl_inbound: bool,
    /// Include the containment (struct) graph
    pub incl_children: bool,
    /// Extract a version snapshot instead of the current state
    pub ver_uid: Option<String>,
}

impl Default for ImrOptions {
    fn default() -> Self {
        Self {
            strict: true,
            incl_inbound: false,
            incl_children: true,
            ver_uid: None,
        }
    }
}

/// The resource-centric layout over a [`TripleStore`].
pub struct RsrcCentricLayout<S: TripleStore> {
    store: S,
    router: AttrRouter,
}

impl<S: TripleStore> RsrcCentricLayout<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            router: AttrRouter::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Destination graph family of a single triple
    pub fn route(&self, t: &Triple) -> GraphDest {
        self.router.route(t)
    }

    /// Delete all graphs and install the seed data (root node + meta)
    pub fn bootstrap(&self, seed: &TripleSet) -> RepoResult<()> {
        info!("Deleting all data from the graph store.");
        self.store.drop_all()?;

        info!("Initializing the graph store with system data.");
        self.modify_rsrc("", &TripleSet::new(), seed)
    }

    /// Whether a resource exists (tombstones do not count)
    pub fn ask_rsrc_exists(&self, uid: &str) -> RepoResult<bool> {
        let urn = nsc::urn(uid);
        self.store.contains(
            &graph_uri(GraphDest::Admin, uid, None),
            &Triple::new(urn, nsc::rdf_type(), nsc::fcrepo("Resource")),
        )
    }

    /// Server-managed metadata of a resource (admin graph only).
    ///
    /// This is an optimized read for everything the engine needs to insert
    /// new contents, and nothing more.
    pub fn get_metadata(&self, uid: &str, ver_uid: Option<&str>) -> RepoResult<TripleSet> {
        self.store.graph(&graph_uri(GraphDest::Admin, uid, ver_uid))
    }

    /// Extract the in-memory resource graph for a uid.
    pub fn extract_imr(&self, uid: &str, opts: &ImrOptions) -> RepoResult<TripleSet> {
        let urn = nsc::urn(uid);
        let ver = opts.ver_uid.as_deref();

        let mut gr = self.store.graph(&graph_uri(GraphDest::Admin, uid, ver))?;
        gr.extend(self.store.graph(&graph_uri(GraphDest::Main, uid, ver))?);
        if opts.incl_children && ver.is_none() {
            gr.extend(self.store.graph(&graph_uri(GraphDest::Struct, uid, None))?);
        }

        if opts.incl_inbound && !gr.is_empty() {
            gr.extend(self.get_inbound_rel(&urn)?);
        }

        if opts.strict && gr.is_empty() {
            return Err(RepoError::not_found(uid));
        }

        // Tombstone checks.
        let subject: Subject = urn.clone().into();
        if gr.has_type(&subject, &nsc::tombstone_type()) {
            if opts.strict {
                return Err(RepoError::Tombstone {
                    uid: uid.to_string(),
                    created: gr.value_literal(&subject, &nsc::fcrepo("created")),
                });
            }
            info!("Tombstone found: {}", uid);
        } else if let Some(ptr) = gr.value_named(&subject, &nsc::tombstone_pred()) {
            if opts.strict {
                return Err(RepoError::Tombstone {
                    uid: nsc::uid_from_urn(&ptr).unwrap_or_else(|| ptr.as_str().to_string()),
                    created: gr.value_literal(&subject, &nsc::fcrepo("created")),
                });
            }
            info!("Parent tombstone found: {}", uid);
        }

        Ok(gr)
    }

    /// Inbound relationships of a subject, restricted to live resources.
    ///
    /// Tombstones and history are excluded because their graphs either have
    /// no `foaf:primaryTopic` record in the meta graph or contain no
    /// outbound triples.
    pub fn get_inbound_rel(&self, urn: &NamedNode) -> RepoResult<TripleSet> {
        let meta = self.store.graph(&nsc::meta_graph())?;
        let target: Term = urn.clone().into();
        let mut out = TripleSet::new();

        for reg in meta.triples_matching(None, Some(&nsc::primary_topic()), None) {
            let (Subject::NamedNode(g), Term::NamedNode(topic)) = (&reg.subject, &reg.object)
            else {
                continue;
            };
            let topic_subject: Subject = topic.clone().into();
            out.extend(self.store.triples_matching(
                g,
                Some(&topic_subject),
                None,
                Some(&target),
            )?);
        }
        Ok(out)
    }

    /// Apply a routed delta to a resource's graphs.
    ///
    /// Each triple of the remove and add sets is routed to its destination
    /// graph; removals are applied before additions. Every destination
    /// actually touched on the add side is registered in the meta graph.
    pub fn modify_rsrc(&self, uid: &str, remove: &TripleSet, add: &TripleSet) -> RepoResult<()> {
        let urn = nsc::urn(uid);

        let mut remove_routes: FxHashMap<GraphDest, TripleSet> = FxHashMap::default();
        let mut add_routes: FxHashMap<GraphDest, TripleSet> = FxHashMap::default();
        for t in remove.iter() {
            remove_routes
                .entry(self.router.route(t))
                .or_default()
                .insert(t.clone());
        }
        for t in add.iter() {
            add_routes
                .entry(self.router.route(t))
                .or_default()
                .insert(t.clone());
        }

        for (dest, trp) in &remove_routes {
            self.store.remove(&graph_uri(*dest, uid, None), trp)?;
        }
        for (dest, trp) in &add_routes {
            let gr_uri = graph_uri(*dest, uid, None);
            self.store.insert(&gr_uri, trp)?;

            let mut reg = TripleSet::new();
            reg.add(gr_uri, nsc::primary_topic(), urn.clone());
            self.store.insert(&nsc::meta_graph(), &reg)?;
        }
        Ok(())
    }

    /// Drop (or back up) the data graphs of a resource.
    ///
    /// With a `backup_uid` the main graph is renamed into a version slot
    /// instead of dropped. The struct and admin graphs are dropped either
    /// way, and the meta graph registrations are cleared.
    pub fn delete_rsrc_data(&self, uid: &str, backup_uid: Option<&str>) -> RepoResult<()> {
        let mg = graph_uri(GraphDest::Main, uid, None);
        let ag = graph_uri(GraphDest::Admin, uid, None);
        let sg = graph_uri(GraphDest::Struct, uid, None);

        match backup_uid {
            Some(b) => {
                self.store.move_graph(&mg, &graph_uri(GraphDest::Main, uid, Some(b)))?
            }
            None => self.store.drop_graph(&mg)?,
        }
        self.store.drop_graph(&sg)?;
        self.store.drop_graph(&ag)?;

        for g in [&mg, &ag, &sg] {
            let s: Subject = g.clone().into();
            self.store
                .remove_matching(&nsc::meta_graph(), Some(&s), None, None)?;
        }
        Ok(())
    }

    /// Completely delete a resource, its versions and (optionally) its
    /// inbound references.
    pub fn purge_rsrc(&self, uid: &str, inbound: bool) -> RepoResult<()> {
        let urn = nsc::urn(uid);
        let urn_term: Term = urn.clone().into();
        info!("Purging resource {}", urn);

        let meta = self.store.graph(&nsc::meta_graph())?;
        let hist = self.store.graph(&nsc::hist_graph())?;

        // Graphs attributed to this resource, and every subject they hold
        // (the resource URN plus any hash fragments).
        let mut doomed: Vec<NamedNode> = meta
            .triples_matching(None, Some(&nsc::primary_topic()), Some(&urn_term))
            .into_iter()
            .filter_map(|t| match &t.subject {
                Subject::NamedNode(g) => Some(g.clone()),
                _ => None,
            })
            .collect();

        let mut purged_subjects: FxHashSet<Term> = FxHashSet::default();
        for g in &doomed {
            for s in self.store.graph(g)?.subjects() {
                if let Subject::NamedNode(n) = s {
                    purged_subjects.insert(n.into());
                }
            }
        }
        purged_subjects.insert(urn_term.clone());

        // Version snapshot graphs and bookkeeping registered in the
        // history graph.
        let urn_subject: Subject = urn.clone().into();
        for v in hist.objects(&urn_subject, &nsc::fcrepo("hasVersion")) {
            for reg in hist.triples_matching(None, Some(&nsc::primary_topic()), Some(v)) {
                if let Subject::NamedNode(g) = &reg.subject {
                    doomed.push(g.clone());
                }
            }
            if let Term::NamedNode(v) = v {
                let vs: Subject = v.clone().into();
                self.store
                    .remove_matching(&nsc::hist_graph(), Some(&vs), None, None)?;
            }
        }

        for g in &doomed {
            debug!("Dropping graph {}", g);
            self.store.drop_graph(g)?;
            let s: Subject = g.clone().into();
            self.store
                .remove_matching(&nsc::meta_graph(), Some(&s), None, None)?;
            self.store
                .remove_matching(&nsc::hist_graph(), Some(&s), None, None)?;
        }
        self.store
            .remove_matching(&nsc::hist_graph(), Some(&urn_subject), None, None)?;

        // Inbound references, from live graphs only.
        if inbound {
            let live = self.store.graph(&nsc::meta_graph())?;
            for reg in live.triples_matching(None, Some(&nsc::primary_topic()), None) {
                let Subject::NamedNode(g) = &reg.subject else {
                    continue;
                };
                for s in &purged_subjects {
                    self.store.remove_matching(g, None, None, Some(s))?;
                }
            }
        }
        Ok(())
    }

    /// Store a version snapshot.
    ///
    /// The triples are expected to already carry the version URN as their
    /// subject; they are routed into the immutable `fcadmin:<uid>:<ver>` /
    /// `fcmain:<uid>:<ver>` pair (snapshots have no struct part). Both
    /// graphs, the `hasVersion` link and the version bookkeeping triples
    /// (`created` stamp, `hasVersionLabel`) are recorded in the history
    /// graph, which is the authoritative version registry.
    pub fn create_snapshot(
        &self,
        uid: &str,
        ver_uid: &str,
        ver_triples: &TripleSet,
        ver_meta: &TripleSet,
    ) -> RepoResult<()> {
        let urn = nsc::urn(uid);
        let ver_urn = version_urn(uid, ver_uid);
        let ver_ag = graph_uri(GraphDest::Admin, uid, Some(ver_uid));
        let ver_mg = graph_uri(GraphDest::Main, uid, Some(ver_uid));

        let mut admin_part = TripleSet::new();
        let mut main_part = TripleSet::new();
        for t in ver_triples.iter() {
            match self.router.route(t) {
                GraphDest::Admin => admin_part.insert(t.clone()),
                _ => main_part.insert(t.clone()),
            };
        }
        self.store.insert(&ver_ag, &admin_part)?;
        self.store.insert(&ver_mg, &main_part)?;

        let mut reg = TripleSet::new();
        reg.add(ver_ag, nsc::primary_topic(), ver_urn.clone());
        reg.add(ver_mg, nsc::primary_topic(), ver_urn.clone());
        reg.add(urn, nsc::fcrepo("hasVersion"), ver_urn);
        reg.extend(ver_meta.iter().cloned());
        self.store.insert(&nsc::hist_graph(), &reg)
    }

    /// Read a version snapshot (admin and main parts)
    pub fn get_version(&self, uid: &str, ver_uid: &str) -> RepoResult<TripleSet> {
        let mut gr = self
            .store
            .graph(&graph_uri(GraphDest::Admin, uid, Some(ver_uid)))?;
        gr.extend(
            self.store
                .graph(&graph_uri(GraphDest::Main, uid, Some(ver_uid)))?,
        );
        Ok(gr)
    }

    /// Version metadata of a resource, assembled from the history graph.
    ///
    /// Contains `hasVersion` links plus each version's `created` timestamp
    /// and `hasVersionLabel`. Kept in the history graph so it survives
    /// burial of the resource.
    pub fn get_version_info(&self, uid: &str) -> RepoResult<TripleSet> {
        let urn = nsc::urn(uid);
        let urn_subject: Subject = urn.clone().into();
        let hist = self.store.graph(&nsc::hist_graph())?;
        let mut out = TripleSet::new();

        for v in hist.objects(&urn_subject, &nsc::fcrepo("hasVersion")) {
            let Term::NamedNode(ver_urn) = v else { continue };
            out.add(urn.clone(), nsc::fcrepo("hasVersion"), ver_urn.clone());

            let ver_subject: Subject = ver_urn.clone().into();
            for p in [nsc::fcrepo("created"), nsc::fcrepo("hasVersionLabel")] {
                out.extend(
                    hist.triples_matching(Some(&ver_subject), Some(&p), None)
                        .into_iter()
                        .cloned(),
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn layout() -> RsrcCentricLayout<MemoryStore> {
        RsrcCentricLayout::new(MemoryStore::new())
    }

    fn urn_subject(uid: &str) -> Subject {
        nsc::urn(uid).into()
    }

    #[test]
    fn test_routing_is_total_and_disjoint() {
        let l = layout();
        let urn = nsc::fcres("x");

        // Server-managed predicate.
        let t = Triple::new(
            urn.clone(),
            nsc::fcrepo("created"),
            oxrdf::Literal::new_simple_literal("now"),
        );
        assert_eq!(l.route(&t), GraphDest::Admin);

        // Containment predicate.
        let t = Triple::new(urn.clone(), nsc::ldp("contains"), nsc::fcres("x/y"));
        assert_eq!(l.route(&t), GraphDest::Struct);

        // Server-managed type.
        let t = Triple::new(urn.clone(), nsc::rdf_type(), nsc::ldp("Container"));
        assert_eq!(l.route(&t), GraphDest::Admin);

        // User type.
        let t = Triple::new(
            urn.clone(),
            nsc::rdf_type(),
            NamedNode::new_unchecked("http://example.org/Thing"),
        );
        assert_eq!(l.route(&t), GraphDest::Main);

        // Anything else.
        let t = Triple::new(
            urn,
            NamedNode::new_unchecked("http://example.org/p"),
            oxrdf::Literal::new_simple_literal("v"),
        );
        assert_eq!(l.route(&t), GraphDest::Main);
    }

    #[test]
    fn test_modify_rsrc_routes_and_registers() {
        let l = layout();
        let urn = nsc::fcres("x");
        let mut add = TripleSet::new();
        add.add(urn.clone(), nsc::rdf_type(), nsc::fcrepo("Resource"));
        add.add(
            urn.clone(),
            NamedNode::new_unchecked("http://example.org/title"),
            oxrdf::Literal::new_simple_literal("A box"),
        );
        l.modify_rsrc("x", &TripleSet::new(), &add).unwrap();

        let admin = l.get_metadata("x", None).unwrap();
        assert_eq!(admin.len(), 1);
        assert!(admin.has_type(&urn_subject("x"), &nsc::fcrepo("Resource")));

        let main = l
            .store()
            .graph(&graph_uri(GraphDest::Main, "x", None))
            .unwrap();
        assert_eq!(main.len(), 1);

        // Both touched graphs registered in the meta graph.
        let meta = l.store().graph(&nsc::meta_graph()).unwrap();
        let regs = meta.triples_matching(
            None,
            Some(&nsc::primary_topic()),
            Some(&Term::from(urn)),
        );
        assert_eq!(regs.len(), 2);

        assert!(l.ask_rsrc_exists("x").unwrap());
        assert!(!l.ask_rsrc_exists("y").unwrap());
    }

    #[test]
    fn test_extract_imr_strict() {
        let l = layout();
        match l.extract_imr("ghost", &ImrOptions::default()) {
            Err(RepoError::NotFound { uid }) => assert_eq!(uid, "ghost"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        // Non-strict read of an absent resource is just empty.
        let gr = l
            .extract_imr(
                "ghost",
                &ImrOptions {
                    strict: false,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(gr.is_empty());
    }

    #[test]
    fn test_extract_imr_tombstone() {
        let l = layout();
        let urn = nsc::fcres("dead");
        let mut add = TripleSet::new();
        add.add(urn.clone(), nsc::rdf_type(), nsc::tombstone_type());
        add.add(
            urn,
            nsc::fcrepo("created"),
            oxrdf::Literal::new_simple_literal("2018-04-06T03:05:52Z"),
        );
        l.modify_rsrc("dead", &TripleSet::new(), &add).unwrap();

        match l.extract_imr("dead", &ImrOptions::default()) {
            Err(RepoError::Tombstone { uid, created }) => {
                assert_eq!(uid, "dead");
                assert_eq!(created.as_deref(), Some("2018-04-06T03:05:52Z"));
            }
            other => panic!("expected Tombstone, got {other:?}"),
        }

        // A tombstone pointer reports the buried ancestor.
        let mut ptr = TripleSet::new();
        ptr.add(nsc::fcres("dead/child"), nsc::tombstone_pred(), nsc::fcres("dead"));
        l.modify_rsrc("dead/child", &TripleSet::new(), &ptr).unwrap();
        match l.extract_imr("dead/child", &ImrOptions::default()) {
            Err(RepoError::Tombstone { uid, .. }) => assert_eq!(uid, "dead"),
            other => panic!("expected Tombstone, got {other:?}"),
        }
    }

    #[test]
    fn test_inbound_rel_scoped_to_live_graphs() {
        let l = layout();
        let x = nsc::fcres("x");
        let y = nsc::fcres("y");

        let mut add = TripleSet::new();
        add.add(y.clone(), nsc::rdf_type(), nsc::fcrepo("Resource"));
        add.add(y.clone(), NamedNode::new_unchecked("http://example.org/ref"), x.clone());
        l.modify_rsrc("y", &TripleSet::new(), &add).unwrap();

        // A reference sitting in an unregistered graph must not show up.
        let mut hidden = TripleSet::new();
        hidden.add(
            nsc::fcres("z"),
            NamedNode::new_unchecked("http://example.org/ref"),
            x.clone(),
        );
        l.store()
            .insert(&NamedNode::new_unchecked("info:fcmain:z:v0"), &hidden)
            .unwrap();

        let inbound = l.get_inbound_rel(&x).unwrap();
        assert_eq!(inbound.len(), 1);
        assert_eq!(
            inbound.subjects_with_object(&Term::from(x)),
            vec![Subject::from(y)]
        );
    }

    #[test]
    fn test_delete_rsrc_data_with_backup() {
        let l = layout();
        let urn = nsc::fcres("x");
        let mut add = TripleSet::new();
        add.add(urn.clone(), nsc::rdf_type(), nsc::fcrepo("Resource"));
        add.add(
            urn.clone(),
            NamedNode::new_unchecked("http://example.org/p"),
            oxrdf::Literal::new_simple_literal("v"),
        );
        l.modify_rsrc("x", &TripleSet::new(), &add).unwrap();

        l.delete_rsrc_data("x", Some("backup")).unwrap();

        assert!(l
            .store()
            .graph(&graph_uri(GraphDest::Main, "x", None))
            .unwrap()
            .is_empty());
        assert!(!l.ask_rsrc_exists("x").unwrap());
        // The main graph moved to the backup slot.
        assert_eq!(
            l.store()
                .graph(&graph_uri(GraphDest::Main, "x", Some("backup")))
                .unwrap()
                .len(),
            1
        );
        // Meta registrations cleared.
        assert!(l.store().graph(&nsc::meta_graph()).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_and_version_info() {
        let l = layout();
        let ver_urn = version_urn("x", "v1");
        let mut ver = TripleSet::new();
        ver.add(ver_urn.clone(), nsc::rdf_type(), nsc::fcrepo("Version"));
        ver.add(
            ver_urn.clone(),
            nsc::fcrepo("created"),
            oxrdf::Literal::new_simple_literal("2018-01-01T00:00:00Z"),
        );
        ver.add(
            ver_urn.clone(),
            NamedNode::new_unchecked("http://example.org/p"),
            oxrdf::Literal::new_simple_literal("payload"),
        );
        let mut meta = TripleSet::new();
        meta.add(
            ver_urn.clone(),
            nsc::fcrepo("created"),
            oxrdf::Literal::new_simple_literal("2018-04-06T03:05:52Z"),
        );
        meta.add(
            ver_urn.clone(),
            nsc::fcrepo("hasVersionLabel"),
            oxrdf::Literal::new_simple_literal("v1"),
        );
        l.create_snapshot("x", "v1", &ver, &meta).unwrap();

        // Admin-routed triples land in the version admin graph, the rest in
        // the version main graph; the snapshot read unions both.
        let snap = l.get_version("x", "v1").unwrap();
        assert_eq!(snap.len(), 3);
        let ver_admin = l.get_metadata("x", Some("v1")).unwrap();
        assert!(ver_admin
            .value(&ver_urn.clone().into(), &nsc::fcrepo("created"))
            .is_some());

        // Version info comes from the history graph, with the bookkeeping
        // stamp rather than the copied resource timestamp.
        let info = l.get_version_info("x").unwrap();
        let x_subject: Subject = nsc::fcres("x").into();
        assert_eq!(
            info.value_named(&x_subject, &nsc::fcrepo("hasVersion")),
            Some(ver_urn.clone())
        );
        let ver_subject: Subject = ver_urn.into();
        assert_eq!(
            info.value_literal(&ver_subject, &nsc::fcrepo("hasVersionLabel")).as_deref(),
            Some("v1")
        );
        assert_eq!(
            info.value_literal(&ver_subject, &nsc::fcrepo("created")).as_deref(),
            Some("2018-04-06T03:05:52Z")
        );
    }

    #[test]
    fn test_purge_removes_all_graphs_and_versions() {
        let l = layout();
        let x = nsc::fcres("x");
        let mut add = TripleSet::new();
        add.add(x.clone(), nsc::rdf_type(), nsc::fcrepo("Resource"));
        add.add(
            x.clone(),
            NamedNode::new_unchecked("http://example.org/p"),
            oxrdf::Literal::new_simple_literal("v"),
        );
        l.modify_rsrc("x", &TripleSet::new(), &add).unwrap();

        let mut ver = TripleSet::new();
        ver.add(version_urn("x", "v1"), nsc::rdf_type(), nsc::fcrepo("Version"));
        l.create_snapshot("x", "v1", &ver, &TripleSet::new()).unwrap();

        // Another live resource holding a reference to x.
        let mut refing = TripleSet::new();
        refing.add(nsc::fcres("y"), nsc::rdf_type(), nsc::fcrepo("Resource"));
        refing.add(
            nsc::fcres("y"),
            NamedNode::new_unchecked("http://example.org/ref"),
            x.clone(),
        );
        l.modify_rsrc("y", &TripleSet::new(), &refing).unwrap();

        l.purge_rsrc("x", true).unwrap();

        assert!(l.get_metadata("x", None).unwrap().is_empty());
        assert!(l.get_version("x", "v1").unwrap().is_empty());
        assert!(l.get_version_info("x").unwrap().is_empty());
        // The meta graph no longer mentions any graph of x...
        let meta = l.store().graph(&nsc::meta_graph()).unwrap();
        assert!(meta
            .triples_matching(None, Some(&nsc::primary_topic()), Some(&Term::from(x.clone())))
            .is_empty());
        // ...and the inbound reference was deleted from y, which is intact.
        assert!(l.ask_rsrc_exists("y").unwrap());
        let y_main = l
            .store()
            .graph(&graph_uri(GraphDest::Main, "y", None))
            .unwrap();
        assert!(y_main.triples_matching(None, None, Some(&Term::from(x))).is_empty());
    }
}
