//! LDP lifecycle engine
//!
//! Implements the user-level operations on a logical resource. Every write
//! decomposes into several routed read-modify-write steps against the
//! resource-centric layout, wrapped in a single transaction; the changelog
//! entries appended here become events after commit.
//!
//! All methods handle internal uids/URNs; conversion from public URIs
//! happens at the edge via the toolbox.

use crate::config::{MgdTermHandling, RefIntegrity, RepoConfig};
use crate::error::{RepoError, RepoResult, TermPosition};
use crate::event::{EventBus, EventKind};
use crate::model::kind::{ContainerKind, ResourceKind};
use crate::model::srv_mgd::SrvMgdTerms;
use crate::rdf::namespace as nsc;
use crate::rdf::TripleSet;
use crate::store::layout::{version_urn, ImrOptions, RsrcCentricLayout, VER_CONT_LABEL};
use crate::store::TripleStore;
use crate::tbox::Toolbox;
use crate::tx::{with_transaction, ChangelogEntry, EventMeta, RequestCtx};
use oxrdf::{Literal, NamedNode, Subject, Term};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Options for the delete operation
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Also delete inbound relationships. Forced on under strict
    /// referential integrity.
    pub inbound: bool,
    /// Delete all child resources
    pub delete_children: bool,
    /// Leave a tombstone (reversible) instead of purging
    pub leave_tombstone: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            inbound: true,
            delete_children: true,
            leave_tombstone: true,
        }
    }
}

/// Header values derived from a resource's metadata
#[derive(Debug, Clone)]
pub struct ResourceHeaders {
    /// Weak ETag from the stored message digest
    pub etag: Option<String>,
    /// `fcrepo:lastModified` value
    pub last_modified: Option<String>,
    /// `Link: <type>;rel="type"` values for the LDP types
    pub link_types: Vec<String>,
    pub kind: ResourceKind,
}

/// The lifecycle engine over a [`TripleStore`].
pub struct LdpEngine<S: TripleStore> {
    layout: RsrcCentricLayout<S>,
    config: Arc<RepoConfig>,
    tbox: Toolbox,
    events: EventBus,
    mgd: SrvMgdTerms,
}

impl<S: TripleStore> LdpEngine<S> {
    pub fn new(store: S, config: RepoConfig) -> Self {
        let tbox = Toolbox::new(&config.webroot);
        Self {
            layout: RsrcCentricLayout::new(store),
            config: Arc::new(config),
            tbox,
            events: EventBus::new(),
            mgd: SrvMgdTerms::new(),
        }
    }

    pub fn layout(&self) -> &RsrcCentricLayout<S> {
        &self.layout
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn tbox(&self) -> &Toolbox {
        &self.tbox
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // Read surface

    /// User-facing graph of a resource, globalized.
    ///
    /// Excludes the digest and version bookkeeping, like any LDP `GET`.
    pub fn get(&self, uid: &str) -> RepoResult<TripleSet> {
        let imr = self.layout.extract_imr(uid, &ImrOptions::default())?;
        let digest = nsc::premis("hasMessageDigest");
        let has_version = nsc::fcrepo("hasVersion");
        let out: TripleSet = imr
            .iter()
            .filter(|t| t.predicate != digest && t.predicate != has_version)
            .cloned()
            .collect();
        Ok(self.tbox.globalize_triples(&out))
    }

    /// Header values for a resource
    pub fn head(&self, uid: &str) -> RepoResult<ResourceHeaders> {
        let meta = self.layout.extract_imr(
            uid,
            &ImrOptions {
                incl_children: false,
                ..Default::default()
            },
        )?;
        let subject: Subject = self.tbox.uid_to_urn(uid).into();

        let etag = meta
            .value_named(&subject, &nsc::premis("hasMessageDigest"))
            .and_then(|d| d.as_str().rsplit(':').next().map(str::to_string))
            .map(|cksum| format!("W/\"{cksum}\""));
        let last_modified = meta.value_literal(&subject, &nsc::fcrepo("lastModified"));

        let types = meta.types_of(&subject);
        let link_types = types
            .iter()
            .filter(|t| t.as_str().starts_with(nsc::LDP))
            .map(|t| format!("<{}>;rel=\"type\"", t.as_str()))
            .collect();

        Ok(ResourceHeaders {
            etag,
            last_modified,
            link_types,
            kind: ResourceKind::from_types(types.iter()),
        })
    }

    /// Version metadata (`fcr:versions`), globalized
    pub fn get_version_info(&self, uid: &str) -> RepoResult<TripleSet> {
        let info = self.layout.get_version_info(uid)?;
        Ok(self.tbox.globalize_triples(&info))
    }

    /// A single version snapshot, globalized
    pub fn get_version(&self, uid: &str, ver_uid: &str) -> RepoResult<TripleSet> {
        let gr = self.layout.get_version(uid, ver_uid)?;
        Ok(self.tbox.globalize_triples(&gr))
    }

    // Lifecycle operations

    /// Drop all data and install the root node
    pub fn bootstrap(&self) -> RepoResult<()> {
        let root = nsc::root_urn();
        self.run_tx(|ctx| {
            let mut seed = TripleSet::new();
            for t in [
                nsc::fcrepo("Resource"),
                nsc::fcrepo("Container"),
                nsc::ldp("Resource"),
                nsc::ldp("RDFSource"),
                nsc::ldp("Container"),
                nsc::ldp("BasicContainer"),
            ] {
                seed.add(root.clone(), nsc::rdf_type(), t);
            }
            let user = Literal::new_simple_literal(&ctx.config().default_user);
            seed.add(root.clone(), nsc::fcrepo("created"), ctx.timestamp_literal());
            seed.add(root.clone(), nsc::fcrepo("createdBy"), user.clone());
            seed.add(root.clone(), nsc::fcrepo("lastModified"), ctx.timestamp_literal());
            seed.add(root.clone(), nsc::fcrepo("lastModifiedBy"), user);
            self.layout.bootstrap(&seed)
        })
    }

    /// Create a resource or replace an existing one.
    ///
    /// With `create_only` an existing resource is not consulted (LDP
    /// `POST` semantics); otherwise the provided graph replaces the stored
    /// one minus the protected predicates (LDP `PUT`).
    pub fn create_or_replace(
        &self,
        uid: &str,
        payload: TripleSet,
        create_only: bool,
    ) -> RepoResult<EventKind> {
        self.validate_uid(uid)?;
        self.run_tx(|ctx| self.create_or_replace_inner(ctx, uid, payload, create_only))
    }

    /// Delete a resource, leaving a tombstone unless told otherwise
    pub fn delete(&self, uid: &str, opts: &DeleteOptions) -> RepoResult<EventKind> {
        self.validate_uid(uid)?;
        self.run_tx(|ctx| self.delete_inner(ctx, uid, opts))
    }

    /// Hard-delete a tombstoned (or live) resource and all its versions.
    ///
    /// Emits no event by contract.
    pub fn purge(&self, uid: &str, inbound: bool) -> RepoResult<()> {
        self.validate_uid(uid)?;
        let inbound = inbound || self.config.referential_integrity == RefIntegrity::Strict;
        self.run_tx(|_ctx| self.layout.purge_rsrc(uid, inbound))
    }

    /// Bring a tombstoned resource back from its most recent version.
    ///
    /// Experimental. Returns the resource URI.
    pub fn resurrect(&self, uid: &str) -> RepoResult<NamedNode> {
        self.validate_uid(uid)?;
        self.run_tx(|ctx| self.resurrect_inner(ctx, uid))
    }

    /// Create a version snapshot; returns the globalized version URN.
    ///
    /// An empty or already-used label is replaced with a generated one.
    pub fn create_version(&self, uid: &str, ver_uid: Option<&str>) -> RepoResult<NamedNode> {
        self.validate_uid(uid)?;
        self.run_tx(|ctx| {
            let ver_urn = self.create_version_inner(ctx, uid, ver_uid, true)?;
            Ok(self.tbox.globalize_term(&ver_urn))
        })
    }

    /// Revert a resource to a previous version, optionally snapshotting
    /// the current state first
    pub fn revert_to_version(
        &self,
        uid: &str,
        ver_uid: &str,
        backup: bool,
    ) -> RepoResult<EventKind> {
        self.validate_uid(uid)?;
        self.run_tx(|ctx| self.revert_inner(ctx, uid, ver_uid, backup))
    }

    // Operation internals. All of these assume an open transaction.

    fn run_tx<T>(&self, op: impl FnOnce(&RequestCtx) -> RepoResult<T>) -> RepoResult<T> {
        let ctx = RequestCtx::new(Arc::clone(&self.config));
        with_transaction(self.layout.store(), &ctx, &self.events, &self.tbox, || {
            op(&ctx)
        })
    }

    fn create_or_replace_inner(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        payload: TripleSet,
        create_only: bool,
    ) -> RepoResult<EventKind> {
        let urn = self.tbox.uid_to_urn(uid);

        // A buried resource blocks the slot until purged or resurrected.
        self.check_not_buried(uid)?;

        let payload = self.tbox.localize_triples(&payload);
        let payload = self.ensure_single_subject(uid, &urn, payload)?;
        let mut payload = self.check_mgd_terms(payload)?;

        let create = create_only || !self.layout.ask_rsrc_exists(uid)?;

        self.add_srv_mgd_triples(ctx, &urn, &mut payload, create);
        self.check_ref_int(uid, &mut payload)?;

        let ev_type = if create {
            self.modify_rsrc(ctx, uid, EventKind::Created, &TripleSet::new(), &payload, true)?;
            EventKind::Created
        } else {
            // The stored graph is the "minus" delta; protected predicates
            // must survive a replace.
            let mut stored = self.layout.extract_imr(uid, &ImrOptions::default())?;
            for p in [
                nsc::fcrepo("created"),
                nsc::fcrepo("createdBy"),
                nsc::ldp("contains"),
            ] {
                stored.remove_matching(None, Some(&p), None);
            }
            let (remove, add) = dedup_deltas(&stored, &payload);
            self.modify_rsrc(ctx, uid, EventKind::Updated, &remove, &add, true)?;
            EventKind::Updated
        };

        self.set_containment(ctx, uid, &urn, &payload)?;

        Ok(ev_type)
    }

    fn delete_inner(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        opts: &DeleteOptions,
    ) -> RepoResult<EventKind> {
        let inbound =
            opts.inbound || self.config.referential_integrity == RefIntegrity::Strict;

        let imr = self.layout.extract_imr(uid, &ImrOptions::default())?;
        let children = if opts.delete_children {
            self.descendants(uid)?
        } else {
            Vec::new()
        };

        if opts.leave_tombstone {
            self.bury_rsrc(ctx, uid, inbound, None)?;
            let urn = self.tbox.uid_to_urn(uid);
            for child_uid in &children {
                self.bury_rsrc(ctx, child_uid, inbound, Some(&urn))?;
            }
        } else {
            // Purge semantics: the stored data disappears entirely, but the
            // user-facing delete still announces itself.
            self.note_event(ctx, EventKind::Deleted, &imr, &TripleSet::new());
            for child_uid in &children {
                self.layout.purge_rsrc(child_uid, inbound)?;
            }
            self.layout.purge_rsrc(uid, inbound)?;
        }

        Ok(EventKind::Deleted)
    }

    fn resurrect_inner(&self, ctx: &RequestCtx, uid: &str) -> RepoResult<NamedNode> {
        let urn = self.tbox.uid_to_urn(uid);
        let subject: Subject = urn.clone().into();

        let tstone = self.layout.extract_imr(
            uid,
            &ImrOptions {
                strict: false,
                ..Default::default()
            },
        )?;
        let is_buried = tstone.has_type(&subject, &nsc::tombstone_type())
            || tstone.value(&subject, &nsc::tombstone_pred()).is_some();
        if !is_buried {
            return Err(RepoError::invalid_resource(uid, "not a tombstone"));
        }

        // Most recent snapshot by version creation stamp.
        let info = self.layout.get_version_info(uid)?;
        let mut latest: Option<(String, String)> = None;
        for v in info.objects(&subject, &nsc::fcrepo("hasVersion")) {
            let Term::NamedNode(ver_urn) = v else { continue };
            let ver_subject: Subject = ver_urn.clone().into();
            let (Some(label), Some(ts)) = (
                info.value_literal(&ver_subject, &nsc::fcrepo("hasVersionLabel")),
                info.value_literal(&ver_subject, &nsc::fcrepo("created")),
            ) else {
                continue;
            };
            if latest.as_ref().map_or(true, |(_, best)| ts > *best) {
                latest = Some((label, ts));
            }
        }
        let Some((ver_label, _)) = latest else {
            return Err(RepoError::invalid_resource(uid, "no version to resurrect from"));
        };

        let ver_urn = version_urn(uid, &ver_label);
        let snapshot = self.layout.get_version(uid, &ver_label)?;
        let version_type: Term = nsc::fcrepo("Version").into();
        let rdf_type = nsc::rdf_type();
        let restored: TripleSet = snapshot
            .iter()
            .filter(|t| !(t.predicate == rdf_type && t.object == version_type))
            .cloned()
            .collect();
        let mut revived = restored.rewrite_subject(&ver_urn, &urn);

        revived.add(urn.clone(), rdf_type.clone(), nsc::fcrepo("Resource"));
        match ResourceKind::from_types(revived.types_of(&subject).iter()) {
            ResourceKind::NonRdfSource => {
                revived.add(urn.clone(), rdf_type, nsc::fcrepo("Binary"));
            }
            kind if kind.is_container() => {
                revived.add(urn.clone(), rdf_type, nsc::fcrepo("Container"));
            }
            _ => {}
        }

        self.modify_rsrc(ctx, uid, EventKind::Created, &tstone, &revived, true)?;
        self.set_containment(ctx, uid, &urn, &revived)?;

        Ok(self.tbox.uid_to_uri(uid))
    }

    /// Create a snapshot of the current state and register it.
    ///
    /// No event is created for the version itself; the caller decides
    /// whether the `hasVersion` update on the resource is notified.
    fn create_version_inner(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        ver_uid: Option<&str>,
        notify: bool,
    ) -> RepoResult<NamedNode> {
        let urn = self.tbox.uid_to_urn(uid);

        let info = self.layout.get_version_info(uid)?;
        let used: FxHashSet<String> = info
            .iter()
            .filter(|t| t.predicate == nsc::fcrepo("hasVersionLabel"))
            .filter_map(|t| match &t.object {
                Term::Literal(l) => Some(l.value().to_string()),
                _ => None,
            })
            .collect();
        let label = match ver_uid {
            Some(v) if !v.is_empty() && !used.contains(v) => v.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let ver_urn = version_urn(uid, &label);
        let vers_urn = nsc::fcres(&format!("{uid}/{VER_CONT_LABEL}"));

        let imr = self.layout.extract_imr(
            uid,
            &ImrOptions {
                incl_children: false,
                ..Default::default()
            },
        )?;

        // Copy the current state, minus the terms that only make sense on
        // the live resource.
        let excluded_types: [Term; 3] = [
            nsc::fcrepo("Binary").into(),
            nsc::fcrepo("Container").into(),
            nsc::fcrepo("Resource").into(),
        ];
        let excluded_preds = [
            nsc::fcrepo("hasParent"),
            nsc::fcrepo("hasVersions"),
            nsc::premis("hasMessageDigest"),
        ];
        let rdf_type = nsc::rdf_type();
        let copied: TripleSet = imr
            .iter()
            .filter(|t| {
                !(t.predicate == rdf_type && excluded_types.contains(&t.object))
                    && !excluded_preds.contains(&t.predicate)
            })
            .cloned()
            .collect();
        let mut ver_add = copied.rewrite_subject(&urn, &ver_urn);
        ver_add.add(ver_urn.clone(), rdf_type, nsc::fcrepo("Version"));

        let mut ver_meta = TripleSet::new();
        ver_meta.add(ver_urn.clone(), nsc::fcrepo("created"), ctx.timestamp_literal());
        ver_meta.add(
            ver_urn.clone(),
            nsc::fcrepo("hasVersionLabel"),
            Literal::new_simple_literal(&label),
        );
        self.layout.create_snapshot(uid, &label, &ver_add, &ver_meta)?;

        // Version bookkeeping on the resource's own admin graph. The
        // version-subject triples are never notified.
        self.modify_rsrc(ctx, uid, EventKind::Updated, &TripleSet::new(), &ver_meta, false)?;

        let mut announced = TripleSet::new();
        announced.add(urn.clone(), nsc::fcrepo("hasVersion"), ver_urn.clone());
        announced.add(urn, nsc::fcrepo("hasVersions"), vers_urn);
        self.modify_rsrc(ctx, uid, EventKind::Updated, &TripleSet::new(), &announced, notify)?;

        Ok(ver_urn)
    }

    fn revert_inner(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        ver_uid: &str,
        backup: bool,
    ) -> RepoResult<EventKind> {
        let urn = self.tbox.uid_to_urn(uid);

        let snapshot = self.layout.get_version(uid, ver_uid)?;
        if snapshot.is_empty() {
            return Err(RepoError::not_found(format!(
                "{uid}/{VER_CONT_LABEL}/{ver_uid}"
            )));
        }

        if backup {
            self.create_version_inner(ctx, uid, None, true)?;
        }

        // The snapshot payload minus server-managed terms becomes a fresh
        // provided graph.
        let ver_urn = version_urn(uid, ver_uid);
        let rdf_type = nsc::rdf_type();
        let revert_gr: TripleSet = snapshot
            .rewrite_subject(&ver_urn, &urn)
            .iter()
            .filter(|t| {
                if self.mgd.is_predicate(&t.predicate) {
                    return false;
                }
                if t.predicate == rdf_type {
                    if let Term::NamedNode(o) = &t.object {
                        return !self.mgd.is_type(o);
                    }
                }
                true
            })
            .cloned()
            .collect();

        self.create_or_replace_inner(ctx, uid, revert_gr, false)
    }

    /// Bury a single resource, leaving a tombstone or a pointer to an
    /// ancestor tombstone. A backup snapshot is taken for resurrection.
    fn bury_rsrc(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        inbound: bool,
        tstone_pointer: Option<&NamedNode>,
    ) -> RepoResult<()> {
        let urn = self.tbox.uid_to_urn(uid);
        info!("Removing resource {}", urn);

        self.create_version_inner(ctx, uid, None, false)?;

        let imr = self.layout.extract_imr(
            uid,
            &ImrOptions {
                strict: false,
                ..Default::default()
            },
        )?;

        let mut markers = TripleSet::new();
        match tstone_pointer {
            Some(ancestor) => {
                markers.add(urn.clone(), nsc::tombstone_pred(), ancestor.clone());
            }
            None => {
                markers.add(urn.clone(), nsc::rdf_type(), nsc::tombstone_type());
                markers.add(urn.clone(), nsc::fcrepo("created"), ctx.timestamp_literal());
            }
        }
        self.modify_rsrc(ctx, uid, EventKind::Deleted, &imr, &markers, true)?;

        if inbound {
            for t in self.layout.get_inbound_rel(&urn)?.iter() {
                let Subject::NamedNode(holder) = &t.subject else {
                    continue;
                };
                let Some(holder_uid) = nsc::uid_from_urn(holder) else {
                    continue;
                };
                let remove: TripleSet = [t.clone()].into_iter().collect();
                self.modify_rsrc(
                    ctx,
                    &holder_uid,
                    EventKind::Updated,
                    &remove,
                    &TripleSet::new(),
                    true,
                )?;
            }
        }
        Ok(())
    }

    /// Find the closest extant ancestor, creating pairtree segments for
    /// the missing intermediates, and establish the containment triples.
    fn set_containment(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        urn: &NamedNode,
        provided: &TripleSet,
    ) -> RepoResult<()> {
        if uid.is_empty() {
            return Ok(());
        }

        // Chain from the first extant ancestor (or root) down to the new
        // resource, through the missing pairtree segments.
        let components: Vec<&str> = uid.split('/').collect();
        let mut found: Option<String> = None;
        let mut missing: Vec<String> = Vec::new();
        if components.len() >= 2 {
            for i in (1..components.len()).rev() {
                let cand = components[..i].join("/");
                if self.layout.ask_rsrc_exists(&cand)? {
                    found = Some(cand);
                    break;
                }
                missing.push(cand);
            }
        }
        let parent_uid = found.unwrap_or_default();

        let mut chain: Vec<(String, NamedNode)> =
            vec![(parent_uid.clone(), self.tbox.uid_to_urn(&parent_uid))];
        for seg_uid in missing.iter().rev() {
            chain.push((seg_uid.clone(), nsc::fcres(seg_uid)));
        }

        // Materialize the missing segments, linking each to its child so
        // the containment chain stays unbroken. Segment plumbing is not
        // notified.
        for idx in 1..chain.len() {
            let (seg_uid, seg_urn) = &chain[idx];
            let child_urn = if idx + 1 < chain.len() {
                chain[idx + 1].1.clone()
            } else {
                urn.clone()
            };
            debug!("Creating pairtree segment {}", seg_urn);

            let mut seg = TripleSet::new();
            for t in [
                nsc::ldp("Container"),
                nsc::ldp("BasicContainer"),
                nsc::ldp("RDFSource"),
                nsc::fcrepo("Pairtree"),
            ] {
                seg.add(seg_urn.clone(), nsc::rdf_type(), t);
            }
            seg.add(seg_urn.clone(), nsc::fcsystem_contains(), child_urn.clone());
            seg.add(seg_urn.clone(), nsc::ldp("contains"), child_urn);
            seg.add(seg_urn.clone(), nsc::fcrepo("hasParent"), chain[idx - 1].1.clone());
            self.modify_rsrc(ctx, seg_uid, EventKind::Updated, &TripleSet::new(), &seg, false)?;

            if idx == 1 {
                let mut link = TripleSet::new();
                link.add(chain[0].1.clone(), nsc::ldp("contains"), seg_urn.clone());
                self.modify_rsrc(
                    ctx,
                    &chain[0].0,
                    EventKind::Updated,
                    &TripleSet::new(),
                    &link,
                    false,
                )?;
            }
        }

        // The resource's real parent is the deepest chain element.
        let (parent_uid, parent_urn) = chain
            .last()
            .cloned()
            .unwrap_or_else(|| (String::new(), nsc::root_urn()));

        let mut link = TripleSet::new();
        link.add(parent_urn.clone(), nsc::ldp("contains"), urn.clone());
        self.modify_rsrc(ctx, &parent_uid, EventKind::Updated, &TripleSet::new(), &link, true)?;

        self.add_ldp_dc_ic_rel(ctx, uid, urn, provided, &parent_uid, &parent_urn)
    }

    /// Add the `hasParent` link and any direct/indirect container
    /// membership projection.
    fn add_ldp_dc_ic_rel(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        urn: &NamedNode,
        provided: &TripleSet,
        parent_uid: &str,
        parent_urn: &NamedNode,
    ) -> RepoResult<()> {
        let mut own = TripleSet::new();
        own.add(urn.clone(), nsc::fcrepo("hasParent"), parent_urn.clone());
        self.modify_rsrc(ctx, uid, EventKind::Updated, &TripleSet::new(), &own, true)?;

        let parent_meta = self.layout.get_metadata(parent_uid, None)?;
        let parent_subject: Subject = parent_urn.clone().into();

        let (Some(mbr_rsrc), Some(mbr_rel)) = (
            parent_meta.value_named(&parent_subject, &nsc::ldp("membershipResource")),
            parent_meta.value_named(&parent_subject, &nsc::ldp("hasMemberRelation")),
        ) else {
            return Ok(());
        };

        let kind = ResourceKind::from_types(parent_meta.types_of(&parent_subject).iter());
        let target: Option<Term> = match kind.container() {
            Some(ContainerKind::Direct) => {
                info!("Parent is a direct container.");
                Some(urn.clone().into())
            }
            Some(ContainerKind::Indirect) => {
                let Some(cont_rel) = parent_meta
                    .value_named(&parent_subject, &nsc::ldp("insertedContentRelation"))
                else {
                    return Ok(());
                };
                info!("Parent is an indirect container.");
                let member_subject: Subject = urn.clone().into();
                provided.value(&member_subject, &cont_rel).cloned()
            }
            _ => None,
        };
        let Some(target) = target else {
            return Ok(());
        };

        // The membership triple lands in the membership resource's own
        // user graph.
        let mbr_rsrc = self.tbox.localize_term(&mbr_rsrc);
        let Some(mbr_uid) = nsc::uid_from_urn(&mbr_rsrc) else {
            debug!(
                "Membership resource {} outside the repository; skipping",
                mbr_rsrc
            );
            return Ok(());
        };
        let mut membership = TripleSet::new();
        membership.add(mbr_rsrc, mbr_rel, target);
        self.modify_rsrc(
            ctx,
            &mbr_uid,
            EventKind::Updated,
            &TripleSet::new(),
            &membership,
            true,
        )
    }

    /// Transitive `ldp:contains` descendants, breadth-first.
    ///
    /// The containment invariant forbids cycles, but the traversal keeps a
    /// visited set so it terminates on corrupt data too.
    fn descendants(&self, uid: &str) -> RepoResult<Vec<String>> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<(String, NamedNode)> =
            VecDeque::from([(uid.to_string(), self.tbox.uid_to_urn(uid))]);
        let contains = nsc::ldp("contains");

        while let Some((cur_uid, cur_urn)) = queue.pop_front() {
            let sg = crate::store::layout::graph_uri(
                crate::store::layout::GraphDest::Struct,
                &cur_uid,
                None,
            );
            let cur_subject: Subject = cur_urn.into();
            for t in self
                .layout
                .store()
                .triples_matching(&sg, Some(&cur_subject), Some(&contains), None)?
            {
                let Term::NamedNode(child) = t.object else { continue };
                let Some(child_uid) = nsc::uid_from_urn(&child) else {
                    continue;
                };
                if seen.insert(child_uid.clone()) {
                    out.push(child_uid.clone());
                    queue.push_back((child_uid, child));
                }
            }
        }
        Ok(out)
    }

    // Payload checks and enrichment

    fn validate_uid(&self, uid: &str) -> RepoResult<()> {
        let malformed = uid.starts_with('/')
            || uid.ends_with('/')
            || uid.contains("//")
            || uid.contains('#')
            || uid.contains(':');
        if malformed {
            return Err(RepoError::invalid_resource(uid, "malformed uid"));
        }
        Ok(())
    }

    /// A create/replace on a buried slot is rejected until the tombstone
    /// is purged or resurrected.
    fn check_not_buried(&self, uid: &str) -> RepoResult<()> {
        let urn = self.tbox.uid_to_urn(uid);
        let subject: Subject = urn.into();
        let meta = self.layout.get_metadata(uid, None)?;
        if meta.has_type(&subject, &nsc::tombstone_type()) {
            return Err(RepoError::Tombstone {
                uid: uid.to_string(),
                created: meta.value_literal(&subject, &nsc::fcrepo("created")),
            });
        }
        if let Some(ptr) = meta.value_named(&subject, &nsc::tombstone_pred()) {
            return Err(RepoError::Tombstone {
                uid: nsc::uid_from_urn(&ptr).unwrap_or_else(|| ptr.as_str().to_string()),
                created: None,
            });
        }
        Ok(())
    }

    /// Every payload subject must be the resource URN or a hash fragment
    /// of it; fragments are recorded via `fcsystem:fragmentOf`.
    fn ensure_single_subject(
        &self,
        uid: &str,
        urn: &NamedNode,
        payload: TripleSet,
    ) -> RepoResult<TripleSet> {
        let frag_prefix = format!("{}#", urn.as_str());
        let mut out = TripleSet::new();

        for t in payload.iter() {
            match &t.subject {
                Subject::NamedNode(s) if s == urn => {}
                Subject::NamedNode(s) if s.as_str().starts_with(&frag_prefix) => {
                    out.add(s.clone(), nsc::fragment_of(), urn.clone());
                }
                other => {
                    return Err(RepoError::SingleSubject {
                        subject: other.to_string(),
                        uid: uid.to_string(),
                    });
                }
            }
            out.insert(t.clone());
        }
        Ok(out)
    }

    /// Apply the configured server-managed-term policy to a payload.
    fn check_mgd_terms(&self, mut payload: TripleSet) -> RepoResult<TripleSet> {
        let handling = self.config.srv_mgd_handling;
        if handling == MgdTermHandling::None {
            return Ok(payload);
        }
        let strict = handling == MgdTermHandling::Strict;

        let offending_subjects: Vec<NamedNode> = payload
            .subjects()
            .into_iter()
            .filter_map(|s| match s {
                Subject::NamedNode(n) if self.mgd.is_subject(&n) => Some(n),
                _ => None,
            })
            .collect();
        if !offending_subjects.is_empty() {
            if strict {
                return Err(RepoError::ServerManagedTerm {
                    terms: offending_subjects.iter().map(|t| t.to_string()).collect(),
                    position: TermPosition::Subject,
                });
            }
            for s in offending_subjects {
                info!("Removing offending subject: {}", s);
                payload.remove_matching(Some(&s.into()), None, None);
            }
        }

        let offending_preds: Vec<NamedNode> = payload
            .predicates()
            .into_iter()
            .filter(|p| self.mgd.is_predicate(p))
            .collect();
        if !offending_preds.is_empty() {
            if strict {
                return Err(RepoError::ServerManagedTerm {
                    terms: offending_preds.iter().map(|t| t.to_string()).collect(),
                    position: TermPosition::Predicate,
                });
            }
            for p in offending_preds {
                info!("Removing offending predicate: {}", p);
                payload.remove_matching(None, Some(&p), None);
            }
        }

        let rdf_type = nsc::rdf_type();
        let offending_types: Vec<NamedNode> = payload
            .triples_matching(None, Some(&rdf_type), None)
            .into_iter()
            .filter_map(|t| match &t.object {
                Term::NamedNode(o) if self.mgd.is_type(o) => Some(o.clone()),
                _ => None,
            })
            .collect();
        if !offending_types.is_empty() {
            if strict {
                return Err(RepoError::ServerManagedTerm {
                    terms: offending_types.iter().map(|t| t.to_string()).collect(),
                    position: TermPosition::RdfType,
                });
            }
            for o in offending_types {
                info!("Removing offending type: {}", o);
                payload.remove_matching(None, Some(&rdf_type), Some(&o.into()));
            }
        }

        Ok(payload)
    }

    /// Enrich a payload with the server-managed triples.
    ///
    /// The digest is set last, over the enriched graph, so a fresh extract
    /// always hashes to its own recorded digest.
    fn add_srv_mgd_triples(
        &self,
        ctx: &RequestCtx,
        urn: &NamedNode,
        payload: &mut TripleSet,
        create: bool,
    ) {
        let subject: Subject = urn.clone().into();

        for t in [
            nsc::fcrepo("Resource"),
            nsc::ldp("Resource"),
            nsc::ldp("RDFSource"),
        ] {
            payload.add(urn.clone(), nsc::rdf_type(), t);
        }

        let user = Literal::new_simple_literal(&ctx.config().default_user);
        if create {
            payload.replace_value(
                subject.clone(),
                nsc::fcrepo("created"),
                ctx.timestamp_literal().into(),
            );
            payload.replace_value(
                subject.clone(),
                nsc::fcrepo("createdBy"),
                user.clone().into(),
            );
        }
        payload.replace_value(
            subject.clone(),
            nsc::fcrepo("lastModified"),
            ctx.timestamp_literal().into(),
        );
        payload.replace_value(
            subject.clone(),
            nsc::fcrepo("lastModifiedBy"),
            user.into(),
        );

        let digest = nsc::premis("hasMessageDigest");
        payload.remove_matching(None, Some(&digest), None);
        let cksum = self.tbox.rdf_cksum(payload);
        payload.add(
            urn.clone(),
            digest,
            NamedNode::new_unchecked(format!("urn:sha1:{cksum}")),
        );
    }

    /// Enforce the referential integrity policy on payload objects inside
    /// the repository namespace.
    fn check_ref_int(&self, uid: &str, payload: &mut TripleSet) -> RepoResult<()> {
        let mode = self.config.referential_integrity;
        if mode == RefIntegrity::Off {
            return Ok(());
        }

        let mut dangling: Vec<NamedNode> = Vec::new();
        for t in payload.iter() {
            let Term::NamedNode(o) = &t.object else { continue };
            let Some(target_uid) = self.repo_object_uid(o) else {
                continue;
            };
            if target_uid == uid {
                continue;
            }
            if !self.layout.ask_rsrc_exists(&target_uid)? {
                if mode == RefIntegrity::Strict {
                    return Err(RepoError::RefIntViolation(o.as_str().to_string()));
                }
                dangling.push(o.clone());
            }
        }
        for o in dangling {
            info!("Removing link to non-existent repo resource: {}", o);
            payload.remove_matching(None, None, Some(&o.into()));
        }
        Ok(())
    }

    fn repo_object_uid(&self, o: &NamedNode) -> Option<String> {
        nsc::uid_from_urn(o).or_else(|| {
            o.as_str()
                .strip_prefix(&format!("{}/", self.tbox.webroot()))
                .map(str::to_string)
        })
    }

    // Changelog plumbing

    /// Apply a routed delta and record it for event emission.
    ///
    /// Any write that should be notified goes through here; this is the
    /// single messaging choke point.
    fn modify_rsrc(
        &self,
        ctx: &RequestCtx,
        uid: &str,
        ev_type: EventKind,
        remove: &TripleSet,
        add: &TripleSet,
        notify: bool,
    ) -> RepoResult<()> {
        self.layout.modify_rsrc(uid, remove, add)?;
        if notify {
            self.note_event(ctx, ev_type, remove, add);
        }
        Ok(())
    }

    /// Append a changelog entry without touching the store
    fn note_event(&self, ctx: &RequestCtx, ev_type: EventKind, remove: &TripleSet, add: &TripleSet) {
        if !self.config.messaging {
            return;
        }
        let merged = remove | add;
        let rdf_type = nsc::rdf_type();
        let created_by = nsc::fcrepo("createdBy");

        let mut rdf_types: FxHashSet<String> = FxHashSet::default();
        let mut actors: FxHashSet<String> = FxHashSet::default();
        for t in merged.iter() {
            if t.predicate == rdf_type {
                if let Term::NamedNode(o) = &t.object {
                    rdf_types.insert(o.as_str().to_string());
                }
            } else if t.predicate == created_by {
                match &t.object {
                    Term::Literal(l) => actors.insert(l.value().to_string()),
                    Term::NamedNode(n) => actors.insert(n.as_str().to_string()),
                    _ => false,
                };
            }
        }
        let mut rdf_types: Vec<String> = rdf_types.into_iter().collect();
        rdf_types.sort();
        let mut actors: Vec<String> = actors.into_iter().collect();
        actors.sort();

        ctx.append_changelog(ChangelogEntry {
            remove: remove.clone(),
            add: add.clone(),
            meta: EventMeta {
                ev_type,
                timestamp: ctx.timestamp_string(),
                rdf_types,
                actors,
            },
        });
    }
}

/// Remove the duplicate triples from a pair of delta graphs, which would
/// otherwise contain statements that annul each other.
pub fn dedup_deltas(remove: &TripleSet, add: &TripleSet) -> (TripleSet, TripleSet) {
    (remove - add, add - remove)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> LdpEngine<MemoryStore> {
        let engine = LdpEngine::new(MemoryStore::new(), RepoConfig::default());
        engine.bootstrap().unwrap();
        engine
    }

    fn ctx(engine: &LdpEngine<MemoryStore>) -> RequestCtx {
        RequestCtx::new(Arc::new(engine.config().clone()))
    }

    fn payload(uid: &str, turtle: &str) -> TripleSet {
        TripleSet::parse_turtle(turtle, Some(&format!("info:fcres:{uid}"))).unwrap()
    }

    #[test]
    fn test_validate_uid() {
        let e = engine();
        for bad in ["/a", "a/", "a//b", "a#b", "a:b"] {
            assert!(matches!(
                e.create_or_replace(bad, TripleSet::new(), false),
                Err(RepoError::InvalidResource { .. })
            ));
        }
    }

    #[test]
    fn test_ensure_single_subject() {
        let e = engine();
        let urn = nsc::fcres("x");

        let ok = payload("x", "<> <http://example.org/p> \"v\" . <#frag> <http://example.org/q> \"w\" .");
        let out = e.ensure_single_subject("x", &urn, ok).unwrap();
        // The fragment link was appended.
        let frag: Subject = NamedNode::new_unchecked("info:fcres:x#frag").into();
        assert_eq!(out.value_named(&frag, &nsc::fragment_of()), Some(urn.clone()));
        assert_eq!(out.len(), 3);

        let bad = payload("x", "<info:fcres:other> <http://example.org/p> \"v\" .");
        match e.ensure_single_subject("x", &urn, bad) {
            Err(RepoError::SingleSubject { subject, uid }) => {
                assert_eq!(subject, "<info:fcres:other>");
                assert_eq!(uid, "x");
            }
            other => panic!("expected SingleSubject, got {other:?}"),
        }
    }

    #[test]
    fn test_digest_matches_enriched_graph() {
        let e = engine();
        let urn = nsc::fcres("x");
        let c = ctx(&e);
        let mut gr = payload("x", "<> <http://example.org/p> \"v\" .");
        e.add_srv_mgd_triples(&c, &urn, &mut gr, true);

        let subject: Subject = urn.into();
        let digest = gr
            .value_named(&subject, &nsc::premis("hasMessageDigest"))
            .unwrap();
        let cksum = digest.as_str().strip_prefix("urn:sha1:").unwrap().to_string();

        let mut without_digest = gr.clone();
        without_digest.remove_matching(None, Some(&nsc::premis("hasMessageDigest")), None);
        assert_eq!(e.tbox().rdf_cksum(&without_digest), cksum);

        // Base types and stamps are all present.
        assert!(gr.has_type(&subject, &nsc::fcrepo("Resource")));
        assert!(gr.has_type(&subject, &nsc::ldp("Resource")));
        assert!(gr.has_type(&subject, &nsc::ldp("RDFSource")));
        assert!(gr.value(&subject, &nsc::fcrepo("created")).is_some());
        assert!(gr.value(&subject, &nsc::fcrepo("lastModifiedBy")).is_some());
    }

    #[test]
    fn test_check_mgd_terms_lenient_strips() {
        let mut cfg = RepoConfig::default();
        cfg.srv_mgd_handling = MgdTermHandling::Lenient;
        let e = LdpEngine::new(MemoryStore::new(), cfg);
        e.bootstrap().unwrap();

        let gr = payload(
            "x",
            "<> <http://fedora.info/definitions/v4/repository#created> \"fake\" ;
                <http://example.org/p> \"v\" .",
        );
        let out = e.check_mgd_terms(gr).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_check_mgd_terms_strict_fails() {
        let mut cfg = RepoConfig::default();
        cfg.srv_mgd_handling = MgdTermHandling::Strict;
        let e = LdpEngine::new(MemoryStore::new(), cfg);
        e.bootstrap().unwrap();

        let gr = payload(
            "x",
            "<> a <http://fedora.info/definitions/v4/repository#Resource> .",
        );
        assert!(matches!(
            e.check_mgd_terms(gr),
            Err(RepoError::ServerManagedTerm {
                position: TermPosition::RdfType,
                ..
            })
        ));
    }

    #[test]
    fn test_dedup_deltas_idempotent() {
        let a = payload("x", "<> <http://example.org/p> \"v\", \"w\" .");
        let b = payload("x", "<> <http://example.org/p> \"w\", \"z\" .");
        let (remove, add) = dedup_deltas(&a, &b);
        assert_eq!(remove.len(), 1);
        assert_eq!(add.len(), 1);

        let (remove2, add2) = dedup_deltas(&remove, &add);
        assert_eq!(remove2, remove);
        assert_eq!(add2, add);
    }
}
