//! Versioning end-to-end: snapshots, labels, revert and resurrection edge
//! cases.

use anyhow::Result;
use cairn::rdf::namespace as nsc;
use cairn::{
    DeleteOptions, LdpEngine, MemoryStore, RepoConfig, RepoError, TripleSet, TripleStore,
};
use oxrdf::{NamedNode, Subject};

const WEBROOT: &str = "http://localhost:8000/ldp";

fn setup() -> LdpEngine<MemoryStore> {
    let engine = LdpEngine::new(MemoryStore::new(), RepoConfig::default());
    engine.bootstrap().unwrap();
    engine
}

fn body(uid: &str, turtle: &str) -> TripleSet {
    TripleSet::parse_turtle(turtle, Some(&format!("{WEBROOT}/{uid}"))).unwrap()
}

fn version_labels(repo: &LdpEngine<MemoryStore>, uid: &str) -> Vec<String> {
    let info = repo.layout().get_version_info(uid).unwrap();
    let mut labels: Vec<String> = info
        .iter()
        .filter(|t| t.predicate == nsc::fcrepo("hasVersionLabel"))
        .filter_map(|t| match &t.object {
            oxrdf::Term::Literal(l) => Some(l.value().to_string()),
            _ => None,
        })
        .collect();
    labels.sort();
    labels
}

#[test]
fn test_create_version_snapshots_state() -> Result<()> {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v1\" ."), false)?;

    let ver_urn = repo.create_version("x", Some("v1"))?;
    // The returned URN is globalized.
    assert_eq!(ver_urn.as_str(), format!("{WEBROOT}/x/fcr:versions/v1"));

    // The snapshot holds the payload under the version subject.
    let snap = repo.layout().get_version("x", "v1")?;
    let vs: Subject = NamedNode::new_unchecked("info:fcres:x/fcr:versions/v1").into();
    assert_eq!(
        snap.value_literal(&vs, &NamedNode::new_unchecked("http://example.org/p")).as_deref(),
        Some("v1")
    );
    assert!(snap.has_type(&vs, &nsc::fcrepo("Version")));
    // Live-only terms are not copied.
    assert!(snap.value(&vs, &nsc::premis("hasMessageDigest")).is_none());
    assert!(snap.value(&vs, &nsc::fcrepo("hasParent")).is_none());
    assert!(!snap.has_type(&vs, &nsc::fcrepo("Resource")));

    // The resource's admin graph records the version.
    let admin = repo.layout().get_metadata("x", None)?;
    let s: Subject = nsc::fcres("x").into();
    assert_eq!(
        admin.value_named(&s, &nsc::fcrepo("hasVersion")),
        Some(NamedNode::new_unchecked("info:fcres:x/fcr:versions/v1"))
    );
    assert_eq!(
        admin.value_named(&s, &nsc::fcrepo("hasVersions")),
        Some(NamedNode::new_unchecked("info:fcres:x/fcr:versions"))
    );
    Ok(())
}

#[test]
fn test_duplicate_label_gets_generated_id() -> Result<()> {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v\" ."), false)?;

    repo.create_version("x", Some("v1"))?;
    repo.create_version("x", Some("v1"))?;
    repo.create_version("x", None)?;

    let labels = version_labels(&repo, "x");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.iter().filter(|l| l.as_str() == "v1").count(), 1);
    Ok(())
}

#[test]
fn test_revert_to_version() -> Result<()> {
    let repo = setup();
    let p = NamedNode::new_unchecked("http://example.org/p");
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v1\" ."), false)?;
    repo.create_version("x", Some("v1"))?;
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v2\" ."), false)?;

    repo.revert_to_version("x", "v1", true)?;

    // Current state equals the snapshot, modulo server-managed terms.
    let s: Subject = nsc::fcres("x").into();
    let imr = repo.layout().extract_imr("x", &Default::default())?;
    assert_eq!(imr.value_literal(&s, &p).as_deref(), Some("v1"));
    assert_eq!(imr.objects(&s, &p).len(), 1);

    // The backup snapshot of the pre-revert state exists alongside v1.
    let labels = version_labels(&repo, "x");
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&"v1".to_string()));
    Ok(())
}

#[test]
fn test_revert_to_unknown_version_fails() {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v\" ."), false)
        .unwrap();
    assert!(matches!(
        repo.revert_to_version("x", "nope", false),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn test_version_info_survives_burial() -> Result<()> {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v\" ."), false)?;
    repo.create_version("x", Some("keep"))?;

    repo.delete("x", &DeleteOptions::default())?;

    // The admin graph was replaced by the tombstone, but the history
    // graph still lists the snapshots (plus the burial backup).
    let labels = version_labels(&repo, "x");
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&"keep".to_string()));
    Ok(())
}

#[test]
fn test_resurrect_restores_container_type() -> Result<()> {
    let repo = setup();
    repo.create_or_replace(
        "x",
        body("x", "<> a <http://www.w3.org/ns/ldp#Container> ; <http://example.org/p> \"v\" ."),
        false,
    )?;
    repo.delete("x", &DeleteOptions::default())?;
    repo.resurrect("x")?;

    let admin = repo.layout().get_metadata("x", None)?;
    let s: Subject = nsc::fcres("x").into();
    assert!(admin.has_type(&s, &nsc::fcrepo("Resource")));
    assert!(admin.has_type(&s, &nsc::fcrepo("Container")));
    assert!(admin.has_type(&s, &nsc::ldp("Container")));
    assert!(!admin.has_type(&s, &nsc::tombstone_type()));

    // Back under its parent.
    let root_struct = repo
        .layout()
        .store()
        .graph(&NamedNode::new_unchecked("info:fcstruct:"))?;
    assert!(root_struct.contains(&oxrdf::Triple::new(
        nsc::root_urn(),
        nsc::ldp("contains"),
        nsc::fcres("x"),
    )));
    Ok(())
}

#[test]
fn test_resurrect_without_tombstone_fails() {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v\" ."), false)
        .unwrap();
    assert!(matches!(
        repo.resurrect("x"),
        Err(RepoError::InvalidResource { .. })
    ));
}

#[test]
fn test_resurrect_without_version_fails() {
    let repo = setup();

    // Hand-craft a tombstone with no snapshot behind it; the engine must
    // refuse to invent content.
    let urn = nsc::fcres("husk");
    let mut markers = TripleSet::new();
    markers.add(urn.clone(), nsc::rdf_type(), nsc::tombstone_type());
    markers.add(
        urn,
        nsc::fcrepo("created"),
        oxrdf::Literal::new_simple_literal("2018-04-06T03:05:52Z"),
    );
    repo.layout()
        .modify_rsrc("husk", &TripleSet::new(), &markers)
        .unwrap();

    match repo.resurrect("husk") {
        Err(RepoError::InvalidResource { uid, .. }) => assert_eq!(uid, "husk"),
        other => panic!("expected InvalidResourceError, got {other:?}"),
    }
}

#[test]
fn test_version_extract() -> Result<()> {
    let repo = setup();
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v1\" ."), false)?;
    repo.create_version("x", Some("v1"))?;
    repo.create_or_replace("x", body("x", "<> <http://example.org/p> \"v2\" ."), false)?;

    // A versioned extract reads the snapshot graphs, not the live state.
    let opts = cairn::ImrOptions {
        ver_uid: Some("v1".to_string()),
        ..Default::default()
    };
    let snap = repo.layout().extract_imr("x", &opts)?;
    let vs: Subject = NamedNode::new_unchecked("info:fcres:x/fcr:versions/v1").into();
    assert_eq!(
        snap.value_literal(&vs, &NamedNode::new_unchecked("http://example.org/p")).as_deref(),
        Some("v1")
    );

    // The globalized read surface matches.
    let ver = repo.get_version("x", "v1")?;
    assert!(!ver.is_empty());
    for t in ver.iter() {
        assert!(!t.subject.to_string().contains("info:fcres:"));
    }
    Ok(())
}
