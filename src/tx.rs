//! Request context, transactions and the changelog
//!
//! Every public lifecycle operation runs under [`with_transaction`]: a
//! store transaction is opened, the operation runs against an explicit
//! [`RequestCtx`], and on success the commit is followed by draining the
//! per-request changelog into the event bus. On any error the transaction
//! is rolled back, the changelog is discarded and no event is emitted.

use crate::config::RepoConfig;
use crate::error::RepoResult;
use crate::event::{EventBus, EventKind};
use crate::rdf::namespace as nsc;
use crate::rdf::TripleSet;
use crate::store::TripleStore;
use crate::tbox::Toolbox;
use chrono::{DateTime, SecondsFormat, Utc};
use oxrdf::Literal;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{info, warn};

/// Metadata recorded with a changelog entry for event emission
#[derive(Debug, Clone)]
pub struct EventMeta {
    pub ev_type: EventKind,
    /// Request timestamp, RFC 3339
    pub timestamp: String,
    /// `rdf:type` objects present in the merged delta
    pub rdf_types: Vec<String>,
    /// `fcrepo:createdBy` actors present in the merged delta
    pub actors: Vec<String>,
}

/// One delta applied by the engine, in enqueue order
#[derive(Debug, Clone)]
pub struct ChangelogEntry {
    pub remove: TripleSet,
    pub add: TripleSet,
    pub meta: EventMeta,
}

/// Per-request state threaded through the lifecycle engine.
///
/// Holds the request timestamp (one stamp for every triple written by the
/// request) and the changelog consumed by the event emitter after commit.
pub struct RequestCtx {
    config: Arc<RepoConfig>,
    timestamp: DateTime<Utc>,
    changelog: RefCell<Vec<ChangelogEntry>>,
}

impl RequestCtx {
    pub fn new(config: Arc<RepoConfig>) -> Self {
        Self {
            config,
            timestamp: Utc::now(),
            changelog: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Request timestamp as an RFC 3339 string (UTC, microseconds)
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Request timestamp as an `xsd:dateTime` literal
    pub fn timestamp_literal(&self) -> Literal {
        Literal::new_typed_literal(self.timestamp_string(), nsc::xsd_date_time())
    }

    pub fn append_changelog(&self, entry: ChangelogEntry) {
        self.changelog.borrow_mut().push(entry);
    }

    pub fn changelog_len(&self) -> usize {
        self.changelog.borrow().len()
    }

    /// Drain the changelog, leaving it empty
    pub fn take_changelog(&self) -> Vec<ChangelogEntry> {
        self.changelog.take()
    }
}

/// Run a fallible operation inside a store transaction.
///
/// Commits and drains the changelog on success; rolls back and discards
/// the changelog on failure. Mutation helpers assume the transaction is
/// already open; this is the only place transactions are opened.
pub fn with_transaction<S, T>(
    store: &S,
    ctx: &RequestCtx,
    events: &EventBus,
    tbox: &Toolbox,
    op: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T>
where
    S: TripleStore + ?Sized,
{
    store.begin()?;
    match op() {
        Ok(ret) => {
            info!("Committing transaction.");
            store.commit()?;
            events.emit_changelog(tbox, ctx.take_changelog());
            Ok(ret)
        }
        Err(e) => {
            warn!("Rolling back transaction.");
            if let Err(rb_err) = store.rollback() {
                warn!("Rollback failed: {}", rb_err);
            }
            Err(e)
        }
    }
}
