//! Repository configuration

use serde::{Deserialize, Serialize};

/// Referential integrity enforcement for payload objects inside the
/// repository namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefIntegrity {
    /// No check
    Off,
    /// Drop offending triples and continue
    #[default]
    Lenient,
    /// Fail the operation
    Strict,
}

/// Handling of server-managed terms found in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MgdTermHandling {
    /// No check
    #[default]
    None,
    /// Strip offending triples and continue
    Lenient,
    /// Fail the operation
    Strict,
}

/// Repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Absolute external URL root, used for localize/globalize
    pub webroot: String,
    /// Referential integrity policy
    pub referential_integrity: RefIntegrity,
    /// Server-managed term handling for payloads
    pub srv_mgd_handling: MgdTermHandling,
    /// Whether to append to the changelog and emit events
    pub messaging: bool,
    /// Actor recorded in `fcrepo:createdBy` / `lastModifiedBy` when the
    /// request carries none
    pub default_user: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            webroot: "http://localhost:8000/ldp".to_string(),
            referential_integrity: RefIntegrity::default(),
            srv_mgd_handling: MgdTermHandling::default(),
            messaging: true,
            default_user: "BypassAdmin".to_string(),
        }
    }
}
