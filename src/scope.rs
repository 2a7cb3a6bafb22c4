use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Endpoint prefixes the backend filters by the selected location.
///
/// Only GET requests are rewritten; write endpoints carry the location in
/// their body instead.
pub(crate) const SCOPED_PREFIXES: &[&str] = &[
    "/visitors/",
    "/device-storage/",
    "/gate-pass/",
    "/task-management/",
    "/images/",
];

/// Identifier of the caller's currently selected location.
///
/// The backend is loose about the type: some deployments key locations by
/// numeric id, others by name, so both deserialize transparently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeId {
    Id(u64),
    Name(String),
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeId::Id(id) => write!(f, "{id}"),
            ScopeId::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<u64> for ScopeId {
    fn from(id: u64) -> Self {
        ScopeId::Id(id)
    }
}

impl From<&str> for ScopeId {
    fn from(name: &str) -> Self {
        ScopeId::Name(name.to_string())
    }
}

impl From<String> for ScopeId {
    fn from(name: String) -> Self {
        ScopeId::Name(name)
    }
}

/// Supplies the currently selected location, if any.
///
/// Injected at client construction so the core has no opinion on where the
/// selection lives (UI state, a config file, a fixed value in tests).
pub trait ScopeProvider: Send + Sync {
    fn current_scope(&self) -> Option<ScopeId>;
}

/// In-memory scope holder, shareable across tasks.
#[derive(Debug, Default)]
pub struct ScopeCell {
    current: RwLock<Option<ScopeId>>,
}

impl ScopeCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, scope: impl Into<ScopeId>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(scope.into());
    }

    pub fn clear(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ScopeProvider for ScopeCell {
    fn current_scope(&self) -> Option<ScopeId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Append `location_id=<id>` to scope-sensitive read endpoints.
///
/// Endpoints outside the allow-list, and any endpoint when no scope is
/// selected, pass through untouched.
pub(crate) fn scoped_endpoint(endpoint: &str, scope: Option<&ScopeId>) -> String {
    let Some(scope) = scope else {
        return endpoint.to_string();
    };
    if !SCOPED_PREFIXES.iter().any(|p| endpoint.starts_with(p)) {
        return endpoint.to_string();
    }
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}location_id={scope}")
}
