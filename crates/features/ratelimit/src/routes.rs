use crate::error::{RatelimitError, RatelimitErrorExt};
use crate::limit::Limit;
use axum::http::Method;
use fxhash::FxHashMap;

/// Rate limit metadata for one mounted route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    /// Route pattern as registered with the router, e.g. `/users/{id}`.
    pub path: String,
    /// Empty means any method.
    pub methods: Vec<Method>,
    pub limits: Vec<Limit>,
    pub websocket: bool,
}

impl RouteEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            methods: Vec::new(),
            limits: Vec::new(),
            websocket: false,
        }
    }

    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Prefix of every rate limit key derived from this route.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("{}@{}", self.name, self.path)
    }
}

/// Route entries indexed by route pattern.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: FxHashMap<String, Vec<RouteEntry>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, ordering its limits by ascending priority.
    ///
    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] if any of the entry's limits is invalid.
    pub fn insert(&mut self, mut entry: RouteEntry) -> Result<(), RatelimitError> {
        for limit in &entry.limits {
            limit.validate().context(format!("route {}", entry.key_prefix()))?;
        }

        entry.limits.sort_by_key(Limit::priority_value);
        self.entries.entry(entry.path.clone()).or_default().push(entry);
        Ok(())
    }

    /// First entry for `path` that accepts `method`.
    #[must_use]
    pub fn lookup(&self, path: &str, method: &Method) -> Option<&RouteEntry> {
        self.entries.get(path)?.iter().find(|entry| entry.accepts(method))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
