//! Route matching for override entries
//!
//! The [`OverrideRouter`] trait is the seam between the registry and the
//! matching algorithm; [`RouteTable`] is the in-memory implementation used
//! by default.

mod pattern;
mod table;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RouteError;
use crate::registry::OverrideEntry;

pub use pattern::{PathPattern, PatternError, RequestPath};
pub use table::{RouteTable, WILDCARD_HOST, WILDCARD_METHOD, normalize_host};

/// Result of a successful lookup
#[derive(Clone)]
pub struct RouteMatch {
    /// The entry that won precedence
    pub entry: Arc<OverrideEntry>,
    /// Path parameters captured by the entry's pattern
    pub params: HashMap<String, String>,
}

/// Route storage and lookup for one context
pub trait OverrideRouter: Send + Sync {
    /// Add an entry; duplicates are kept alongside earlier entries
    fn insert(&self, entry: Arc<OverrideEntry>);

    /// Find the best entry for a request, if any
    fn resolve(
        &self,
        method: &str,
        path: &str,
        host: Option<&str>,
    ) -> Result<Option<RouteMatch>, RouteError>;

    /// All entries in insertion order
    fn entries(&self) -> Vec<Arc<OverrideEntry>>;
}
