//! In-memory route table for override entries
//!
//! Entries are partitioned by virtual host and method. A lookup tries, in
//! order: the request method, GET (for HEAD requests only), then the `*`
//! method; within each, the exact host table before the `*` host table.
//! Among matching patterns in one partition the most specific wins, and
//! equally specific patterns resolve to the most recently registered.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::pattern::RequestPath;
use super::{OverrideRouter, RouteMatch};
use crate::error::RouteError;
use crate::registry::OverrideEntry;

/// Host that matches every request
pub const WILDCARD_HOST: &str = "*";

/// Method that matches every request
pub const WILDCARD_METHOD: &str = "*";

/// Canonical host key: lowercase, without a trailing root dot
pub fn normalize_host(host: &str) -> String {
    let host = host.strip_suffix('.').unwrap_or(host);
    host.to_ascii_lowercase()
}

#[derive(Clone)]
struct Slot {
    sequence: u64,
    specificity: Vec<u8>,
    entry: Arc<OverrideEntry>,
}

#[derive(Default)]
struct TableInner {
    next_sequence: u64,
    /// host -> method -> slots
    partitions: HashMap<String, HashMap<String, Vec<Slot>>>,
    /// Every entry in insertion order
    order: Vec<Arc<OverrideEntry>>,
}

impl TableInner {
    fn lookup(&self, host: &str, method: &str, path: &RequestPath) -> Option<RouteMatch> {
        let slots = self.partitions.get(host)?.get(method)?;

        // Slots are kept sorted best-first, so the first match wins
        slots.iter().find_map(|slot| {
            slot.entry.pattern().matches(path).map(|params| RouteMatch {
                entry: slot.entry.clone(),
                params,
            })
        })
    }
}

/// Default [`OverrideRouter`] implementation
#[derive(Default)]
pub struct RouteTable {
    inner: RwLock<TableInner>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideRouter for RouteTable {
    fn insert(&self, entry: Arc<OverrideEntry>) {
        let mut inner = self.inner.write();

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let slot = Slot {
            sequence,
            specificity: entry.pattern().specificity(),
            entry: entry.clone(),
        };

        let slots = inner
            .partitions
            .entry(normalize_host(entry.host()))
            .or_default()
            .entry(entry.method().to_string())
            .or_default();
        slots.push(slot);
        slots.sort_by(|a, b| {
            b.specificity
                .cmp(&a.specificity)
                .then(b.sequence.cmp(&a.sequence))
        });

        debug!(
            "Route table insert #{}: {} {} (host: {})",
            sequence,
            entry.method(),
            entry.pattern(),
            entry.host()
        );

        inner.order.push(entry);
    }

    fn resolve(
        &self,
        method: &str,
        path: &str,
        host: Option<&str>,
    ) -> Result<Option<RouteMatch>, RouteError> {
        let path = RequestPath::parse(path)?;
        let method = method.to_ascii_lowercase();
        let host = host.map(normalize_host);

        let mut methods = vec![method.as_str()];
        if method == "head" {
            methods.push("get");
        }
        methods.push(WILDCARD_METHOD);

        let mut hosts = Vec::with_capacity(2);
        if let Some(host) = host.as_deref().filter(|h| *h != WILDCARD_HOST) {
            hosts.push(host);
        }
        hosts.push(WILDCARD_HOST);

        let inner = self.inner.read();
        for method in methods {
            for host in &hosts {
                if let Some(found) = inner.lookup(host, method, &path) {
                    return Ok(Some(found));
                }
            }
        }

        Ok(None)
    }

    fn entries(&self) -> Vec<Arc<OverrideEntry>> {
        self.inner.read().order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ActivationPolicy, OverrideId, ResponseSpec, StaticResponse};
    use crate::routing::PathPattern;
    use serde_json::json;

    fn make_entry(method: &str, pattern: &str, host: &str, payload: i64) -> Arc<OverrideEntry> {
        Arc::new(OverrideEntry::new(
            OverrideId::new(),
            method.to_string(),
            PathPattern::parse(pattern).unwrap(),
            host.to_string(),
            ResponseSpec::Static(StaticResponse::new(json!(payload))),
            ActivationPolicy::Always,
        ))
    }

    fn payload_of(found: Option<RouteMatch>) -> Option<i64> {
        found.and_then(|m| match m.entry.response() {
            ResponseSpec::Static(s) => s.payload().as_i64(),
            ResponseSpec::Functional(_) => None,
        })
    }

    #[test]
    fn test_exact_path_routing() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "*", 2));
        table.insert(make_entry("get", "/a", "*", 3));

        assert_eq!(payload_of(table.resolve("get", "/", None).unwrap()), Some(2));
        assert_eq!(payload_of(table.resolve("GET", "/a", None).unwrap()), Some(3));
        assert!(table.resolve("get", "/b", None).unwrap().is_none());
        assert!(table.resolve("post", "/", None).unwrap().is_none());
    }

    #[test]
    fn test_specific_beats_wildcard() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/users/me", "*", 1));
        table.insert(make_entry("get", "/users/{id}", "*", 2));
        table.insert(make_entry("get", "/{*rest}", "*", 3));

        assert_eq!(payload_of(table.resolve("get", "/users/me", None).unwrap()), Some(1));
        assert_eq!(payload_of(table.resolve("get", "/users/42", None).unwrap()), Some(2));
        assert_eq!(payload_of(table.resolve("get", "/other", None).unwrap()), Some(3));

        let found = table.resolve("get", "/users/42", None).unwrap().unwrap();
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_duplicate_registration_latest_wins() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "*", 1));
        table.insert(make_entry("get", "/", "*", 2));

        assert_eq!(payload_of(table.resolve("get", "/", None).unwrap()), Some(2));
        assert_eq!(table.entries().len(), 2);
    }

    #[test]
    fn test_virtual_host_partitioning() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "api.example.com", 1));
        table.insert(make_entry("get", "/", "*", 2));

        assert_eq!(
            payload_of(table.resolve("get", "/", Some("API.example.com")).unwrap()),
            Some(1)
        );
        assert_eq!(
            payload_of(table.resolve("get", "/", Some("www.example.com")).unwrap()),
            Some(2)
        );
        assert_eq!(payload_of(table.resolve("get", "/", None).unwrap()), Some(2));
    }

    #[test]
    fn test_trailing_dot_host_is_equivalent() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "example.com.", 1));
        table.insert(make_entry("get", "/", "api.example.com", 2));

        assert_eq!(
            payload_of(table.resolve("get", "/", Some("example.com")).unwrap()),
            Some(1)
        );
        assert_eq!(
            payload_of(table.resolve("get", "/", Some("API.example.com.")).unwrap()),
            Some(2)
        );
    }

    #[test]
    fn test_host_only_entries_ignore_other_hosts() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "api.example.com", 1));

        assert!(table.resolve("get", "/", Some("other.example.com")).unwrap().is_none());
        assert!(table.resolve("get", "/", None).unwrap().is_none());
    }

    #[test]
    fn test_method_fallbacks() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/page", "*", 1));
        table.insert(make_entry("*", "/any", "*", 2));

        assert_eq!(payload_of(table.resolve("head", "/page", None).unwrap()), Some(1));
        assert_eq!(payload_of(table.resolve("delete", "/any", None).unwrap()), Some(2));
        assert!(table.resolve("post", "/page", None).unwrap().is_none());
    }

    #[test]
    fn test_malformed_path_is_an_error() {
        let table = RouteTable::new();
        table.insert(make_entry("get", "/", "*", 1));

        assert!(table.resolve("get", "no-slash", None).is_err());
        assert!(table.resolve("get", "/%zz", None).is_err());
    }
}
