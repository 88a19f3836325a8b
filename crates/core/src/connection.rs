//! Connection descriptors and the run-scoped connection registry.
//!
//! The registry is constructed once per run, passed by reference into every
//! test invocation, and torn down once at run end. It caches live
//! connections by their canonical connection string so a run opens at most
//! one connection per distinct target.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::driver::{sqlite::SqliteDriver, Connection, Driver};
use crate::error::{EngineError, Result};

pub const DEFAULT_DRIVER: &str = "sqlite";
pub const DEFAULT_DATABASE: &str = ":memory:";

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_true() -> bool {
    true
}

/// Everything needed to open a database connection. Immutable once built;
/// the canonical connection string derived from it is the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(default = "default_driver")]
    pub driver: String,
    pub server: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default, rename = "trusted_connection")]
    pub trusted: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub trust_server_certificate: bool,
    /// Extra driver options, appended to the connection string in
    /// deterministic (sorted) order.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    /// Canonical connection string: fixed field order, so equal descriptors
    /// always map to the same cache entry.
    ///
    /// With `trusted` set, credentials are omitted and the integrated-auth
    /// flag is emitted instead; otherwise both username and password are
    /// required and their absence is a definition error, not a default.
    pub fn connection_string(&self) -> Result<String> {
        let mut parts = vec![
            format!("DRIVER={{{}}}", self.driver),
            format!("SERVER={}", self.server),
            format!("DATABASE={}", self.database),
        ];

        if self.trusted {
            parts.push("Trusted_Connection=yes".to_string());
        } else {
            let username = self.username.as_ref().ok_or_else(|| EngineError::Connection {
                message: format!(
                    "connection to {} requires 'username' (or set trusted_connection)",
                    self.server
                ),
            })?;
            let password = self.password.as_ref().ok_or_else(|| EngineError::Connection {
                message: format!(
                    "connection to {} requires 'password' (or set trusted_connection)",
                    self.server
                ),
            })?;
            parts.push(format!("UID={username}"));
            parts.push(format!("PWD={password}"));
        }

        if self.trust_server_certificate {
            parts.push("TrustServerCertificate=yes".to_string());
        }

        for (key, value) in &self.options {
            parts.push(format!("{key}={value}"));
        }

        Ok(parts.join(";"))
    }
}

/// A connection reference on a test definition: either the name of a shared
/// connection or an inline descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionRef {
    Named(String),
    Inline(ConnectionDescriptor),
}

/// Run-scoped cache of live connections, keyed by canonical connection
/// string, plus the table of shared named descriptors.
pub struct ConnectionRegistry {
    shared: BTreeMap<String, ConnectionDescriptor>,
    driver: Box<dyn Driver>,
    cache: RefCell<HashMap<String, Rc<dyn Connection>>>,
}

impl ConnectionRegistry {
    /// Registry backed by the built-in SQLite driver.
    pub fn new(shared: BTreeMap<String, ConnectionDescriptor>) -> Self {
        Self::with_driver(shared, Box::new(SqliteDriver))
    }

    pub fn with_driver(
        shared: BTreeMap<String, ConnectionDescriptor>,
        driver: Box<dyn Driver>,
    ) -> Self {
        ConnectionRegistry {
            shared,
            driver,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a reference to a full descriptor. Names are looked up in the
    /// shared table; inline descriptors pass through unchanged.
    pub fn resolve(&self, reference: &ConnectionRef) -> Result<ConnectionDescriptor> {
        match reference {
            ConnectionRef::Inline(descriptor) => Ok(descriptor.clone()),
            ConnectionRef::Named(name) => self.resolve_name(name),
        }
    }

    pub fn resolve_name(&self, name: &str) -> Result<ConnectionDescriptor> {
        self.shared
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownConnection {
                name: name.to_string(),
                available: self.shared.keys().cloned().collect(),
            })
    }

    /// Get the cached connection for a descriptor, opening (and caching) a
    /// new one on first use.
    pub fn connection(&self, descriptor: &ConnectionDescriptor) -> Result<Rc<dyn Connection>> {
        let key = descriptor.connection_string()?;

        if let Some(existing) = self.cache.borrow().get(&key) {
            return Ok(Rc::clone(existing));
        }

        let opened = self.driver.open(descriptor)?;
        self.cache.borrow_mut().insert(key, Rc::clone(&opened));
        Ok(opened)
    }

    /// Close every cached connection, best-effort, and clear the cache.
    /// Individual close failures never block closing the rest.
    pub fn close_all(&self) {
        for (_, connection) in self.cache.borrow_mut().drain() {
            connection.close();
        }
    }

    pub fn cached_connections(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            driver: "sqlite".to_string(),
            server: "localhost".to_string(),
            database: ":memory:".to_string(),
            trusted: true,
            username: None,
            password: None,
            trust_server_certificate: true,
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn trusted_connection_string_omits_credentials() {
        let conn_str = descriptor().connection_string().unwrap();
        assert_eq!(
            conn_str,
            "DRIVER={sqlite};SERVER=localhost;DATABASE=:memory:;Trusted_Connection=yes;TrustServerCertificate=yes"
        );
    }

    #[test]
    fn credentialed_connection_string_requires_both_fields() {
        let mut d = descriptor();
        d.trusted = false;
        d.username = Some("svc".to_string());
        let err = d.connection_string().unwrap_err();
        assert!(err.to_string().contains("password"));

        d.password = Some("hunter2".to_string());
        let conn_str = d.connection_string().unwrap();
        assert!(conn_str.contains("UID=svc;PWD=hunter2"));
        assert!(!conn_str.contains("Trusted_Connection"));
    }

    #[test]
    fn extra_options_append_in_deterministic_order() {
        let mut d = descriptor();
        d.options.insert("Encrypt".to_string(), "no".to_string());
        d.options.insert("AppName".to_string(), "probe".to_string());
        let conn_str = d.connection_string().unwrap();
        assert!(conn_str.ends_with("AppName=probe;Encrypt=no"));
    }

    #[test]
    fn resolve_unknown_name_lists_known_connections() {
        let mut shared = BTreeMap::new();
        shared.insert("source".to_string(), descriptor());
        let registry = ConnectionRegistry::new(shared);

        let err = registry
            .resolve(&ConnectionRef::Named("warehouse".to_string()))
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'warehouse'"));
        assert!(text.contains("source"));
    }

    #[test]
    fn resolve_inline_descriptor_passes_through() {
        let registry = ConnectionRegistry::new(BTreeMap::new());
        let resolved = registry
            .resolve(&ConnectionRef::Inline(descriptor()))
            .unwrap();
        assert_eq!(resolved, descriptor());
    }

    #[test]
    fn same_descriptor_reuses_the_cached_connection() {
        let registry = ConnectionRegistry::new(BTreeMap::new());
        let first = registry.connection(&descriptor()).unwrap();
        let second = registry.connection(&descriptor()).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_connections(), 1);
    }

    #[test]
    fn differing_descriptor_fields_open_distinct_connections() {
        let registry = ConnectionRegistry::new(BTreeMap::new());
        let first = registry.connection(&descriptor()).unwrap();

        let mut other = descriptor();
        other.server = "replica".to_string();
        let second = registry.connection(&other).unwrap();

        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_connections(), 2);
    }

    #[test]
    fn close_all_clears_the_cache() {
        let registry = ConnectionRegistry::new(BTreeMap::new());
        registry.connection(&descriptor()).unwrap();
        registry.close_all();
        assert_eq!(registry.cached_connections(), 0);
    }

    #[test]
    fn named_ref_deserializes_from_bare_string() {
        let reference: ConnectionRef = serde_yaml::from_str("source_db").unwrap();
        assert!(matches!(reference, ConnectionRef::Named(name) if name == "source_db"));

        let reference: ConnectionRef =
            serde_yaml::from_str("{server: db01, trusted_connection: true}").unwrap();
        assert!(matches!(reference, ConnectionRef::Inline(_)));
    }
}
