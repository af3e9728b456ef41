//! Named connections with host failover

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use sqlhelm_core::{ConnectParams, Driver, DriverKind, DriverOptions, Error, Result, SqlxDriver};

use crate::helper::QueryHelper;

pub const DEFAULT_CONNECTION: &str = "default";

fn default_kind() -> DriverKind {
    DriverKind::MySql
}

/// How to reach one database.
///
/// Hosts are tried in order. The username and password at a host's index
/// are used for it when present, otherwise the first ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: DriverKind,
    #[serde(default, alias = "host", deserialize_with = "one_or_many")]
    pub hosts: Vec<String>,
    #[serde(default, alias = "username", alias = "user", deserialize_with = "one_or_many")]
    pub usernames: Vec<String>,
    #[serde(default, alias = "password", deserialize_with = "one_or_many")]
    pub passwords: Vec<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub throws: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

impl ConnectionConfig {
    pub fn new(kind: DriverKind) -> Self {
        Self {
            kind,
            hosts: Vec::new(),
            usernames: Vec::new(),
            passwords: Vec::new(),
            database: None,
            charset: None,
            throws: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.usernames.push(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.passwords.push(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn throws(mut self, throws: bool) -> Self {
        self.throws = throws;
        self
    }

    /// Parameters for the host at `index`
    pub fn params_for(&self, index: usize) -> ConnectParams {
        let pick = |values: &[String]| values.get(index).or_else(|| values.first()).cloned();

        ConnectParams {
            host: self.hosts.get(index).cloned(),
            username: pick(&self.usernames),
            password: pick(&self.passwords),
            database: self.database.clone(),
            charset: self.charset.clone(),
        }
    }
}

/// Connections by name, opened on first use.
///
/// The host that last connected is remembered in a cache file so the next
/// process tries it first.
#[derive(Debug)]
pub struct ConnectionRegistry {
    configurations: HashMap<String, ConnectionConfig>,
    connections: HashMap<String, QueryHelper>,
    cache_dir: PathBuf,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_cache_dir(std::env::temp_dir())
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            configurations: HashMap::new(),
            connections: HashMap::new(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn configure(&mut self, name: &str, config: ConnectionConfig) -> &mut Self {
        self.configurations.insert(name.to_string(), config);
        self
    }

    pub fn has_configuration(&self, name: &str) -> bool {
        self.configurations.contains_key(name)
    }

    /// Open, or able to be opened
    pub fn has_connection(&self, name: &str) -> bool {
        self.connections.contains_key(name) || self.has_configuration(name)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Register an already connected helper
    pub fn set(&mut self, name: &str, helper: QueryHelper) {
        self.connections.insert(name.to_string(), helper);
    }

    /// The connection named `name`, connecting it first if needed
    pub fn get(&mut self, name: &str) -> Result<&mut QueryHelper> {
        if !self.connections.contains_key(name) {
            let config = self
                .configurations
                .get(name)
                .ok_or_else(|| Error::UnknownConnection {
                    name: name.to_string(),
                })?;
            let helper = self.discover(name, config)?;
            self.connections.insert(name.to_string(), helper);
        }

        self.connections
            .get_mut(name)
            .ok_or_else(|| Error::UnknownConnection {
                name: name.to_string(),
            })
    }

    /// Close and forget an open connection
    pub fn close(&mut self, name: &str) -> bool {
        let closed = match self.connections.get_mut(name) {
            Some(helper) => helper.close(),
            None => false,
        };
        if closed {
            self.connections.remove(name);
        }
        closed
    }

    /// Whether the connection is open or can be opened
    pub fn try_connect(&mut self, name: &str) -> bool {
        match self.get(name) {
            Ok(_) => true,
            Err(err) => {
                debug!("connection {} unavailable: {}", name, err);
                false
            }
        }
    }

    /// Cache file remembering the last host `name` connected to from the
    /// current working directory
    pub fn cache_file(&self, name: &str) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_default();
        let key = format!("Connection::{}{}", cwd.display(), name);
        self.cache_dir
            .join(format!("{:08x}.cache", crc32fast::hash(key.as_bytes())))
    }

    fn discover(&self, name: &str, config: &ConnectionConfig) -> Result<QueryHelper> {
        let cache = self.cache_file(name);
        let previous = read_cache(&cache);

        if let Some(index) = previous
            .as_ref()
            .and_then(|prev| config.hosts.iter().position(|host| host == prev))
        {
            if let Some(driver) = attempt(config, index) {
                return Ok(QueryHelper::from_boxed(driver));
            }
        }

        let attempts = config.hosts.len().max(1);
        for index in 0..attempts {
            let host = config.hosts.get(index);
            if host.is_some() && host == previous.as_ref() {
                continue;
            }
            if let Some(driver) = attempt(config, index) {
                if let Some(host) = host {
                    write_cache(&cache, host);
                }
                return Ok(QueryHelper::from_boxed(driver));
            }
        }

        Err(Error::connect(format!("no host of connection '{}' is reachable", name)))
    }
}

fn attempt(config: &ConnectionConfig, index: usize) -> Option<Box<dyn Driver>> {
    let params = config.params_for(index);
    let host = params.host.as_deref().unwrap_or("<default>");
    let mut driver = SqlxDriver::for_kind(config.kind, DriverOptions { throws: config.throws });

    match driver.connect(&params) {
        Ok(true) => {
            info!("connected to {} host {}", config.kind, host);
            Some(Box::new(driver))
        }
        Ok(false) => {
            warn!("cannot connect to {} host {}: {}", config.kind, host, driver.error().1);
            None
        }
        Err(err) => {
            warn!("cannot connect to {} host {}: {}", config.kind, host, err);
            None
        }
    }
}

fn read_cache(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(host) => Some(host.trim().to_string()).filter(|h| !h.is_empty()),
        Err(err) => {
            debug!("no host cache at {}: {}", path.display(), err);
            None
        }
    }
}

fn write_cache(path: &Path, host: &str) {
    if let Err(err) = fs::write(path, host) {
        debug!("cannot write host cache {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json_single_values() {
        let config = ConnectionConfig::from_json(
            r#"{"type": "mysqli", "host": "db1", "username": "app", "password": "secret", "database": "shop"}"#,
        )
        .unwrap();
        assert_eq!(config.kind, DriverKind::MySql);
        assert_eq!(config.hosts, vec!["db1"]);
        assert_eq!(config.usernames, vec!["app"]);
        assert_eq!(config.database.as_deref(), Some("shop"));
        assert!(!config.throws);
    }

    #[test]
    fn test_config_from_json_lists() {
        let config = ConnectionConfig::from_json(
            r#"{"type": "sqlite", "hosts": ["a.db", "b.db"], "usernames": null, "throws": true}"#,
        )
        .unwrap();
        assert_eq!(config.kind, DriverKind::Sqlite);
        assert_eq!(config.hosts, vec!["a.db", "b.db"]);
        assert!(config.usernames.is_empty());
        assert!(config.throws);

        assert!(matches!(
            ConnectionConfig::from_json(r#"{"type": "oracle"}"#),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_params_fall_back_to_first_credentials() {
        let config = ConnectionConfig::new(DriverKind::MySql)
            .host("primary")
            .host("replica")
            .host("backup")
            .username("root")
            .username("reader")
            .password("pw");

        let params = config.params_for(1);
        assert_eq!(params.host.as_deref(), Some("replica"));
        assert_eq!(params.username.as_deref(), Some("reader"));
        assert_eq!(params.password.as_deref(), Some("pw"));

        let params = config.params_for(2);
        assert_eq!(params.host.as_deref(), Some("backup"));
        assert_eq!(params.username.as_deref(), Some("root"));
    }

    #[test]
    fn test_cache_file_is_stable_per_name() {
        let registry = ConnectionRegistry::with_cache_dir("/tmp/cache");
        assert_eq!(registry.cache_file("default"), registry.cache_file("default"));
        assert_ne!(registry.cache_file("default"), registry.cache_file("reports"));
        assert!(registry.cache_file("default").starts_with("/tmp/cache"));
    }

    #[test]
    fn test_unknown_connection() {
        let mut registry = ConnectionRegistry::with_cache_dir("/tmp/cache");
        assert!(!registry.has_connection("nope"));
        assert!(matches!(registry.get("nope"), Err(Error::UnknownConnection { .. })));
        assert!(!registry.try_connect("nope"));
        assert!(!registry.close("nope"));
    }
}
