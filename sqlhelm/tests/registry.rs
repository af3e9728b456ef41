use std::fs;

use sqlhelm::{
    ConnectionConfig, ConnectionRegistry, Driver, DriverKind, Error, QueryHelper, Value,
    DEFAULT_CONNECTION,
};
use tempfile::TempDir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Fixture {
    dir: TempDir,
    registry: ConnectionRegistry,
}

impl Fixture {
    fn new() -> Self {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::with_cache_dir(dir.path());
        Self { dir, registry }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// A database file that cannot be opened
    fn unreachable(&self) -> String {
        self.path("missing/nested/app.db")
    }
}

#[test]
fn test_first_reachable_host_is_cached() {
    let mut fixture = Fixture::new();
    let good = fixture.path("app.db");
    let config = ConnectionConfig::new(DriverKind::Sqlite)
        .host(fixture.unreachable())
        .host(good.clone());
    fixture.registry.configure(DEFAULT_CONNECTION, config);

    assert!(fixture.registry.has_configuration(DEFAULT_CONNECTION));
    assert!(!fixture.registry.is_open(DEFAULT_CONNECTION));

    let helper = fixture.registry.get(DEFAULT_CONNECTION).unwrap();
    assert!(helper.is_connected());
    assert!(helper.exec("CREATE TABLE t (v INTEGER)").unwrap());

    let cache = fixture.registry.cache_file(DEFAULT_CONNECTION);
    assert_eq!(fs::read_to_string(cache).unwrap(), good);
    assert!(fixture.registry.is_open(DEFAULT_CONNECTION));
}

#[test]
fn test_cached_host_is_reused() {
    let mut fixture = Fixture::new();
    let first = fixture.path("first.db");
    let second = fixture.path("second.db");
    let config = ConnectionConfig::new(DriverKind::Sqlite)
        .host(first.clone())
        .host(second.clone());
    fixture.registry.configure("reports", config);

    let cache = fixture.registry.cache_file("reports");
    fs::write(&cache, &second).unwrap();

    let helper = fixture.registry.get("reports").unwrap();
    helper.exec("CREATE TABLE marker (v INTEGER)").unwrap();
    assert!(fixture.registry.close("reports"));
    assert!(!fixture.registry.is_open("reports"));

    // the table landed in the cached database, not in the first host
    let mut direct = QueryHelper::new(sqlhelm::SqlxDriver::sqlite(Default::default()));
    direct
        .connect(&sqlhelm::ConnectParams::new().host(second.clone()))
        .unwrap();
    let tables = direct
        .fetch_column("SELECT COUNT(*) FROM sqlite_master WHERE name = 'marker'", Vec::new())
        .unwrap();
    assert_eq!(tables, Some(Value::I64(1)));
    assert_eq!(fs::read_to_string(&cache).unwrap(), second);
}

#[test]
fn test_stale_cache_entry_is_ignored() {
    let mut fixture = Fixture::new();
    let good = fixture.path("app.db");
    fixture
        .registry
        .configure("default", ConnectionConfig::new(DriverKind::Sqlite).host(good.clone()));
    fs::write(fixture.registry.cache_file("default"), "gone.example").unwrap();

    assert!(fixture.registry.try_connect("default"));
    assert_eq!(fs::read_to_string(fixture.registry.cache_file("default")).unwrap(), good);
}

#[test]
fn test_no_reachable_host() {
    let mut fixture = Fixture::new();
    let config = ConnectionConfig::new(DriverKind::Sqlite).host(fixture.unreachable());
    fixture.registry.configure("default", config);

    assert!(matches!(fixture.registry.get("default"), Err(Error::Connect { .. })));
    assert!(!fixture.registry.try_connect("default"));
    assert!(!fixture.registry.is_open("default"));
    assert!(fixture.registry.has_connection("default"));
}

#[test]
fn test_set_and_close() {
    let mut fixture = Fixture::new();
    let helper = sqlhelm::sqlite_memory(Default::default()).unwrap();
    fixture.registry.set("memory", helper);

    assert!(fixture.registry.has_connection("memory"));
    assert!(!fixture.registry.has_configuration("memory"));
    assert!(fixture.registry.try_connect("memory"));

    assert!(fixture.registry.close("memory"));
    assert!(!fixture.registry.close("memory"));
    assert!(matches!(
        fixture.registry.get("memory"),
        Err(Error::UnknownConnection { .. })
    ));
}

#[test]
fn test_config_from_json_connects() {
    let mut fixture = Fixture::new();
    let json = format!(
        r#"{{"type": "sqlite3", "host": ["{}", "{}"], "throws": true}}"#,
        fixture.unreachable(),
        fixture.path("json.db")
    );
    let config = ConnectionConfig::from_json(&json).unwrap();
    fixture.registry.configure("json", config);

    let helper = fixture.registry.get("json").unwrap();
    assert!(helper.driver().throws());
    assert_eq!(helper.count("sqlite_master", ()).unwrap(), 0);
}
