use std::cell::RefCell;
use std::rc::Rc;

use sqlhelm::{
    sqlite_memory, Condition, DriverOptions, Entity, Error, FetchMode, Field, Mapped, QueryHelper,
    SaveGuard, Value,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct VoiceProfile {
    id: i64,
    name: String,
    rate: i64,
    guard: SaveGuard,
}

impl VoiceProfile {
    fn new(name: &str, rate: i64) -> Self {
        Self {
            name: name.to_string(),
            rate,
            ..Self::default()
        }
    }
}

impl Mapped for VoiceProfile {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new("id", |p: &Self| p.id.into(), |p: &mut Self, v| {
                p.id = v.get()?;
                Ok(())
            }),
            Field::new("name", |p: &Self| p.name.clone().into(), |p: &mut Self, v| {
                p.name = v.get()?;
                Ok(())
            }),
            Field::new("rate", |p: &Self| p.rate.into(), |p: &mut Self, v| {
                p.rate = v.get()?;
                Ok(())
            }),
        ]
    }
}

impl Entity for VoiceProfile {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn save_guard(&self) -> &SaveGuard {
        &self.guard
    }

    fn migrate(helper: &mut QueryHelper) -> sqlhelm::Result<()> {
        helper.exec(
            "CREATE TABLE IF NOT EXISTS voice_profile (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                rate INTEGER NOT NULL DEFAULT 100
            )",
        )?;
        helper.exec("CREATE TABLE IF NOT EXISTS user (id INTEGER PRIMARY KEY AUTOINCREMENT)")?;
        Self::migrate_many_to_many(helper, "user")?;
        Ok(())
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn helper() -> QueryHelper {
    init_logger();
    let mut helper = sqlite_memory(DriverOptions::throwing()).unwrap();
    VoiceProfile::migrate(&mut helper).unwrap();
    helper
}

fn recorder(helper: &mut QueryHelper, kinds: &[&str]) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in kinds {
        let log = log.clone();
        helper.add_event_listener(kind, move |event, _| log.borrow_mut().push(event.kind().to_string()));
    }
    log
}

#[test]
fn test_table_name() {
    assert_eq!(VoiceProfile::table(), "voice_profile");
}

#[test]
fn test_save_inserts_then_updates() {
    let mut helper = helper();

    let mut profile = VoiceProfile::new("alto", 120);
    assert!(profile.save(&mut helper).unwrap());
    assert_eq!(profile.id(), 1);

    profile.rate = 90;
    assert!(profile.save(&mut helper).unwrap());
    assert_eq!(profile.id(), 1);

    let stored = VoiceProfile::find_by_id(&mut helper, 1).unwrap().unwrap();
    assert_eq!(stored, VoiceProfile { id: 1, name: "alto".to_string(), rate: 90, ..Default::default() });
    assert!(VoiceProfile::find_by_id(&mut helper, 2).unwrap().is_none());

    // a stored record is not inserted twice
    assert!(!profile.insert_entry(&mut helper).unwrap());
    assert_eq!(helper.count("voice_profile", ()).unwrap(), 1);
}

#[test]
fn test_finders() {
    let mut helper = helper();
    for (name, rate) in [("alto", 120), ("bass", 80), ("tenor", 150)] {
        VoiceProfile::new(name, rate).save(&mut helper).unwrap();
    }

    let all = VoiceProfile::find(&mut helper, (), "rate", false).unwrap();
    let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["tenor", "alto", "bass"]);

    let fast = VoiceProfile::find(&mut helper, ("rate > ?", 100), vec!["name"], true).unwrap();
    assert_eq!(fast.len(), 2);
    assert_eq!(fast[0].name, "alto");

    let bass = VoiceProfile::find_one(&mut helper, Condition::eq("name", "bass"), (), true).unwrap();
    assert_eq!(bass.map(|p| p.rate), Some(80));

    let slowest = VoiceProfile::find_one(&mut helper, (), "rate", true).unwrap().unwrap();
    assert_eq!(slowest.name, "bass");

    assert_eq!(helper.count("voice_profile", ("rate >= ?", 120)).unwrap(), 2);
}

#[test]
fn test_remove() {
    let mut helper = helper();
    let mut profile = VoiceProfile::new("alto", 120);
    profile.save(&mut helper).unwrap();
    VoiceProfile::new("bass", 80).save(&mut helper).unwrap();

    let log = recorder(&mut helper, &["delete:before", "delete:after"]);
    assert!(profile.remove(&mut helper).unwrap());
    assert!(!VoiceProfile::remove_entry(&mut helper, 0).unwrap());
    assert_eq!(*log.borrow(), vec!["delete:before", "delete:after"]);

    assert!(VoiceProfile::find_by_id(&mut helper, profile.id()).unwrap().is_none());
    assert_eq!(helper.count("voice_profile", ()).unwrap(), 1);
}

#[test]
fn test_lifecycle_events() {
    let mut helper = helper();
    let log = recorder(
        &mut helper,
        &["insert:before", "insert:after", "update:before", "update:after"],
    );
    helper.add_event_listener("insert:before", |event, _| {
        if let Some(profile) = event.detail_mut::<VoiceProfile>() {
            profile.name = profile.name.to_uppercase();
        }
    });

    let mut profile = VoiceProfile::new("soprano", 200);
    profile.save(&mut helper).unwrap();
    profile.save(&mut helper).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["insert:before", "insert:after", "update:before", "update:after"]
    );
    let stored = VoiceProfile::find_by_id(&mut helper, profile.id()).unwrap().unwrap();
    assert_eq!(stored.name, "SOPRANO");
}

#[test]
fn test_save_from_listener_is_ignored() {
    let mut helper = helper();
    let nested = Rc::new(RefCell::new(Vec::new()));
    let results = nested.clone();
    helper.add_event_listener("update:after", move |event, helper| {
        if let Some(profile) = event.detail_mut::<VoiceProfile>() {
            profile.rate += 1;
            results.borrow_mut().push(profile.save(helper).unwrap());
        }
    });

    let mut profile = VoiceProfile::new("alto", 100);
    profile.save(&mut helper).unwrap();
    profile.save(&mut helper).unwrap();

    assert_eq!(*nested.borrow(), vec![false]);
    assert_eq!(profile.rate, 101);
    assert!(!profile.save_guard().is_saving());

    // the nested save never reached the database
    let stored = VoiceProfile::find_by_id(&mut helper, profile.id()).unwrap().unwrap();
    assert_eq!(stored.rate, 100);
}

#[test]
fn test_listener_saving_another_record_fires_events() {
    let mut helper = helper();
    let log = recorder(&mut helper, &["insert:before", "insert:after"]);
    let echoes = Rc::new(RefCell::new(Vec::new()));
    let saved = echoes.clone();
    helper.add_event_listener("insert:after", move |event, helper| {
        let Some(profile) = event.detail::<VoiceProfile>() else {
            return;
        };
        if profile.name == "lead" {
            let mut echo = VoiceProfile::new("echo", 50);
            assert!(echo.save(helper).unwrap());
            saved.borrow_mut().push(echo.id());
        }
    });

    let mut lead = VoiceProfile::new("lead", 120);
    assert!(lead.save(&mut helper).unwrap());

    assert_eq!(
        *log.borrow(),
        vec!["insert:before", "insert:after", "insert:before", "insert:after"]
    );
    assert_eq!(lead.id(), 1);
    assert_eq!(*echoes.borrow(), vec![2]);
    assert_eq!(helper.count("voice_profile", ()).unwrap(), 2);
}

#[test]
fn test_after_event_fires_on_failure() {
    init_logger();
    let mut helper = sqlite_memory(DriverOptions::throwing()).unwrap();
    let log = recorder(&mut helper, &["insert:before", "insert:after"]);

    let mut profile = VoiceProfile::new("ghost", 1);
    let result = profile.save(&mut helper);

    assert!(matches!(result, Err(Error::Prepare { .. })));
    assert_eq!(*log.borrow(), vec!["insert:before", "insert:after"]);
    assert_eq!(profile.id(), 0);
    assert!(!profile.save_guard().is_saving());
}

#[test]
fn test_soft_driver_save_reports_false() {
    init_logger();
    let mut helper = sqlite_memory(DriverOptions::default()).unwrap();

    let mut profile = VoiceProfile::new("ghost", 1);
    assert!(!profile.save(&mut helper).unwrap());
    assert!(VoiceProfile::find(&mut helper, (), (), true).unwrap().is_empty());
}

#[test]
fn test_many_to_many_table() {
    let mut helper = helper();

    let columns = helper.describe_table("user_voice_profile", &[]).unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.field_name()).collect();
    assert_eq!(names, vec!["user_id", "voice_profile_id"]);
    assert!(columns.iter().all(|c| c.is_primary_key()));
    assert!(columns.iter().all(|c| c.field_type() == "INTEGER"));

    let mut user = helper.insert("user");
    user.values(("id", 7));
    helper.run(&user).unwrap().unwrap();
    let mut profile = VoiceProfile::new("alto", 120);
    profile.save(&mut helper).unwrap();

    let mut link = helper.insert("user_voice_profile");
    link.values(vec![("user_id", Value::I64(7)), ("voice_profile_id", Value::I64(profile.id()))]);
    helper.run(&link).unwrap().unwrap();

    // deleting the user cascades to the join table
    helper.exec("DELETE FROM user WHERE id = 7").unwrap();
    assert_eq!(helper.count("user_voice_profile", ()).unwrap(), 0);
}

#[test]
fn test_describe_table_filters_fields() {
    let mut helper = helper();

    let columns = helper.describe_table("`voice_profile`", &["rate", "name"]).unwrap();
    assert_eq!(columns.len(), 2);

    let rate = columns.iter().find(|c| c.field_name() == "rate").unwrap();
    assert!(!rate.is_nullable());
    assert!(!rate.is_primary_key());
    assert_eq!(rate.default_value_decoded(), Some(serde_json::json!(100)));
}

#[test]
fn test_convenience_queries() {
    let mut helper = helper();
    VoiceProfile::new("alto", 120).save(&mut helper).unwrap();
    VoiceProfile::new("bass", 80).save(&mut helper).unwrap();

    let rows = helper
        .fetch_all("SELECT name FROM voice_profile ORDER BY name", Vec::new(), FetchMode::Num)
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get_index(0), Some(Value::from("bass")));

    let row = helper
        .fetch_one("SELECT * FROM voice_profile WHERE rate < ?", vec![Value::I64(100)], FetchMode::Assoc)
        .unwrap()
        .unwrap();
    assert_eq!(row.get("name"), Some(Value::from("bass")));

    let name = helper
        .fetch_column("SELECT name FROM voice_profile ORDER BY rate DESC", Vec::new())
        .unwrap();
    assert_eq!(name, Some(Value::from("alto")));

    // SQLite has no database to switch to
    assert!(!helper.use_database("other").unwrap());
}
