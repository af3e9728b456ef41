use sqlhelm::{
    sqlite_memory, DriverOptions, Entity, FetchMode, Field, Mapped, QueryHelper, SaveGuard, Value,
};

#[derive(Debug, Default)]
struct Author {
    id: i64,
    name: String,
    books: i64,
    guard: SaveGuard,
}

impl Mapped for Author {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new("id", |a: &Self| a.id.into(), |a: &mut Self, v| {
                a.id = v.get()?;
                Ok(())
            }),
            Field::new("name", |a: &Self| a.name.clone().into(), |a: &mut Self, v| {
                a.name = v.get()?;
                Ok(())
            }),
            Field::new("books", |a: &Self| a.books.into(), |a: &mut Self, v| {
                a.books = v.get()?;
                Ok(())
            }),
        ]
    }
}

impl Entity for Author {
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
            "CREATE TABLE author (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, books INTEGER NOT NULL)",
        )?;
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== sqlhelm SQLite - Usage Example ===\n");

    let mut helper = sqlite_memory(DriverOptions::throwing())?;
    Author::migrate(&mut helper)?;

    helper.add_event_listener("insert:after", |event, _| {
        if let Some(author) = event.detail::<Author>() {
            println!("   inserted {} as #{}", author.name, author.id);
        }
    });

    // Active records
    println!("1. Saving records:");
    for (name, books) in [("Le Guin", 23), ("Herbert", 6), ("Jemisin", 11)] {
        let mut author = Author {
            name: name.to_string(),
            books,
            ..Author::default()
        };
        author.save(&mut helper)?;
    }
    println!();

    // Builder
    let mut query = helper.select(["a.name", "a.books"]);
    query
        .from("author", Some("a"))?
        .where_(("a.books > ?", 10))
        .order_by("a.books", false);

    println!("2. SELECT:");
    println!("   SQL: {}", query.to_sql()?);
    println!("   Parameters: {:?}", query.get_params());
    if let Some(mut statement) = helper.run(&query)? {
        for row in statement.fetch(FetchMode::Assoc) {
            println!("   {:?}", row);
        }
    }
    println!();

    // Finders
    println!("3. Finders:");
    if let Some(mut author) = Author::find_one(&mut helper, ("name", "Herbert"), (), true)? {
        author.books += 1;
        author.save(&mut helper)?;
        println!("   {} now has {} books", author.name, author.books);
    }
    println!("   {} authors", helper.count("author", ())?);
    println!();

    // Nested transactions only commit once the outermost one does
    println!("4. Transactions:");
    helper.begin_transaction()?;
    helper.begin_transaction()?;
    Author::remove_entry(&mut helper, 1)?;
    helper.commit()?;
    helper.roll_back()?;
    let left = helper.fetch_column("SELECT COUNT(*) FROM author", Vec::new())?;
    println!("   after rollback: {:?}", left.unwrap_or(Value::Null));

    Ok(())
}
