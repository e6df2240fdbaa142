//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `repokit_core` linkage and run one scripted unit of work
//!   against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use repokit_core::{
    field, Entity, Migration, RepoError, RepoResult, Repository, SortDirection, UnitOfWork,
};
use rusqlite::types::Value;
use rusqlite::Row;
use std::process::ExitCode;

const CONTACT_MIGRATIONS: &[Migration] = &[Migration::new(
    1,
    "CREATE TABLE contacts (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE
    );",
)];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Contact {
    id: i64,
    name: String,
    email: Option<String>,
}

impl Contact {
    fn new(id: i64, name: &str, email: Option<&str>) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
        }
    }
}

impl Entity for Contact {
    type Key = i64;
    const COLLECTION: &'static str = "contacts";
    const COLUMNS: &'static [&'static str] = &["name", "email"];

    fn id(&self) -> &i64 {
        &self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.email.clone().map_or(Value::Null, Value::Text),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
        })
    }
}

fn main() -> ExitCode {
    println!("repokit_core ping={}", repokit_core::ping());
    println!("repokit_core version={}", repokit_core::core_version());

    match walkthrough() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("walkthrough failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn walkthrough() -> RepoResult<()> {
    let uow = UnitOfWork::open_in_memory(CONTACT_MIGRATIONS)?;
    let contacts = uow.repository::<Contact>()?;

    contacts.add(&Contact::new(1, "Ada", Some("ada@example.com")))?;
    contacts.add(&Contact::new(2, "Brian", None))?;
    println!("saved={}", contacts.save_changes()?);

    contacts.add_or_update(&Contact::new(2, "Brian K", Some("bk@example.com")))?;
    contacts.add_or_update(&Contact::new(3, "Cleo", None))?;
    println!("upserted={}", contacts.save_changes()?);

    contacts.add(&Contact::new(4, "Dup", Some("ada@example.com")))?;
    match contacts.save_changes() {
        Err(RepoError::ConstraintViolation(_)) => {
            println!("rejected_duplicate_email discarded={}", uow.discard_changes());
        }
        Ok(affected) => println!("unexpected_save affected={affected}"),
        Err(err) => return Err(err),
    }

    contacts.remove(&1)?;
    println!("removed={}", contacts.save_changes()?);

    let named = contacts
        .find(field("name").like("%r%"))?
        .order_by("name", SortDirection::Descending);
    for contact in named.to_vec()? {
        println!(
            "contact id={} name={} email={}",
            contact.id,
            contact.name,
            contact.email.as_deref().unwrap_or("-")
        );
    }
    println!("total={}", contacts.count()?);

    contacts.dispose();
    println!("disposed={}", uow.is_disposed());
    Ok(())
}
