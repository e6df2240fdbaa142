#![allow(dead_code)]

use repokit_core::{Entity, Migration, RepoError, RepoResult, Repository, UnitOfWork};
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE notes (
            id TEXT PRIMARY KEY NOT NULL,
            person_id INTEGER NOT NULL REFERENCES people(id),
            body TEXT NOT NULL
        );",
    ),
    Migration::new(
        3,
        "CREATE TABLE countries (
            code TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL
        );",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
}

impl Person {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            age: None,
        }
    }

    pub fn aged(id: i64, name: &str, age: i64) -> Self {
        Self {
            age: Some(age),
            ..Self::new(id, name)
        }
    }
}

impl Entity for Person {
    type Key = i64;
    const COLLECTION: &'static str = "people";
    const COLUMNS: &'static [&'static str] = &["name", "age"];

    fn id(&self) -> &i64 {
        &self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.age.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            age: row.get("age")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub person_id: i64,
    pub body: String,
}

impl Note {
    pub fn new(person_id: i64, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id,
            body: body.to_string(),
        }
    }
}

impl Entity for Note {
    type Key = Uuid;
    const COLLECTION: &'static str = "notes";
    const COLUMNS: &'static [&'static str] = &["person_id", "body"];

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.person_id), Value::Text(self.body.clone())]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id_text: String = row.get("id")?;
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{id_text}` in notes.id"))
        })?;
        Ok(Self {
            id,
            person_id: row.get("person_id")?,
            body: row.get("body")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub code: String,
    pub name: String,
}

impl Country {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

impl Entity for Country {
    type Key = String;
    const COLLECTION: &'static str = "countries";
    const KEY_COLUMN: &'static str = "code";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn id(&self) -> &String {
        &self.code
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            code: row.get("code")?,
            name: row.get("name")?,
        })
    }
}

pub fn open_uow() -> UnitOfWork {
    UnitOfWork::open_in_memory(MIGRATIONS).unwrap()
}

/// Opens a context whose `people` table already holds `{1, "A"}` and `{2, "B"}`.
pub fn seeded_uow() -> UnitOfWork {
    let uow = open_uow();
    {
        let people = uow.repository::<Person>().unwrap();
        people.add(&Person::new(1, "A")).unwrap();
        people.add(&Person::new(2, "B")).unwrap();
        assert_eq!(people.save_changes().unwrap(), 2);
    }
    uow
}
