mod common;

use common::{open_uow, seeded_uow, Country, Note, Person};
use repokit_core::{field, Filter, RepoError, Repository};

#[test]
fn add_then_save_then_get_returns_equal_entity() {
    let uow = open_uow();
    let people = uow.repository::<Person>().unwrap();

    let person = Person::aged(7, "Grace", 85);
    people.add(&person).unwrap();
    assert_eq!(people.save_changes().unwrap(), 1);

    assert_eq!(people.get_by_id(&7).unwrap(), Some(person));
}

#[test]
fn staged_add_is_invisible_until_saved() {
    let uow = open_uow();
    let people = uow.repository::<Person>().unwrap();

    people.add(&Person::new(1, "A")).unwrap();
    assert!(people.get_by_id(&1).unwrap().is_none());
    assert_eq!(uow.pending_changes(), 1);

    people.save_changes().unwrap();
    assert!(people.get_by_id(&1).unwrap().is_some());
    assert_eq!(uow.pending_changes(), 0);
}

#[test]
fn get_by_unknown_id_is_none_not_error() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();
    assert_eq!(people.get_by_id(&99).unwrap(), None);
}

#[test]
fn add_or_update_takes_update_path_for_saved_identity() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();

    let replacement = Person::aged(1, "A-renamed", 40);
    people.add_or_update(&replacement).unwrap();
    assert_eq!(people.save_changes().unwrap(), 1);

    assert_eq!(people.get_by_id(&1).unwrap(), Some(replacement));
    assert_eq!(people.count().unwrap(), 2);
}

#[test]
fn add_or_update_takes_insert_path_for_new_identity() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();

    people.add_or_update(&Person::new(3, "C")).unwrap();
    people.save_changes().unwrap();

    let matches = people.find(field("id").eq(3)).unwrap().to_vec().unwrap();
    assert_eq!(matches, vec![Person::new(3, "C")]);
}

#[test]
fn add_or_update_ignores_inserts_staged_in_same_unit_of_work() {
    let uow = open_uow();
    let people = uow.repository::<Person>().unwrap();

    people.add(&Person::new(5, "first")).unwrap();
    people.add_or_update(&Person::new(5, "second")).unwrap();

    let err = people.save_changes().unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert_eq!(people.count().unwrap(), 0);
}

#[test]
fn update_overwrites_every_column() {
    let uow = open_uow();
    let people = uow.repository::<Person>().unwrap();
    people.add(&Person::aged(1, "A", 30)).unwrap();
    people.save_changes().unwrap();

    people.update(&Person::new(1, "A2")).unwrap();
    people.save_changes().unwrap();

    let loaded = people.get_by_id(&1).unwrap().unwrap();
    assert_eq!(loaded.name, "A2");
    assert_eq!(loaded.age, None);
}

#[test]
fn absent_arguments_are_invalid() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();

    assert!(matches!(
        people.get_by_id(&0).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert!(matches!(
        people.find(Filter::default()).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert!(matches!(
        people.add(&Person::new(0, "nobody")).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert!(matches!(
        people.update(&Person::new(0, "nobody")).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert!(matches!(
        people.add_or_update(&Person::new(0, "nobody")).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert!(matches!(
        people.remove(&0).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert_eq!(uow.pending_changes(), 0);
}

#[test]
fn find_and_remove_scenario() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();

    let found = people.find(field("name").eq("A")).unwrap().to_vec().unwrap();
    assert_eq!(found, vec![Person::new(1, "A")]);

    people.remove(&2).unwrap();
    assert_eq!(people.save_changes().unwrap(), 1);

    let remaining = people.get_all().unwrap().to_vec().unwrap();
    assert_eq!(remaining, vec![Person::new(1, "A")]);
}

#[test]
fn remove_unknown_id_fails_with_not_found() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();

    let err = people.remove(&42).unwrap_err();
    assert!(
        matches!(err, RepoError::NotFound { collection: "people", ref key } if key == "42")
    );
    assert_eq!(uow.pending_changes(), 0);
}

#[test]
fn uuid_keyed_entities_roundtrip() {
    let uow = seeded_uow();
    let notes = uow.repository::<Note>().unwrap();

    let note = Note::new(1, "remember the milk");
    notes.add(&note).unwrap();
    notes.save_changes().unwrap();

    assert_eq!(notes.get_by_id(&note.id).unwrap(), Some(note.clone()));
    assert!(notes.exists(&note.id).unwrap());
    assert!(matches!(
        notes.get_by_id(&uuid::Uuid::nil()).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
}

#[test]
fn repositories_on_one_context_share_a_save() {
    let uow = seeded_uow();
    let people = uow.repository::<Person>().unwrap();
    let notes = uow.repository::<Note>().unwrap();

    people.add(&Person::new(3, "C")).unwrap();
    notes.add(&Note::new(3, "for C")).unwrap();
    assert_eq!(notes.save_changes().unwrap(), 2);

    assert!(people.exists(&3).unwrap());
    assert_eq!(notes.count().unwrap(), 1);
}

#[test]
fn string_keyed_entities_roundtrip_and_remove() {
    let uow = open_uow();
    let countries = uow.repository::<Country>().unwrap();

    let norway = Country::new("NO", "Norway");
    countries.add(&norway).unwrap();
    countries.add(&Country::new("SE", "Sweden")).unwrap();
    countries.save_changes().unwrap();

    assert_eq!(countries.get_by_id(&"NO".to_string()).unwrap(), Some(norway));
    assert_eq!(countries.get_by_id(&"DK".to_string()).unwrap(), None);
    assert!(matches!(
        countries.get_by_id(&"  ".to_string()).unwrap_err(),
        RepoError::InvalidArgument(_)
    ));

    countries.remove(&"NO".to_string()).unwrap();
    assert_eq!(countries.save_changes().unwrap(), 1);

    let remaining = countries.get_all().unwrap().to_vec().unwrap();
    assert_eq!(remaining, vec![Country::new("SE", "Sweden")]);
}
