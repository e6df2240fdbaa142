mod common;

use common::{open_uow, Person};
use repokit_core::{field, Filter, FilterValue, RepoError, Repository, SortDirection};

fn people_fixture() -> repokit_core::UnitOfWork {
    let uow = open_uow();
    {
        let people = uow.repository::<Person>().unwrap();
        people.add(&Person::aged(1, "Ada", 36)).unwrap();
        people.add(&Person::aged(2, "Brian", 52)).unwrap();
        people.add(&Person::new(3, "Cleo")).unwrap();
        people.add(&Person::aged(4, "Dora", 19)).unwrap();
        people.save_changes().unwrap();
    }
    uow
}

fn ids(people: &[Person]) -> Vec<i64> {
    people.iter().map(|person| person.id).collect()
}

#[test]
fn query_is_deferred_until_consumed() {
    let uow = open_uow();
    let people = uow.repository::<Person>().unwrap();

    let adults = people.find(field("age").ge(18)).unwrap();
    people.add(&Person::aged(1, "late", 30)).unwrap();
    people.save_changes().unwrap();

    assert_eq!(ids(&adults.to_vec().unwrap()), vec![1]);
}

#[test]
fn composed_filters_are_and_combined() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let query = people
        .find(field("age").gt(20))
        .unwrap()
        .filter(field("name").like("B%"));
    assert_eq!(ids(&query.to_vec().unwrap()), vec![2]);
    assert_eq!(query.count().unwrap(), 1);
}

#[test]
fn or_not_and_null_filters() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let young_or_unknown = field("age").lt(20).or(field("age").is_null());
    assert_eq!(
        ids(&people.find(young_or_unknown).unwrap().to_vec().unwrap()),
        vec![3, 4]
    );

    let not_ada = !field("name").eq("Ada");
    assert_eq!(
        ids(&people.find(not_ada).unwrap().to_vec().unwrap()),
        vec![2, 3, 4]
    );

    let by_set = field("id").is_in([2_i64, 4, 9]);
    assert_eq!(ids(&people.find(by_set).unwrap().to_vec().unwrap()), vec![2, 4]);
}

#[test]
fn ordering_and_paging() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let page = people
        .get_all()
        .unwrap()
        .order_by("name", SortDirection::Descending)
        .limit(2)
        .offset(1);
    assert_eq!(ids(&page.to_vec().unwrap()), vec![3, 2]);

    let tail = people.get_all().unwrap().offset(3);
    assert_eq!(ids(&tail.to_vec().unwrap()), vec![4]);

    let oldest = people
        .find(field("age").is_not_null())
        .unwrap()
        .order_by("age", SortDirection::Descending)
        .first()
        .unwrap();
    assert_eq!(oldest.map(|person| person.id), Some(2));
}

#[test]
fn invalid_predicates_are_rejected_at_find() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let unknown_column = people.find(field("salary").gt(1)).unwrap_err();
    assert!(matches!(unknown_column, RepoError::InvalidArgument(_)));

    let empty_in = people
        .find(field("id").is_in(Vec::<i64>::new()))
        .unwrap_err();
    assert!(matches!(empty_in, RepoError::InvalidArgument(_)));

    let empty_group = people.find(Filter::any(Vec::new())).unwrap_err();
    assert!(matches!(empty_group, RepoError::InvalidArgument(_)));
}

#[test]
fn invalid_order_column_fails_at_execution() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let query = people
        .get_all()
        .unwrap()
        .order_by("rowid; DROP TABLE people", SortDirection::Ascending);
    assert!(matches!(
        query.to_vec().unwrap_err(),
        RepoError::InvalidArgument(_)
    ));
    assert_eq!(people.count().unwrap(), 4);
}

#[test]
fn filter_text_is_bound_not_interpolated() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let hostile = field("name").eq("x' OR '1'='1");
    assert!(!people.find(hostile).unwrap().exists().unwrap());
}

#[test]
fn filters_roundtrip_through_json() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let json = r#"{"and":[
        {"compare":{"column":"age","op":"ge","value":30}},
        {"not":{"compare":{"column":"name","op":"eq","value":"Brian"}}}
    ]}"#;
    let filter: Filter = serde_json::from_str(json).unwrap();
    assert_eq!(ids(&people.find(filter.clone()).unwrap().to_vec().unwrap()), vec![1]);

    let encoded = serde_json::to_value(&filter).unwrap();
    assert_eq!(encoded["and"][0]["compare"]["value"], 30);

    let decoded: FilterValue = serde_json::from_str("null").unwrap();
    assert_eq!(decoded, FilterValue::Null);
}

#[test]
fn inequality_and_negation_keep_rows_with_null_columns() {
    let uow = people_fixture();
    let people = uow.repository::<Person>().unwrap();

    let in_memory = people
        .get_all()
        .unwrap()
        .to_vec()
        .unwrap()
        .into_iter()
        .filter(|person| person.age != Some(36))
        .collect::<Vec<_>>();
    assert_eq!(ids(&in_memory), vec![2, 3, 4]);

    let not_equal = people.find(field("age").ne(36)).unwrap().to_vec().unwrap();
    assert_eq!(not_equal, in_memory);

    let negated = people.find(!field("age").eq(36)).unwrap().to_vec().unwrap();
    assert_eq!(negated, in_memory);

    let outside_set = people
        .find(!field("age").is_in([36_i64, 52]))
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(ids(&outside_set), vec![3, 4]);
}
