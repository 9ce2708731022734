use bson::{doc, Bson, Document};
use mongo_shelve::errors::ErrorKind;
use mongo_shelve_int_test::test_util::{
    cleanup, create_test_context, insert_people, people, run_test, KEY_FIELD,
};
use std::collections::HashMap;

fn names(keys: Vec<Bson>) -> Vec<String> {
    let mut names: Vec<String> = keys
        .into_iter()
        .filter_map(|key| key.as_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

#[test]
fn test_keys() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let keys = shelve.keys()?.collect::<Result<Vec<_>, _>>()?;
            assert_eq!(names(keys), vec!["Ann", "Helen", "John"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_items_match_get() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let expected: HashMap<String, Document> = people()
                .into_iter()
                .map(|(name, record)| (name.to_string(), record))
                .collect();

            let mut seen = 0;
            for item in shelve.items()? {
                let (key, record) = item?;
                let name = key.as_str().unwrap_or_default().to_string();
                assert_eq!(expected.get(&name), Some(&record));
                assert_eq!(shelve.get(key)?, record);
                assert!(!record.contains_key("_id"));
                assert!(!record.contains_key(KEY_FIELD));
                seen += 1;
            }
            assert_eq!(seen, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_keys_and_items_agree() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let keys = shelve.keys()?.collect::<Result<Vec<_>, _>>()?;
            let item_keys = shelve
                .items()?
                .map(|item| item.map(|(key, _)| key))
                .collect::<Result<Vec<_>, _>>()?;
            assert_eq!(names(keys), names(item_keys));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_values() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let mut ages: Vec<i32> = shelve
                .values()?
                .map(|value| value.map(|record| record.get_i32("age").unwrap_or_default()))
                .collect::<Result<Vec<_>, _>>()?;
            ages.sort();
            assert_eq!(ages, vec![21, 23, 44]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_iteration_is_restartable() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert_eq!(shelve.keys()?.count(), 3);
            assert_eq!(shelve.keys()?.count(), 3);

            shelve.set("Zoe", &doc! { "age": 30 })?;
            assert_eq!(shelve.keys()?.count(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_iteration_over_empty_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            assert_eq!(shelve.keys()?.count(), 0);
            assert_eq!(shelve.items()?.count(), 0);
            assert_eq!(shelve.values()?.count(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_iteration_reports_missing_key_field() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;
            shelve.insert_one(doc! { "age": 99 })?;

            let results: Vec<_> = shelve.keys()?.collect();
            assert_eq!(results.len(), 4);

            let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].kind(), &ErrorKind::MissingKeyField);
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
            Ok(())
        },
        cleanup,
    )
}
