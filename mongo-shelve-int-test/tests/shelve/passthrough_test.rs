use bson::{doc, Document};
use mongo_shelve::errors::ErrorKind;
use mongo_shelve_int_test::test_util::{
    assert_error_kind, cleanup, create_test_context, insert_people, run_test, KEY_FIELD,
};

#[test]
fn test_insert_one() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            let id = shelve.insert_one(doc! { "key_field": "Ann", "age": 23 })?;

            let raw = shelve.find(doc! { "_id": id })?.try_collect()?;
            assert_eq!(raw.len(), 1);
            assert_eq!(shelve.get("Ann")?, doc! { "age": 23 });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_many() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            let ids = shelve.insert_many(vec![
                doc! { "key_field": "Ann", "age": 23 },
                doc! { "key_field": "John", "age": 21 },
                doc! { "key_field": "Helen", "age": 44 },
            ])?;
            assert_eq!(ids.len(), 3);

            let first = shelve.find(doc! { "_id": ids[0].clone() })?.try_collect()?;
            assert_eq!(first[0].get_str(KEY_FIELD).ok(), Some("Ann"));
            assert_eq!(shelve.len()?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_duplicate_key() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let err = assert_error_kind(
                shelve.insert_one(doc! { "key_field": "Ann", "age": 1 }),
                ErrorKind::UniqueConstraintViolation,
            );
            assert!(std::error::Error::source(&err).is_some());
            assert_eq!(shelve.get("Ann")?, doc! { "age": 23, "height": 158 });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_many_duplicate_key() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let err = assert_error_kind(
                shelve.insert_many(vec![
                    doc! { "key_field": "Paul", "age": 30 },
                    doc! { "key_field": "John", "age": 1 },
                    doc! { "key_field": "Zoe", "age": 12 },
                ]),
                ErrorKind::UniqueConstraintViolation,
            );
            assert!(std::error::Error::source(&err).is_some());
            assert_eq!(shelve.get("John")?, doc! { "age": 21, "height": 172 });
            assert!(shelve.contains("Paul")?);
            assert!(!shelve.contains("Zoe")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_returns_raw_documents() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let young: Vec<Document> = shelve.find(doc! { "age": { "$lt": 30 } })?.try_collect()?;
            assert_eq!(young.len(), 2);
            for document in &young {
                assert!(document.contains_key("_id"));
                assert!(document.contains_key(KEY_FIELD));
            }

            let everyone = shelve.find(doc! {})?.count();
            assert_eq!(everyone, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_with_logical_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let filter = doc! {
                "$or": [
                    { "key_field": "Ann" },
                    { "height": { "$gte": 170 } },
                ]
            };
            let mut names: Vec<String> = shelve
                .find(filter)?
                .try_collect()?
                .iter()
                .filter_map(|d| d.get_str(KEY_FIELD).ok().map(str::to_string))
                .collect();
            names.sort();
            assert_eq!(names, vec!["Ann", "John"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_collection_escape_hatch() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert_eq!(shelve.key_field(), KEY_FIELD);
            assert_eq!(shelve.collection().name(), ctx.collection_name());
            assert_eq!(shelve.collection().count()?, 3);
            Ok(())
        },
        cleanup,
    )
}
