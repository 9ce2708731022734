use bson::{doc, Bson};
use mongo_shelve::errors::ErrorKind;
use mongo_shelve_int_test::test_util::{
    assert_error_kind, cleanup, create_test_context, insert_people, run_test,
};

#[test]
fn test_delete() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            shelve.delete("Ann")?;
            assert_error_kind(shelve.get("Ann"), ErrorKind::NotFound);
            assert!(!shelve.contains("Ann")?);
            assert_eq!(shelve.len()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_missing_key() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let err = assert_error_kind(shelve.delete("Zoe"), ErrorKind::NotFound);
            assert!(err
                .message()
                .contains("No document with key 'Zoe' could be deleted"));
            assert_eq!(shelve.len()?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_twice() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            shelve.delete("John")?;
            assert_error_kind(shelve.delete("John"), ErrorKind::NotFound);
            assert_eq!(shelve.len()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_in_empty_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            assert_error_kind(shelve.delete("Ann"), ErrorKind::NotFound);
            assert_eq!(shelve.len()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clear() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert_eq!(shelve.clear()?, 3);
            assert_eq!(shelve.len()?, 0);
            assert_eq!(shelve.keys()?.count(), 0);
            for name in ["Ann", "John", "Helen"] {
                assert_error_kind(shelve.get(name), ErrorKind::NotFound);
            }
            assert_eq!(shelve.clear()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_many() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let deleted = shelve.delete_many(doc! { "age": { "$gt": 22 } })?;
            assert_eq!(deleted, 2);

            let keys = shelve.keys()?.collect::<Result<Vec<_>, _>>()?;
            assert_eq!(keys, vec![Bson::String("John".to_string())]);
            assert_eq!(shelve.get("John")?, doc! { "age": 21, "height": 172 });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_many_with_non_matching_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert_eq!(shelve.delete_many(doc! { "age": { "$gt": 100 } })?, 0);
            assert_eq!(shelve.len()?, 3);
            Ok(())
        },
        cleanup,
    )
}
