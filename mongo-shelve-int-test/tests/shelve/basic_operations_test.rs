use bson::{doc, Bson};
use mongo_shelve::errors::ErrorKind;
use mongo_shelve::MongoShelve;
use mongo_shelve_int_test::test_util::{
    assert_error_kind, cleanup, create_test_context, insert_people, people, run_test, KEY_FIELD,
    TEST_DATABASE,
};

#[test]
fn test_set_and_get() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert_eq!(shelve.len()?, 3);
            assert_eq!(shelve.get("Ann")?, doc! { "age": 23, "height": 158 });
            for (name, record) in people() {
                assert_eq!(shelve.get(name)?, record);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_get_hides_reserved_fields() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let ann = shelve.get("Ann")?;
            assert!(!ann.contains_key("_id"));
            assert!(!ann.contains_key(KEY_FIELD));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_get_missing_key() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            let err = assert_error_kind(shelve.get("Zoe"), ErrorKind::NotFound);
            assert!(err.message().contains("Key 'Zoe' not found"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_set_replaces_record() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            shelve.set("Ann", &doc! { "age": 24, "team": "ops" })?;
            assert_eq!(shelve.get("Ann")?, doc! { "age": 24, "team": "ops" });
            assert_eq!(shelve.len()?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_merge_keeps_other_fields() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            shelve.merge("Ann", &doc! { "age": 24 })?;
            assert_eq!(shelve.get("Ann")?, doc! { "age": 24, "height": 158 });

            shelve.merge("Zoe", &doc! { "age": 30 })?;
            assert_eq!(shelve.get("Zoe")?, doc! { "age": 30 });
            assert_eq!(shelve.len()?, 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_set_ignores_identity_in_record() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            shelve.set("Ann", &doc! { "_id": 12345, "age": 23 })?;

            assert_eq!(shelve.get("Ann")?, doc! { "age": 23 });
            let raw = shelve.find(doc! { "key_field": "Ann" })?.try_collect()?;
            assert_eq!(raw.len(), 1);
            assert_ne!(raw[0].get("_id"), Some(&Bson::Int32(12345)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_non_string_keys() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            shelve.set(42, &doc! { "answer": true })?;
            shelve.set(7i64, &doc! { "answer": false })?;

            assert_eq!(shelve.get(42)?, doc! { "answer": true });
            assert!(shelve.contains(7i64)?);

            let err = assert_error_kind(shelve.get(43), ErrorKind::NotFound);
            assert!(err.message().contains("Key '43' not found"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_contains() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            insert_people(&shelve)?;

            assert!(shelve.contains("Ann")?);
            assert!(shelve.contains("Helen")?);
            assert!(!shelve.contains("Zoe")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_len_and_is_empty() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            assert_eq!(shelve.len()?, 0);
            assert!(shelve.is_empty()?);

            insert_people(&shelve)?;
            assert_eq!(shelve.len()?, 3);
            assert!(!shelve.is_empty()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_display() {
    run_test(
        create_test_context,
        |ctx| {
            let shelve = ctx.shelve();
            assert_eq!(
                shelve.to_string(),
                format!("<{}.{} ({})>", TEST_DATABASE, ctx.collection_name(), KEY_FIELD)
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rejects_invalid_key_field() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.shelve().collection().clone();
            for key_field in ["", "_id", "$key", "a.b"] {
                assert_error_kind(
                    MongoShelve::new(collection.clone(), key_field),
                    ErrorKind::InvalidFieldName,
                );
            }
            Ok(())
        },
        cleanup,
    )
}
