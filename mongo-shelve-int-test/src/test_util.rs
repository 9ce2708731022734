use bson::{doc, Document};
use mongo_shelve::errors::{ErrorKind, ShelveError, ShelveResult};
use mongo_shelve::MongoShelve;
use std::backtrace::Backtrace;
use std::time::{Duration, Instant};
use std::thread;

#[cfg(not(any(feature = "memory", feature = "mongodb")))]
compile_error!("enable the `memory` or `mongodb` feature to pick a test backend");

pub const TEST_DATABASE: &str = "testing_mongoshelve";
pub const KEY_FIELD: &str = "key_field";

/// Runs a test with retry logic and error handling.
/// `after` runs whether the test body succeeds or not.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> ShelveResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> ShelveResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> ShelveResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        let failure = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    format!("{}\n\nBacktrace:\n{}", e, bt)
                } else {
                    e
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                format!("Panic: {}", err_msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", failure);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(failure);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    collection_name: String,
    shelve: MongoShelve,
    #[cfg(feature = "mongodb")]
    backend: mongo_shelve::mongo::MongoCollection,
}

impl TestContext {
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn shelve(&self) -> MongoShelve {
        self.shelve.clone()
    }
}

pub fn random_collection_name() -> String {
    format!("collec_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(all(feature = "memory", not(feature = "mongodb")))]
pub fn create_test_context() -> ShelveResult<TestContext> {
    use mongo_shelve::collection::ShelfCollection;
    use mongo_shelve::memory::InMemoryCollection;

    let collection_name = random_collection_name();
    let memory = InMemoryCollection::new(TEST_DATABASE, &collection_name);
    memory.create_unique_index(KEY_FIELD)?;

    let shelve = MongoShelve::new(ShelfCollection::new(memory), KEY_FIELD)?;
    Ok(TestContext {
        collection_name,
        shelve,
    })
}

#[cfg(feature = "mongodb")]
pub fn test_uri() -> String {
    std::env::var("MONGO_SHELVE_TEST_URI").unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string())
}

#[cfg(feature = "mongodb")]
pub fn create_test_context() -> ShelveResult<TestContext> {
    use mongo_shelve::collection::ShelfCollection;
    use mongo_shelve::mongo::MongoCollection;
    use mongodb::options::IndexOptions;
    use mongodb::sync::Client;
    use mongodb::IndexModel;

    let collection_name = random_collection_name();
    let client = Client::with_uri_str(test_uri()).map_err(driver_error)?;
    let backend = MongoCollection::from_client(&client, TEST_DATABASE, &collection_name);

    let mut keys = Document::new();
    keys.insert(KEY_FIELD, 1);
    let index = IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build();
    backend
        .inner()
        .create_index(index)
        .run()
        .map_err(driver_error)?;

    let shelve = MongoShelve::new(ShelfCollection::new(backend.clone()), KEY_FIELD)?;
    Ok(TestContext {
        collection_name,
        shelve,
        backend,
    })
}

#[cfg(feature = "mongodb")]
fn driver_error(err: mongodb::error::Error) -> ShelveError {
    ShelveError::new_with_cause(&err.to_string(), ErrorKind::StoreError, err)
}

#[cfg(all(feature = "memory", not(feature = "mongodb")))]
pub fn cleanup(ctx: TestContext) -> ShelveResult<()> {
    ctx.shelve().clear()?;
    Ok(())
}

#[cfg(feature = "mongodb")]
pub fn cleanup(ctx: TestContext) -> ShelveResult<()> {
    ctx.backend.inner().drop().run().map_err(driver_error)
}

/// The people every scenario starts from.
pub fn people() -> Vec<(&'static str, Document)> {
    vec![
        ("Ann", doc! { "age": 23, "height": 158 }),
        ("John", doc! { "age": 21, "height": 172 }),
        ("Helen", doc! { "age": 44, "height": 168 }),
    ]
}

pub fn insert_people(shelve: &MongoShelve) -> ShelveResult<()> {
    for (name, record) in people() {
        shelve.set(name, &record)?;
    }
    Ok(())
}

/// Asserts that `result` failed with `kind`.
pub fn assert_error_kind<T: std::fmt::Debug>(result: ShelveResult<T>, kind: ErrorKind) -> ShelveError {
    match result {
        Ok(value) => panic!("Expected {} error, got {:?}", kind, value),
        Err(err) => {
            assert_eq!(err.kind(), &kind, "unexpected error: {:?}", err);
            err
        }
    }
}
