use bson::doc;
use mongo_shelve::errors::ShelveResult;
use mongo_shelve_int_test::test_util::{cleanup, create_test_context};

fn main() -> ShelveResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let shelve = ctx.shelve();

    let count = 10_000;

    let start = std::time::Instant::now();
    for i in 0..count {
        let key = uuid::Uuid::new_v4().to_string();
        shelve.set(key, &doc! { "seq": i, "processed": false })?;
    }
    println!("Set {} entries in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let mut seen = 0;
    for key in shelve.keys()? {
        shelve.merge(key?, &doc! { "processed": true })?;
        seen += 1;
    }
    println!("Merged {} entries in {:?}", seen, start.elapsed());

    let start = std::time::Instant::now();
    let processed = shelve.find(doc! { "processed": true })?.count();
    println!("Counted {} processed entries in {:?}", processed, start.elapsed());

    cleanup(ctx)
}
