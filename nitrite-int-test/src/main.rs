use nitrite_core::collection::Filter;
use nitrite_core::errors::NitriteResult;
use nitrite_core::index::IndexKind;
use nitrite_int_test::test_util::{cleanup, create_test_context, insert_people};
use std::thread;

fn main() -> NitriteResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let people = ctx.db().collection("people")?;

    let count = 200_000;
    let start = std::time::Instant::now();
    insert_people(&people, count)?;
    println!("Inserted {} documents in {:?}", count, start.elapsed());

    // index the data while other threads keep writing
    let start = std::time::Instant::now();
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let people = people.clone();
            thread::spawn(move || -> NitriteResult<()> {
                for i in 0..5_000 {
                    people.insert(nitrite_core::doc! {
                        first_name: (format!("writer_{}_{}", w, i)),
                        age: (i % 90),
                    })?;
                }
                Ok(())
            })
        })
        .collect();

    people.create_index(vec!["age"], IndexKind::NonUnique)?;
    for writer in writers {
        if let Ok(result) = writer.join() {
            result?;
        }
    }
    println!("Built index under load in {:?}", start.elapsed());

    let start = std::time::Instant::now();
    let found = people.find(Filter::eq("age", 42))?.size();
    println!("Indexed lookup found {} documents in {:?}", found, start.elapsed());

    cleanup(ctx)?;
    println!("Stress test completed");
    Ok(())
}
