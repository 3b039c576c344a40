use nitrite_core::collection::{Document, NitriteCollection};
use nitrite_core::doc;
use nitrite_core::errors::NitriteResult;
use nitrite_core::nitrite::Nitrite;
use std::backtrace::Backtrace;
use std::thread;
use std::time::{Duration, Instant};

/// Runs `test` between `before` and `after`, retrying a failed attempt.
/// `after` runs even when the test fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> NitriteResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> NitriteResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> NitriteResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

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
                last_backtrace = Some(bt);
                e
            }
            Err(panic_err) => {
                let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                last_backtrace = Some(Backtrace::capture().to_string());
                format!("Panic: {}", message)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", failure);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(failure);
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    name: String,
    db: Nitrite,
}

impl TestContext {
    pub fn new(name: String, db: Nitrite) -> Self {
        Self { name, db }
    }

    /// A unique name for this run, handy as a collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db(&self) -> Nitrite {
        self.db.clone()
    }
}

pub fn create_test_context() -> NitriteResult<TestContext> {
    let db = Nitrite::builder().event_workers(2).open_or_create()?;
    Ok(TestContext::new(random_name(), db))
}

/// Like [create_test_context] with a small backfill batch, so index builds
/// take many batches and interleave with concurrent writers.
pub fn create_small_batch_context() -> NitriteResult<TestContext> {
    let db = Nitrite::builder()
        .event_workers(2)
        .backfill_batch_size(8)
        .open_or_create()?;
    Ok(TestContext::new(random_name(), db))
}

pub fn cleanup(ctx: TestContext) -> NitriteResult<()> {
    ctx.db().close()
}

pub fn random_name() -> String {
    format!("test_{}", uuid::Uuid::new_v4().simple())
}

pub fn create_person(first_name: &str, last_name: &str, age: i32, email: &str) -> Document {
    doc! {
        first_name: first_name,
        last_name: last_name,
        age: age,
        email: email,
        address: {
            city: "Springfield",
            zip: 12345,
        },
    }
}

/// Inserts `count` people named `person_<i>` aged `20 + i % 50`.
pub fn insert_people(collection: &NitriteCollection, count: usize) -> NitriteResult<()> {
    let people = (0..count)
        .map(|i| {
            create_person(
                &format!("person_{}", i),
                "Smith",
                20 + (i % 50) as i32,
                &format!("person_{}@example.org", i),
            )
        })
        .collect();
    collection.insert_many(people)?;
    Ok(())
}
