//! Asynchronous strategy: I/O-backed validators, concurrent fan-out and
//! shared reference targets.

use std::time::Duration;

use pretty_assertions::assert_eq;

use trellis::prelude::*;

fn slow_convert(delay_ms: u64) -> CallAsync {
    CallAsync::new(move |_ctx, value| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match value {
                Value::Str(s) => s
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| Invalid::new("type", "Value must be an integer")),
                Value::Int(_) => Ok(value),
                _ => Err(Invalid::new("type", "Value must be an integer")),
            }
        })
    })
}

#[tokio::test]
async fn plain_validators_run_under_the_async_strategy() {
    let ctx = IsString::new().and(Len::min(2)).context("hello");
    assert_eq!(ctx.result_async().await.unwrap(), Value::from("hello"));
}

#[tokio::test]
async fn async_leaf_validators_suspend() {
    let ctx = slow_convert(5).context("42");
    assert_eq!(ctx.result_async().await.unwrap(), Value::from(42));
}

#[test]
#[should_panic(expected = "asynchronous strategy")]
fn async_leaves_reject_the_sync_strategy() {
    let ctx = slow_convert(0).context("42");
    let _ = ctx.result();
}

#[tokio::test]
async fn schema_fans_out_concurrently_with_deterministic_aggregation() {
    // The slowest field finishes last; aggregation still follows
    // declaration order.
    let schema = Schema::new()
        .field("a", slow_convert(30))
        .field("b", slow_convert(1))
        .field("c", slow_convert(10));
    let ctx = schema.context(record! { "a" => "x", "b" => "y", "c" => "3" });

    let start = std::time::Instant::now();
    let err = ctx.result_async().await.unwrap_err();
    // Concurrent, not sequential: well under the 41ms sequential sum.
    assert!(start.elapsed() < Duration::from_millis(40));

    assert_eq!(err.param("fields"), Some("a, b"));
    let paths: Vec<&str> = err.nested.iter().filter_map(|e| e.path.as_deref()).collect();
    assert_eq!(paths, vec!["/a", "/b"]);
}

#[tokio::test]
async fn for_each_fans_out_concurrently() {
    let validator = ForEach::new(slow_convert(10));
    let ctx = validator.context(list!["1", "2", "3", "4"]);

    let start = std::time::Instant::now();
    let result = ctx.result_async().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(35));
    assert_eq!(
        result,
        Value::List(vec![
            Value::from(1),
            Value::from(2),
            Value::from(3),
            Value::from(4),
        ])
    );
}

#[tokio::test]
async fn concurrent_references_to_one_target_settle_once() {
    // Both b and c await a's in-flight validation instead of re-running it.
    let schema = Schema::new()
        .field("a", slow_convert(10))
        .field("b", Match::check(Field::new(".a").use_result(true).copy(true)))
        .field("c", Match::check(Field::new(".a").use_result(true).copy(true)));
    let ctx = schema.context(record! { "a" => "7", "b" => 7, "c" => 7 });
    let result = ctx.result_async().await.unwrap();
    assert_eq!(result.get("a"), Value::from(7));
    assert_eq!(result.get("b"), Value::from(7));
}

#[tokio::test]
async fn async_outcomes_are_memoized_for_sync_reads() {
    let ctx = slow_convert(1).context("5");
    assert!(ctx.result_async().await.is_ok());
    // Once settled, the memoized outcome is readable synchronously.
    assert_eq!(ctx.result().unwrap(), Value::from(5));
    assert_eq!(ctx.error(), "");
}

#[tokio::test]
async fn or_stays_sequential_under_async() {
    let validator = slow_convert(1).or(IsString::new());
    let ctx = validator.context("not a number");
    assert_eq!(
        ctx.result_async().await.unwrap(),
        Value::from("not a number")
    );
}

#[tokio::test]
async fn concurrent_compositions_keep_their_own_overrides() {
    fn delay(delay_ms: u64) -> CallAsync {
        CallAsync::new(move |_ctx, value| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(value)
            })
        })
    }

    // Both fields install override scopes; the slower one is still live
    // when the faster one's tag resolves. Each tag must see its own
    // composition's map.
    let relaxed = Compose::new(delay(5).and(Len::min(5).tag("length")))
        .with(Overrides::new().set("length_min", 1));
    let strict = Compose::new(delay(25).and(Len::min(5).tag("length")));
    let schema = Schema::new().field("a", relaxed).field("b", strict);

    let ctx = schema.context(record! { "a" => "ab", "b" => "abcdef" });
    let result = ctx.result_async().await.unwrap();
    assert_eq!(result.get("a"), Value::from("ab"));
    assert_eq!(result.get("b"), Value::from("abcdef"));
}

#[tokio::test]
async fn async_compose_overrides_apply() {
    let compose = Compose::new(Len::range(3, 20).tag("length"))
        .with(Overrides::new().set("length_min", 6));
    let ctx = compose.context("abcd");
    let err = ctx.result_async().await.unwrap_err();
    assert_eq!(err.code, "length_min");
}
