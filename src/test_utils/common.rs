use std::time::Duration;

use tokio::time::Instant;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Tolerance for due-time assertions under paused time; timers fire on
/// millisecond ticks so fetches can land slightly after their due time.
pub const TIMER_SLACK: Duration = Duration::from_millis(20);

/// Asserts `at - start` is `expected` give or take [`TIMER_SLACK`], and never
/// earlier than `expected`.
pub fn assert_elapsed(
    start: Instant,
    at: Instant,
    expected: Duration,
) {
    let elapsed = at.duration_since(start);
    assert!(
        elapsed >= expected && elapsed <= expected + TIMER_SLACK,
        "expected ~{:?} after start, got {:?}",
        expected,
        elapsed
    );
}
