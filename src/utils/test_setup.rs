use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

/// Loads the environment once for tests and pins long phase timers so a
/// timer never fires in the middle of a test.
pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        if std::env::var("NIGHT_DURATION_SECS").is_err() {
            std::env::set_var("NIGHT_DURATION_SECS", "600");
        }
        if std::env::var("DAY_DISCUSSION_DURATION_SECS").is_err() {
            std::env::set_var("DAY_DISCUSSION_DURATION_SECS", "600");
        }
        if std::env::var("DAY_VOTING_DURATION_SECS").is_err() {
            std::env::set_var("DAY_VOTING_DURATION_SECS", "600");
        }
        if std::env::var("SHOWDOWN_DURATION_SECS").is_err() {
            std::env::set_var("SHOWDOWN_DURATION_SECS", "600");
        }
    });
}
