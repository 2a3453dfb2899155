//! Configuration, paths, and logging shared by every Furrow crate.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_LIST_STALE_SECS, DEFAULT_LOG_LEVEL, DEFAULT_OAUTH_CALLBACK_PORT,
    DEFAULT_OAUTH_TIMEOUT_SECS, DEFAULT_REPORT_POLL_INTERVAL_SECS, DEFAULT_SUPABASE_PUBLISHABLE_KEY,
    DEFAULT_SUPABASE_URL, MAX_LIST_STALE_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, summarize_response_body};
pub use paths::Paths;
