//! Crate version and build metadata

pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

pub const BUILD_TIME: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

// Highest migration under migrations/; caches written by a newer schema are refused.
include!(concat!(env!("OUT_DIR"), "/schema_version.rs"));

/// One line for logs and bug reports
pub fn describe() -> String {
    format!(
        "fieldsync-sdk {} (schema v{}, {} built {})",
        SDK_VERSION, SDK_DB_VERSION, GIT_SHA, BUILD_TIME
    )
}
