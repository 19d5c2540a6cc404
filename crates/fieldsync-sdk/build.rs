//! Build metadata for `version.rs`.
//!
//! vergen emits the build timestamp and git sha. The schema version is the
//! highest refinery migration number under `migrations/`, written to
//! `$OUT_DIR/schema_version.rs` and pulled in with `include!`.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use vergen::EmitBuilder;

fn migration_version(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix('V')?
        .strip_suffix(".sql")?
        .split_once("__")?
        .0
        .parse()
        .ok()
}

fn latest_migration(dir: &Path) -> i64 {
    fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| migration_version(entry.file_name().to_str()?))
        .max()
        .unwrap_or(0)
}

fn main() -> Result<(), Box<dyn Error>> {
    // a checkout without git still builds; version.rs falls back to "unknown"
    let _ = EmitBuilder::builder().build_timestamp().git_sha(false).emit();

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let version = latest_migration(&manifest_dir.join("migrations"));

    let out = PathBuf::from(std::env::var("OUT_DIR")?).join("schema_version.rs");
    fs::write(
        out,
        format!("pub const SDK_DB_VERSION: i64 = {};\n", version),
    )?;

    println!("cargo:rerun-if-changed=migrations");
    Ok(())
}
