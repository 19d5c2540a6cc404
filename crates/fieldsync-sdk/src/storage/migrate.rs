//! Schema setup for the cache database
//!
//! Migrations under `migrations/` are embedded by refinery at compile time.
//! [`init_db`] runs once per opened connection.

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{FieldSyncError, Result};
use crate::version::SDK_DB_VERSION;

const HISTORY_TABLE: &str = "refinery_schema_history";

const CACHE_PRAGMAS: &str = "
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA foreign_keys=ON;
PRAGMA temp_store=MEMORY;
";

fn migration_error(context: &str, e: impl std::fmt::Display) -> FieldSyncError {
    FieldSyncError::Migration(format!("{}: {}", context, e))
}

/// Highest applied migration, `None` for a fresh database
fn schema_version(conn: &mut Connection) -> Result<Option<i64>> {
    let has_history = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [HISTORY_TABLE],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_history {
        return Ok(None);
    }
    let last = embedded::migrations::runner()
        .get_last_applied_migration(conn)
        .map_err(|e| migration_error("cannot read schema history", e))?;
    Ok(last.map(|m| i64::from(m.version())))
}

/// Pragmas, then a downgrade guard, then pending migrations.
///
/// A cache written by a newer SDK is refused before anything touches it.
pub fn init_db(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(CACHE_PRAGMAS.trim())?;

    if let Some(version) = schema_version(conn)? {
        if version > SDK_DB_VERSION {
            return Err(FieldSyncError::Migration(format!(
                "cache schema v{} is newer than supported v{}",
                version, SDK_DB_VERSION
            )));
        }
    }

    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| migration_error("migration failed", e))?;
    for migration in report.applied_migrations() {
        info!("🗄️ applied migration {}", migration);
    }
    Ok(())
}
