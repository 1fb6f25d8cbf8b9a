use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::error::{AppError, ErrorKind};

/// Open the source database read-only. Never creates the file.
pub fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Connection, AppError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(|e| {
        AppError::new(
            ErrorKind::Connection,
            "DB_OPEN_FAILED",
            "Failed to open source database",
        )
        .with_details(format!("path={}; err={}", path.display(), e))
    })?;

    conn.busy_timeout(busy_timeout).map_err(|e| {
        AppError::new(
            ErrorKind::Connection,
            "DB_OPEN_FAILED",
            "Failed to configure database connection",
        )
        .with_details(e.to_string())
    })?;

    // SQLite opens lazily; touch the schema so a non-database file fails here.
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| {
        AppError::new(
            ErrorKind::Connection,
            "DB_OPEN_FAILED",
            "Source database is not readable",
        )
        .with_details(format!("path={}; err={}", path.display(), e))
        .with_retryable(is_busy(&e))
    })?;

    Ok(conn)
}

/// Classify an error raised while preparing or stepping a statement.
pub(crate) fn statement_error(e: rusqlite::Error, sql: &str) -> AppError {
    if is_busy(&e) {
        return AppError::new(
            ErrorKind::Connection,
            "DB_BUSY",
            "Source database is locked",
        )
        .with_details(e.to_string())
        .with_retryable(true);
    }
    AppError::new(ErrorKind::Query, "DB_QUERY_FAILED", "Failed to execute query")
        .with_details(format!("sql={sql}; err={e}"))
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}
