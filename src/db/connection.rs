use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::rows::{fetch_rows, Row};

/// File-backed aggregate database. Every query gets its own read-only connection.
#[derive(Debug, Clone)]
pub struct AggregateStore {
    path: PathBuf,
}

impl AggregateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> rusqlite::Result<Connection> {
        debug!("Opening aggregate database {}", self.path.display());
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Runs `sql` on a fresh connection and returns every row.
    pub fn query(&self, sql: &str) -> rusqlite::Result<Vec<Row>> {
        let conn = self.connect()?;
        fetch_rows(&conn, sql)
    }
}
