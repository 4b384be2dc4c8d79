//! `setup`, `connect`, `disconnect` (spec §4.C).

use std::path::Path;

use rusqlite::Connection as SqliteConnection;

use crate::builder::Builder;
use crate::classify::{self, Kind};
use crate::error::DbError;

/// One worker's exclusive handle to the store: the raw `rusqlite` connection
/// plus the reusable [`Builder`] every streaming read rebuilds its rows
/// through (spec §3, "A `Connection` (C) exclusively owns its store handle,
/// its Builder (B)...").
pub struct Connection {
    pub(crate) conn: SqliteConnection,
    pub(crate) builder: Builder,
}

fn to_db_error(err: rusqlite::Error, context: &str) -> DbError {
    match classify::classify(&err) {
        Kind::UserError => DbError::user(format!("{context}: {err}")),
        Kind::RuntimeError => DbError::Runtime(format!("{context}: {err}")),
        Kind::HardError => DbError::hard(format!("{context}: {err}")),
        Kind::Success => unreachable!("classify() never returns Success for an Err"),
    }
}

/// Create the database file if absent and apply the schema, then close.
/// Spec: "RuntimeError on I/O; HardError on corruption".
pub fn setup(path: &Path) -> Result<(), DbError> {
    let conn = SqliteConnection::open(path).map_err(|e| to_db_error(e, "opening database file"))?;
    crate::db::schema::apply(&conn).map_err(|e| to_db_error(e, "applying schema"))?;
    conn.close().map_err(|(_, e)| to_db_error(e, "closing database after setup"))
}

/// Open a connection and prepare the statement cache. Spec: "HardError if
/// schema missing" — `apply` is idempotent, so a missing schema is created
/// rather than rejected; a connection that cannot even create the schema
/// (e.g. a corrupt file) surfaces as `HardError` via [`to_db_error`].
pub fn connect(path: &Path) -> Result<Connection, DbError> {
    let conn = SqliteConnection::open(path).map_err(|e| to_db_error(e, "opening database file"))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| to_db_error(e, "enabling foreign keys"))?;
    // Each worker holds its own connection against one shared file (spec
    // §3); without a busy timeout, two workers' transactions landing at the
    // same instant surface as `SQLITE_BUSY` instead of one simply waiting.
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| to_db_error(e, "setting busy timeout"))?;
    crate::db::schema::apply(&conn).map_err(|e| to_db_error(e, "applying schema"))?;
    crate::db::statements::configure_cache(&conn);
    Ok(Connection {
        conn,
        builder: Builder::new(),
    })
}

/// Finalize all statements and close. Spec: "first error wins; connection
/// destroyed regardless".
pub fn disconnect(connection: Connection) -> Result<(), DbError> {
    connection
        .conn
        .close()
        .map_err(|(_, e)| to_db_error(e, "closing database connection"))
}
