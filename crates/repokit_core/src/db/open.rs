//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections carry the pragmas from `DbOptions`.
//! - Returned connections have all supplied migrations applied.

use super::migrations::apply_migrations;
use super::{DbOptions, DbResult, Migration};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file with default options and applies `migrations`.
pub fn open_db(path: impl AsRef<Path>, migrations: &[Migration]) -> DbResult<Connection> {
    open_db_with_options(path, &DbOptions::default(), migrations)
}

/// Opens an in-memory SQLite database with default options and applies `migrations`.
pub fn open_db_in_memory(migrations: &[Migration]) -> DbResult<Connection> {
    open_db_in_memory_with_options(&DbOptions::default(), migrations)
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_options(
    path: impl AsRef<Path>,
    options: &DbOptions,
    migrations: &[Migration],
) -> DbResult<Connection> {
    bootstrap("file", || Connection::open(path), options, migrations)
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory_with_options(
    options: &DbOptions,
    migrations: &[Migration],
) -> DbResult<Connection> {
    bootstrap("memory", Connection::open_in_memory, options, migrations)
}

fn bootstrap(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    options: &DbOptions,
    migrations: &[Migration],
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&mut conn, options, migrations) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} migrations={}",
                started_at.elapsed().as_millis(),
                migrations.len()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(
    conn: &mut Connection,
    options: &DbOptions,
    migrations: &[Migration],
) -> DbResult<()> {
    let foreign_keys = if options.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(options.busy_timeout)?;
    apply_migrations(conn, migrations)?;
    Ok(())
}
