//! SQLite warehouse backend
//!
//! Read-only connections with a small idle cache. Text-list parameters are
//! bound as JSON arrays and expanded in SQL with `json_each`. Only the
//! parameters a statement actually references are bound.

use super::{ParamValue, QueryParams, QueryStore, Row, StorageError, Value};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn migration_error(file: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Migration(format!("{}: {}", file.display(), err))
}

/// `.sql` files of `dir`, in file-name order
fn schema_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| migration_error(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort();

    Ok(files)
}

/// Create the warehouse schema from `schema_dir` on a read-write connection
///
/// Every statement must be `IF NOT EXISTS`, so running this against an
/// existing warehouse is a no-op. Returns the number of files applied.
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: impl AsRef<Path>,
) -> Result<usize, StorageError> {
    let schema_dir = schema_dir.as_ref();
    let files = schema_files(schema_dir)?;

    let journal_mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(|e| migration_error(schema_dir, e))?;

    log::info!(
        "🔧 Applying {} warehouse schema files from {} (journal_mode={})",
        files.len(),
        schema_dir.display(),
        journal_mode
    );

    let tx = conn
        .transaction()
        .map_err(|e| migration_error(schema_dir, e))?;
    for file in &files {
        let sql = fs::read_to_string(file).map_err(|e| migration_error(file, e))?;
        tx.execute_batch(&sql).map_err(|e| migration_error(file, e))?;
        log::debug!("   ├─ applied {}", file.display());
    }
    tx.commit().map_err(|e| migration_error(schema_dir, e))?;

    log::info!("✅ Warehouse schema ready");
    Ok(files.len())
}

pub struct SqliteStore {
    db_path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

impl SqliteStore {
    /// Open the warehouse read-only
    ///
    /// Opens one connection eagerly so a missing or unreadable database fails
    /// at startup rather than on the first request.
    pub fn open(db_path: impl AsRef<Path>, max_idle: usize) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = open_read_only(&db_path)?;

        log::info!("📥 SQLite warehouse opened: {}", db_path.display());

        Ok(Self {
            db_path,
            idle: Mutex::new(vec![conn]),
            max_idle: max_idle.max(1),
        })
    }

    pub fn idle_connections(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn checkout(&self) -> Result<Connection, StorageError> {
        let cached = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();

        match cached {
            Some(conn) => Ok(conn),
            None => open_read_only(&self.db_path),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

fn open_read_only(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )
    .map_err(|e| StorageError::Connection(format!("{}: {}", path.display(), e)))?;

    conn.pragma_update(None, "query_only", true)
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(conn)
}

fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &QueryParams) -> Result<(), StorageError> {
    for (name, value) in params.iter() {
        let key = format!(":{}", name);
        let idx = match stmt
            .parameter_index(&key)
            .map_err(|e| StorageError::Query(e.to_string()))?
        {
            Some(idx) => idx,
            None => continue,
        };

        let bound = match value {
            ParamValue::Integer(v) => stmt.raw_bind_parameter(idx, *v),
            ParamValue::TextList(list) => {
                let json = serde_json::to_string(list)
                    .map_err(|e| StorageError::Query(format!("{}: {}", key, e)))?;
                stmt.raw_bind_parameter(idx, json)
            }
        };

        bound.map_err(|e| StorageError::Query(format!("{}: {}", key, e)))?;
    }

    Ok(())
}

fn owned_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Blob(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn run_query(
    conn: &Connection,
    query: &str,
    params: &QueryParams,
    visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare(query)
        .map_err(|e| StorageError::Query(e.to_string()))?;

    bind_params(&mut stmt, params)?;

    let column_count = stmt.column_count();
    let mut rows = stmt.raw_query();

    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return Err(StorageError::Cursor(e.to_string())),
        };

        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            let value = row
                .get_ref(idx)
                .map_err(|e| StorageError::Cursor(e.to_string()))?;
            values.push(owned_value(value));
        }

        if visit(Row::new(values)).is_break() {
            break;
        }
    }

    Ok(())
}

impl QueryStore for SqliteStore {
    fn query(
        &self,
        query: &str,
        params: &QueryParams,
        visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
    ) -> Result<(), StorageError> {
        let conn = self.checkout()?;
        let result = run_query(&conn, query, params, visit);
        self.checkin(conn);
        result
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
