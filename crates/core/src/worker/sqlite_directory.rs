//! SQLite-backed worker directory.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::ticket::QueueError;
use crate::worker::{NewWorker, Worker, WorkerDirectory};

/// Shared database file; see the ticket store.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteWorkerDirectory {
    conn: Mutex<Connection>,
}

impl SqliteWorkerDirectory {
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(QueueError::store)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(QueueError::store)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(QueueError::store)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL,
                counter_number INTEGER NOT NULL UNIQUE
            );
            "#,
        )
        .map_err(QueueError::store)?;

        Ok(())
    }

    fn row_to_worker(row: &rusqlite::Row) -> rusqlite::Result<Worker> {
        Ok(Worker {
            id: row.get(0)?,
            display_name: row.get(1)?,
            counter_number: row.get(2)?,
        })
    }
}

impl WorkerDirectory for SqliteWorkerDirectory {
    fn create(&self, worker: NewWorker) -> Result<Worker, QueueError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.execute(
            "INSERT INTO workers (display_name, counter_number) VALUES (?, ?)",
            params![worker.display_name, worker.counter_number],
        );

        match result {
            Ok(_) => Ok(Worker {
                id: conn.last_insert_rowid(),
                display_name: worker.display_name,
                counter_number: worker.counter_number,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(QueueError::Duplicate(format!(
                    "counter {} is already staffed",
                    worker.counter_number
                )))
            }
            Err(e) => Err(QueueError::store(e)),
        }
    }

    fn resolve(&self, id: i64) -> Result<Option<Worker>, QueueError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, display_name, counter_number FROM workers WHERE id = ?",
            params![id],
            Self::row_to_worker,
        )
        .optional()
        .map_err(QueueError::store)
    }

    fn list(&self) -> Result<Vec<Worker>, QueueError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT id, display_name, counter_number FROM workers ORDER BY counter_number ASC")
            .map_err(QueueError::store)?;

        let rows = stmt
            .query_map([], Self::row_to_worker)
            .map_err(QueueError::store)?;

        let mut workers = Vec::new();
        for row_result in rows {
            workers.push(row_result.map_err(QueueError::store)?);
        }

        Ok(workers)
    }
}
