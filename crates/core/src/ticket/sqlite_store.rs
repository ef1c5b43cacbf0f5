//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{NewTicket, QueueError, Ticket, TicketFilter, TicketStatus, TicketStore};

const TICKET_COLUMNS: &str = "id, contact, worker_id, status, created_at, updated_at";

/// Other stores hold their own connection to the same database file;
/// waiting out their write locks beats surfacing SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(QueueError::store)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(QueueError::store)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact TEXT NOT NULL,
                worker_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_worker_status ON tickets(worker_id, status);
            CREATE INDEX IF NOT EXISTS idx_tickets_contact ON tickets(contact);
            "#,
        )
        .map_err(QueueError::store)?;

        Ok(())
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: i64 = row.get(0)?;
        let contact: String = row.get(1)?;
        let worker_id: i64 = row.get(2)?;
        let status_str: String = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let updated_at_str: String = row.get(5)?;

        // An unknown status string can only come from a foreign writer; the
        // closed enum never persists one.
        let status = TicketStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unrecognized ticket status: {status_str}").into(),
            )
        })?;

        let created_at = parse_timestamp(&created_at_str, 4)?;
        let updated_at = parse_timestamp(&updated_at_str, 5)?;

        Ok(Ticket {
            id,
            contact,
            worker_id,
            status,
            created_at,
            updated_at,
        })
    }

    fn get_locked(conn: &Connection, id: i64) -> Result<Option<Ticket>, QueueError> {
        conn.query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(QueueError::store)
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(worker_id) = filter.worker_id {
            conditions.push("worker_id = ?");
            params.push(Box::new(worker_id));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

fn parse_timestamp(s: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

impl TicketStore for SqliteTicketStore {
    fn insert(&self, ticket: NewTicket) -> Result<Ticket, QueueError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        conn.execute(
            "INSERT INTO tickets (contact, worker_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                ticket.contact,
                ticket.worker_id,
                TicketStatus::Waiting.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(QueueError::store)?;

        let id = conn.last_insert_rowid();

        Ok(Ticket {
            id,
            contact: ticket.contact,
            worker_id: ticket.worker_id,
            status: TicketStatus::Waiting,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: i64) -> Result<Option<Ticket>, QueueError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn find(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, QueueError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut all_params) = Self::build_where_clause(filter);

        let limit_clause = if filter.limit > 0 {
            all_params.push(Box::new(filter.limit));
            " LIMIT ?"
        } else {
            ""
        };

        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets {where_clause} ORDER BY created_at ASC, id ASC{limit_clause}"
        );

        let mut stmt = conn.prepare(&sql).map_err(QueueError::store)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(QueueError::store)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result.map_err(QueueError::store)?);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, QueueError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {where_clause}");
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(QueueError::store)
    }

    fn oldest_waiting(&self, worker_id: i64) -> Result<Option<Ticket>, QueueError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE worker_id = ? AND status = ? \
                 ORDER BY created_at ASC, id ASC LIMIT 1"
            ),
            params![worker_id, TicketStatus::Waiting.as_str()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(QueueError::store)
    }

    fn processing_for(&self, worker_id: i64) -> Result<Option<Ticket>, QueueError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE worker_id = ? AND status = ? LIMIT 1"),
            params![worker_id, TicketStatus::Processing.as_str()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(QueueError::store)
    }

    fn update_status(
        &self,
        id: i64,
        expected: Option<TicketStatus>,
        new_status: TicketStatus,
    ) -> Result<Ticket, QueueError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let changed = match expected {
            Some(expected) => conn
                .execute(
                    "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                    params![new_status.as_str(), now.to_rfc3339(), id, expected.as_str()],
                )
                .map_err(QueueError::store)?,
            None => conn
                .execute(
                    "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
                    params![new_status.as_str(), now.to_rfc3339(), id],
                )
                .map_err(QueueError::store)?,
        };

        if changed == 0 {
            // Distinguish a missing ticket from a lost compare-and-swap.
            return match (Self::get_locked(&conn, id)?, expected) {
                (None, _) => Err(QueueError::NotFound(format!("ticket {id}"))),
                (Some(_), Some(expected)) => Err(QueueError::Conflict {
                    ticket_id: id,
                    expected,
                }),
                (Some(_), None) => Err(QueueError::store("status update affected no rows")),
            };
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| QueueError::NotFound(format!("ticket {id}")))
    }

    fn update_worker(&self, id: i64, worker_id: i64) -> Result<Ticket, QueueError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let changed = conn
            .execute(
                "UPDATE tickets SET worker_id = ?, updated_at = ? WHERE id = ?",
                params![worker_id, now.to_rfc3339(), id],
            )
            .map_err(QueueError::store)?;

        if changed == 0 {
            return Err(QueueError::NotFound(format!("ticket {id}")));
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| QueueError::NotFound(format!("ticket {id}")))
    }

    fn find_by_contact(&self, contact: &str) -> Result<Option<Ticket>, QueueError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE contact = ? ORDER BY id DESC LIMIT 1"
            ),
            params![contact],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(QueueError::store)
    }

    fn delete(&self, id: i64) -> Result<Ticket, QueueError> {
        let conn = self.conn.lock().unwrap();

        let ticket = Self::get_locked(&conn, id)?
            .ok_or_else(|| QueueError::NotFound(format!("ticket {id}")))?;

        conn.execute("DELETE FROM tickets WHERE id = ?", params![id])
            .map_err(QueueError::store)?;

        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn new_ticket(contact: &str, worker_id: i64) -> NewTicket {
        NewTicket {
            contact: contact.to_string(),
            worker_id,
        }
    }

    #[test]
    fn test_insert_assigns_monotonic_ids_and_waiting_status() {
        let store = create_test_store();

        let t1 = store.insert(new_ticket("a@x.com", 1)).unwrap();
        let t2 = store.insert(new_ticket("b@x.com", 1)).unwrap();

        assert!(t2.id > t1.id);
        assert_eq!(t1.status, TicketStatus::Waiting);
        assert_eq!(t2.status, TicketStatus::Waiting);
    }

    #[test]
    fn test_get_ticket() {
        let store = create_test_store();
        let created = store.insert(new_ticket("a@x.com", 1)).unwrap();

        let fetched = store.get(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);

        assert!(store.get(9999).unwrap().is_none());
    }

    #[test]
    fn test_oldest_waiting_follows_fifo_order() {
        let store = create_test_store();

        let t1 = store.insert(new_ticket("first@x.com", 1)).unwrap();
        store.insert(new_ticket("second@x.com", 1)).unwrap();

        let oldest = store.oldest_waiting(1).unwrap().unwrap();
        assert_eq!(oldest.id, t1.id);
    }

    #[test]
    fn test_oldest_waiting_skips_non_waiting() {
        let store = create_test_store();

        let t1 = store.insert(new_ticket("a@x.com", 1)).unwrap();
        let t2 = store.insert(new_ticket("b@x.com", 1)).unwrap();
        store
            .update_status(t1.id, Some(TicketStatus::Waiting), TicketStatus::Processing)
            .unwrap();

        let oldest = store.oldest_waiting(1).unwrap().unwrap();
        assert_eq!(oldest.id, t2.id);
    }

    #[test]
    fn test_oldest_waiting_is_scoped_to_worker() {
        let store = create_test_store();

        store.insert(new_ticket("other@x.com", 2)).unwrap();
        assert!(store.oldest_waiting(1).unwrap().is_none());
    }

    #[test]
    fn test_processing_for() {
        let store = create_test_store();

        let t1 = store.insert(new_ticket("a@x.com", 1)).unwrap();
        assert!(store.processing_for(1).unwrap().is_none());

        store
            .update_status(t1.id, Some(TicketStatus::Waiting), TicketStatus::Processing)
            .unwrap();
        let processing = store.processing_for(1).unwrap().unwrap();
        assert_eq!(processing.id, t1.id);
    }

    #[test]
    fn test_update_status_cas_guard_rejects_stale_expectation() {
        let store = create_test_store();
        let ticket = store.insert(new_ticket("a@x.com", 1)).unwrap();

        store
            .update_status(ticket.id, Some(TicketStatus::Waiting), TicketStatus::Cancelled)
            .unwrap();

        // Ticket is no longer Waiting; the guarded promotion must not apply.
        let result = store.update_status(
            ticket.id,
            Some(TicketStatus::Waiting),
            TicketStatus::Processing,
        );
        assert!(matches!(result, Err(QueueError::Conflict { .. })));

        let current = store.get(ticket.id).unwrap().unwrap();
        assert_eq!(current.status, TicketStatus::Cancelled);
    }

    #[test]
    fn test_update_status_missing_ticket_is_not_found() {
        let store = create_test_store();

        let result = store.update_status(42, Some(TicketStatus::Waiting), TicketStatus::Cancelled);
        assert!(matches!(result, Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_update_status_bumps_updated_at() {
        let store = create_test_store();
        let ticket = store.insert(new_ticket("a@x.com", 1)).unwrap();

        let updated = store
            .update_status(ticket.id, Some(TicketStatus::Waiting), TicketStatus::Finished)
            .unwrap();
        assert!(updated.updated_at >= ticket.updated_at);
        assert_eq!(updated.created_at, ticket.created_at);
    }

    #[test]
    fn test_find_with_worker_and_status_filter() {
        let store = create_test_store();

        store.insert(new_ticket("a@x.com", 1)).unwrap();
        let t2 = store.insert(new_ticket("b@x.com", 1)).unwrap();
        store.insert(new_ticket("c@x.com", 2)).unwrap();

        store
            .update_status(t2.id, Some(TicketStatus::Waiting), TicketStatus::Cancelled)
            .unwrap();

        let waiting = store
            .find(&TicketFilter::new().with_worker(1).with_status(TicketStatus::Waiting))
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].contact, "a@x.com");

        let all_for_worker = store.find(&TicketFilter::new().with_worker(1)).unwrap();
        assert_eq!(all_for_worker.len(), 2);
    }

    #[test]
    fn test_count_waiting() {
        let store = create_test_store();

        for i in 0..3 {
            store.insert(new_ticket(&format!("u{i}@x.com"), 1)).unwrap();
        }
        store.insert(new_ticket("other@x.com", 2)).unwrap();

        let count = store
            .count(&TicketFilter::new().with_worker(1).with_status(TicketStatus::Waiting))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_find_by_contact_returns_newest() {
        let store = create_test_store();

        store.insert(new_ticket("repeat@x.com", 1)).unwrap();
        let newer = store.insert(new_ticket("repeat@x.com", 2)).unwrap();

        let found = store.find_by_contact("repeat@x.com").unwrap().unwrap();
        assert_eq!(found.id, newer.id);

        assert!(store.find_by_contact("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn test_update_worker() {
        let store = create_test_store();
        let ticket = store.insert(new_ticket("a@x.com", 1)).unwrap();

        let moved = store.update_worker(ticket.id, 5).unwrap();
        assert_eq!(moved.worker_id, 5);
        assert_eq!(moved.status, TicketStatus::Waiting);

        let result = store.update_worker(9999, 5);
        assert!(matches!(result, Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_delete_returns_ticket() {
        let store = create_test_store();
        let ticket = store.insert(new_ticket("a@x.com", 1)).unwrap();

        let deleted = store.delete(ticket.id).unwrap();
        assert_eq!(deleted.id, ticket.id);
        assert!(store.get(ticket.id).unwrap().is_none());

        let result = store.delete(ticket.id);
        assert!(matches!(result, Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tickets.db");

        let store = SqliteTicketStore::new(&db_path).unwrap();
        let ticket = store.insert(new_ticket("a@x.com", 1)).unwrap();

        assert!(db_path.exists());
        assert!(store.get(ticket.id).unwrap().is_some());
    }

    #[test]
    fn test_file_based_store_waits_for_concurrent_writers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tickets.db");
        let store = SqliteTicketStore::new(&db_path).unwrap();

        let conn = store.conn.lock().unwrap();
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, BUSY_TIMEOUT.as_millis() as i64);
    }
}
