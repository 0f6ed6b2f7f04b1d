//! Shared notes, one document per call session.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use skillswap_shared::SessionId;

use crate::database::Database;
use crate::error::{not_found_on_no_rows, Result};
use crate::models::Note;
use crate::sessions::{parse_session_id, parse_ts, parse_uuid};

impl Database {
    /// Create the session's note on first write, overwrite it afterwards.
    ///
    /// The first write also stores the note reference on the session.
    pub fn upsert_session_notes(&self, session_id: SessionId, content: &str) -> Result<Note> {
        let tx = self.conn().unchecked_transaction()?;
        let session = self.get_session(session_id)?;
        let now = Utc::now().to_rfc3339();

        let note_id = match session.notes_id {
            Some(id) => {
                tx.execute(
                    "UPDATE notes SET content = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id.to_string(), content, now],
                )?;
                id
            }
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO notes (id, session_id, content, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![id.to_string(), session_id.to_string(), content, now],
                )?;
                self.set_notes_ref(session_id, id)?;
                id
            }
        };

        tx.commit()?;
        self.get_note(note_id)
    }

    pub fn get_note(&self, id: Uuid) -> Result<Note> {
        self.conn()
            .query_row(
                "SELECT id, session_id, content, created_at, updated_at FROM notes WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(Note {
                        id: parse_uuid(row, 0)?,
                        session_id: parse_session_id(row, 1)?,
                        content: row.get(2)?,
                        created_at: parse_ts(row, 3)?,
                        updated_at: parse_ts(row, 4)?,
                    })
                },
            )
            .map_err(not_found_on_no_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use skillswap_shared::UserId;

    #[test]
    fn test_first_write_creates_and_links_note() {
        let db = Database::open_in_memory().unwrap();
        let session = db
            .create_session(&UserId::new("alice").unwrap(), &UserId::new("bob").unwrap())
            .unwrap();

        let note = db.upsert_session_notes(session.id, "agenda: rust").unwrap();
        assert_eq!(note.content, "agenda: rust");
        assert_eq!(note.session_id, session.id);
        assert_eq!(db.get_session(session.id).unwrap().notes_id, Some(note.id));
    }

    #[test]
    fn test_second_write_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        let session = db
            .create_session(&UserId::new("alice").unwrap(), &UserId::new("bob").unwrap())
            .unwrap();

        let first = db.upsert_session_notes(session.id, "v1").unwrap();
        let second = db.upsert_session_notes(session.id, "").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.content, "");
    }

    #[test]
    fn test_notes_for_unknown_session() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.upsert_session_notes(SessionId::new(), "x"),
            Err(StoreError::NotFound)
        ));
    }
}
