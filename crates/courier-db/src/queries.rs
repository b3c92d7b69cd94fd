use crate::Database;
use crate::models::{MessageRow, PersonalRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
        is_superuser: bool,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, role, is_superuser) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![username, password_hash, role, is_superuser],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, role, is_active, is_superuser, created_at FROM users WHERE username = ?1", rusqlite::params![username])
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, role, is_active, is_superuser, created_at FROM users WHERE id = ?1", rusqlite::params![id])
        })
    }

    pub fn update_password(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                rusqlite::params![user_id, password_hash],
            )?;
            Ok(affected > 0)
        })
    }

    // -- Personal data --

    pub fn create_personal(&self, user_id: i64, phone: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO personal (user_id, phone, email) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, phone, email],
            )?;
            Ok(())
        })
    }

    pub fn get_personal(&self, user_id: i64) -> Result<Option<PersonalRow>> {
        self.with_conn(|conn| query_personal(conn, user_id))
    }

    /// Partial update: only the provided fields change; `modified_at` is
    /// stamped either way.
    pub fn update_personal(
        &self,
        user_id: i64,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<PersonalRow>> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE personal
                 SET phone = COALESCE(?2, phone),
                     email = COALESCE(?3, email),
                     modified_at = datetime('now')
                 WHERE user_id = ?1",
                rusqlite::params![user_id, phone, email],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            query_personal(conn, user_id)
        })
    }

    // -- Messages --

    /// Insert a message and return the stored row with its server-assigned
    /// id and timestamp.
    pub fn create_message(
        &self,
        sender: i64,
        receiver: i64,
        text: Option<&str>,
        photo: Option<&str>,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender, receiver, text, photo) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender, receiver, text, photo],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("inserted message {} not found", id))
        })
    }

    /// Mutate the text of an existing message. Returns `None` when no row
    /// has the given id. A photo message becomes a text message, keeping
    /// the exactly-one column invariant intact.
    pub fn update_message(&self, id: i64, text: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages
                 SET text = ?2, photo = NULL, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, text],
            )?;
            if affected == 0 {
                return Ok(None);
            }
            query_message(conn, id)
        })
    }

    /// Returns whether a row was actually removed.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM messages WHERE id = ?1", rusqlite::params![id])?;
            Ok(affected > 0)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Conversation between two subjects in either direction, newest first.
    pub fn list_messages(&self, a: i64, b: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender, receiver, text, photo, created_at, updated_at
                 FROM messages
                 WHERE (sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1)
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![a, b], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt
        .query_row(params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                role: row.get(3)?,
                is_active: row.get(4)?,
                is_superuser: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_personal(conn: &Connection, user_id: i64) -> Result<Option<PersonalRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, phone, email, created_at, modified_at FROM personal WHERE user_id = ?1",
    )?;
    let row = stmt
        .query_row([user_id], |row| {
            Ok(PersonalRow {
                user_id: row.get(0)?,
                phone: row.get(1)?,
                email: row.get(2)?,
                created_at: row.get(3)?,
                modified_at: row.get(4)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, receiver, text, photo, created_at, updated_at
         FROM messages WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], message_from_row).optional()?;
    Ok(row)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender: row.get(1)?,
        receiver: row.get(2)?,
        text: row.get(3)?,
        photo: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn db_with_two_users() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "hash-a", "user", false).unwrap();
        db.create_user("bob", "hash-b", "user", false).unwrap();
        db
    }

    #[test]
    fn user_roundtrip_and_unique_username() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("alice", "hash", "admin", true).unwrap();
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, "admin");
        assert!(user.is_superuser);
        assert!(user.is_active);

        assert!(db.create_user("alice", "other", "user", false).is_err());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn personal_partial_update() {
        let db = db_with_two_users();
        db.create_personal(1, "+79005001010", "a@example.com").unwrap();

        let updated = db
            .update_personal(1, None, Some("new@example.com"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone, "+79005001010");
        assert_eq!(updated.email, "new@example.com");
        assert!(updated.modified_at.is_some());

        assert!(db.update_personal(42, Some("+10000000000"), None).unwrap().is_none());
    }

    #[test]
    fn message_lifecycle() {
        let db = db_with_two_users();
        let row = db.create_message(1, 2, Some("hi"), None).unwrap();
        assert_eq!(row.sender, 1);
        assert_eq!(row.receiver, 2);
        assert_eq!(row.text.as_deref(), Some("hi"));
        assert!(row.photo.is_none());
        assert!(!row.created_at.is_empty());

        let updated = db.update_message(row.id, "edited").unwrap().unwrap();
        assert_eq!(updated.text.as_deref(), Some("edited"));
        assert!(updated.updated_at.is_some());

        assert!(db.update_message(9999, "nope").unwrap().is_none());

        assert!(db.delete_message(row.id).unwrap());
        assert!(!db.delete_message(row.id).unwrap());
        assert!(db.get_message(row.id).unwrap().is_none());
    }

    #[test]
    fn exactly_one_of_text_photo_is_enforced() {
        let db = db_with_two_users();
        assert!(db.create_message(1, 2, Some("hi"), Some("pic.png")).is_err());
        assert!(db.create_message(1, 2, None, None).is_err());
        assert!(db.create_message(1, 2, None, Some("pic.png")).is_ok());
    }

    #[test]
    fn conversation_is_newest_first_both_directions() {
        let db = db_with_two_users();
        let m1 = db.create_message(1, 2, Some("first"), None).unwrap();
        let m2 = db.create_message(2, 1, Some("second"), None).unwrap();
        let m3 = db.create_message(1, 2, Some("third"), None).unwrap();
        // Unrelated pair must not leak in.
        db.create_user("carol", "hash-c", "user", false).unwrap();
        db.create_message(1, 3, Some("elsewhere"), None).unwrap();

        let history = db.list_messages(1, 2).unwrap();
        let ids: Vec<i64> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m3.id, m2.id, m1.id]);
    }
}
