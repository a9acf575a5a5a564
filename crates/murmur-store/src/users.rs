//! CRUD operations for [`User`] records, including their friend set and
//! received friend requests.

use rusqlite::{params, Connection, OptionalExtension};

use murmur_shared::types::UserId;

use crate::database::{invalid_col, opt_ts_col, ts_col, ts_to_sql, uuid_col, Database};
use crate::error::{Result, StoreError};
use crate::models::{FriendRequest, RequestStatus, User};

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.find_user(id)?.ok_or(StoreError::NotFound)
    }

    pub fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let base = self
            .conn()
            .query_row(
                "SELECT id, username, email, profile_pic, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .optional()?;

        match base {
            Some(user) => Ok(Some(load_relations(self.conn(), user)?)),
            None => Ok(None),
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let id: Option<String> = self
            .conn()
            .query_row(
                "SELECT id FROM users WHERE email = ?1 COLLATE NOCASE",
                params![email],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => self.find_user(UserId::parse(&id)?),
            None => Ok(None),
        }
    }

    /// Fetch every user in `ids` that exists. Unknown ids are skipped and the
    /// result follows the order of `ids`.
    pub fn find_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_user(*id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Users whose username contains `query`, ignoring ASCII case, other than
    /// `exclude`. Ordered by username.
    pub fn search_users(&self, query: &str, exclude: UserId, limit: u32) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = self.conn().prepare(
            "SELECT id, username, email, profile_pic, created_at
             FROM users
             WHERE id != ?1 AND username LIKE ?2 ESCAPE '\\'
             ORDER BY username COLLATE NOCASE, id
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![exclude.to_string(), pattern, limit], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(load_relations(self.conn(), row?)?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert or fully replace a user, its friend set and its requests.
    pub fn save_user(&self, user: &User) -> Result<()> {
        self.save_users(std::slice::from_ref(user))
    }

    /// Save several users in one transaction. Either every user is written
    /// or none is, which keeps two-sided friendship edits consistent.
    pub fn save_users(&self, users: &[User]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        // Base rows first so friendship foreign keys between the users resolve.
        for user in users {
            upsert_user_row(&tx, user)?;
        }
        for user in users {
            replace_relations(&tx, user)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Make `%`, `_` and backslash in user input match literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn upsert_user_row(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, profile_pic, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             username = excluded.username,
             email = excluded.email,
             profile_pic = excluded.profile_pic",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.profile_pic,
            ts_to_sql(&user.created_at),
        ],
    )?;
    Ok(())
}

fn replace_relations(conn: &Connection, user: &User) -> Result<()> {
    let id = user.id.to_string();

    conn.execute("DELETE FROM friendships WHERE user_id = ?1", params![id])?;
    for friend in &user.friends {
        conn.execute(
            "INSERT INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
            params![id, friend.to_string()],
        )?;
    }

    conn.execute(
        "DELETE FROM friend_requests WHERE recipient_id = ?1",
        params![id],
    )?;
    for (position, request) in user.friend_requests.iter().enumerate() {
        conn.execute(
            "INSERT INTO friend_requests
                 (recipient_id, from_id, status, created_at, declined_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                request.from.to_string(),
                request.status.as_str(),
                ts_to_sql(&request.created_at),
                request.declined_at.as_ref().map(ts_to_sql),
                position as i64,
            ],
        )?;
    }
    Ok(())
}

fn load_relations(conn: &Connection, mut user: User) -> Result<User> {
    let id = user.id.to_string();

    let mut stmt = conn.prepare(
        "SELECT friend_id FROM friendships WHERE user_id = ?1 ORDER BY friend_id",
    )?;
    let rows = stmt.query_map(params![id], |row| uuid_col(row, 0))?;
    for row in rows {
        user.friends.insert(UserId(row?));
    }

    let mut stmt = conn.prepare(
        "SELECT from_id, status, created_at, declined_at
         FROM friend_requests
         WHERE recipient_id = ?1
         ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![id], row_to_request)?;
    for row in rows {
        user.friend_requests.push(row?);
    }

    Ok(user)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(uuid_col(row, 0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        profile_pic: row.get(3)?,
        friends: Default::default(),
        friend_requests: Vec::new(),
        created_at: ts_col(row, 4)?,
    })
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let status: String = row.get(1)?;
    let status =
        RequestStatus::from_str_opt(&status).ok_or_else(|| invalid_col(1, "unknown request status"))?;

    Ok(FriendRequest {
        from: UserId(uuid_col(row, 0)?),
        status,
        created_at: ts_col(row, 2)?,
        declined_at: opt_ts_col(row, 3)?,
    })
}
