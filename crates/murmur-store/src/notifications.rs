//! CRUD operations for [`Notification`] records.
//!
//! Reads, updates and deletes all take a [`NotificationFilter`]; the filter
//! is compiled to a parameterised `WHERE` clause.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use murmur_shared::types::{NotificationId, NotificationKind, UserId};

use crate::database::{invalid_col, json_col, opt_uuid_col, ts_col, ts_to_sql, uuid_col, Database};
use crate::error::Result;
use crate::models::{Notification, NotificationFilter, NotificationPatch, SortOrder};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, sender_id, kind, content, is_read, related_id, metadata, created_at";

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        insert(self.conn(), notification)
    }

    /// Insert a batch in one transaction: all rows land or none do.
    pub fn insert_notifications(&self, notifications: &[Notification]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        for notification in notifications {
            insert(&tx, notification)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn find_notifications(
        &self,
        filter: &NotificationFilter,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>> {
        let (predicate, mut args) = where_clause(filter);
        let mut sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE {predicate}
             ORDER BY created_at {}, id {}",
            order.sql(),
            order.sql(),
        );
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    pub fn count_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        let (predicate, args) = where_clause(filter);
        let count: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM notifications WHERE {predicate}"),
            params_from_iter(args),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Apply `patch` to every matching row. Returns how many rows actually
    /// changed; rows already in the target state are not counted.
    pub fn update_notifications(
        &self,
        filter: &NotificationFilter,
        patch: NotificationPatch,
    ) -> Result<u64> {
        let (predicate, mut args) = where_clause(filter);
        let mut all_args = vec![Value::Integer(patch.is_read as i64)];
        all_args.append(&mut args);
        all_args.push(Value::Integer(patch.is_read as i64));

        let affected = self.conn().execute(
            &format!(
                "UPDATE notifications SET is_read = ? WHERE {predicate} AND is_read <> ?"
            ),
            params_from_iter(all_args),
        )?;
        Ok(affected as u64)
    }

    pub fn delete_notification(&self, id: NotificationId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_notifications(&self, filter: &NotificationFilter) -> Result<u64> {
        let (predicate, args) = where_clause(filter);
        let affected = self.conn().execute(
            &format!("DELETE FROM notifications WHERE {predicate}"),
            params_from_iter(args),
        )?;
        Ok(affected as u64)
    }
}

fn insert(conn: &Connection, n: &Notification) -> Result<()> {
    let metadata = serde_json::to_string(&n.metadata)?;
    conn.execute(
        "INSERT INTO notifications
             (id, recipient_id, sender_id, kind, content, is_read, related_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            n.id.to_string(),
            n.recipient_id.to_string(),
            n.sender_id.to_string(),
            n.kind.as_str(),
            n.content,
            n.is_read,
            n.related_id.map(|id| id.to_string()),
            metadata,
            ts_to_sql(&n.created_at),
        ],
    )?;
    Ok(())
}

/// Compile a filter into positional `?` placeholders. An empty id list
/// matches nothing.
fn where_clause(filter: &NotificationFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args = Vec::new();

    if let Some(recipient) = filter.recipient {
        clauses.push("recipient_id = ?".into());
        args.push(Value::Text(recipient.to_string()));
    }
    if let Some(sender) = filter.sender {
        clauses.push("sender_id = ?".into());
        args.push(Value::Text(sender.to_string()));
    }
    if let Some(kind) = filter.kind {
        clauses.push("kind = ?".into());
        args.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(is_read) = filter.is_read {
        clauses.push("is_read = ?".into());
        args.push(Value::Integer(is_read as i64));
    }
    if let Some(ids) = &filter.ids {
        if ids.is_empty() {
            clauses.push("0".into());
        } else {
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("id IN ({placeholders})"));
            args.extend(ids.iter().map(|id| Value::Text(id.to_string())));
        }
    }

    if clauses.is_empty() {
        ("1".to_string(), args)
    } else {
        (clauses.join(" AND "), args)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(3)?;
    let kind = NotificationKind::from_str_opt(&kind)
        .ok_or_else(|| invalid_col(3, "unknown notification kind"))?;

    Ok(Notification {
        id: NotificationId(uuid_col(row, 0)?),
        recipient_id: UserId(uuid_col(row, 1)?),
        sender_id: UserId(uuid_col(row, 2)?),
        kind,
        content: row.get(4)?,
        is_read: row.get(5)?,
        related_id: opt_uuid_col(row, 6)?,
        metadata: json_col(row, 7)?,
        created_at: ts_col(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use murmur_shared::types::NotificationMetadata;

    struct Fixture {
        db: Database,
        ada: User,
        bob: User,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let ada = User::new("ada", "ada@example.com");
        let bob = User::new("bob", "bob@example.com");
        db.save_users(&[ada.clone(), bob.clone()]).unwrap();
        Fixture { db, ada, bob }
    }

    fn note(to: &User, from: &User, kind: NotificationKind) -> Notification {
        Notification::new(to.id, from.id, kind, format!("{} did a thing", from.username))
    }

    #[test]
    fn test_round_trip_with_metadata() {
        let f = fixture();
        let n = note(&f.ada, &f.bob, NotificationKind::Message)
            .with_related(uuid::Uuid::new_v4())
            .with_metadata(NotificationMetadata {
                message_preview: Some("hello".into()),
                has_image: Some(false),
                ..Default::default()
            });
        f.db.insert_notification(&n).unwrap();

        let found = f
            .db
            .find_notifications(&NotificationFilter::for_recipient(f.ada.id), SortOrder::Descending, None)
            .unwrap();
        assert_eq!(found, vec![n]);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let f = fixture();
        let a = note(&f.ada, &f.bob, NotificationKind::Message);
        let b = note(&f.ada, &f.bob, NotificationKind::FriendRequest);
        f.db.insert_notifications(&[a.clone(), b.clone()]).unwrap();

        let filter = NotificationFilter::for_recipient(f.ada.id).ids([a.id, b.id]);
        let patch = NotificationPatch { is_read: true };
        assert_eq!(f.db.update_notifications(&filter, patch).unwrap(), 2);
        assert_eq!(f.db.update_notifications(&filter, patch).unwrap(), 0);

        let unread = NotificationFilter::for_recipient(f.ada.id).is_read(false);
        assert_eq!(f.db.count_notifications(&unread).unwrap(), 0);
    }

    #[test]
    fn test_filter_scopes_to_recipient_and_empty_ids_match_nothing() {
        let f = fixture();
        let mine = note(&f.ada, &f.bob, NotificationKind::Message);
        let theirs = note(&f.bob, &f.ada, NotificationKind::Message);
        f.db.insert_notifications(&[mine, theirs.clone()]).unwrap();

        // Ada cannot touch Bob's notification even by id.
        let filter = NotificationFilter::for_recipient(f.ada.id).ids([theirs.id]);
        assert_eq!(
            f.db.update_notifications(&filter, NotificationPatch { is_read: true }).unwrap(),
            0
        );

        let none = NotificationFilter::for_recipient(f.ada.id).ids([]);
        assert_eq!(f.db.count_notifications(&none).unwrap(), 0);
    }

    #[test]
    fn test_limit_and_delete_by_filter() {
        let f = fixture();
        let batch: Vec<_> = (0..5)
            .map(|_| note(&f.ada, &f.bob, NotificationKind::FriendRequest))
            .collect();
        f.db.insert_notifications(&batch).unwrap();

        let page = f
            .db
            .find_notifications(&NotificationFilter::for_recipient(f.ada.id), SortOrder::Descending, Some(3))
            .unwrap();
        assert_eq!(page.len(), 3);

        let filter = NotificationFilter::for_recipient(f.ada.id)
            .sender(f.bob.id)
            .kind(NotificationKind::FriendRequest);
        assert_eq!(f.db.delete_notifications(&filter).unwrap(), 5);
        assert!(!f.db.delete_notification(batch[0].id).unwrap());
    }

    #[test]
    fn test_failed_batch_inserts_nothing() {
        let f = fixture();
        let ok = note(&f.ada, &f.bob, NotificationKind::Message);
        let dup = ok.clone();
        assert!(f.db.insert_notifications(&[ok, dup]).is_err());
        assert_eq!(
            f.db.count_notifications(&NotificationFilter::for_recipient(f.ada.id)).unwrap(),
            0
        );
    }
}
