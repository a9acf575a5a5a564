use rusqlite::params;

use murmur_shared::types::{GroupId, MessageId, UserId};

use crate::database::{invalid_col, opt_uuid_col, ts_col, ts_to_sql, uuid_col, Database};
use crate::error::Result;
use crate::models::{Message, MessageFilter, MessageTarget, SortOrder};

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, group_id, text, image, created_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let (receiver_id, group_id) = match message.target {
            MessageTarget::Direct(user) => (Some(user.to_string()), None),
            MessageTarget::Group(group) => (None, Some(group.to_string())),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender_id, receiver_id, group_id, text, image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.sender_id.to_string(),
                receiver_id,
                group_id,
                message.text,
                message.image,
                ts_to_sql(&message.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_messages(&self, filter: MessageFilter, order: SortOrder) -> Result<Vec<Message>> {
        self.query_messages(filter, order, None)
    }

    /// The newest message matching `filter`, if any.
    pub fn find_latest_message(&self, filter: MessageFilter) -> Result<Option<Message>> {
        Ok(self
            .query_messages(filter, SortOrder::Descending, Some(1))?
            .into_iter()
            .next())
    }

    fn query_messages(
        &self,
        filter: MessageFilter,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Message>> {
        let (predicate, args): (&str, Vec<String>) = match filter {
            MessageFilter::Conversation(a, b) => (
                "group_id IS NULL AND
                 ((sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1))",
                vec![a.to_string(), b.to_string()],
            ),
            MessageFilter::Group(group) => ("group_id = ?1", vec![group.to_string()]),
        };

        let mut sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {predicate} ORDER BY created_at {}, id {}",
            order.sql(),
            order.sql(),
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let receiver = opt_uuid_col(row, 2)?;
    let group = opt_uuid_col(row, 3)?;
    let target = match (receiver, group) {
        (Some(user), None) => MessageTarget::Direct(UserId(user)),
        (None, Some(group)) => MessageTarget::Group(GroupId(group)),
        _ => return Err(invalid_col(2, "message must have exactly one target")),
    };

    Ok(Message {
        id: MessageId(uuid_col(row, 0)?),
        sender_id: UserId(uuid_col(row, 1)?),
        target,
        text: row.get(4)?,
        image: row.get(5)?,
        created_at: ts_col(row, 6)?,
    })
}
