//! CRUD operations for [`Group`] records and their membership.

use rusqlite::{params, Connection, OptionalExtension};

use murmur_shared::types::{GroupId, UserId};

use crate::database::{ts_col, ts_to_sql, uuid_col, Database};
use crate::error::Result;
use crate::models::Group;

impl Database {
    pub fn find_group(&self, id: GroupId) -> Result<Option<Group>> {
        let base = self
            .conn()
            .query_row(
                "SELECT id, name, profile_pic, created_by, created_at
                 FROM chat_groups WHERE id = ?1",
                params![id.to_string()],
                row_to_group,
            )
            .optional()?;

        match base {
            Some(group) => Ok(Some(load_members(self.conn(), group)?)),
            None => Ok(None),
        }
    }

    /// All groups `user` belongs to, oldest first.
    pub fn find_groups_by_member(&self, user: UserId) -> Result<Vec<Group>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.profile_pic, g.created_by, g.created_at
             FROM chat_groups g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id = ?1
             ORDER BY g.created_at ASC",
        )?;
        let rows = stmt.query_map(params![user.to_string()], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(load_members(self.conn(), row?)?);
        }
        Ok(groups)
    }

    /// Insert or fully replace a group and its member/admin sets.
    pub fn save_group(&self, group: &Group) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        let id = group.id.to_string();

        tx.execute(
            "INSERT INTO chat_groups (id, name, profile_pic, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 profile_pic = excluded.profile_pic",
            params![
                id,
                group.name,
                group.profile_pic,
                group.created_by.to_string(),
                ts_to_sql(&group.created_at),
            ],
        )?;

        tx.execute("DELETE FROM group_members WHERE group_id = ?1", params![id])?;
        for member in &group.members {
            tx.execute(
                "INSERT INTO group_members (group_id, user_id, is_admin) VALUES (?1, ?2, ?3)",
                params![id, member.to_string(), group.is_admin(member)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_members(conn: &Connection, mut group: Group) -> Result<Group> {
    let mut stmt = conn.prepare(
        "SELECT user_id, is_admin FROM group_members WHERE group_id = ?1 ORDER BY user_id",
    )?;
    let rows = stmt.query_map(params![group.id.to_string()], |row| {
        Ok((UserId(uuid_col(row, 0)?), row.get::<_, bool>(1)?))
    })?;

    for row in rows {
        let (user, is_admin) = row?;
        group.members.insert(user);
        if is_admin {
            group.admins.insert(user);
        }
    }
    Ok(group)
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId(uuid_col(row, 0)?),
        name: row.get(1)?,
        profile_pic: row.get(2)?,
        created_by: UserId(uuid_col(row, 3)?),
        members: Default::default(),
        admins: Default::default(),
        created_at: ts_col(row, 4)?,
    })
}
