//! Persistence for [`Group`] records and their rosters.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::messages::messages_by_conversation;
use crate::models::Group;

impl Database {
    /// Write a group's metadata and replace its member and admin lists in a
    /// single transaction.
    pub fn upsert_group(&self, group: &Group) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO groups (id, name, avatar, creator, allow_members_to_add, invite_link, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 avatar = excluded.avatar,
                 allow_members_to_add = excluded.allow_members_to_add,
                 invite_link = excluded.invite_link",
            params![
                group.id,
                group.name,
                group.avatar,
                group.creator,
                group.allow_members_to_add as i32,
                group.invite_link,
                format_timestamp(&group.created),
            ],
        )?;

        tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1",
            params![group.id],
        )?;
        tx.execute(
            "DELETE FROM group_admins WHERE group_id = ?1",
            params![group.id],
        )?;

        for (position, user_id) in group.members.iter().enumerate() {
            tx.execute(
                "INSERT INTO group_members (group_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![group.id, user_id, position as i64],
            )?;
        }
        for (position, user_id) in group.admins.iter().enumerate() {
            tx.execute(
                "INSERT INTO group_admins (group_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![group.id, user_id, position as i64],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// All groups, oldest first, with rosters and messages attached.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn()?;
        let mut messages = messages_by_conversation(&conn)?;
        let mut members = roster(&conn, "group_members")?;
        let mut admins = roster(&conn, "group_admins")?;

        let mut stmt = conn.prepare(
            "SELECT id, name, avatar, creator, allow_members_to_add, invite_link, created_at
             FROM groups ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let allow: i32 = row.get(4)?;
            let created: String = row.get(6)?;
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
                avatar: row.get(2)?,
                creator: row.get(3)?,
                admins: Vec::new(),
                members: Vec::new(),
                allow_members_to_add: allow != 0,
                invite_link: row.get(5)?,
                messages: Vec::new(),
                created: parse_timestamp(6, &created)?,
            })
        })?;

        let mut groups = Vec::new();
        for row in rows {
            let mut group = row.map_err(StoreError::Sqlite)?;
            group.members = members.remove(&group.id).unwrap_or_default();
            group.admins = admins.remove(&group.id).unwrap_or_default();
            group.messages = messages.remove(&group.id).unwrap_or_default();
            groups.push(group);
        }
        Ok(groups)
    }
}

// `table` is one of two fixed names, never user input.
fn roster(conn: &Connection, table: &str) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT group_id, user_id FROM {table} ORDER BY group_id, position ASC"
    ))?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (group_id, user_id) = row?;
        map.entry(group_id).or_default().push(user_id);
    }
    Ok(map)
}
