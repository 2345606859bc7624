//! Persistence for the post feed.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::{Result, StoreError};
use crate::models::{Comment, Post};

impl Database {
    /// Write a post's own fields and replace its likes in one transaction.
    /// Comments are appended separately and are not touched.
    pub fn upsert_post(&self, post: &Post) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO posts (id, user_id, text, image, timestamp, edited)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 text = excluded.text,
                 image = excluded.image,
                 edited = excluded.edited",
            params![
                post.id,
                post.user_id,
                post.text,
                post.image,
                format_timestamp(&post.timestamp),
                post.edited.as_ref().map(format_timestamp),
            ],
        )?;

        tx.execute("DELETE FROM post_likes WHERE post_id = ?1", params![post.id])?;
        for (position, user_id) in post.likes.iter().enumerate() {
            tx.execute(
                "INSERT INTO post_likes (post_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![post.id, user_id, position as i64],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Removes the post together with its likes and comments.
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        let affected = self
            .conn()?
            .execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn append_comment(&self, post_id: &str, comment: &Comment) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO post_comments (id, post_id, user_id, user_name, user_avatar, text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.id,
                post_id,
                comment.user_id,
                comment.user_name,
                comment.user_avatar,
                comment.text,
                format_timestamp(&comment.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Every post in creation order, with likes and comments attached.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let conn = self.conn()?;
        let mut likes = likes_by_post(&conn)?;
        let mut comments = comments_by_post(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, text, image, timestamp, edited FROM posts ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let timestamp: String = row.get(4)?;
            let edited: Option<String> = row.get(5)?;
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                text: row.get(2)?,
                image: row.get(3)?,
                timestamp: parse_timestamp(4, &timestamp)?,
                edited: edited.map(|s| parse_timestamp(5, &s)).transpose()?,
                likes: Vec::new(),
                comments: Vec::new(),
            })
        })?;

        let mut posts = Vec::new();
        for row in rows {
            let mut post = row.map_err(StoreError::Sqlite)?;
            post.likes = likes.remove(&post.id).unwrap_or_default();
            post.comments = comments.remove(&post.id).unwrap_or_default();
            posts.push(post);
        }
        Ok(posts)
    }
}

fn likes_by_post(conn: &Connection) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt =
        conn.prepare("SELECT post_id, user_id FROM post_likes ORDER BY post_id, position ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (post_id, user_id) = row?;
        map.entry(post_id).or_default().push(user_id);
    }
    Ok(map)
}

fn comments_by_post(conn: &Connection) -> Result<HashMap<String, Vec<Comment>>> {
    let mut stmt = conn.prepare(
        "SELECT post_id, id, user_id, user_name, user_avatar, text, timestamp
         FROM post_comments ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let timestamp: String = row.get(6)?;
        let comment = Comment {
            id: row.get(1)?,
            user_id: row.get(2)?,
            user_name: row.get(3)?,
            user_avatar: row.get(4)?,
            text: row.get(5)?,
            timestamp: parse_timestamp(6, &timestamp)?,
        };
        Ok((row.get::<_, String>(0)?, comment))
    })?;

    let mut map: HashMap<String, Vec<Comment>> = HashMap::new();
    for row in rows {
        let (post_id, comment) = row?;
        map.entry(post_id).or_default().push(comment);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            user_id: "u1".into(),
            text: format!("post {id}"),
            image: String::new(),
            timestamp: Utc::now(),
            edited: None,
            likes: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            user_id: "u2".into(),
            user_name: "Bob".into(),
            user_avatar: String::new(),
            text: "nice".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn likes_and_comments_are_attached() {
        let db = Database::open_in_memory().unwrap();
        let mut p = post("p1");
        db.upsert_post(&p).unwrap();
        db.upsert_post(&post("p2")).unwrap();

        p.likes = vec!["u3".into(), "u2".into()];
        db.upsert_post(&p).unwrap();
        db.append_comment("p1", &comment("c1")).unwrap();
        db.append_comment("p1", &comment("c2")).unwrap();

        let posts = db.list_posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].likes, ["u3", "u2"]);
        let ids: Vec<_> = posts[0].comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert_eq!(posts[0].comments[0].user_name, "Bob");
        assert!(posts[1].likes.is_empty());
    }

    #[test]
    fn upsert_keeps_comments() {
        let db = Database::open_in_memory().unwrap();
        let mut p = post("p1");
        db.upsert_post(&p).unwrap();
        db.append_comment("p1", &comment("c1")).unwrap();

        p.text = "edited".into();
        p.edited = Some(Utc::now());
        db.upsert_post(&p).unwrap();

        let stored = &db.list_posts().unwrap()[0];
        assert_eq!(stored.text, "edited");
        assert!(stored.edited.is_some());
        assert_eq!(stored.comments.len(), 1);
    }

    #[test]
    fn delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let mut p = post("p1");
        p.likes = vec!["u2".into()];
        db.upsert_post(&p).unwrap();
        db.append_comment("p1", &comment("c1")).unwrap();

        db.delete_post("p1").unwrap();
        assert!(db.list_posts().unwrap().is_empty());
        assert!(matches!(db.delete_post("p1"), Err(StoreError::NotFound)));

        let orphans: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM post_comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn comment_on_missing_post_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.append_comment("nope", &comment("c1")).is_err());
    }
}
