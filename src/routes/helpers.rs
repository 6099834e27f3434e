//! Shared helpers for the forum route handlers: slugs, ownership checks and
//! loading topics and posts together with their related rows.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::auth::responses::Role;
use crate::error::ApiError;
use crate::models::{AuthorSummary, CategorySummary, Like, Post, PostView, Tag, Topic, TopicView};

static SLUG_SEPARATORS: OnceLock<Regex> = OnceLock::new();

/// Lowercase `title`, collapse every run of characters outside `[a-z0-9]`
/// into a single `-` and trim dashes from both ends.
pub fn make_slug(title: &str) -> String {
    let separators = SLUG_SEPARATORS
        .get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("invalid slug regex"));
    separators
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Authors may change their own content; admins and moderators anyone's.
pub fn can_modify(author_id: i32, user: &AuthUser) -> bool {
    author_id == user.id || user.role.is_elevated()
}

pub fn ensure_can_modify(author_id: i32, user: &AuthUser) -> Result<(), ApiError> {
    if can_modify(author_id, user) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("not allowed to modify this content".into()))
    }
}

pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id")))
}

/// Trimmed, de-duplicated, non-empty tag names in first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !seen.iter().any(|existing: &String| existing == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

pub async fn fetch_topic(pool: &PgPool, id: Uuid) -> Result<Topic, ApiError> {
    sqlx::query_as::<_, Topic>(&format!("SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))
}

pub async fn fetch_post(pool: &PgPool, id: Uuid) -> Result<Post, ApiError> {
    sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))
}

pub const TOPIC_COLUMNS: &str = "t.id, t.title, t.slug, t.kind, t.user_id, t.category_id, \
     t.views, t.is_pinned, t.is_locked, t.created_at, t.updated_at";

pub const POST_COLUMNS: &str =
    "p.id, p.topic_id, p.user_id, p.content, p.reply_to_id, p.created_at, p.updated_at";

/// Select list for [`TopicRow`]; callers append `WHERE`/`ORDER BY`.
pub fn topic_view_select() -> String {
    format!(
        "SELECT {TOPIC_COLUMNS}, \
            u.name AS author_name, u.avatar AS author_avatar, u.role AS author_role, \
            c.name AS category_name, c.slug AS category_slug, \
            (SELECT COUNT(*) FROM posts p WHERE p.topic_id = t.id) AS post_count \
         FROM topics t \
         JOIN users u ON u.id = t.user_id \
         JOIN categories c ON c.id = t.category_id"
    )
}

#[derive(Debug, FromRow)]
pub struct TopicRow {
    #[sqlx(flatten)]
    topic: Topic,
    author_name: String,
    author_avatar: String,
    author_role: String,
    category_name: String,
    category_slug: String,
    post_count: i64,
}

impl TopicRow {
    fn author(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.topic.user_id,
            name: self.author_name.clone(),
            avatar: self.author_avatar.clone(),
            role: Role::from_db(&self.author_role),
        }
    }

    fn category(&self) -> CategorySummary {
        CategorySummary {
            id: self.topic.category_id,
            name: self.category_name.clone(),
            slug: self.category_slug.clone(),
        }
    }
}

/// Attach author, category and tags to topic rows, preserving row order.
pub async fn into_topic_views(pool: &PgPool, rows: Vec<TopicRow>) -> Result<Vec<TopicView>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.topic.id).collect();
    let mut tags = load_tags(pool, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let user = row.author();
            let category = row.category();
            TopicView {
                tags: tags.remove(&row.topic.id).unwrap_or_default(),
                post_count: row.post_count,
                topic: row.topic,
                user,
                category,
            }
        })
        .collect())
}

#[derive(Debug, FromRow)]
struct TopicTagRow {
    topic_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

/// Tags for each of `topic_ids`, sorted by name.
pub async fn load_tags(pool: &PgPool, topic_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>, ApiError> {
    if topic_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<TopicTagRow> = sqlx::query_as(
        r#"SELECT tt.topic_id, g.id, g.name
           FROM topic_tags tt
           JOIN tags g ON g.id = tt.tag_id
           WHERE tt.topic_id = ANY($1)
           ORDER BY g.name ASC"#,
    )
    .bind(topic_ids)
    .fetch_all(pool)
    .await?;

    let mut by_topic: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in rows {
        by_topic.entry(row.topic_id).or_default().push(row.tag);
    }
    Ok(by_topic)
}

#[derive(Debug, FromRow)]
struct PostRow {
    #[sqlx(flatten)]
    post: Post,
    author_name: String,
    author_avatar: String,
    author_role: String,
}

/// Posts of a topic, oldest first, each with its author and likes.
pub async fn load_post_views(pool: &PgPool, topic_id: Uuid) -> Result<Vec<PostView>, ApiError> {
    let rows: Vec<PostRow> = sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS}, \
            u.name AS author_name, u.avatar AS author_avatar, u.role AS author_role \
         FROM posts p \
         JOIN users u ON u.id = p.user_id \
         WHERE p.topic_id = $1 \
         ORDER BY p.created_at ASC"
    ))
    .bind(topic_id)
    .fetch_all(pool)
    .await?;

    let post_ids: Vec<Uuid> = rows.iter().map(|row| row.post.id).collect();
    let likes: Vec<Like> = if post_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(
            r#"SELECT id, post_id, user_id, created_at
               FROM likes
               WHERE post_id = ANY($1)
               ORDER BY created_at ASC"#,
        )
        .bind(&post_ids)
        .fetch_all(pool)
        .await?
    };

    let mut likes_by_post: HashMap<Uuid, Vec<Like>> = HashMap::new();
    for like in likes {
        likes_by_post.entry(like.post_id).or_default().push(like);
    }

    Ok(rows
        .into_iter()
        .map(|row| PostView {
            user: AuthorSummary {
                id: row.post.user_id,
                name: row.author_name,
                avatar: row.author_avatar,
                role: Role::from_db(&row.author_role),
            },
            likes: likes_by_post.remove(&row.post.id).unwrap_or_default(),
            post: row.post,
        })
        .collect())
}
