use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{
    CreateTopicRequest, CreatedTopic, MessageResponse, Post, PostView, Tag, Topic, TopicDetail,
    TopicView, UpdateTopicRequest,
};
use crate::routes::helpers::{
    POST_COLUMNS, TOPIC_COLUMNS, TopicRow, ensure_can_modify, fetch_topic, into_topic_views,
    load_post_views, make_slug, normalize_tags, parse_uuid, topic_view_select,
};
use crate::routes::params::TopicFilter;

/// Topics, pinned first and then newest first.
#[openapi(tag = "Topics")]
#[get("/topics?<filter..>")]
pub async fn list_topics(
    filter: TopicFilter,
    pool: &State<PgPool>,
) -> Result<Json<Vec<TopicView>>, ApiError> {
    let category_id = match filter.category_id.as_deref().filter(|id| !id.is_empty()) {
        Some(raw) => Some(parse_uuid(raw, "category")?),
        None => None,
    };

    let sql = format!(
        "{} WHERE ($1::uuid IS NULL OR t.category_id = $1) \
         ORDER BY t.is_pinned DESC, t.created_at DESC",
        topic_view_select()
    );
    let rows: Vec<TopicRow> = sqlx::query_as(&sql)
        .bind(category_id)
        .fetch_all(pool.inner())
        .await?;

    Ok(Json(into_topic_views(pool.inner(), rows).await?))
}

/// A topic by uuid or slug with its author, category, tags and posts.
///
/// Counts a view in the background; the response does not wait for it.
#[openapi(tag = "Topics")]
#[get("/topics/<id_or_slug>")]
pub async fn get_topic(
    id_or_slug: String,
    pool: &State<PgPool>,
) -> Result<Json<TopicDetail>, ApiError> {
    let row: Option<TopicRow> = match Uuid::parse_str(&id_or_slug) {
        Ok(id) => {
            sqlx::query_as(&format!("{} WHERE t.id = $1", topic_view_select()))
                .bind(id)
                .fetch_optional(pool.inner())
                .await?
        }
        Err(_) => {
            sqlx::query_as(&format!("{} WHERE t.slug = $1", topic_view_select()))
                .bind(&id_or_slug)
                .fetch_optional(pool.inner())
                .await?
        }
    };
    let row = row.ok_or_else(|| ApiError::NotFound(format!("topic '{id_or_slug}' not found")))?;

    let view = into_topic_views(pool.inner(), vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("topic row vanished while loading".into()))?;
    let posts = load_post_views(pool.inner(), view.topic.id).await?;

    spawn_view_increment(pool.inner().clone(), view.topic.id);

    Ok(Json(TopicDetail {
        topic: view.topic,
        user: view.user,
        category: view.category,
        tags: view.tags,
        posts,
    }))
}

/// Posts of a topic, oldest first.
#[openapi(tag = "Topics")]
#[get("/topics/<id>/posts")]
pub async fn list_topic_posts(
    id: String,
    pool: &State<PgPool>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let id = parse_uuid(&id, "topic")?;
    fetch_topic(pool.inner(), id).await?;
    Ok(Json(load_post_views(pool.inner(), id).await?))
}

/// Create a topic with its tags and opening post in one transaction.
#[openapi(tag = "Topics")]
#[post("/api/topics", data = "<payload>")]
pub async fn create_topic(
    user: AuthUser,
    pool: &State<PgPool>,
    payload: Json<CreateTopicRequest>,
) -> Result<status::Created<Json<CreatedTopic>>, ApiError> {
    let payload = payload.into_inner();
    let title = payload.title.trim();
    if title.is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("title and content are required".into()));
    }
    let slug = make_slug(title);
    if slug.is_empty() {
        return Err(ApiError::BadRequest("title must contain letters or digits".into()));
    }

    let category_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(payload.category_id)
            .fetch_one(pool.inner())
            .await?;
    if !category_exists {
        return Err(ApiError::NotFound("category not found".into()));
    }

    let mut tx = pool.begin().await?;

    let topic: Topic = sqlx::query_as(&format!(
        "INSERT INTO topics AS t (title, slug, kind, user_id, category_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {TOPIC_COLUMNS}"
    ))
    .bind(title)
    .bind(&slug)
    .bind(payload.kind.as_str())
    .bind(user.id)
    .bind(payload.category_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut tags = Vec::new();
    for name in normalize_tags(&payload.tags) {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let tag: Tag = sqlx::query_as(
            r#"INSERT INTO tags (name) VALUES ($1)
               ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
               RETURNING id, name"#,
        )
        .bind(&name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO topic_tags (topic_id, tag_id) VALUES ($1, $2)")
            .bind(topic.id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await?;
        tags.push(tag);
    }

    let post: Post = sqlx::query_as(&format!(
        "INSERT INTO posts AS p (topic_id, user_id, content) \
         VALUES ($1, $2, $3) RETURNING {POST_COLUMNS}"
    ))
    .bind(topic.id)
    .bind(user.id)
    .bind(payload.content.trim())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!("account {} created topic {} ({})", user.id, topic.slug, topic.id);
    let location = format!("/topics/{}", topic.slug);
    Ok(status::Created::new(location).body(Json(CreatedTopic { topic, tags, post })))
}

/// Rename or retype a topic. Authors, moderators and admins only.
#[openapi(tag = "Topics")]
#[put("/api/topics/<id>", data = "<payload>")]
pub async fn update_topic(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
    payload: Json<UpdateTopicRequest>,
) -> Result<Json<Topic>, ApiError> {
    let id = parse_uuid(&id, "topic")?;
    let existing = fetch_topic(pool.inner(), id).await?;
    ensure_can_modify(existing.user_id, &user)?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty());
    let slug = title.map(make_slug).filter(|slug| !slug.is_empty());
    if title.is_some() && slug.is_none() {
        return Err(ApiError::BadRequest("title must contain letters or digits".into()));
    }

    let topic: Topic = sqlx::query_as(&format!(
        "UPDATE topics AS t SET \
            title = COALESCE($2, t.title), \
            slug = COALESCE($3, t.slug), \
            kind = COALESCE($4, t.kind), \
            updated_at = NOW() \
         WHERE t.id = $1 RETURNING {TOPIC_COLUMNS}"
    ))
    .bind(id)
    .bind(title)
    .bind(slug)
    .bind(payload.kind.map(|kind| kind.as_str()))
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(topic))
}

/// Delete a topic with its posts, likes and tag links.
#[openapi(tag = "Topics")]
#[delete("/api/topics/<id>")]
pub async fn delete_topic(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(&id, "topic")?;
    let existing = fetch_topic(pool.inner(), id).await?;
    ensure_can_modify(existing.user_id, &user)?;

    sqlx::query("DELETE FROM topics WHERE id = $1")
        .bind(id)
        .execute(pool.inner())
        .await?;

    log::info!("account {} deleted topic {}", user.id, id);
    Ok(Json(MessageResponse::new("topic deleted")))
}

/// Best-effort `views + 1`, detached from the request.
fn spawn_view_increment(pool: PgPool, topic_id: Uuid) {
    tokio::spawn(async move {
        if let Err(err) = sqlx::query("UPDATE topics SET views = views + 1 WHERE id = $1")
            .bind(topic_id)
            .execute(&pool)
            .await
        {
            log::debug!("view increment for topic {} dropped: {}", topic_id, err);
        }
    });
}
