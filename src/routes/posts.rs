use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, post, put};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::is_unique_violation;
use crate::error::ApiError;
use crate::models::{CreatePostRequest, Like, MessageResponse, Post, UpdatePostRequest};
use crate::routes::helpers::{POST_COLUMNS, ensure_can_modify, fetch_post, fetch_topic, parse_uuid};

/// Reply in a topic. Locked topics accept posts from moderators and admins only.
#[openapi(tag = "Posts")]
#[post("/api/topics/<id>/posts", data = "<payload>")]
pub async fn create_post(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
    payload: Json<CreatePostRequest>,
) -> Result<status::Created<Json<Post>>, ApiError> {
    let topic_id = parse_uuid(&id, "topic")?;
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }

    let topic = fetch_topic(pool.inner(), topic_id).await?;
    if topic.is_locked && !user.role.is_elevated() {
        return Err(ApiError::Forbidden("topic is locked".into()));
    }

    let reply_to_id = reply_target(payload.reply_to_id.as_deref());

    let mut tx = pool.begin().await?;

    let post: Post = sqlx::query_as(&format!(
        "INSERT INTO posts AS p (topic_id, user_id, content, reply_to_id) \
         VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
    ))
    .bind(topic_id)
    .bind(user.id)
    .bind(content)
    .bind(reply_to_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE topics SET updated_at = NOW() WHERE id = $1")
        .bind(topic_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(status::Created::new(format!("/topics/{}", topic.slug)).body(Json(post)))
}

#[openapi(tag = "Posts")]
#[put("/api/posts/<id>", data = "<payload>")]
pub async fn update_post(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
    payload: Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let id = parse_uuid(&id, "post")?;
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }

    let existing = fetch_post(pool.inner(), id).await?;
    ensure_can_modify(existing.user_id, &user)?;

    let post: Post = sqlx::query_as(&format!(
        "UPDATE posts AS p SET content = $2, updated_at = NOW() \
         WHERE p.id = $1 RETURNING {POST_COLUMNS}"
    ))
    .bind(id)
    .bind(content)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(post))
}

#[openapi(tag = "Posts")]
#[delete("/api/posts/<id>")]
pub async fn delete_post(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(&id, "post")?;
    let existing = fetch_post(pool.inner(), id).await?;
    ensure_can_modify(existing.user_id, &user)?;

    remove_post(pool.inner(), id).await?;
    log::info!("account {} deleted post {}", user.id, id);
    Ok(Json(MessageResponse::new("post deleted")))
}

/// Like a post once. A second like from the same account is a conflict.
#[openapi(tag = "Posts")]
#[post("/api/posts/<id>/like")]
pub async fn like_post(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
) -> Result<status::Created<Json<Like>>, ApiError> {
    let post_id = parse_uuid(&id, "post")?;
    fetch_post(pool.inner(), post_id).await?;

    let result: Result<Like, sqlx::Error> = sqlx::query_as(
        r#"INSERT INTO likes (post_id, user_id) VALUES ($1, $2)
           RETURNING id, post_id, user_id, created_at"#,
    )
    .bind(post_id)
    .bind(user.id)
    .fetch_one(pool.inner())
    .await;

    match result {
        Ok(like) => Ok(status::Created::new(format!("/api/posts/{post_id}/like")).body(Json(like))),
        Err(err) if is_unique_violation(&err) => {
            Err(ApiError::Conflict("post already liked".into()))
        }
        Err(err) => Err(err.into()),
    }
}

#[openapi(tag = "Posts")]
#[delete("/api/posts/<id>/like")]
pub async fn unlike_post(
    id: String,
    user: AuthUser,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post_id = parse_uuid(&id, "post")?;

    let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user.id)
        .execute(pool.inner())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("like not found".into()));
    }
    Ok(Json(MessageResponse::new("like removed")))
}

pub(crate) async fn remove_post(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("post not found".into()));
    }
    Ok(())
}

/// A reply target that is not a uuid is dropped rather than rejected.
fn reply_target(raw: Option<&str>) -> Option<Uuid> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reply_target_is_ignored() {
        assert_eq!(reply_target(None), None);
        assert_eq!(reply_target(Some("")), None);
        assert_eq!(reply_target(Some("not-a-uuid")), None);

        let id = Uuid::new_v4();
        assert_eq!(reply_target(Some(&id.to_string())), Some(id));
    }
}
