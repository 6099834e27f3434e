//! Administrative endpoints: dashboard counts, account management, topic
//! moderation and content seeding. Every handler requires the admin role.

use chrono::{DateTime, Utc};
use rocket::{State, delete, get, post, put, serde::json::Json};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use rocket_okapi::openapi;

use crate::auth::responses::Role;
use crate::auth::{AuthState, RequireAdmin};
use crate::error::ApiError;
use crate::models::{AdminUser, DashboardStats, MessageResponse, RoleUpdateRequest, SeedReport};
use crate::routes::categories::remove_category;
use crate::routes::helpers::parse_uuid;
use crate::routes::posts::remove_post;
use crate::seed_data;

#[derive(Debug, FromRow)]
struct AdminUserRow {
    id: i32,
    name: String,
    email: String,
    provider: String,
    role: String,
    avatar: String,
    created_at: DateTime<Utc>,
}

impl From<AdminUserRow> for AdminUser {
    fn from(row: AdminUserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            provider: row.provider,
            role: Role::from_db(&row.role),
            avatar: row.avatar,
            created_at: row.created_at,
        }
    }
}

#[openapi(tag = "Admin")]
#[get("/api/admin/stats")]
pub async fn dashboard_stats(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<DashboardStats>, ApiError> {
    let (users, topics, posts, categories): (i64, i64, i64, i64) = sqlx::query_as(
        r#"SELECT
               (SELECT COUNT(*) FROM users),
               (SELECT COUNT(*) FROM topics),
               (SELECT COUNT(*) FROM posts),
               (SELECT COUNT(*) FROM categories)"#,
    )
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(DashboardStats {
        users,
        topics,
        posts,
        categories,
    }))
}

/// Every account, oldest first. Password hashes and refresh tokens are never
/// selected.
#[openapi(tag = "Admin")]
#[get("/api/admin/users")]
pub async fn list_users(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<Vec<AdminUser>>, ApiError> {
    let rows: Vec<AdminUserRow> = sqlx::query_as(
        "SELECT id, name, email, provider, role, avatar, created_at FROM users ORDER BY id ASC",
    )
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(rows.into_iter().map(AdminUser::from).collect()))
}

#[openapi(tag = "Admin")]
#[put("/api/admin/users/<id>/role", data = "<payload>")]
pub async fn update_user_role(
    id: i32,
    admin: RequireAdmin,
    pool: &State<PgPool>,
    payload: Json<RoleUpdateRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let role: Role = payload
        .role
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("role must be one of user, moderator, admin".into()))?;

    let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(id)
        .bind(role.as_str())
        .execute(pool.inner())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found".into()));
    }

    log::info!("account {} set role of {} to {}", admin.0.id, id, role.as_str());
    Ok(Json(MessageResponse::new("role updated")))
}

/// Delete an account. Its topics, posts and likes go with it; its downloads
/// are kept without attribution.
#[openapi(tag = "Admin")]
#[delete("/api/admin/users/<id>")]
pub async fn delete_user(
    id: i32,
    admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    if id == admin.0.id {
        return Err(ApiError::BadRequest("cannot delete your own account".into()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool.inner())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found".into()));
    }

    log::info!("account {} deleted by {}", id, admin.0.id);
    Ok(Json(MessageResponse::new("user deleted")))
}

#[derive(Debug, Clone, Copy)]
enum TopicFlag {
    Locked,
    Pinned,
}

impl TopicFlag {
    fn column(self) -> &'static str {
        match self {
            TopicFlag::Locked => "is_locked",
            TopicFlag::Pinned => "is_pinned",
        }
    }

    fn message(self, on: bool) -> &'static str {
        match (self, on) {
            (TopicFlag::Locked, true) => "topic locked",
            (TopicFlag::Locked, false) => "topic unlocked",
            (TopicFlag::Pinned, true) => "topic pinned",
            (TopicFlag::Pinned, false) => "topic unpinned",
        }
    }
}

async fn set_topic_flag(
    pool: &PgPool,
    raw_id: &str,
    flag: TopicFlag,
    on: bool,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(raw_id, "topic")?;
    let result = sqlx::query(&format!(
        "UPDATE topics SET {} = $2 WHERE id = $1",
        flag.column()
    ))
    .bind(id)
    .bind(on)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("topic not found".into()));
    }
    Ok(Json(MessageResponse::new(flag.message(on))))
}

#[openapi(tag = "Admin")]
#[put("/api/admin/topics/<id>/lock")]
pub async fn lock_topic(
    id: String,
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    set_topic_flag(pool.inner(), &id, TopicFlag::Locked, true).await
}

#[openapi(tag = "Admin")]
#[delete("/api/admin/topics/<id>/lock")]
pub async fn unlock_topic(
    id: String,
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    set_topic_flag(pool.inner(), &id, TopicFlag::Locked, false).await
}

#[openapi(tag = "Admin")]
#[put("/api/admin/topics/<id>/pin")]
pub async fn pin_topic(
    id: String,
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    set_topic_flag(pool.inner(), &id, TopicFlag::Pinned, true).await
}

#[openapi(tag = "Admin")]
#[delete("/api/admin/topics/<id>/pin")]
pub async fn unpin_topic(
    id: String,
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    set_topic_flag(pool.inner(), &id, TopicFlag::Pinned, false).await
}

#[openapi(tag = "Admin")]
#[delete("/api/admin/posts/<id>")]
pub async fn delete_any_post(
    id: String,
    admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(&id, "post")?;
    remove_post(pool.inner(), id).await?;
    log::info!("post {} deleted by admin {}", id, admin.0.id);
    Ok(Json(MessageResponse::new("post deleted")))
}

#[openapi(tag = "Admin")]
#[delete("/api/admin/categories/<id>")]
pub async fn delete_any_category(
    id: String,
    admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(&id, "category")?;
    remove_category(pool.inner(), id, admin.0.id).await?;
    Ok(Json(MessageResponse::new("category deleted")))
}

/// Insert the default categories and sample topics. Safe to call repeatedly.
#[openapi(tag = "Admin")]
#[post("/api/admin/seed")]
pub async fn seed_forum(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    auth: &State<AuthState>,
) -> Result<Json<SeedReport>, ApiError> {
    let report =
        seed_data::seed_forum(pool.inner(), auth.accounts.as_ref(), auth.passwords.as_ref()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::TopicFlag;

    #[test]
    fn flag_messages_follow_direction() {
        assert_eq!(TopicFlag::Locked.message(true), "topic locked");
        assert_eq!(TopicFlag::Pinned.message(false), "topic unpinned");
        assert_eq!(TopicFlag::Pinned.column(), "is_pinned");
    }
}
