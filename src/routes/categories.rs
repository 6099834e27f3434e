use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::models::{Category, CategoryRequest, CategoryUpdate, MessageResponse};
use crate::routes::helpers::{make_slug, parse_uuid};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, sort_order, created_at, updated_at";

/// All categories in display order.
#[openapi(tag = "Categories")]
#[get("/categories")]
pub async fn list_categories(pool: &State<PgPool>) -> Result<Json<Vec<Category>>, ApiError> {
    let categories: Vec<Category> = sqlx::query_as(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order ASC, name ASC"
    ))
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(categories))
}

/// One category, addressed by uuid or by slug.
#[openapi(tag = "Categories")]
#[get("/categories/<id_or_slug>")]
pub async fn get_category(
    id_or_slug: String,
    pool: &State<PgPool>,
) -> Result<Json<Category>, ApiError> {
    let category: Option<Category> = match Uuid::parse_str(&id_or_slug) {
        Ok(id) => {
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool.inner())
                .await?
        }
        Err(_) => {
            sqlx::query_as(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"))
                .bind(&id_or_slug)
                .fetch_optional(pool.inner())
                .await?
        }
    };

    category
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("category '{id_or_slug}' not found")))
}

#[openapi(tag = "Categories")]
#[post("/api/categories", data = "<payload>")]
pub async fn create_category(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    payload: Json<CategoryRequest>,
) -> Result<status::Created<Json<Category>>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }

    let category: Category = sqlx::query_as(&format!(
        "INSERT INTO categories (name, slug, description, sort_order) \
         VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(name)
    .bind(make_slug(name))
    .bind(payload.description.trim())
    .bind(payload.order)
    .fetch_one(pool.inner())
    .await?;

    log::info!("created category {} ({})", category.slug, category.id);
    let location = format!("/categories/{}", category.id);
    Ok(status::Created::new(location).body(Json(category)))
}

/// Partial update. A new name also regenerates the slug.
#[openapi(tag = "Categories")]
#[put("/api/categories/<id>", data = "<payload>")]
pub async fn update_category(
    id: String,
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    payload: Json<CategoryUpdate>,
) -> Result<Json<Category>, ApiError> {
    let id = parse_uuid(&id, "category")?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let category: Option<Category> = sqlx::query_as(&format!(
        "UPDATE categories SET \
            name = COALESCE($2, name), \
            slug = COALESCE($3, slug), \
            description = COALESCE($4, description), \
            sort_order = COALESCE($5, sort_order), \
            updated_at = NOW() \
         WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(name.map(make_slug))
    .bind(payload.description.as_deref().map(str::trim))
    .bind(payload.order)
    .fetch_optional(pool.inner())
    .await?;

    category
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("category not found".into()))
}

/// Delete a category together with its topics.
#[openapi(tag = "Categories")]
#[delete("/api/categories/<id>")]
pub async fn delete_category(
    id: String,
    admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_uuid(&id, "category")?;
    remove_category(pool.inner(), id, admin.0.id).await?;
    Ok(Json(MessageResponse::new("category deleted")))
}

pub(crate) async fn remove_category(pool: &PgPool, id: Uuid, actor: i32) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("category not found".into()));
    }
    log::info!("category {} deleted by account {}", id, actor);
    Ok(())
}
