use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::openapi;

use crate::error::ApiError;
use crate::models::SearchResponse;
use crate::routes::helpers::{TopicRow, into_topic_views, topic_view_select};
use crate::routes::params::SearchParams;

const SEARCH_LIMIT: i64 = 50;

/// Topics whose title contains `q`, ignoring case. A blank query matches nothing.
#[openapi(tag = "Search")]
#[get("/search?<params..>")]
pub async fn search_topics(
    params: SearchParams,
    pool: &State<PgPool>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(SearchResponse { topics: Vec::new() }));
    }

    let sql = format!(
        "{} WHERE t.title ILIKE $1 ESCAPE '\\' \
         ORDER BY t.is_pinned DESC, t.created_at DESC LIMIT $2",
        topic_view_select()
    );
    let rows: Vec<TopicRow> = sqlx::query_as(&sql)
        .bind(like_pattern(query))
        .bind(SEARCH_LIMIT)
        .fetch_all(pool.inner())
        .await?;

    Ok(Json(SearchResponse {
        topics: into_topic_views(pool.inner(), rows).await?,
    }))
}

/// `%query%` with LIKE wildcards in the query taken literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(like_pattern("uefi"), "%uefi%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }
}
