use chrono::{Local, Utc};
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::Json;
use rocket::{Request, State, get, post};
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::openapi;
use rocket_okapi::request::OpenApiFromRequest;

use crate::analytics::{self, DownloadEvent, Edition};
use crate::auth::{AuthUser, RequireAdmin};
use crate::error::ApiError;
use crate::models::{DailyCount, DownloadStats, TrackDownloadRequest, TrackDownloadResponse};
use crate::routes::params::HistoryParams;

/// Requester address and user agent as seen by the server.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct ClientMeta {
    pub ip_address: String,
    pub user_agent: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientMeta {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientMeta {
            ip_address: request
                .client_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            user_agent: request
                .headers()
                .get_one("User-Agent")
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Record one download. Anonymous callers are accepted; a valid bearer token
/// attributes the download to its account.
#[openapi(tag = "Downloads")]
#[post("/api/downloads/track", data = "<payload>")]
pub async fn track_download(
    user: Option<AuthUser>,
    client: ClientMeta,
    pool: &State<PgPool>,
    payload: Json<TrackDownloadRequest>,
) -> Result<Json<TrackDownloadResponse>, ApiError> {
    if payload.edition.is_empty() {
        return Err(ApiError::BadRequest("edition is required".into()));
    }
    let edition: Edition = payload.edition.parse().map_err(ApiError::BadRequest)?;

    let event = DownloadEvent {
        edition,
        ip_address: client.ip_address,
        user_agent: client.user_agent,
        user_id: user.map(|user| user.id),
    };
    let download = analytics::record_download(pool.inner(), &event).await?;

    log::debug!("download {} recorded for {}", download.id, edition.as_str());
    Ok(Json(TrackDownloadResponse {
        message: "download tracked".to_string(),
        id: download.id,
    }))
}

#[openapi(tag = "Downloads")]
#[get("/api/admin/downloads/stats")]
pub async fn download_stats(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
) -> Result<Json<DownloadStats>, ApiError> {
    let starts = analytics::period_starts(&Local::now());
    Ok(Json(analytics::download_stats(pool.inner(), starts).await?))
}

/// Daily download counts, oldest first.
#[openapi(tag = "Downloads")]
#[get("/api/admin/downloads/history?<params..>")]
pub async fn download_history(
    _admin: RequireAdmin,
    params: HistoryParams,
    pool: &State<PgPool>,
) -> Result<Json<Vec<DailyCount>>, ApiError> {
    let history = analytics::download_history(pool.inner(), Utc::now(), params.days()).await?;
    Ok(Json(history))
}
