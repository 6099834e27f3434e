use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::responses::Role;

// ===== Envelopes =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ===== Forum =====

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Bug,
    Question,
    #[default]
    Discussion,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Bug => "bug",
            TopicKind::Question => "question",
            TopicKind::Discussion => "discussion",
        }
    }
}

impl TryFrom<String> for TopicKind {
    type Error = String;

    fn try_from(kind: String) -> Result<Self, Self::Error> {
        match kind.as_str() {
            "bug" => Ok(TopicKind::Bug),
            "question" => Ok(TopicKind::Question),
            "discussion" => Ok(TopicKind::Discussion),
            other => Err(format!("unknown topic kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: TopicKind,
    pub user_id: i32,
    pub category_id: Uuid,
    pub views: i32,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub user_id: i32,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Like {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account attached to forum content.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthorSummary {
    pub id: i32,
    pub name: String,
    pub avatar: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    pub user: AuthorSummary,
    pub category: CategorySummary,
    pub tags: Vec<Tag>,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub user: AuthorSummary,
    pub likes: Vec<Like>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TopicDetail {
    #[serde(flatten)]
    pub topic: Topic,
    pub user: AuthorSummary,
    pub category: CategorySummary,
    pub tags: Vec<Tag>,
    pub posts: Vec<PostView>,
}

/// Result of creating a topic: the topic and its opening post.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatedTopic {
    pub topic: Topic,
    pub tags: Vec<Tag>,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub topics: Vec<TopicView>,
}

// ===== Request bodies =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category_id: Uuid,
    #[serde(rename = "type", default)]
    pub kind: TopicKind,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateTopicRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TopicKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    /// Post being replied to. A value that is not a uuid is ignored.
    pub reply_to_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub content: String,
}

// ===== Admin =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoleUpdateRequest {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdminUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub provider: String,
    pub role: Role,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DashboardStats {
    pub users: i64,
    pub topics: i64,
    pub posts: i64,
    pub categories: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeedReport {
    pub categories_created: usize,
    pub topics_created: usize,
}

// ===== Downloads =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrackDownloadRequest {
    #[serde(default)]
    pub edition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Download {
    pub id: i32,
    pub edition: String,
    pub ip_address: String,
    pub user_agent: String,
    pub user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrackDownloadResponse {
    pub message: String,
    pub id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadStats {
    pub total_downloads: i64,
    pub downloads_by_edition: BTreeMap<String, i64>,
    pub downloads_today: i64,
    pub downloads_this_week: i64,
    pub downloads_this_month: i64,
    pub recent_downloads: Vec<Download>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}
