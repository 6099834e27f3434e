use std::sync::Arc;

use chrono::{DateTime, Utc};
use forum_api::api_routes;
use forum_api::auth::responses::Role;
use forum_api::auth::{AuthConfig, AuthState, PgAccountStore};
use forum_api::error::ErrorBody;
use forum_api::models::{
    CreatedTopic, Post, SearchResponse, SeedReport, Topic, TopicDetail, TopicView,
};
use forum_api::test_support::{TestDatabase, TestFixtures, TestRocketBuilder};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::json;
use uuid::Uuid;

struct Forum {
    client: Client,
    auth: AuthState,
    db: TestDatabase,
}

impl Forum {
    fn token(&self, user_id: i32, role: Role) -> Header<'static> {
        let pair = self.auth.jwt.issue_pair(user_id, role).expect("issue token");
        Header::new("Authorization", format!("Bearer {}", pair.access_token))
    }

    fn fixtures(&self) -> TestFixtures<'_> {
        TestFixtures::new(self.db.pool())
    }
}

async fn forum() -> Option<Forum> {
    let db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(err) if err.is_unavailable() => {
            eprintln!("skipping forum route test: {err}");
            return None;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = db.pool_clone();
    let auth = AuthState::new(
        AuthConfig::with_secret("forum-routes-secret"),
        Arc::new(PgAccountStore::new(pool.clone())),
    )
    .expect("auth state");

    let client = TestRocketBuilder::new()
        .mount_routes(api_routes())
        .manage_pg_pool(pool)
        .manage_auth_state(auth.clone())
        .async_client()
        .await;

    Some(Forum { client, auth, db })
}

async fn create_topic(forum: &Forum, user_id: i32, category_id: Uuid, title: &str, tags: &[&str]) -> CreatedTopic {
    let response = forum
        .client
        .post("/api/topics")
        .header(ContentType::JSON)
        .header(forum.token(user_id, Role::User))
        .body(
            json!({
                "title": title,
                "content": "first post",
                "category_id": category_id,
                "type": "bug",
                "tags": tags,
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    response.into_json().await.expect("created topic")
}

async fn topic_updated_at(forum: &Forum, topic_id: Uuid) -> DateTime<Utc> {
    sqlx::query_scalar("SELECT updated_at FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_one(forum.db.pool())
        .await
        .expect("topic updated_at")
}

#[tokio::test]
async fn tags_are_shared_between_topics() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("tags@x.com", "Tagger", "user").await.expect("user");
    let category = fixtures.insert_category("Bugs", "bugs").await.expect("category");

    let first = create_topic(&forum, author, category, "Screen flickers", &["bug", "cosmic"]).await;
    let second = create_topic(&forum, author, category, "Panel freezes", &["cosmic", "bug", " bug "]).await;

    assert_eq!(first.topic.slug, "screen-flickers");
    assert_eq!(first.post.content, "first post");
    assert_eq!(second.tags.len(), 2);

    let tag_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
        .fetch_one(forum.db.pool())
        .await
        .expect("count tags");
    assert_eq!(tag_rows, 2);

    let response = forum.client.get("/topics").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let topics: Vec<TopicView> = response.into_json().await.expect("topic list");
    assert_eq!(topics.len(), 2);
    assert!(topics.iter().all(|view| view.tags.len() == 2 && view.post_count == 1));
}

#[tokio::test]
async fn topic_needs_existing_category_and_title() {
    let Some(forum) = forum().await else { return };
    let author = forum.fixtures().insert_user("t@x.com", "T", "user").await.expect("user");

    let response = forum
        .client
        .post("/api/topics")
        .header(ContentType::JSON)
        .header(forum.token(author, Role::User))
        .body(json!({"title": "Orphan", "content": "x", "category_id": Uuid::new_v4()}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let category = forum.fixtures().insert_category("Help", "help").await.expect("category");
    let response = forum
        .client
        .post("/api/topics")
        .header(ContentType::JSON)
        .header(forum.token(author, Role::User))
        .body(json!({"title": "  ", "content": "x", "category_id": category}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[tokio::test]
async fn post_edits_follow_ownership() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("author@x.com", "Author", "user").await.expect("user");
    let stranger = fixtures.insert_user("stranger@x.com", "Stranger", "user").await.expect("user");
    let moderator = fixtures.insert_user("mod@x.com", "Mod", "moderator").await.expect("user");
    let category = fixtures.insert_category("General", "general").await.expect("category");
    let (_, post_id) = fixtures
        .insert_topic(author, category, "Hello", "hello")
        .await
        .expect("topic");

    let edit = |user_id: i32, role: Role, content: &str| {
        forum
            .client
            .put(format!("/api/posts/{post_id}"))
            .header(ContentType::JSON)
            .header(forum.token(user_id, role))
            .body(json!({ "content": content }).to_string())
    };

    let response = edit(stranger, Role::User, "hijacked").dispatch().await;
    assert_eq!(response.status(), Status::Forbidden);
    let body: ErrorBody = response.into_json().await.expect("error body");
    assert_eq!(body.error, "Forbidden");

    let response = edit(author, Role::User, "edited by author").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let post: Post = response.into_json().await.expect("post");
    assert_eq!(post.content, "edited by author");

    let response = edit(moderator, Role::Moderator, "edited by moderator").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[tokio::test]
async fn topic_edits_follow_ownership() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("op@x.com", "Op", "user").await.expect("user");
    let stranger = fixtures.insert_user("other@x.com", "Other", "user").await.expect("user");
    let moderator = fixtures.insert_user("mod2@x.com", "Mod", "moderator").await.expect("user");
    let category = fixtures.insert_category("Desktop", "desktop").await.expect("category");
    let (topic_id, _) = fixtures
        .insert_topic(author, category, "Dock icons", "dock-icons")
        .await
        .expect("topic");

    let rename = |user_id: i32, role: Role, title: &str| {
        forum
            .client
            .put(format!("/api/topics/{topic_id}"))
            .header(ContentType::JSON)
            .header(forum.token(user_id, role))
            .body(json!({ "title": title }).to_string())
    };
    let remove = |user_id: i32, role: Role| {
        forum
            .client
            .delete(format!("/api/topics/{topic_id}"))
            .header(forum.token(user_id, role))
    };

    let response = rename(stranger, Role::User, "Taken over").dispatch().await;
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(remove(stranger, Role::User).dispatch().await.status(), Status::Forbidden);

    let response = rename(author, Role::User, "Dock icons vanish").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let topic: Topic = response.into_json().await.expect("topic");
    assert_eq!(topic.slug, "dock-icons-vanish");

    let response = rename(moderator, Role::Moderator, "Dock icons vanish on login").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    assert_eq!(remove(moderator, Role::Moderator).dispatch().await.status(), Status::Ok);
    let response = forum.client.get(format!("/topics/{topic_id}")).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[tokio::test]
async fn over_long_fields_are_bad_requests() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("long@x.com", "Long", "user").await.expect("user");
    let admin = fixtures.insert_user("boss@x.com", "Boss", "admin").await.expect("user");
    let category = fixtures.insert_category("Limits", "limits").await.expect("category");

    let response = forum
        .client
        .post("/api/topics")
        .header(ContentType::JSON)
        .header(forum.token(author, Role::User))
        .body(json!({"title": "t".repeat(300), "content": "x", "category_id": category}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: ErrorBody = response.into_json().await.expect("error body");
    assert_eq!(body.error, "BadRequest");

    let response = forum
        .client
        .post("/api/categories")
        .header(ContentType::JSON)
        .header(forum.token(admin, Role::Admin))
        .body(json!({"name": "c".repeat(120)}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[tokio::test]
async fn failed_tag_rolls_back_the_whole_topic() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("roll@x.com", "Roll", "user").await.expect("user");
    let category = fixtures.insert_category("Rollback", "rollback").await.expect("category");

    let response = forum
        .client
        .post("/api/topics")
        .header(ContentType::JSON)
        .header(forum.token(author, Role::User))
        .body(
            json!({
                "title": "Half written",
                "content": "first post",
                "category_id": category,
                "tags": ["fine", "x".repeat(60)],
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    for table in ["topics", "posts", "topic_tags", "tags"] {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(forum.db.pool())
            .await
            .expect("count rows");
        assert_eq!(rows, 0, "{table}");
    }
}

#[tokio::test]
async fn locked_topics_refuse_plain_replies() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let admin = fixtures.insert_user("admin@x.com", "Admin", "admin").await.expect("user");
    let member = fixtures.insert_user("member@x.com", "Member", "user").await.expect("user");
    let category = fixtures.insert_category("Questions", "questions").await.expect("category");
    let (topic_id, _) = fixtures
        .insert_topic(member, category, "Locked soon", "locked-soon")
        .await
        .expect("topic");

    let response = forum
        .client
        .put(format!("/api/admin/topics/{topic_id}/lock"))
        .header(forum.token(admin, Role::Admin))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let reply = |user_id: i32, role: Role| {
        forum
            .client
            .post(format!("/api/topics/{topic_id}/posts"))
            .header(ContentType::JSON)
            .header(forum.token(user_id, role))
            .body(json!({"content": "still here?", "reply_to_id": "not-a-uuid"}).to_string())
    };

    assert_eq!(reply(member, Role::User).dispatch().await.status(), Status::Forbidden);

    let before = topic_updated_at(&forum, topic_id).await;

    let response = reply(admin, Role::Admin).dispatch().await;
    assert_eq!(response.status(), Status::Created);
    let post: Post = response.into_json().await.expect("post");
    assert_eq!(post.reply_to_id, None);
    assert!(topic_updated_at(&forum, topic_id).await > before);
}

#[tokio::test]
async fn likes_are_unique_per_user() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("liker@x.com", "Liker", "user").await.expect("user");
    let category = fixtures.insert_category("Likes", "likes").await.expect("category");
    let (topic_id, post_id) = fixtures
        .insert_topic(author, category, "Like me", "like-me")
        .await
        .expect("topic");

    let like = || {
        forum
            .client
            .post(format!("/api/posts/{post_id}/like"))
            .header(forum.token(author, Role::User))
    };
    assert_eq!(like().dispatch().await.status(), Status::Created);
    assert_eq!(like().dispatch().await.status(), Status::Conflict);

    let response = forum.client.get("/topics/like-me").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let detail: TopicDetail = response.into_json().await.expect("topic detail");
    assert_eq!(detail.topic.id, topic_id);
    assert_eq!(detail.posts.len(), 1);
    assert_eq!(detail.posts[0].likes.len(), 1);

    let response = forum
        .client
        .delete(format!("/api/posts/{post_id}/like"))
        .header(forum.token(author, Role::User))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[tokio::test]
async fn search_matches_titles_case_insensitively() {
    let Some(forum) = forum().await else { return };
    let fixtures = forum.fixtures();
    let author = fixtures.insert_user("s@x.com", "Searcher", "user").await.expect("user");
    let category = fixtures.insert_category("Install", "install").await.expect("category");
    fixtures
        .insert_topic(author, category, "UEFI install fails", "uefi-install-fails")
        .await
        .expect("topic");
    fixtures
        .insert_topic(author, category, "Wifi drops", "wifi-drops")
        .await
        .expect("topic");

    let response = forum.client.get("/search?q=uefi").dispatch().await;
    let results: SearchResponse = response.into_json().await.expect("search payload");
    assert_eq!(results.topics.len(), 1);
    assert_eq!(results.topics[0].topic.slug, "uefi-install-fails");

    let response = forum.client.get("/search?q=").dispatch().await;
    let results: SearchResponse = response.into_json().await.expect("search payload");
    assert!(results.topics.is_empty());
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let Some(forum) = forum().await else { return };
    let admin = forum.fixtures().insert_user("root@x.com", "Root", "admin").await.expect("user");

    let seed = || {
        forum
            .client
            .post("/api/admin/seed")
            .header(forum.token(admin, Role::Admin))
    };

    let first: SeedReport = seed().dispatch().await.into_json().await.expect("seed report");
    assert_eq!(first.categories_created, 3);
    assert_eq!(first.topics_created, 3);

    let second: SeedReport = seed().dispatch().await.into_json().await.expect("seed report");
    assert_eq!(second.categories_created, 0);
    assert_eq!(second.topics_created, 0);

    let response = forum.client.get("/categories/questions-help").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}
