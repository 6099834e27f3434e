#[macro_use]
extern crate rocket;

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod seed_data;

use crate::auth::{AuthConfig, AuthState, PgAccountStore};
use crate::config::AppConfig;
use crate::db::ForumDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every documented route, plus `/openapi.json` describing them.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        // Health
        routes::health::health_check,
        // Auth
        auth::routes::register,
        auth::routes::login,
        auth::routes::refresh,
        auth::routes::logout,
        auth::routes::me,
        // Categories
        routes::categories::list_categories,
        routes::categories::get_category,
        routes::categories::create_category,
        routes::categories::update_category,
        routes::categories::delete_category,
        // Topics
        routes::topics::list_topics,
        routes::topics::get_topic,
        routes::topics::list_topic_posts,
        routes::topics::create_topic,
        routes::topics::update_topic,
        routes::topics::delete_topic,
        // Posts
        routes::posts::create_post,
        routes::posts::update_post,
        routes::posts::delete_post,
        routes::posts::like_post,
        routes::posts::unlike_post,
        // Search
        routes::search::search_topics,
        // Downloads
        routes::downloads::track_download,
        routes::downloads::download_stats,
        routes::downloads::download_history,
        // Admin
        routes::admin::dashboard_stats,
        routes::admin::list_users,
        routes::admin::update_user_role,
        routes::admin::delete_user,
        routes::admin::lock_topic,
        routes::admin::unlock_topic,
        routes::admin::pin_topic,
        routes::admin::unpin_topic,
        routes::admin::delete_any_post,
        routes::admin::delete_any_category,
        routes::admin::seed_forum,
    ]
}

/// OAuth redirects; browsers follow these, so they stay out of the API docs.
pub fn oauth_routes() -> Vec<Route> {
    routes![
        auth::routes::google_login,
        auth::routes::google_callback,
        auth::routes::github_login,
        auth::routes::github_callback,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let app_config = AppConfig::from_env();
    if app_config.database_url.is_none() {
        log::warn!("no DATABASE_URL or DB_HOST set; relying on Rocket.toml for databases.forum_db");
    }

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&app_config.cors_allowed_origins))
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
                Method::Options,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    let seed_admin = app_config.seed_admin.clone();

    rocket::custom(app_config.figment())
        .attach(RequestLogger)
        .attach(ForumDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match ForumDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match db::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Clone the pool into managed state for handlers and the auth store
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool and Auth State",
            |rocket| async move {
                let pool = match ForumDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => return Err(rocket),
                };

                let auth_state = match AuthConfig::from_env()
                    .and_then(|config| AuthState::new(config, Arc::new(PgAccountStore::new(pool.clone()))))
                {
                    Ok(state) => state,
                    Err(err) => {
                        log::error!("failed to initialise auth: {}", err);
                        return Err(rocket);
                    }
                };

                if auth_state.config.google.is_none() {
                    log::info!("google login disabled: GOOGLE_CLIENT_ID not set");
                }
                if auth_state.config.github.is_none() {
                    log::info!("github login disabled: GITHUB_CLIENT_ID not set");
                }

                Ok(rocket.manage(pool).manage(auth_state))
            },
        ))
        .attach(AdHoc::on_liftoff("Seed Admin Account", move |rocket| {
            Box::pin(async move {
                let (Some(pool), Some(auth)) =
                    (rocket.state::<PgPool>(), rocket.state::<AuthState>())
                else {
                    log::error!("cannot seed admin: pool or auth state missing");
                    return;
                };

                if let Err(err) = seed_data::seed_admin(
                    pool,
                    auth.accounts.as_ref(),
                    auth.passwords.as_ref(),
                    &seed_admin,
                )
                .await
                {
                    log::error!("admin seeding failed: {}", err);
                }
            })
        }))
        .mount("/", api_routes())
        .mount("/", oauth_routes())
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Forum API", "/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .register("/", routes::catchers::all())
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use chrono::Utc;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::auth::accounts::{Account, AccountStore, NewAccount};
    use crate::auth::{AuthConfig, AuthError, AuthResult, AuthState};
    use crate::routes::catchers;

    pub use database::{TestDatabase, TestDatabaseError};

    /// Secret shared by test tokens.
    pub const TEST_JWT_SECRET: &str = "forum-test-secret";

    /// Auth state over an in-memory account store, with no OAuth providers.
    pub fn memory_auth_state() -> (AuthState, Arc<MemoryAccountStore>) {
        let store = Arc::new(MemoryAccountStore::default());
        let state = AuthState::new(AuthConfig::with_secret(TEST_JWT_SECRET), store.clone())
            .expect("auth state builds from a static secret");
        (state, store)
    }

    /// Account store kept in a vector, for route tests that need no database.
    #[derive(Default)]
    pub struct MemoryAccountStore {
        accounts: Mutex<Vec<Account>>,
    }

    impl MemoryAccountStore {
        pub async fn len(&self) -> usize {
            self.accounts.lock().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.len().await == 0
        }
    }

    #[rocket::async_trait]
    impl AccountStore for MemoryAccountStore {
        async fn find_by_id(&self, id: i32) -> AuthResult<Option<Account>> {
            let accounts = self.accounts.lock().await;
            Ok(accounts.iter().find(|account| account.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
            let accounts = self.accounts.lock().await;
            Ok(accounts.iter().find(|account| account.email == email).cloned())
        }

        async fn insert(&self, account: NewAccount) -> AuthResult<Account> {
            let mut accounts = self.accounts.lock().await;
            if accounts.iter().any(|existing| existing.email == account.email) {
                return Err(AuthError::EmailTaken);
            }

            let stored = Account {
                id: accounts.len() as i32 + 1,
                name: account.name,
                email: account.email,
                password_hash: account.password_hash,
                provider: account.provider,
                role: account.role,
                avatar: account.avatar,
                refresh_token: None,
                created_at: Utc::now(),
            };
            accounts.push(stored.clone());
            Ok(stored)
        }

        async fn store_refresh_token(&self, id: i32, token: Option<&str>) -> AuthResult<()> {
            let mut accounts = self.accounts.lock().await;
            let account = accounts
                .iter_mut()
                .find(|account| account.id == id)
                .ok_or(AuthError::AccountNotFound)?;
            account.refresh_token = token.map(str::to_string);
            Ok(())
        }

        async fn rotate_refresh_token(&self, id: i32, current: &str, next: &str) -> AuthResult<bool> {
            let mut accounts = self.accounts.lock().await;
            match accounts.iter_mut().find(|account| account.id == id) {
                Some(account) if account.refresh_token.as_deref() == Some(current) => {
                    account.refresh_token = Some(next.to_string());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    /// Convenience helpers for seeding forum tables in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a local account with the given role, returning its id.
        pub async fn insert_user(&self, email: &str, name: &str, role: &str) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (name, email, provider, role) VALUES ($1, $2, 'local', $3) RETURNING id",
            )
            .bind(name)
            .bind(email)
            .bind(role)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_category(&self, name: &str, slug: &str) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar("INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id")
                .bind(name)
                .bind(slug)
                .fetch_one(self.pool)
                .await
        }

        /// Insert a topic with one opening post by its author.
        pub async fn insert_topic(
            &self,
            user_id: i32,
            category_id: Uuid,
            title: &str,
            slug: &str,
        ) -> Result<(Uuid, Uuid), sqlx::Error> {
            let topic_id: Uuid = sqlx::query_scalar(
                "INSERT INTO topics (title, slug, user_id, category_id) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(title)
            .bind(slug)
            .bind(user_id)
            .bind(category_id)
            .fetch_one(self.pool)
            .await?;

            let post_id: Uuid = sqlx::query_scalar(
                "INSERT INTO posts (topic_id, user_id, content) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(topic_id)
            .bind(user_id)
            .bind(format!("opening post of {title}"))
            .fetch_one(self.pool)
            .await?;

            Ok((topic_id, post_id))
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        impl TestDatabaseError {
            /// True when no Postgres could be reached at all, e.g. Docker is
            /// not running. Tests skip rather than fail in that case.
            pub fn is_unavailable(&self) -> bool {
                matches!(self, TestDatabaseError::Container(_))
            }
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Use the server at `TEST_DATABASE_URL` when set, otherwise
            /// launch a disposable Postgres container.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) if !url.is_empty() => Self::with_server(&url, None).await,
                    _ => Self::new().await,
                }
            }

            /// Provision a fresh database inside a new Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag("16-alpine").start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::with_server(&admin_url, Some(container)).await
            }

            async fn with_server(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database_with_fallback(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(admin_options, &db_name)
                                        .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        routes: Vec<Route>,
        pg_pool: Option<PgPool>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                ..Default::default()
            }
        }

        /// Mount routes at `/`; handlers carry their full paths.
        pub fn mount_routes(mut self, routes: Vec<Route>) -> Self {
            self.routes.extend(routes);
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage the auth state read by the request guards and auth routes.
        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Finish building the Rocket instance, with the JSON catchers registered.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .mount("/", self.routes)
                .register("/", catchers::all());

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }
            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
