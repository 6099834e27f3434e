use rocket_db_pools::sqlx::migrate::{MigrateError, Migrator};
use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("forum_db")]
pub struct ForumDb(sqlx::PgPool);

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations from `migrations/`.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// SQLSTATE 23505: a unique index rejected the write.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

/// SQLSTATE 23503: the write referenced a row that does not exist.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503")
    )
}

/// SQLSTATE 22001: a value is longer than its column allows.
pub fn is_value_too_long(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("22001")
    )
}
