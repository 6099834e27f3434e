//! Startup admin account and the default forum content.
//!
//! Everything here is idempotent: rows are keyed by email or slug and left
//! alone when they already exist.

use rocket_db_pools::sqlx::{self, PgPool};
use uuid::Uuid;

use crate::auth::accounts::{AccountStore, NewAccount};
use crate::auth::responses::{Provider, Role};
use crate::auth::{AuthError, PasswordService};
use crate::config::SeedAdminConfig;
use crate::error::ApiError;
use crate::models::{SeedReport, TopicKind};

pub struct CategorySeed {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub order: i32,
}

pub struct TopicSeed {
    pub title: &'static str,
    pub slug: &'static str,
    pub kind: TopicKind,
    pub category_slug: &'static str,
    pub content: &'static str,
    pub tags: &'static [&'static str],
}

const SAMPLE_AUTHOR_EMAIL: &str = "testuser@example.com";
const SAMPLE_AUTHOR_NAME: &str = "Test User";
const SAMPLE_AUTHOR_PASSWORD: &str = "password123";

pub fn default_categories() -> Vec<CategorySeed> {
    vec![
        CategorySeed {
            name: "Bug Reports",
            slug: "bug-reports",
            description: "Report bugs and issues you've encountered with TeaLinuxOS",
            order: 1,
        },
        CategorySeed {
            name: "Questions & Help",
            slug: "questions-help",
            description: "Ask questions and get help from the community",
            order: 2,
        },
        CategorySeed {
            name: "General Discussion",
            slug: "general-discussion",
            description: "Discuss anything related to TeaLinuxOS and Linux in general",
            order: 3,
        },
    ]
}

pub fn sample_topics() -> Vec<TopicSeed> {
    vec![
        TopicSeed {
            title: "Bug: System crashes when opening Settings",
            slug: "bug-system-crashes-when-opening-settings",
            kind: TopicKind::Bug,
            category_slug: "bug-reports",
            content: "I found a critical bug. When I try to open System Settings, the entire \
                      system freezes.\n\nSteps to reproduce:\n1. Click on Settings icon\n\
                      2. System freezes immediately\n3. Must force restart\n\n\
                      Expected: Settings opens normally\nActual: Complete system freeze\n\n\
                      System: TeaLinuxOS COSMIC, 8GB RAM, Intel HD Graphics",
            tags: &["bug", "critical", "settings", "cosmic"],
        },
        TopicSeed {
            title: "How to install TeaLinuxOS on UEFI system?",
            slug: "how-to-install-tealinux-on-uefi",
            kind: TopicKind::Question,
            category_slug: "questions-help",
            content: "I'm trying to install TeaLinuxOS on my laptop with UEFI. The installer \
                      doesn't seem to detect my hard drive. Any help would be appreciated!",
            tags: &["installation", "uefi", "help"],
        },
        TopicSeed {
            title: "TeaLinuxOS Performance vs Other Distros",
            slug: "tealinux-performance-comparison",
            kind: TopicKind::Discussion,
            category_slug: "general-discussion",
            content: "I've been using TeaLinuxOS for a month now. Compared to Ubuntu and Fedora, \
                      I'm getting much better performance especially on my older laptop. \
                      What's your experience?",
            tags: &["performance", "discussion", "comparison"],
        },
    ]
}

/// Create the configured admin account unless some admin already exists.
/// Returns whether an account was created.
pub async fn seed_admin(
    pool: &PgPool,
    accounts: &dyn AccountStore,
    passwords: &PasswordService,
    config: &SeedAdminConfig,
) -> Result<bool, AuthError> {
    let has_admin: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(pool)
            .await?;
    if has_admin {
        return Ok(false);
    }

    let account = NewAccount {
        name: config.name.clone(),
        email: config.email.trim().to_lowercase(),
        password_hash: Some(passwords.hash_password(&config.password)?),
        provider: Provider::Local,
        role: Role::Admin,
        avatar: String::new(),
    };

    match accounts.insert(account).await {
        Ok(admin) => {
            log::info!("seeded admin account {} ({})", admin.email, admin.id);
            Ok(true)
        }
        Err(AuthError::EmailTaken) => {
            log::warn!(
                "cannot seed admin: {} is already registered without the admin role",
                config.email
            );
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Insert the default categories and sample topics that are not there yet.
pub async fn seed_forum(
    pool: &PgPool,
    accounts: &dyn AccountStore,
    passwords: &PasswordService,
) -> Result<SeedReport, ApiError> {
    let mut report = SeedReport {
        categories_created: 0,
        topics_created: 0,
    };

    for category in default_categories() {
        let inserted = sqlx::query(
            r#"INSERT INTO categories (name, slug, description, sort_order)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (slug) DO NOTHING"#,
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .bind(category.order)
        .execute(pool)
        .await?;
        report.categories_created += inserted.rows_affected() as usize;
    }

    let author_id = sample_author(accounts, passwords).await?;

    for seed in sample_topics() {
        let category_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM categories WHERE slug = $1")
            .bind(seed.category_slug)
            .fetch_optional(pool)
            .await?;
        let Some(category_id) = category_id else {
            log::warn!("skipping sample topic {}: category {} missing", seed.slug, seed.category_slug);
            continue;
        };

        let mut tx = pool.begin().await?;

        let topic_id: Option<Uuid> = sqlx::query_scalar(
            r#"INSERT INTO topics (title, slug, kind, user_id, category_id)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (slug) DO NOTHING
               RETURNING id"#,
        )
        .bind(seed.title)
        .bind(seed.slug)
        .bind(seed.kind.as_str())
        .bind(author_id)
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(topic_id) = topic_id else {
            continue;
        };

        sqlx::query("INSERT INTO posts (topic_id, user_id, content) VALUES ($1, $2, $3)")
            .bind(topic_id)
            .bind(author_id)
            .bind(seed.content)
            .execute(&mut *tx)
            .await?;

        for tag in seed.tags {
            sqlx::query(
                r#"WITH tag AS (
                       INSERT INTO tags (name) VALUES ($2)
                       ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                       RETURNING id
                   )
                   INSERT INTO topic_tags (topic_id, tag_id)
                   SELECT $1, id FROM tag
                   ON CONFLICT DO NOTHING"#,
            )
            .bind(topic_id)
            .bind(*tag)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        report.topics_created += 1;
    }

    log::info!(
        "forum seed: {} categories and {} topics created",
        report.categories_created,
        report.topics_created
    );
    Ok(report)
}

async fn sample_author(accounts: &dyn AccountStore, passwords: &PasswordService) -> Result<i32, ApiError> {
    if let Some(existing) = accounts.find_by_email(SAMPLE_AUTHOR_EMAIL).await? {
        return Ok(existing.id);
    }

    let author = accounts
        .insert(NewAccount {
            name: SAMPLE_AUTHOR_NAME.to_string(),
            email: SAMPLE_AUTHOR_EMAIL.to_string(),
            password_hash: Some(passwords.hash_password(SAMPLE_AUTHOR_PASSWORD)?),
            provider: Provider::Local,
            role: Role::User,
            avatar: String::new(),
        })
        .await?;
    Ok(author.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::helpers::make_slug;

    #[test]
    fn category_slugs_match_their_names() {
        for category in default_categories() {
            let slug = make_slug(category.name);
            // "Questions & Help" collapses the ampersand run to one dash.
            assert_eq!(slug, category.slug);
        }
    }

    #[test]
    fn sample_topics_reference_seeded_categories() {
        let slugs: Vec<&str> = default_categories().iter().map(|c| c.slug).collect();
        for topic in sample_topics() {
            assert!(slugs.contains(&topic.category_slug), "{}", topic.slug);
            assert!(!topic.tags.is_empty());
        }
    }
}
