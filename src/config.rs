//! Process configuration read from the environment.
//!
//! A `.env` file is loaded first when present. Values that Rocket itself
//! consumes (port, database URL) are merged into its figment by
//! [`AppConfig::figment`].

use reqwest::Url;
use rocket::figment::Figment;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:4321",
    "http://localhost:4322",
    "http://localhost:4323",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub seed_admin: SeedAdminConfig,
}

/// Account created at startup when no admin exists yet.
#[derive(Debug, Clone)]
pub struct SeedAdminConfig {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Default for SeedAdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@tealinux.org".into(),
            password: "admin123".into(),
            name: "TeaLinux Admin".into(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => log::warn!("ignoring unreadable .env file: {}", err),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("APP_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("APP_PORT '{}' is not a port number, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let cors_allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let defaults = SeedAdminConfig::default();
        let seed_admin = SeedAdminConfig {
            email: var("SEED_ADMIN_EMAIL").unwrap_or(defaults.email),
            password: var("SEED_ADMIN_PASSWORD").unwrap_or(defaults.password),
            name: var("SEED_ADMIN_NAME").unwrap_or(defaults.name),
        };

        Self {
            port,
            database_url: database_url(&var),
            cors_allowed_origins,
            seed_admin,
        }
    }

    /// Rocket's default figment with the port and, when known, the pool URL.
    pub fn figment(&self) -> Figment {
        let figment = rocket::Config::figment().merge(("port", self.port));
        match &self.database_url {
            Some(url) => figment.merge(("databases.forum_db.url", url.as_str())),
            None => figment,
        }
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from `DB_*` parts
/// when at least `DB_HOST` is set.
fn database_url(var: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(url) = var("DATABASE_URL") {
        return Some(url);
    }

    let host = var("DB_HOST")?;
    let port = var("DB_PORT").unwrap_or_else(|| "5432".into());
    let user = var("DB_USER").unwrap_or_else(|| "postgres".into());
    let password = var("DB_PASSWORD").unwrap_or_default();
    let name = var("DB_NAME").unwrap_or_else(|| "forum".into());
    let sslmode = var("DB_SSLMODE").unwrap_or_else(|| "disable".into());

    let mut url = match Url::parse(&format!("postgres://{host}:{port}/{name}")) {
        Ok(url) => url,
        Err(err) => {
            log::warn!("cannot build a database URL from DB_HOST/DB_PORT/DB_NAME: {}", err);
            return None;
        }
    };
    // Setters percent-encode, so credentials may contain '@', '/' or '#'.
    if url.set_username(&user).is_err()
        || (!password.is_empty() && url.set_password(Some(&password)).is_err())
    {
        log::warn!("cannot set database credentials on {}", url);
        return None;
    }
    url.query_pairs_mut().append_pair("sslmode", &sslmode);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.cors_allowed_origins.len(), 3);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.seed_admin.email, "admin@tealinux.org");
    }

    #[test]
    fn database_url_is_assembled_from_parts() {
        let cfg = config(&[
            ("DB_HOST", "db"),
            ("DB_USER", "forum"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "forum_prod"),
        ]);
        assert_eq!(
            cfg.database_url.as_deref(),
            Some("postgres://forum:pw@db:5432/forum_prod?sslmode=disable")
        );
    }

    #[test]
    fn database_credentials_are_percent_encoded() {
        let cfg = config(&[
            ("DB_HOST", "db"),
            ("DB_USER", "forum"),
            ("DB_PASSWORD", "p@ss/w#rd"),
            ("DB_NAME", "forum_prod"),
        ]);
        let url = cfg.database_url.expect("database url");
        assert_eq!(
            url,
            "postgres://forum:p%40ss%2Fw%23rd@db:5432/forum_prod?sslmode=disable"
        );

        let parsed = Url::parse(&url).expect("valid url");
        assert_eq!(parsed.host_str(), Some("db"));
        assert_eq!(parsed.path(), "/forum_prod");
    }

    #[test]
    fn explicit_database_url_wins() {
        let cfg = config(&[("DATABASE_URL", "postgres://x/y"), ("DB_HOST", "db")]);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://x/y"));
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let cfg = config(&[("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,")]);
        assert_eq!(
            cfg.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        assert_eq!(config(&[("APP_PORT", "eighty")]).port, 3000);
        assert_eq!(config(&[("APP_PORT", "8080")]).port, 8080);
    }
}
