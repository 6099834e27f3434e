use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use forum_api::auth::credentials::normalize_email;
use forum_api::auth::passwords::PasswordService;
use forum_api::auth::responses::Role;
use forum_api::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a local forum account")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Display name shown next to the account's posts.
    #[arg(long, default_value = "")]
    name: String,

    /// Role to assign (`user`, `moderator` or `admin`).
    #[arg(long, default_value = "user")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = normalize_email(&args.email);

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    let role: Role = match args.role.trim().to_lowercase().parse() {
        Ok(role) => role,
        Err(_) => {
            writeln!(
                io::stderr(),
                "error: unsupported role '{}'. Use 'user', 'moderator' or 'admin'.",
                args.role
            )?;
            std::process::exit(1);
        }
    };

    let database_url = AppConfig::from_env()
        .database_url
        .ok_or("set DATABASE_URL or DB_HOST to reach the database")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await?;

    if existing > 0 {
        writeln!(
            io::stderr(),
            "error: a user with email '{email}' already exists."
        )?;
        std::process::exit(1);
    }

    let password_service = PasswordService::new()?;
    let password_hash = password_service.hash_password(&args.password)?;

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash, provider, role) \
         VALUES ($1, $2, $3, 'local', $4) RETURNING id",
    )
    .bind(args.name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(&pool)
    .await?;

    println!("Created {} user '{email}' with id {user_id}", role.as_str());
    Ok(())
}
