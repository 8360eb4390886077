//! create_user
//!
//! Inserts one user account. There is no registration page, so this is how teachers
//! and students get into the portal.

use clap::Parser;
use lms_portal::{
    auth,
    config::AppConfig,
    models::{NewUser, Role},
    repository::{PostgresRepository, Repository},
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "create_user")]
#[command(version, about = "Create an LMS portal user", long_about = None)]
struct Cli {
    /// Login email address
    #[arg(long)]
    email: String,

    /// Login phone number
    #[arg(long)]
    phone: String,

    /// Plaintext password, stored as an Argon2id hash
    #[arg(long)]
    password: String,

    /// teacher or student
    #[arg(long, default_value = "student")]
    role: Role,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "create_user=info,lms_portal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(config.connect_options()?)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = PostgresRepository::new(pool);
    let user = repo
        .create_user(NewUser {
            email: cli.email,
            phone: cli.phone,
            password_hash: auth::hash_password(&cli.password)?,
            role: cli.role,
        })
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, role = %user.role, "user created");
    println!("✅ User created successfully! (id {})", user.id);
    Ok(())
}
