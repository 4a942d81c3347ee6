use anyhow::Context;
use serde::Deserialize;
use sqlx::PgPool;
use std::path::Path;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::manager::DatabaseManager;

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    users: Vec<SeedUser>,
    #[serde(default)]
    prompts: Vec<SeedPrompt>,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    email: String,
    password: String,
    #[serde(default)]
    is_seller: bool,
}

#[derive(Debug, Deserialize)]
struct SeedPrompt {
    title: String,
    description: String,
    content: String,
    price_cents: i64,
    owner_email: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Idempotent fixture load: users are upserted by email; prompts are only
/// created when the catalog is still empty.
pub async fn handle(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let seed: SeedFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid fixture file {}", file.display()))?;

    let pool = DatabaseManager::pool().await?;
    DatabaseManager::migrate().await?;

    for user in &seed.users {
        let id = upsert_user(&pool, user).await?;
        println!("user {} -> {}", user.email, id);
    }

    let prompt_count: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM prompts")
        .fetch_one(&pool)
        .await?;
    if prompt_count > 0 {
        println!("prompts already present ({}), skipping prompt fixtures", prompt_count);
        return Ok(());
    }

    for prompt in &seed.prompts {
        let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&prompt.owner_email)
            .fetch_optional(&pool)
            .await?;
        let owner_id = owner_id
            .with_context(|| format!("owner {} not in fixture users", prompt.owner_email))?;

        let prompt_id: Uuid = sqlx::query_scalar(
            "INSERT INTO prompts (owner_id, title, description, content, price_cents) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(owner_id)
        .bind(&prompt.title)
        .bind(&prompt.description)
        .bind(&prompt.content)
        .bind(prompt.price_cents)
        .fetch_one(&pool)
        .await?;

        for tag in &prompt.tags {
            link_tag(&pool, prompt_id, tag).await?;
        }
        println!("prompt {:?} -> {}", prompt.title, prompt_id);
    }

    println!("Seed complete");
    Ok(())
}

async fn upsert_user(pool: &PgPool, user: &SeedUser) -> anyhow::Result<Uuid> {
    if let Some(id) = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&user.email)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    let password_hash = hash_password(&user.password).context("failed to hash password")?;
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, is_seller) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&user.email)
    .bind(&password_hash)
    .bind(user.is_seller)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn link_tag(pool: &PgPool, prompt_id: Uuid, name: &str) -> anyhow::Result<()> {
    let tag_id: Uuid = sqlx::query_scalar(
        "INSERT INTO tags (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(name.trim().to_lowercase())
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT INTO prompt_tags (prompt_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(prompt_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
    Ok(())
}
