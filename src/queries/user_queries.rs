use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::Result, models::User};

pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    whatsapp_number: &str,
) -> Result<User> {
    let id = format!("user_{}", Uuid::new_v4().simple());

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password, whatsapp_number) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&id)
    .bind(email)
    .bind(password_hash)
    .bind(whatsapp_number)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_by_store_slug(pool: &PgPool, slug: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE store_slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Find a user whose email local-part (the text before `@`) matches exactly.
pub async fn find_by_email_local_part(pool: &PgPool, local_part: &str) -> Result<Option<User>> {
    let pattern = format!("{}@%", escape_like(local_part));

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email LIKE $1 ESCAPE '\\'")
        .bind(&pattern)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn update_store(
    pool: &PgPool,
    user_id: &str,
    store_name: Option<&str>,
    store_slug: Option<&str>,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users
         SET store_name = COALESCE($2, store_name),
             store_slug = COALESCE($3, store_slug),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(store_name)
    .bind(store_slug)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn update_banner(pool: &PgPool, user_id: &str, banner_url: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET banner_url = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(banner_url)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Escape LIKE metacharacters so a local-part like `a_b` does not match `aXb`.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
