use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{Product, ProductPatch},
};

pub async fn create_product(
    conn: &mut PgConnection,
    user_id: &str,
    name: &str,
    description: Option<&str>,
    price: Decimal,
    is_available: bool,
) -> Result<Product> {
    let id = format!("product_{}", Uuid::new_v4().simple());

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, user_id, name, description, price, is_available)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&id)
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(is_available)
    .fetch_one(conn)
    .await?;

    Ok(product)
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(product)
}

/// Fetch a product the caller must own. A missing row and an ownership
/// mismatch both surface as 404, tagged apart for logging only.
pub async fn find_owned(pool: &PgPool, id: &str, user_id: &str) -> Result<Product> {
    let product = find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if product.user_id != user_id {
        return Err(AppError::not_owned("Product not found"));
    }

    Ok(product)
}

pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(products)
}

pub async fn list_available_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products
         WHERE user_id = $1 AND is_available = TRUE
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(products)
}

/// Apply a partial patch: absent fields keep their stored value.
pub async fn apply_patch(
    conn: &mut PgConnection,
    id: &str,
    patch: &ProductPatch,
) -> Result<Product> {
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products
         SET name = COALESCE($2, name),
             description = COALESCE($3, description),
             price = COALESCE($4, price),
             is_available = COALESCE($5, is_available),
             updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(patch.name.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.price)
    .bind(patch.is_available)
    .fetch_one(conn)
    .await?;

    Ok(product)
}

pub async fn set_image_url(
    conn: &mut PgConnection,
    id: &str,
    slot: u8,
    url: &str,
) -> Result<Product> {
    let column = image_column(slot)?;

    let query = format!(
        "UPDATE products SET {} = $2, updated_at = now() WHERE id = $1 RETURNING *",
        column
    );

    let product = sqlx::query_as::<_, Product>(&query)
        .bind(id)
        .bind(url)
        .fetch_one(conn)
        .await?;

    Ok(product)
}

pub async fn delete_product(pool: &PgPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Atomic increment; returns the new count, or `None` if the product
/// does not exist.
pub async fn increment_click_count(pool: &PgPool, id: &str) -> Result<Option<i32>> {
    let count: Option<(i32,)> = sqlx::query_as(
        "UPDATE products SET click_count = click_count + 1 WHERE id = $1 RETURNING click_count",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(count.map(|(c,)| c))
}

fn image_column(slot: u8) -> Result<&'static str> {
    match slot {
        1 => Ok("image_url_1"),
        2 => Ok("image_url_2"),
        3 => Ok("image_url_3"),
        4 => Ok("image_url_4"),
        5 => Ok("image_url_5"),
        _ => Err(AppError::BadRequest(
            "Image slot must be between 1 and 5".to_string(),
        )),
    }
}
