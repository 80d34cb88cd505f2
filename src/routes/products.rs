use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{ClickTrackingResponse, ImageUploadResponse, Product, ProductPatch, User},
    queries::product_queries,
    services::{ImageSlot, MAX_PRODUCT_IMAGE_BYTES, PRODUCT_IMAGE_CATEGORY},
};

struct UploadedImage {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Multipart product form. Absent fields stay `None`, which is what gives
/// updates their partial-patch semantics.
#[derive(Default)]
struct ProductForm {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    is_available: Option<bool>,
    images: Vec<(u8, UploadedImage)>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>)> {
    let form = parse_product_form(multipart).await?;

    let name = form
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Product name is required".to_string()))?;
    let price = form
        .price
        .ok_or_else(|| AppError::BadRequest("Price is required".to_string()))?;
    let is_available = form.is_available.unwrap_or(true);

    // Row insert and image attachment share one transaction: a failed image
    // store aborts the whole creation.
    let mut tx = state.db.begin().await?;

    let mut product = product_queries::create_product(
        &mut tx,
        &user.id,
        name,
        form.description.as_deref(),
        price,
        is_available,
    )
    .await?;

    let product_id = product.id.clone();
    let mut stored_urls: Vec<String> = Vec::new();
    let mut failure: Option<AppError> = None;

    for (slot, image) in &form.images {
        let attach = async {
            let stored = state
                .storage
                .store(
                    PRODUCT_IMAGE_CATEGORY,
                    &product_id,
                    ImageSlot::Product(*slot),
                    &image.filename,
                    image.content_type.as_deref(),
                    &image.bytes,
                    MAX_PRODUCT_IMAGE_BYTES,
                )
                .await?;
            stored_urls.push(stored.url.clone());
            product_queries::set_image_url(&mut tx, &product_id, *slot, &stored.url).await
        };

        match attach.await {
            Ok(updated) => product = updated,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if let Some(err) = failure {
        tx.rollback().await.ok();
        for url in &stored_urls {
            state.storage.delete(url).await;
        }
        return Err(err);
    }

    tx.commit().await?;

    tracing::info!("Product created: {} by user {}", product.id, user.id);

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Product>>> {
    let products = product_queries::list_by_user(&state.db, &user.id).await?;

    Ok(Json(products))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let existing = product_queries::find_owned(&state.db, &id, &user.id).await?;

    let form = parse_product_form(multipart).await?;

    if let Some(name) = form.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Product name cannot be empty".to_string(),
            ));
        }
    }

    let patch = ProductPatch {
        name: form.name.map(|n| n.trim().to_string()),
        description: form.description,
        price: form.price,
        is_available: form.is_available,
    };

    let mut tx = state.db.begin().await?;

    let mut product = if patch.is_empty() {
        existing.clone()
    } else {
        product_queries::apply_patch(&mut tx, &id, &patch).await?
    };

    let product_id = product.id.clone();
    let mut stored_urls: Vec<String> = Vec::new();
    let mut failure: Option<AppError> = None;

    for (slot, image) in &form.images {
        // the replaced slot's old object goes first
        if let Some(old_url) = existing.image_url(*slot) {
            state.storage.delete(old_url).await;
        }

        let attach = async {
            let stored = state
                .storage
                .store(
                    PRODUCT_IMAGE_CATEGORY,
                    &product_id,
                    ImageSlot::Product(*slot),
                    &image.filename,
                    image.content_type.as_deref(),
                    &image.bytes,
                    MAX_PRODUCT_IMAGE_BYTES,
                )
                .await?;
            stored_urls.push(stored.url.clone());
            product_queries::set_image_url(&mut tx, &product_id, *slot, &stored.url).await
        };

        match attach.await {
            Ok(updated) => product = updated,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if let Some(err) = failure {
        tx.rollback().await.ok();
        for url in &stored_urls {
            state.storage.delete(url).await;
        }
        return Err(err);
    }

    tx.commit().await?;

    Ok(Json(product))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let product = product_queries::find_owned(&state.db, &id, &user.id).await?;

    // best-effort: a failed object delete never blocks removing the row
    for url in product.image_urls() {
        state.storage.delete(&url).await;
    }

    product_queries::delete_product(&state.db, &id).await?;

    tracing::info!("Product deleted: {} by user {}", id, user.id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn track_click(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClickTrackingResponse>> {
    product_queries::increment_click_count(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(ClickTrackingResponse {
        message: "Click tracked successfully".to_string(),
    }))
}

pub async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>> {
    let product = product_queries::find_owned(&state.db, &id, &user.id).await?;

    let mut image: Option<UploadedImage> = None;
    let mut slot: Option<u8> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        match field.name() {
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("Image file is missing".to_string()))?;
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
                image = Some(UploadedImage {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("image_slot") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {}", e)))?;
                slot = Some(text.trim().parse().map_err(|_| {
                    AppError::BadRequest("Image slot must be between 1 and 5".to_string())
                })?);
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::BadRequest("Image file is required".to_string()))?;
    let slot = slot.ok_or_else(|| AppError::BadRequest("Image slot is required".to_string()))?;

    if !(1..=5).contains(&slot) {
        return Err(AppError::BadRequest(
            "Image slot must be between 1 and 5".to_string(),
        ));
    }

    if let Some(old_url) = product.image_url(slot) {
        state.storage.delete(old_url).await;
    }

    let stored = state
        .storage
        .store(
            PRODUCT_IMAGE_CATEGORY,
            &product.id,
            ImageSlot::Product(slot),
            &image.filename,
            image.content_type.as_deref(),
            &image.bytes,
            MAX_PRODUCT_IMAGE_BYTES,
        )
        .await?;

    let mut conn = state.db.acquire().await?;
    product_queries::set_image_url(&mut conn, &id, slot, &stored.url).await?;

    Ok(Json(ImageUploadResponse {
        url: stored.url,
        key: stored.key,
        storage_type: stored.storage_type.to_string(),
        image_slot: slot,
    }))
}

async fn parse_product_form(mut multipart: Multipart) -> Result<ProductForm> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "name" => {
                form.name = Some(read_text(field).await?);
            }
            "description" => {
                form.description = Some(read_text(field).await?);
            }
            "price" => {
                form.price = Some(parse_price(&read_text(field).await?)?);
            }
            "is_available" => {
                form.is_available = Some(parse_bool(&read_text(field).await?)?);
            }
            _ => {
                if let Some(slot) = image_field_slot(&name) {
                    // fields uploaded without a file are ignored
                    let Some(filename) = field.file_name().map(str::to_string) else {
                        continue;
                    };
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read upload: {}", e))
                    })?;
                    form.images.push((
                        slot,
                        UploadedImage {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    ));
                }
            }
        }
    }

    form.images.sort_by_key(|(slot, _)| *slot);

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read field: {}", e)))
}

fn image_field_slot(field_name: &str) -> Option<u8> {
    let slot: u8 = field_name.strip_prefix("image_")?.parse().ok()?;
    (1..=5).contains(&slot).then_some(slot)
}

fn parse_price(text: &str) -> Result<Decimal> {
    let price = Decimal::from_str(text.trim())
        .map_err(|_| AppError::BadRequest("Invalid price".to_string()))?;

    if price <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Price must be greater than 0".to_string(),
        ));
    }

    Ok(price)
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "Invalid boolean value: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_must_be_positive() {
        assert!(parse_price("25.99").is_ok());
        assert!(matches!(parse_price("0"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_price("-5"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_price("abc"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn price_keeps_decimal_precision() {
        assert_eq!(parse_price("19.90").unwrap().to_string(), "19.90");
    }

    #[test]
    fn booleans_accept_form_style_values() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("yes").is_err());
    }

    #[test]
    fn image_field_names_map_to_slots() {
        assert_eq!(image_field_slot("image_1"), Some(1));
        assert_eq!(image_field_slot("image_5"), Some(5));
        assert_eq!(image_field_slot("image_6"), None);
        assert_eq!(image_field_slot("image_0"), None);
        assert_eq!(image_field_slot("banner"), None);
    }
}
