use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde_json::json;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{RegisterRequest, RegisterResponse, StoreUpdateRequest, User, UserProfile},
    queries::user_queries,
    services::{BANNER_IMAGE_CATEGORY, ImageSlot, MAX_BANNER_IMAGE_BYTES},
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    validate_registration(&payload)?;

    if user_queries::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))?;

    let user = user_queries::create_user(
        &state.db,
        &payload.email,
        &password_hash,
        &payload.whatsapp_number,
    )
    .await
    .map_err(|e| match e {
        // unique constraint can still fire under concurrent registration
        AppError::Conflict(_) => AppError::Conflict("Email already registered".to_string()),
        other => other,
    })?;

    tracing::info!("Registered new vendor: {}", user.id);

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserProfile> {
    Json(user.into())
}

pub async fn update_store(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<StoreUpdateRequest>,
) -> Result<Json<UserProfile>> {
    let store_name = payload
        .store_name
        .as_deref()
        .map(normalize_store_name)
        .transpose()?;
    let store_slug = payload
        .store_slug
        .as_deref()
        .map(normalize_store_slug)
        .transpose()?;

    let updated = user_queries::update_store(
        &state.db,
        &user.id,
        store_name.as_deref(),
        store_slug.as_deref(),
    )
    .await
    .map_err(|e| match e {
        AppError::Conflict(_) => AppError::Conflict("Store slug already taken".to_string()),
        other => other,
    })?;

    Ok(Json(updated.into()))
}

pub async fn upload_banner(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() == Some("image") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| AppError::BadRequest("Image file is missing".to_string()))?;
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            upload = Some((filename, content_type, bytes.to_vec()));
        }
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("Image file is required".to_string()))?;

    let stored = state
        .storage
        .store(
            BANNER_IMAGE_CATEGORY,
            &user.id,
            ImageSlot::Banner,
            &filename,
            content_type.as_deref(),
            &bytes,
            MAX_BANNER_IMAGE_BYTES,
        )
        .await?;

    // replace, not accumulate
    if let Some(old) = &user.banner_url {
        if *old != stored.url {
            state.storage.delete(old).await;
        }
    }

    user_queries::update_banner(&state.db, &user.id, &stored.url).await?;

    Ok(Json(json!({
        "url": stored.url,
        "storage_type": stored.storage_type,
    })))
}

fn validate_registration(payload: &RegisterRequest) -> Result<()> {
    let email = payload.email.trim();
    if email.is_empty() || !is_plausible_email(email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    if payload.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if !is_valid_whatsapp_number(&payload.whatsapp_number) {
        return Err(AppError::BadRequest(
            "WhatsApp number must be 10 to 15 digits".to_string(),
        ));
    }

    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// `^[0-9]{10,15}$`
fn is_valid_whatsapp_number(number: &str) -> bool {
    (10..=15).contains(&number.len()) && number.bytes().all(|b| b.is_ascii_digit())
}

fn normalize_store_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Store name cannot be empty".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(AppError::BadRequest(
            "Store name must be at most 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn normalize_store_slug(slug: &str) -> Result<String> {
    let slug = slug.trim().to_lowercase();
    if !(3..=50).contains(&slug.len()) {
        return Err(AppError::BadRequest(
            "Store slug must be between 3 and 50 characters".to_string(),
        ));
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(AppError::BadRequest(
            "Store slug may only contain letters, numbers and hyphens".to_string(),
        ));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, whatsapp: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            whatsapp_number: whatsapp.to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        let payload = request("vendor1@example.com", "pw12345678", "2348012345678");
        assert!(validate_registration(&payload).is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        let payload = request("vendor1@example.com", "short", "2348012345678");
        assert!(matches!(
            validate_registration(&payload),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn whatsapp_number_must_be_ten_to_fifteen_digits() {
        for bad in ["123456789", "1234567890123456", "23480123456a", "+23480123456"] {
            let payload = request("vendor1@example.com", "pw12345678", bad);
            assert!(
                validate_registration(&payload).is_err(),
                "expected rejection for {:?}",
                bad
            );
        }

        let payload = request("vendor1@example.com", "pw12345678", "1234567890");
        assert!(validate_registration(&payload).is_ok());
    }

    #[test]
    fn bad_emails_are_rejected() {
        for bad in ["", "no-at-sign", "@nodomain.com", "user@nodot"] {
            let payload = request(bad, "pw12345678", "2348012345678");
            assert!(
                validate_registration(&payload).is_err(),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn store_slug_is_lowercased_and_validated() {
        assert_eq!(normalize_store_slug(" Shop1 ").unwrap(), "shop1");
        assert_eq!(normalize_store_slug("my-store").unwrap(), "my-store");
        assert!(normalize_store_slug("ab").is_err());
        assert!(normalize_store_slug("has space").is_err());
        assert!(normalize_store_slug("under_score").is_err());
    }

    #[test]
    fn store_name_must_not_be_blank() {
        assert!(normalize_store_name("   ").is_err());
        assert_eq!(normalize_store_name(" My Shop ").unwrap(), "My Shop");
    }
}
