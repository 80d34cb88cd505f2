use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    error::{AppError, Result},
    models::{PublicProduct, StorefrontResponse, User},
    queries::{product_queries, user_queries},
};

/// Public storefront view. The identifier is tried as a custom store slug
/// first, then as the email local-part; slug wins when both exist.
pub async fn get_storefront(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<StorefrontResponse>> {
    let user = resolve_vendor(&state, &identifier)
        .await?
        .ok_or_else(|| AppError::not_found("Store not found"))?;

    let products = product_queries::list_available_by_user(&state.db, &user.id)
        .await?
        .into_iter()
        .map(PublicProduct::from)
        .collect();

    let vendor_name = derive_vendor_name(user.store_name.as_deref(), &user.email);

    Ok(Json(StorefrontResponse {
        vendor_name,
        whatsapp_number: user.whatsapp_number,
        store_slug: user.store_slug,
        banner_url: user.banner_url,
        products,
    }))
}

async fn resolve_vendor(state: &AppState, identifier: &str) -> Result<Option<User>> {
    if let Some(user) = user_queries::find_by_store_slug(&state.db, identifier).await? {
        return Ok(Some(user));
    }

    user_queries::find_by_email_local_part(&state.db, identifier).await
}

/// Custom store name if set, otherwise the email local-part with `.`/`_`/`-`
/// normalized to spaces and title-cased.
fn derive_vendor_name(store_name: Option<&str>, email: &str) -> String {
    if let Some(name) = store_name {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    let local_part = email.split('@').next().unwrap_or(email);

    local_part
        .split(['.', '_', '-'])
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_name_wins_when_present() {
        assert_eq!(
            derive_vendor_name(Some("Awesome Wears"), "vendor1@example.com"),
            "Awesome Wears"
        );
    }

    #[test]
    fn blank_store_name_falls_back_to_email() {
        assert_eq!(
            derive_vendor_name(Some("   "), "vendor1@example.com"),
            "Vendor1"
        );
    }

    #[test]
    fn local_part_is_title_cased() {
        assert_eq!(derive_vendor_name(None, "vendor1@example.com"), "Vendor1");
        assert_eq!(
            derive_vendor_name(None, "john.doe@example.com"),
            "John Doe"
        );
        assert_eq!(
            derive_vendor_name(None, "cool_shop-lagos@example.com"),
            "Cool Shop Lagos"
        );
    }

    #[test]
    fn consecutive_separators_do_not_leave_gaps() {
        assert_eq!(
            derive_vendor_name(None, "a..b__c@example.com"),
            "A B C"
        );
    }
}
