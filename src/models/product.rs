use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const IMAGE_SLOT_COUNT: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
    pub image_url_1: Option<String>,
    pub image_url_2: Option<String>,
    pub image_url_3: Option<String>,
    pub image_url_4: Option<String>,
    pub image_url_5: Option<String>,
    pub click_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn image_url(&self, slot: u8) -> Option<&str> {
        let url = match slot {
            1 => &self.image_url_1,
            2 => &self.image_url_2,
            3 => &self.image_url_3,
            4 => &self.image_url_4,
            5 => &self.image_url_5,
            _ => return None,
        };
        url.as_deref()
    }

    /// Non-null image URLs in slot order.
    pub fn image_urls(&self) -> Vec<String> {
        (1..=IMAGE_SLOT_COUNT)
            .filter_map(|slot| self.image_url(slot).map(str::to_string))
            .collect()
    }
}

/// Partial patch payload: `None` means the field was not sent and must not
/// be touched.
#[derive(Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub is_available: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.is_available.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct ClickTrackingResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    pub url: String,
    pub key: String,
    pub storage_type: String,
    pub image_slot: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with_slots(slots: [Option<&str>; 5]) -> Product {
        Product {
            id: "product_1".to_string(),
            user_id: "user_1".to_string(),
            name: "Test".to_string(),
            description: None,
            price: Decimal::new(500, 2),
            is_available: true,
            image_url_1: slots[0].map(str::to_string),
            image_url_2: slots[1].map(str::to_string),
            image_url_3: slots[2].map(str::to_string),
            image_url_4: slots[3].map(str::to_string),
            image_url_5: slots[4].map(str::to_string),
            click_count: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn image_urls_flatten_in_slot_order() {
        let product = product_with_slots([None, Some("/uploads/b.png"), None, Some("/uploads/d.png"), None]);
        assert_eq!(product.image_urls(), vec!["/uploads/b.png", "/uploads/d.png"]);
    }

    #[test]
    fn image_url_rejects_out_of_range_slot() {
        let product = product_with_slots([Some("/uploads/a.png"), None, None, None, None]);
        assert!(product.image_url(0).is_none());
        assert!(product.image_url(6).is_none());
        assert_eq!(product.image_url(1), Some("/uploads/a.png"));
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch {
            name: Some("New".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
