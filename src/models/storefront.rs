use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Product;

#[derive(Debug, Serialize)]
pub struct PublicProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
    pub image_urls: Vec<String>,
}

impl From<Product> for PublicProduct {
    fn from(product: Product) -> Self {
        let image_urls = product.image_urls();
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            is_available: product.is_available,
            image_urls,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StorefrontResponse {
    pub vendor_name: String,
    pub whatsapp_number: String,
    pub store_slug: Option<String>,
    pub banner_url: Option<String>,
    pub products: Vec<PublicProduct>,
}
