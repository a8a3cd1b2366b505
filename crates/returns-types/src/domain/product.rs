use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog fields as they arrive from the platform; the upsert payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductInput {
    pub shopify_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub product_type: Option<String>,
}

/// Local mirror of a catalog item, keyed by `shopify_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub shopify_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub product_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_input(input: ProductInput) -> anyhow::Result<Self> {
        if input.shopify_id.trim().is_empty() {
            anyhow::bail!("shopify_id empty");
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            shopify_id: input.shopify_id,
            title: input.title,
            description: input.description,
            price: input.price,
            image_url: input.image_url,
            product_type: input.product_type,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn matches(&self, input: &ProductInput) -> bool {
        self.shopify_id == input.shopify_id
            && self.title == input.title
            && self.description == input.description
            && self.price == input.price
            && self.image_url == input.image_url
            && self.product_type == input.product_type
    }

    /// Applies `input`, touching `updated_at` only when something changed.
    /// Returns whether the product was modified.
    pub fn apply(&mut self, input: ProductInput) -> bool {
        if self.matches(&input) {
            return false;
        }
        self.title = input.title;
        self.description = input.description;
        self.price = input.price;
        self.image_url = input.image_url;
        self.product_type = input.product_type;
        self.updated_at = Utc::now();
        true
    }

    /// Category used by return analytics; blank product types count as "Other".
    pub fn category(&self) -> &str {
        match self.product_type.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => "Other",
        }
    }
}
