use serde::{Deserialize, Serialize};

/// Normalized product handed to the pricing engine and stored in the cache.
///
/// `price` 0 means "no usable offer", `sales_rank` 0 means "unranked".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub title: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub sales_rank: u64,
    pub category: String,
    pub identifier: String,
}

impl ProductRecord {
    pub fn has_usable_price(&self) -> bool {
        self.price > 0.0
    }
}
