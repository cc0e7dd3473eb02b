use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

use super::{
    lenient_f64, lenient_u64, truncate_for_log, BuyBoxOffer, LookupStrategy, MarketOffer,
    ProviderAdapter, ProviderError, RankEntry, RawProductPayload,
};
use crate::config::RainforestSettings;

pub const PROVIDER_NAME: &str = "rainforest";

/// Rainforest product data API.
///
/// Single-call provider: `GET /request?type=product` accepts either `asin=`
/// or `gtin=`, so UPC and 979 ISBN-13 codes resolve without a search step.
/// The API key travels as a query parameter and is never logged.
#[derive(Clone)]
pub struct RainforestProvider {
    base_url: String,
    amazon_domain: String,
    api_key: String,
    http: Client,
}

impl fmt::Debug for RainforestProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RainforestProvider")
            .field("base_url", &self.base_url)
            .field("amazon_domain", &self.amazon_domain)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    success: Option<bool>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    request_info: Option<RequestInfo>,
    product: Option<Product>,
    #[serde(default)]
    offers: Vec<OfferItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search_results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    asin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Product {
    asin: Option<String>,
    title: Option<String>,
    main_image: Option<Link>,
    buybox_winner: Option<BuyBoxWinner>,
    #[serde(default)]
    bestsellers_rank: Vec<BestsellerRank>,
    bestsellers_rank_flat: Option<String>,
    #[serde(default)]
    categories: Vec<CategoryItem>,
}

#[derive(Debug, Deserialize)]
struct Link {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Money {
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    title: Option<String>,
    is_new: Option<bool>,
}

impl Condition {
    fn text(self) -> Option<String> {
        self.title.or(match self.is_new {
            Some(true) => Some("New".to_string()),
            Some(false) => Some("Used".to_string()),
            None => None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BuyBoxWinner {
    price: Option<Money>,
    condition: Option<Condition>,
}

#[derive(Debug, Deserialize)]
struct OfferItem {
    price: Option<Money>,
    condition: Option<Condition>,
}

#[derive(Debug, Deserialize)]
struct BestsellerRank {
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    rank: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CategoryItem {
    name: Option<String>,
}

fn build_payload(product: Product, offers: Vec<OfferItem>) -> RawProductPayload {
    RawProductPayload {
        identifier: product.asin.filter(|s| !s.trim().is_empty()),
        title: product.title.filter(|s| !s.trim().is_empty()),
        image_url: product.main_image.and_then(|i| i.link),
        buybox: product
            .buybox_winner
            .map(|w| BuyBoxOffer {
                price: w.price.and_then(|p| p.value),
                condition: w.condition.and_then(Condition::text),
            })
            .into_iter()
            .collect(),
        price_buybox: None,
        price: None,
        offers: offers
            .into_iter()
            .map(|o| MarketOffer {
                price: o.price.and_then(|p| p.value),
                condition: o.condition.and_then(Condition::text),
            })
            .collect(),
        sales_rank: product
            .bestsellers_rank
            .into_iter()
            .map(|r| RankEntry {
                rank: r.rank,
                ladder: r.category.into_iter().collect(),
            })
            .collect(),
        sales_rank_text: product.bestsellers_rank_flat,
        categories: product
            .categories
            .into_iter()
            .filter_map(|c| c.name)
            .filter(|n| !n.trim().is_empty())
            .collect(),
    }
}

impl RainforestProvider {
    pub fn new(settings: &RainforestSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("ScanQuote/1.0")
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            amazon_domain: settings.amazon_domain.clone(),
            api_key: settings.api_key.clone(),
            http,
        })
    }

    async fn request<T>(&self, params: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/request", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("amazon_domain", self.amazon_domain.as_str()),
            ])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            warn!(provider = PROVIDER_NAME, %status, "rainforest request failed");
            debug!(provider = PROVIDER_NAME, body = %text, "rainforest error body");
            return Err(ProviderError::from_status(status));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Malformed(e.without_url().to_string()))
    }
}

/// ASINs and ISBN-10s go in `asin=`; everything else is a GTIN.
fn identifier_param(identifier: &str) -> &'static str {
    if identifier.len() == 10 {
        "asin"
    } else {
        "gtin"
    }
}

#[async_trait]
impl ProviderAdapter for RainforestProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn strategy(&self) -> LookupStrategy {
        LookupStrategy::DirectCode
    }

    async fn search_for_identifier(&self, code: &str) -> Result<Option<String>, ProviderError> {
        let resp: SearchResponse = self
            .request(&[("type", "search"), ("search_term", code)])
            .await?;
        Ok(resp
            .search_results
            .into_iter()
            .filter_map(|r| r.asin)
            .map(|asin| asin.trim().to_ascii_uppercase())
            .find(|asin| !asin.is_empty()))
    }

    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<RawProductPayload, ProviderError> {
        let resp: ProductResponse = self
            .request(&[("type", "product"), (identifier_param(identifier), identifier)])
            .await?;

        match resp.product {
            Some(product) => Ok(build_payload(product, resp.offers)),
            None => {
                let info = resp.request_info;
                debug!(
                    provider = PROVIDER_NAME,
                    success = ?info.as_ref().and_then(|i| i.success),
                    message = ?info.as_ref().and_then(|i| i.message.as_deref()),
                    "rainforest returned no product"
                );
                Err(ProviderError::NotFound)
            }
        }
    }
}
