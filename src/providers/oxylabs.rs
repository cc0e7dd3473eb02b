use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

use super::{
    lenient_f64, lenient_u64, truncate_for_log, BuyBoxOffer, LookupStrategy, ProviderAdapter,
    ProviderError, RankEntry, RawProductPayload,
};
use crate::config::OxylabsSettings;

pub const PROVIDER_NAME: &str = "oxylabs";

/// `parse_status_code` of a fully parsed page; anything else is partial or failed.
const PARSE_OK: u64 = 12000;

/// Oxylabs realtime scraper API, Amazon sources.
///
/// Search-then-detail provider:
/// - POST /v1/queries `{source: "amazon_search", query: <code>}` resolves a
///   UPC/ISBN-13 to an ASIN (first organic result, then first paid).
/// - POST /v1/queries `{source: "amazon_product", query: <asin>}` returns the
///   parsed product page.
///
/// Basic auth on every call; one timeout per call, no retries.
#[derive(Clone)]
pub struct OxylabsProvider {
    base_url: String,
    domain: String,
    username: String,
    password: String,
    http: Client,
}

impl fmt::Debug for OxylabsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OxylabsProvider")
            .field("base_url", &self.base_url)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

/// One scraped target. `status_code` is the target page's status, reported
/// in-band while the API call itself answers 200.
#[derive(Debug, Deserialize)]
struct QueryResult {
    content: Option<Value>,
    status_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SearchContent {
    results: Option<SearchBuckets>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchBuckets {
    #[serde(default)]
    organic: Vec<SearchItem>,
    #[serde(default)]
    paid: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    asin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProductContent {
    asin: Option<String>,
    title: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    buybox: Vec<BuyBoxItem>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_buybox: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default)]
    sales_rank: Vec<SalesRankItem>,
    #[serde(default)]
    category: Vec<CategoryItem>,
}

#[derive(Debug, Deserialize)]
struct BuyBoxItem {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    condition: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SalesRankItem {
    #[serde(default, deserialize_with = "lenient_u64")]
    rank: Option<u64>,
    #[serde(default)]
    ladder: Vec<LadderItem>,
}

#[derive(Debug, Deserialize)]
struct CategoryItem {
    #[serde(default)]
    ladder: Vec<LadderItem>,
}

#[derive(Debug, Deserialize)]
struct LadderItem {
    name: Option<String>,
}

fn ladder_names(ladder: Vec<LadderItem>) -> Vec<String> {
    ladder
        .into_iter()
        .filter_map(|l| l.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

impl From<ProductContent> for RawProductPayload {
    fn from(c: ProductContent) -> Self {
        RawProductPayload {
            identifier: c.asin.filter(|s| !s.trim().is_empty()),
            title: c.title.filter(|s| !s.trim().is_empty()),
            image_url: c.images.into_iter().find(|s| !s.trim().is_empty()),
            buybox: c
                .buybox
                .into_iter()
                .map(|b| BuyBoxOffer {
                    price: b.price,
                    condition: b.condition,
                })
                .collect(),
            price_buybox: c.price_buybox,
            price: c.price,
            offers: Vec::new(),
            sales_rank: c
                .sales_rank
                .into_iter()
                .map(|s| RankEntry {
                    rank: s.rank,
                    ladder: ladder_names(s.ladder),
                })
                .collect(),
            sales_rank_text: None,
            // most specific ladder last; keep the top-level name of each ladder
            categories: c
                .category
                .into_iter()
                .filter_map(|cat| ladder_names(cat.ladder).into_iter().next())
                .collect(),
        }
    }
}

impl OxylabsProvider {
    pub fn new(settings: &OxylabsSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("ScanQuote/1.0")
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            domain: settings.domain.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            http,
        })
    }

    /// Run one query and return its parsed content, if any.
    async fn query<T>(&self, source: &str, query: &str) -> Result<Option<T>, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/v1/queries", self.base_url);
        let body = json!({
            "source": source,
            "domain": self.domain,
            "query": query,
            "parse": true,
        });

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            warn!(provider = PROVIDER_NAME, source, %status, "oxylabs query failed");
            debug!(provider = PROVIDER_NAME, body = %text, "oxylabs error body");
            return Err(ProviderError::from_status(status));
        }

        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.without_url().to_string()))?;
        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("empty results array".to_string()))?;

        if let Some(target_status) = result.status_code.filter(|s| !(200..300).contains(s)) {
            warn!(provider = PROVIDER_NAME, source, target_status, "oxylabs target failed");
            return Err(ProviderError::from_status_code(target_status));
        }

        let Some(content) = result.content else {
            return Ok(None);
        };
        if let Some(parse_status) = content
            .get("parse_status_code")
            .and_then(Value::as_u64)
            .filter(|code| *code != PARSE_OK)
        {
            warn!(provider = PROVIDER_NAME, source, parse_status, "oxylabs parse incomplete");
            return Err(ProviderError::Malformed(format!(
                "parse_status_code {parse_status}"
            )));
        }
        serde_json::from_value(content)
            .map(Some)
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for OxylabsProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn strategy(&self) -> LookupStrategy {
        LookupStrategy::SearchThenDetail
    }

    async fn search_for_identifier(&self, code: &str) -> Result<Option<String>, ProviderError> {
        let buckets = self
            .query::<SearchContent>("amazon_search", code)
            .await?
            .and_then(|c| c.results)
            .unwrap_or_default();

        Ok(buckets
            .organic
            .into_iter()
            .chain(buckets.paid)
            .filter_map(|item| item.asin)
            .map(|asin| asin.trim().to_ascii_uppercase())
            .find(|asin| !asin.is_empty()))
    }

    async fn lookup_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<RawProductPayload, ProviderError> {
        let content = self
            .query::<ProductContent>("amazon_product", identifier)
            .await?
            .ok_or_else(|| ProviderError::Malformed("product result without content".into()))?;
        Ok(content.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, timeout: Duration) -> OxylabsProvider {
        OxylabsProvider::new(&OxylabsSettings {
            username: "user".into(),
            password: "pass".into(),
            base_url: server.uri(),
            timeout,
            domain: "com".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn search_takes_first_organic_then_paid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/queries"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({"source": "amazon_search", "query": "012345678905"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "status_code": 200,
                    "content": {"results": {
                        "organic": [],
                        "paid": [{"asin": null}, {"asin": "b0paid0001"}]
                    }}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let asin = provider(&server, Duration::from_secs(5))
            .search_for_identifier("012345678905")
            .await
            .unwrap();
        assert_eq!(asin.as_deref(), Some("B0PAID0001"));
    }

    #[tokio::test]
    async fn search_without_results_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"content": {"results": {"organic": [], "paid": []}}}]
            })))
            .mount(&server)
            .await;

        let asin = provider(&server, Duration::from_secs(5))
            .search_for_identifier("012345678905")
            .await
            .unwrap();
        assert_eq!(asin, None);
    }

    #[tokio::test]
    async fn maps_product_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"source": "amazon_product"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"content": {
                    "asin": "0743273567",
                    "title": "The Great Gatsby",
                    "images": ["https://img.example/gatsby.jpg"],
                    "buybox": [{"price": 10.0, "condition": "Buy new"}],
                    "price_buybox": "$9.50",
                    "price": 5,
                    "sales_rank": [{"rank": "1,234", "ladder": [{"name": "Books", "url": "/b"}]}],
                    "category": [{"ladder": [{"name": "Books"}, {"name": "Literature & Fiction"}]}]
                }}]
            })))
            .mount(&server)
            .await;

        let payload = provider(&server, Duration::from_secs(5))
            .lookup_by_identifier("0743273567")
            .await
            .unwrap();
        assert_eq!(payload.title.as_deref(), Some("The Great Gatsby"));
        assert_eq!(payload.image_url.as_deref(), Some("https://img.example/gatsby.jpg"));
        assert_eq!(payload.buybox[0].price, Some(10.0));
        assert_eq!(payload.price_buybox, Some(9.5));
        assert_eq!(payload.price, Some(5.0));
        assert_eq!(payload.sales_rank[0].rank, Some(1234));
        assert_eq!(payload.sales_rank[0].ladder, vec!["Books".to_string()]);
        assert_eq!(payload.categories, vec!["Books".to_string()]);
    }

    #[tokio::test]
    async fn maps_http_errors() {
        for (status, expected) in [
            (401, ProviderError::Auth),
            (402, ProviderError::QuotaExhausted),
            (429, ProviderError::RateLimited),
            (503, ProviderError::Unavailable(503)),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;
            let err = provider(&server, Duration::from_secs(5))
                .lookup_by_identifier("B00005N5PF")
                .await
                .unwrap_err();
            assert_eq!(err, expected, "status {status}");
        }
    }

    fn in_band(status: u16) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"status_code": status, "content": {"parse_status_code": 12004}}]
        }))
    }

    #[tokio::test]
    async fn in_band_target_status_is_an_error() {
        for (status, expected) in [
            (503, ProviderError::Unavailable(503)),
            (404, ProviderError::NotFound),
            (429, ProviderError::RateLimited),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(in_band(status))
                .mount(&server)
                .await;
            let oxylabs = provider(&server, Duration::from_secs(5));

            let err = oxylabs.lookup_by_identifier("B00005N5PF").await.unwrap_err();
            assert_eq!(err, expected, "product, target status {status}");
            let err = oxylabs.search_for_identifier("012345678905").await.unwrap_err();
            assert_eq!(err, expected, "search, target status {status}");
        }
    }

    #[tokio::test]
    async fn incomplete_parse_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"status_code": 200, "content": {
                    "parse_status_code": 12004,
                    "title": "The Great Gatsby"
                }}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .lookup_by_identifier("B00005N5PF")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn failed_target_leaves_cache_empty() {
        use crate::cache::{MemoryCacheStore, ResultCache};
        use crate::lookup::testing::FakePricing;
        use crate::lookup::{LookupError, QuotePipeline};
        use crate::providers::ProviderRegistry;
        use std::sync::Arc;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(in_band(503))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCacheStore::new());
        let pricing = Arc::new(FakePricing::accepting());
        let registry = ProviderRegistry::new(PROVIDER_NAME)
            .register(Arc::new(provider(&server, Duration::from_secs(5))));
        let pipeline =
            QuotePipeline::new(registry, ResultCache::new(store.clone(), None), pricing.clone());

        let err = pipeline.quote("B00005N5PF", None).await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Provider {
                source: ProviderError::Unavailable(503),
                ..
            }
        ));
        assert_eq!(pricing.calls(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn debug_hides_credentials() {
        let server = MockServer::start().await;
        let rendered = format!("{:?}", provider(&server, Duration::from_secs(5)));
        assert!(!rendered.contains("pass"));
        assert!(!rendered.contains("user"));
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"results": []})),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(50))
            .lookup_by_identifier("B00005N5PF")
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout);
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .lookup_by_identifier("B00005N5PF")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
