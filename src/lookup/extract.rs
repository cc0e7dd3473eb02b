//! Best-effort price / sales rank / category from an untrusted payload.
//!
//! Nothing here fails: missing data degrades to price 0, rank 0 and
//! category "Unknown", which the pricing engine rejects on its own terms.

use serde::{Deserialize, Serialize};

use crate::providers::{MarketOffer, RankEntry, RawProductPayload};

/// Categories the buyback business deals in, in ladder-scan priority order.
pub const CATEGORY_ALLOW_LIST: [&str; 6] = [
    "Books",
    "CDs & Vinyl",
    "Movies & TV",
    "Video Games",
    "Music",
    "DVD",
];

pub const UNKNOWN_CATEGORY: &str = "Unknown";

const TITLE_KEYWORDS: [(&str, &[&str]); 4] = [
    ("Books", &["book", "novel", "guide"]),
    ("CDs & Vinyl", &["cd", "album", "music"]),
    ("Movies & TV", &["dvd", "movie", "film"]),
    (
        "Video Games",
        &["game", "nintendo", "xbox", "playstation", "gaming"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferCondition {
    New,
    Used,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysis {
    pub best_price: f64,
    pub best_condition: OfferCondition,
    pub source_description: String,
    pub has_new_offer: bool,
}

impl PriceAnalysis {
    fn none() -> Self {
        Self {
            best_price: 0.0,
            best_condition: OfferCondition::Unknown,
            source_description: "no usable offer".to_string(),
            has_new_offer: false,
        }
    }

    fn found(price: f64, condition: OfferCondition, source: &str) -> Self {
        Self {
            best_price: price,
            best_condition: condition,
            source_description: source.to_string(),
            has_new_offer: condition == OfferCondition::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub price: PriceAnalysis,
    pub sales_rank: u64,
    pub category: String,
}

pub fn extract(payload: &RawProductPayload) -> Extracted {
    Extracted {
        price: analyze_price(payload),
        sales_rank: extract_sales_rank(payload),
        category: extract_category(payload),
    }
}

fn positive(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

/// Classify free-text condition. "Used - Like New" and "Renewed" are used, not new.
pub fn classify_condition(text: &str) -> OfferCondition {
    let t = text.to_ascii_lowercase();
    if t.contains("used")
        || t.contains("like new")
        || t.contains("renewed")
        || t.contains("refurbished")
    {
        OfferCondition::Used
    } else if t.contains("new") {
        OfferCondition::New
    } else if t.contains("very good") || t.contains("good") || t.contains("acceptable") {
        OfferCondition::Used
    } else {
        OfferCondition::Unknown
    }
}

/// Price precedence: buy-box array, buy-box price, primary price, flat offers.
pub fn analyze_price(payload: &RawProductPayload) -> PriceAnalysis {
    if let Some(first) = payload.buybox.first() {
        if let Some(price) = positive(first.price) {
            let condition = match first.condition.as_deref().map(classify_condition) {
                Some(OfferCondition::Used) => OfferCondition::Used,
                // buy box is assumed new absent contrary evidence
                _ => OfferCondition::New,
            };
            return PriceAnalysis::found(price, condition, "buy box offer");
        }
    }

    if let Some(price) = positive(payload.price_buybox) {
        return PriceAnalysis::found(price, OfferCondition::New, "buy box price");
    }

    if let Some(price) = positive(payload.price) {
        return PriceAnalysis::found(price, OfferCondition::New, "listed price");
    }

    cheapest_offer(&payload.offers).unwrap_or_else(PriceAnalysis::none)
}

/// Cheapest new offer, else cheapest used offer.
fn cheapest_offer(offers: &[MarketOffer]) -> Option<PriceAnalysis> {
    let cheapest = |wanted: OfferCondition| {
        offers
            .iter()
            .filter(|o| o.condition.as_deref().map(classify_condition) == Some(wanted))
            .filter_map(|o| positive(o.price))
            .min_by(|a, b| a.total_cmp(b))
    };

    if let Some(price) = cheapest(OfferCondition::New) {
        return Some(PriceAnalysis::found(price, OfferCondition::New, "cheapest new offer"));
    }
    cheapest(OfferCondition::Used)
        .map(|price| PriceAnalysis::found(price, OfferCondition::Used, "cheapest used offer"))
}

/// Ladder names look like "Books" or "Books (See Top 100 in Books)".
fn allow_listed(name: &str) -> Option<&'static str> {
    let head = name.split('(').next().unwrap_or(name).trim();
    CATEGORY_ALLOW_LIST
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(head))
}

fn allow_listed_entry(ranks: &[RankEntry]) -> Option<(&RankEntry, &'static str)> {
    ranks.iter().find_map(|entry| {
        entry
            .ladder
            .iter()
            .find_map(|name| allow_listed(name))
            .map(|category| (entry, category))
    })
}

pub fn extract_sales_rank(payload: &RawProductPayload) -> u64 {
    if let Some(rank) = allow_listed_entry(&payload.sales_rank).and_then(|(e, _)| e.rank) {
        return rank;
    }
    if let Some(rank) = payload.sales_rank.iter().find_map(|e| e.rank) {
        return rank;
    }
    payload
        .sales_rank_text
        .as_deref()
        .and_then(parse_rank_text)
        .unwrap_or(0)
}

/// Leading numeric group of "#1,234 in Books", thousands separators removed.
pub fn parse_rank_text(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

pub fn extract_category(payload: &RawProductPayload) -> String {
    if let Some((_, category)) = allow_listed_entry(&payload.sales_rank) {
        return category.to_string();
    }
    if let Some(category) = payload
        .categories
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
    {
        return category.to_string();
    }
    payload
        .title
        .as_deref()
        .and_then(category_from_title)
        .unwrap_or(UNKNOWN_CATEGORY)
        .to_string()
}

fn category_from_title(title: &str) -> Option<&'static str> {
    let t = title.to_ascii_lowercase();
    TITLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| t.contains(k)))
        .map(|(category, _)| *category)
}
