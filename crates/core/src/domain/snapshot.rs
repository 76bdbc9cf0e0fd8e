use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Currency pair (`"USD/TWD"`) → rate.
pub type Rates = BTreeMap<String, f64>;

/// Same keys as [`Rates`]; `None` means no baseline, which is not the same as "no movement".
pub type RateChanges = BTreeMap<String, Option<f64>>;

/// Index display name → latest quote.
pub type Indices = BTreeMap<String, IndexQuote>;

pub type News = BTreeMap<Category, Vec<NewsItem>>;

pub type Forecasts = BTreeMap<Category, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Economy,
    Markets,
    Ai,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Economy, Category::Markets, Category::Ai];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Economy => "economy",
            Category::Markets => "markets",
            Category::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Some(Category::Economy),
            "markets" => Some(Category::Markets),
            "ai" => Some(Category::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub price: f64,
    pub change: f64,
}

impl IndexQuote {
    /// Stand-in for a ticker that failed and has no previous value.
    pub const PLACEHOLDER: IndexQuote = IndexQuote {
        price: 0.0,
        change: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
}

impl NewsItem {
    /// Trims both fields; `None` when either ends up empty.
    pub fn try_new(title: &str, url: &str) -> Option<Self> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at_local: DateTime<FixedOffset>,
    pub generated_at_utc: DateTime<Utc>,
    pub rates: Rates,
    pub rate_changes: RateChanges,
    pub indices: Indices,
    pub news: News,
    pub forecasts: Forecasts,
    pub summary_text: String,
}

impl Snapshot {
    /// Every numeric leaf in document order.
    pub fn numeric_leaves(&self) -> Vec<f64> {
        let mut out = Vec::new();
        out.extend(self.rates.values().copied());
        out.extend(self.rate_changes.values().flatten().copied());
        for quote in self.indices.values() {
            out.push(quote.price);
            out.push(quote.change);
        }
        out
    }

    pub fn news_for(&self, category: Category) -> &[NewsItem] {
        self.news.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}
