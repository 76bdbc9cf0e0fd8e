use crate::domain::snapshot::Category;
use crate::ingest::retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_DELAY};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 12;
const DEFAULT_NEWS_MAX_ITEMS: usize = 5;

const DEFAULT_FX_BASE_URL: &str = "https://open.er-api.com";
const DEFAULT_FX_BASE_CURRENCY: &str = "USD";
const FX_WANTED: [&str; 12] = [
    "TWD", "JPY", "EUR", "GBP", "CNY", "AUD", "CAD", "CHF", "HKD", "KRW", "SGD", "INR",
];

const DEFAULT_INDEX_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_INDEX_RANGE: &str = "6d";
const INDEX_TICKERS: [(&str, &str); 8] = [
    ("^DJI", "道瓊"),
    ("^IXIC", "那斯達克"),
    ("^GSPC", "S&P 500"),
    ("^N225", "日經225"),
    ("^GDAXI", "德國DAX"),
    ("^FTSE", "英國FTSE"),
    ("^HSI", "恆生指數"),
    ("^TWII", "台灣加權"),
];

const FEEDS_ECONOMY: [&str; 2] = [
    "http://feeds.bbci.co.uk/news/business/rss.xml",
    "https://feeds.reuters.com/reuters/businessNews",
];
const FEEDS_MARKETS: [&str; 2] = [
    "https://feeds.reuters.com/reuters/marketsNews",
    "https://www.marketwatch.com/feeds/topstories",
];
const FEEDS_AI: [&str; 2] = [
    "https://feeds.arstechnica.com/arstechnica/technology-lab",
    "https://www.theverge.com/rss/index.xml",
];

/// Immutable description of every upstream source, built once per run.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub fx_base_url: String,
    pub fx_base_currency: String,
    pub fx_wanted: Vec<String>,

    pub index_base_url: String,
    pub index_range: String,
    /// Ticker → display name, in display order.
    pub index_tickers: Vec<(String, String)>,
    pub index_retry: RetryPolicy,

    pub feeds: BTreeMap<Category, Vec<String>>,
    pub news_max_items: usize,

    /// Per-request timeout for every source.
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Self {
            fx_base_url: DEFAULT_FX_BASE_URL.to_string(),
            fx_base_currency: DEFAULT_FX_BASE_CURRENCY.to_string(),
            fx_wanted: FX_WANTED.iter().map(|s| s.to_string()).collect(),
            index_base_url: DEFAULT_INDEX_BASE_URL.to_string(),
            index_range: DEFAULT_INDEX_RANGE.to_string(),
            index_tickers: INDEX_TICKERS
                .iter()
                .map(|(t, n)| (t.to_string(), n.to_string()))
                .collect(),
            index_retry: RetryPolicy::new(DEFAULT_ATTEMPTS, DEFAULT_DELAY, timeout),
            feeds: BTreeMap::from([
                (Category::Economy, to_strings(&FEEDS_ECONOMY)),
                (Category::Markets, to_strings(&FEEDS_MARKETS)),
                (Category::Ai, to_strings(&FEEDS_AI)),
            ]),
            news_max_items: DEFAULT_NEWS_MAX_ITEMS,
            timeout,
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(n) = env_parse::<u64>("SOURCE_TIMEOUT_SECS").filter(|n| *n > 0) {
            out.timeout = Duration::from_secs(n);
        }
        if let Some(s) = env_non_empty("FX_BASE_URL") {
            out.fx_base_url = s;
        }
        if let Some(s) = env_non_empty("FX_BASE_CURRENCY") {
            out.fx_base_currency = s.to_ascii_uppercase();
        }
        if let Some(s) = env_non_empty("INDEX_BASE_URL") {
            out.index_base_url = s;
        }

        let attempts = env_parse::<u32>("INDEX_RETRY_ATTEMPTS").unwrap_or(DEFAULT_ATTEMPTS);
        let delay = env_parse::<u64>("INDEX_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DELAY);
        out.index_retry = RetryPolicy::new(attempts, delay, out.timeout);

        for category in Category::ALL {
            let key = format!("FEEDS_{}", category.as_str().to_ascii_uppercase());
            if let Some(s) = env_non_empty(&key) {
                out.feeds.insert(category, split_list(&s));
            }
        }

        if let Some(n) = env_parse::<usize>("NEWS_MAX_ITEMS").filter(|n| *n > 0) {
            out.news_max_items = n;
        }

        out
    }

    pub fn feeds_for(&self, category: Category) -> &[String] {
        self.feeds.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn to_strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
