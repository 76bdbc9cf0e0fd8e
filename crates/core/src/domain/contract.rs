use crate::domain::snapshot::{
    Category, IndexQuote, Indices, News, NewsItem, RateChanges, Rates,
};
use serde_json::{Map, Value};

/// The previous run's document, read group by group.
///
/// A malformed group degrades to empty on its own; the remaining groups survive. Key names used
/// by older revisions of the document (`exchange_rates`, `stocks`, `news_<category>`, ...) are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousSnapshot {
    pub rates: Rates,
    pub rate_changes: RateChanges,
    pub indices: Indices,
    pub news: News,
}

impl PreviousSnapshot {
    pub fn from_value(doc: &Value) -> Self {
        let Some(obj) = doc.as_object() else {
            tracing::warn!("previous snapshot is not a JSON object; ignoring it");
            return Self::default();
        };

        Self {
            rates: field(obj, &["rates", "exchange_rates"])
                .map(parse_rates)
                .unwrap_or_default(),
            rate_changes: field(obj, &["rate_changes", "exchange_changes"])
                .map(parse_rate_changes)
                .unwrap_or_default(),
            indices: field(obj, &["indices", "stocks"])
                .map(parse_indices)
                .unwrap_or_default(),
            news: parse_news(obj),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
            && self.indices.is_empty()
            && self.news.values().all(Vec::is_empty)
    }

    pub fn news_for(&self, category: Category) -> &[NewsItem] {
        self.news.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|n| n.is_finite())
}

fn parse_rates(v: &Value) -> Rates {
    let Some(obj) = v.as_object() else {
        return Rates::new();
    };
    obj.iter()
        .filter_map(|(k, v)| finite(v).map(|n| (k.clone(), n)))
        .collect()
}

fn parse_rate_changes(v: &Value) -> RateChanges {
    let Some(obj) = v.as_object() else {
        return RateChanges::new();
    };
    obj.iter().map(|(k, v)| (k.clone(), finite(v))).collect()
}

fn parse_indices(v: &Value) -> Indices {
    let Some(obj) = v.as_object() else {
        return Indices::new();
    };

    let mut out = Indices::new();
    for (name, entry) in obj {
        let price = entry.get("price").and_then(finite);
        let change = entry.get("change").and_then(finite);
        match (price, change) {
            (Some(price), Some(change)) => {
                out.insert(name.clone(), IndexQuote { price, change });
            }
            _ => tracing::debug!(%name, "dropping malformed previous index entry"),
        }
    }
    out
}

fn parse_news_items(v: &Value) -> Vec<NewsItem> {
    let Some(items) = v.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|it| {
            let title = it.get("title")?.as_str()?;
            let url = it.get("url")?.as_str()?;
            NewsItem::try_new(title, url)
        })
        .collect()
}

fn parse_news(obj: &Map<String, Value>) -> News {
    let mut out = News::new();
    let nested = obj.get("news");

    for category in Category::ALL {
        let items = nested
            .and_then(|n| n.get(category.as_str()))
            .or_else(|| obj.get(&format!("news_{category}")))
            .map(parse_news_items)
            .unwrap_or_default();
        if !items.is_empty() {
            out.insert(category, items);
        }
    }

    // The earliest documents had a single uncategorised business/world list.
    if let Some(flat) = nested.filter(|n| n.is_array()) {
        let items = parse_news_items(flat);
        if !items.is_empty() {
            out.entry(Category::Economy).or_insert(items);
        }
    }

    out
}
