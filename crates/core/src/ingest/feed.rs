use crate::domain::snapshot::{Category, NewsItem};
use crate::ingest::provider::{build_http, fetch_bytes, SourceAdapter};
use crate::ingest::sources::SourceConfig;
use crate::ingest::types::{GroupResult, SourceError};
use std::collections::HashSet;

/// Headlines for one news category, merged from several RSS/Atom feeds.
#[derive(Debug, Clone)]
pub struct RssFeedSource {
    http: reqwest::Client,
    category: Category,
    name: String,
    urls: Vec<String>,
    max_items: usize,
}

impl RssFeedSource {
    pub fn from_config(config: &SourceConfig, category: Category) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http(config.timeout)?,
            category,
            name: format!("news.{category}"),
            urls: config.feeds_for(category).to_vec(),
            max_items: config.news_max_items,
        })
    }

    async fn fetch_one(&self, url: &str) -> GroupResult<Vec<NewsItem>> {
        let bytes = fetch_bytes(&self.http, url).await?;
        parse_feed(&bytes, self.max_items)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RssFeedSource {
    type Output = Vec<NewsItem>;

    fn source_name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> GroupResult<Vec<NewsItem>> {
        let mut items = Vec::new();
        let mut last_err: Option<SourceError> = None;
        let mut failures: usize = 0;

        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(found) => items.extend(found),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        category = %self.category,
                        %url,
                        error = %err,
                        "feed read failed; skipping feed"
                    );
                    last_err = Some(err);
                }
            }
        }

        if failures == self.urls.len() {
            if let Some(err) = last_err {
                return Err(err);
            }
        }

        Ok(merge_headlines(items, self.max_items))
    }
}

/// Parses an RSS or Atom document, keeping the first `max_items` entries that have both a
/// title and a link.
pub fn parse_feed(bytes: &[u8], max_items: usize) -> GroupResult<Vec<NewsItem>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|err| SourceError::malformed(format!("feed is not RSS/Atom: {err}")))?;

    Ok(feed
        .entries
        .iter()
        .take(max_items)
        .filter_map(|entry| {
            let title = entry.title.as_ref()?;
            let link = entry.links.first()?;
            NewsItem::try_new(&title.content, &link.href)
        })
        .collect())
}

/// Exact-title dedup; the first occurrence wins and order is preserved.
pub fn dedup_by_title(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|it| seen.insert(it.title.clone()))
        .collect()
}

pub fn merge_headlines(items: Vec<NewsItem>, max_items: usize) -> Vec<NewsItem> {
    let mut out = dedup_by_title(items);
    out.truncate(max_items);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            url: format!("https://news.example/{title}"),
        }
    }

    fn rss(titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .map(|t| {
                format!(
                    "<item><title>{t}</title><link>https://news.example/{t}</link></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>T</title><link>https://news.example</link><description>d</description>{items}</channel></rss>"#
        )
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let out = dedup_by_title(vec![item("A"), item("B"), item("A")]);
        assert_eq!(out, vec![item("A"), item("B")]);
    }

    #[test]
    fn merge_truncates_after_dedup() {
        let out = merge_headlines(vec![item("A"), item("A"), item("B"), item("C")], 2);
        assert_eq!(out, vec![item("A"), item("B")]);
    }

    #[test]
    fn parses_rss_and_skips_entries_without_title() {
        let doc = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title><link>https://x</link><description>d</description>
            <item><title>  Growth returns  </title><link>https://x/1</link></item>
            <item><link>https://x/2</link></item>
            <item><title>Rally</title><link>https://x/3</link></item>
            </channel></rss>"#;

        let items = parse_feed(doc.as_bytes(), 5).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Growth returns");
        assert_eq!(items[0].url, "https://x/1");
        assert_eq!(items[1].title, "Rally");
    }

    #[test]
    fn rejects_non_feed_payloads() {
        let err = parse_feed(b"service temporarily unavailable", 5).unwrap_err();
        assert_eq!(err.kind(), "malformed_payload");
    }

    #[tokio::test]
    async fn merges_feeds_and_tolerates_one_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.xml")
            .with_status(200)
            .with_body(rss(&["A", "B"]))
            .create_async()
            .await;
        server
            .mock("GET", "/b.xml")
            .with_status(200)
            .with_body(rss(&["B", "C"]))
            .create_async()
            .await;
        server
            .mock("GET", "/gone.xml")
            .with_status(404)
            .create_async()
            .await;

        let mut config = SourceConfig::default();
        config.feeds.insert(
            Category::Economy,
            vec![
                format!("{}/a.xml", server.url()),
                format!("{}/gone.xml", server.url()),
                format!("{}/b.xml", server.url()),
            ],
        );
        let src = RssFeedSource::from_config(&config, Category::Economy).unwrap();
        let items = src.fetch().await.unwrap();

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn fails_only_when_every_feed_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/down.xml")
            .with_status(500)
            .create_async()
            .await;

        let mut config = SourceConfig::default();
        config
            .feeds
            .insert(Category::Ai, vec![format!("{}/down.xml", server.url())]);
        let src = RssFeedSource::from_config(&config, Category::Ai).unwrap();
        let err = src.fetch().await.unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
    }
}
