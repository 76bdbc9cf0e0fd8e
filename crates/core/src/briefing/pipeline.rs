use crate::briefing::digest::compose_digest;
use crate::briefing::forecast::compose_forecasts;
use crate::briefing::reconcile::{reconcile_indices, reconcile_news, reconcile_rates, GroupStatus};
use crate::briefing::sanitize::sanitize_snapshot;
use crate::domain::snapshot::{Category, Forecasts, News, NewsItem, Snapshot};
use crate::ingest::feed::RssFeedSource;
use crate::ingest::fx::ErApiFxSource;
use crate::ingest::index::YahooIndexSource;
use crate::ingest::retry::Retrying;
use crate::ingest::sources::SourceConfig;
use crate::ingest::types::{CloseSeries, GroupResult, RateQuotes, SourceError};
use crate::ingest::SourceAdapter;
use crate::storage::{PersistenceError, SnapshotStore};
use crate::time::display::stamp;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

const GROUP_GRACE: Duration = Duration::from_secs(1);

pub type RatesAdapter = Box<dyn SourceAdapter<Output = RateQuotes>>;
pub type IndicesAdapter = Box<dyn SourceAdapter<Output = CloseSeries>>;
pub type NewsAdapter = Box<dyn SourceAdapter<Output = Vec<NewsItem>>>;

/// One adapter per group. News has one adapter per category.
pub struct Sources {
    pub rates: RatesAdapter,
    pub indices: IndicesAdapter,
    pub news: Vec<(Category, NewsAdapter)>,
}

impl Sources {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut news: Vec<(Category, NewsAdapter)> = Vec::new();
        for category in Category::ALL {
            news.push((
                category,
                Box::new(RssFeedSource::from_config(config, category)?),
            ));
        }

        Ok(Self {
            rates: Box::new(ErApiFxSource::from_config(config)?),
            indices: Box::new(Retrying::new(
                YahooIndexSource::from_config(config)?,
                config.index_retry,
            )),
            news,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group: String,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub groups: Vec<GroupReport>,
    /// Numeric leaves replaced by the final sanitize pass.
    pub sanitized: usize,
}

impl RunReport {
    pub fn status_of(&self, group: &str) -> Option<&GroupStatus> {
        self.groups
            .iter()
            .find(|g| g.group == group)
            .map(|g| &g.status)
    }

    /// True when any group is not fully fresh.
    pub fn degraded(&self) -> bool {
        self.groups.iter().any(|g| g.status != GroupStatus::Fresh)
    }

    fn record(&mut self, group: impl Into<String>, status: GroupStatus) {
        let group = group.into();
        match &status {
            GroupStatus::Fresh => {}
            GroupStatus::Partial { .. } => {
                tracing::warn!(%group, status = %status, "group partially carried from previous run")
            }
            GroupStatus::Stale { .. } | GroupStatus::Empty { .. } => {
                tracing::warn!(%group, status = %status, "group fell back")
            }
        }
        self.groups.push(GroupReport { group, status });
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub report: RunReport,
}

struct Fetched {
    rates: GroupResult<RateQuotes>,
    indices: GroupResult<CloseSeries>,
    news: Vec<(Category, GroupResult<Vec<NewsItem>>)>,
}

/// Fetch → reconcile → sanitize → compose → persist.
///
/// Source failures never abort a run; only persistence can fail it.
pub struct Pipeline {
    sources: Sources,
    store: SnapshotStore,
    tickers: Vec<(String, String)>,
    zone: Tz,
    parallel: bool,
    group_timeout: Duration,
}

impl Pipeline {
    pub fn new(sources: Sources, store: SnapshotStore, config: &SourceConfig, zone: Tz) -> Self {
        Self {
            sources,
            store,
            tickers: config.index_tickers.clone(),
            zone,
            parallel: false,
            group_timeout: group_budget(config),
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn group_timeout(mut self, timeout: Duration) -> Self {
        self.group_timeout = timeout;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Everything but the write.
    pub async fn build(&self, now: DateTime<Utc>) -> RunOutcome {
        let previous = self.store.load_previous();
        tracing::info!(
            parallel = self.parallel,
            has_previous = !previous.is_empty(),
            "briefing run started"
        );

        let fetched = if self.parallel {
            self.fetch_parallel().await
        } else {
            self.fetch_sequential().await
        };

        let mut report = RunReport::default();

        let rates = reconcile_rates(fetched.rates, &previous.rates, &previous.rate_changes);
        report.record(self.sources.rates.source_name(), rates.status);

        let indices = reconcile_indices(fetched.indices, &self.tickers, &previous.indices);
        report.record(self.sources.indices.source_name(), indices.status);

        let mut news = News::new();
        for (category, fresh) in fetched.news {
            let merged = reconcile_news(fresh, previous.news_for(category));
            report.record(format!("news.{category}"), merged.status);
            news.insert(category, merged.value);
        }

        let at = stamp(now, self.zone);
        let mut snapshot = Snapshot {
            generated_at_local: at.local,
            generated_at_utc: at.utc,
            rates: rates.value.rates,
            rate_changes: rates.value.changes,
            indices: indices.value,
            news,
            forecasts: Forecasts::new(),
            summary_text: String::new(),
        };

        report.sanitized = sanitize_snapshot(&mut snapshot);
        snapshot.forecasts = compose_forecasts(&snapshot.news);
        snapshot.summary_text = compose_digest(
            &snapshot.rates,
            &snapshot.rate_changes,
            &snapshot.indices,
            &snapshot.news,
        );

        RunOutcome { snapshot, report }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, PersistenceError> {
        let outcome = self.build(now).await;
        self.store.save(&outcome.snapshot)?;
        tracing::info!(
            path = %self.store.path().display(),
            degraded = outcome.report.degraded(),
            sanitized = outcome.report.sanitized,
            "snapshot published"
        );
        Ok(outcome)
    }

    async fn fetch_sequential(&self) -> Fetched {
        let rates = guarded(self.sources.rates.as_ref(), self.group_timeout).await;
        let indices = guarded(self.sources.indices.as_ref(), self.group_timeout).await;
        let mut news = Vec::with_capacity(self.sources.news.len());
        for (category, adapter) in &self.sources.news {
            news.push((*category, guarded(adapter.as_ref(), self.group_timeout).await));
        }
        Fetched {
            rates,
            indices,
            news,
        }
    }

    async fn fetch_parallel(&self) -> Fetched {
        let budget = self.group_timeout;
        let news = futures::future::join_all(
            self.sources
                .news
                .iter()
                .map(|(category, adapter)| async move {
                    (*category, guarded(adapter.as_ref(), budget).await)
                }),
        );

        let (rates, indices, news) = tokio::join!(
            guarded(self.sources.rates.as_ref(), budget),
            guarded(self.sources.indices.as_ref(), budget),
            news,
        );
        Fetched {
            rates,
            indices,
            news,
        }
    }
}

/// Runs one group under its own deadline and logs its failure once.
async fn guarded<T: Send>(adapter: &dyn SourceAdapter<Output = T>, budget: Duration) -> GroupResult<T> {
    let res = match tokio::time::timeout(budget, adapter.fetch()).await {
        Ok(res) => res,
        Err(_) => Err(SourceError::unavailable(format!(
            "group timed out after {budget:?}"
        ))),
    };
    if let Err(err) = &res {
        tracing::warn!(
            group = adapter.source_name(),
            kind = err.kind(),
            error = %err,
            "source group failed"
        );
    }
    res
}

/// Long enough for the slowest group to exhaust its own retries.
fn group_budget(config: &SourceConfig) -> Duration {
    let retry = config.index_retry;
    let index = (retry.attempt_timeout + retry.delay) * retry.attempts;
    let widest_feed = Category::ALL
        .iter()
        .map(|c| config.feeds_for(*c).len())
        .max()
        .unwrap_or(1)
        .max(1);
    let news = config.timeout * widest_feed as u32;
    index.max(news) + GROUP_GRACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::IndexQuote;
    use crate::ingest::retry::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Fixed<T> {
        name: &'static str,
        result: GroupResult<T>,
        stall: Option<Duration>,
    }

    impl<T> Fixed<T> {
        fn ok(name: &'static str, value: T) -> Self {
            Self {
                name,
                result: Ok(value),
                stall: None,
            }
        }

        fn err(name: &'static str, err: SourceError) -> Self {
            Self {
                name,
                result: Err(err),
                stall: None,
            }
        }

        fn stalled(mut self, stall: Duration) -> Self {
            self.stall = Some(stall);
            self
        }
    }

    #[async_trait::async_trait]
    impl<T: Clone + Send + Sync> SourceAdapter for Fixed<T> {
        type Output = T;

        fn source_name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> GroupResult<T> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.result.clone()
        }
    }

    struct AlwaysDown {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for AlwaysDown {
        type Output = CloseSeries;

        fn source_name(&self) -> &str {
            "indices"
        }

        async fn fetch(&self) -> GroupResult<CloseSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::unavailable("HTTP 503"))
        }
    }

    fn config() -> SourceConfig {
        let mut cfg = SourceConfig::default();
        cfg.index_tickers = vec![
            ("^DJI".to_string(), "道瓊".to_string()),
            ("^N225".to_string(), "日經225".to_string()),
        ];
        cfg
    }

    fn headline(title: &str) -> NewsItem {
        NewsItem::try_new(title, &format!("https://news.example/{}", title.len())).unwrap()
    }

    fn news(name: &'static str, items: Vec<NewsItem>) -> NewsAdapter {
        Box::new(Fixed::ok(name, items))
    }

    fn healthy_news() -> Vec<(Category, NewsAdapter)> {
        vec![
            (
                Category::Economy,
                news("news.economy", vec![headline("Growth returns")]),
            ),
            (
                Category::Markets,
                news("news.markets", vec![headline("Stocks rally")]),
            ),
            (Category::Ai, news("news.ai", Vec::new())),
        ]
    }

    fn healthy_indices() -> IndicesAdapter {
        Box::new(Fixed::ok(
            "indices",
            CloseSeries::from([
                ("^DJI".to_string(), vec![100.0, 101.0]),
                ("^N225".to_string(), vec![38000.0]),
            ]),
        ))
    }

    fn zone() -> Tz {
        chrono_tz::Asia::Taipei
    }

    fn seed(store: &SnapshotStore, doc: serde_json::Value) {
        std::fs::write(store.path(), serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn fresh_rate_is_compared_with_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        seed(&store, serde_json::json!({ "rates": { "USD/TWD": 31.0 } }));

        let sources = Sources {
            rates: Box::new(Fixed::ok(
                "fx",
                RateQuotes::from([("USD/TWD".to_string(), Some(31.5))]),
            )),
            indices: healthy_indices(),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let outcome = pipeline.run(Utc::now()).await.unwrap();

        assert_eq!(outcome.snapshot.rate_changes["USD/TWD"], Some(1.61));
        assert_eq!(outcome.report.status_of("fx"), Some(&GroupStatus::Fresh));
        assert!(outcome.snapshot.summary_text.contains("TWD 31.5(+1.61%)"));

        let saved = pipeline.store().load_snapshot().unwrap().unwrap();
        assert_eq!(saved, outcome.snapshot);
    }

    #[tokio::test]
    async fn exhausted_index_retries_keep_previous_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        seed(
            &store,
            serde_json::json!({ "indices": { "道瓊": { "price": 123, "change": 0.5 } } }),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_secs(1));
        let sources = Sources {
            rates: Box::new(Fixed::ok(
                "fx",
                RateQuotes::from([("USD/TWD".to_string(), Some(31.5))]),
            )),
            indices: Box::new(Retrying::new(
                AlwaysDown {
                    calls: calls.clone(),
                },
                policy,
            )),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let outcome = pipeline.run(Utc::now()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome.snapshot.indices["道瓊"],
            IndexQuote {
                price: 123.0,
                change: 0.5
            }
        );
        assert_eq!(outcome.report.status_of("indices").unwrap().label(), "stale");
    }

    #[tokio::test]
    async fn failed_rates_reuse_previous_group_and_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        seed(
            &store,
            serde_json::json!({
                "rates": { "USD/TWD": 31.0123, "USD/JPY": 149.87 },
                "rate_changes": { "USD/TWD": -0.12, "USD/JPY": null },
            }),
        );

        let sources = Sources {
            rates: Box::new(Fixed::err("fx", SourceError::malformed("no rates object"))),
            indices: healthy_indices(),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let outcome = pipeline.build(Utc::now()).await;

        assert_eq!(
            serde_json::to_string(&outcome.snapshot.rates).unwrap(),
            r#"{"USD/JPY":149.87,"USD/TWD":31.0123}"#
        );
        assert_eq!(outcome.snapshot.rate_changes["USD/TWD"], Some(-0.12));
        assert_eq!(outcome.snapshot.rate_changes["USD/JPY"], None);
        assert!(outcome.report.degraded());
    }

    #[tokio::test]
    async fn first_run_with_every_source_down_still_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        let down = || SourceError::unavailable("connection refused");

        let sources = Sources {
            rates: Box::new(Fixed::<RateQuotes>::err("fx", down())),
            indices: Box::new(Fixed::<CloseSeries>::err("indices", down())),
            news: Category::ALL
                .into_iter()
                .map(|c| {
                    let adapter: NewsAdapter =
                        Box::new(Fixed::<Vec<NewsItem>>::err("news", down()));
                    (c, adapter)
                })
                .collect(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let outcome = pipeline.run(Utc::now()).await.unwrap();

        assert!(outcome.snapshot.rates.is_empty());
        assert!(outcome.snapshot.indices.is_empty());
        assert!(outcome.snapshot.forecasts.values().all(String::is_empty));
        assert_eq!(outcome.snapshot.summary_text, "今日重點已更新，請查看板塊。");
        assert!(pipeline.store().path().exists());
    }

    #[tokio::test]
    async fn published_numbers_are_always_finite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        seed(&store, serde_json::json!({ "rates": { "USD/TWD": 31.0, "USD/JPY": 150.0 } }));

        let sources = Sources {
            rates: Box::new(Fixed::ok(
                "fx",
                RateQuotes::from([
                    ("USD/TWD".to_string(), Some(f64::NAN)),
                    ("USD/JPY".to_string(), Some(150.0)),
                ]),
            )),
            indices: Box::new(Fixed::ok(
                "indices",
                CloseSeries::from([("^DJI".to_string(), vec![f64::INFINITY, 101.0])]),
            )),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let outcome = pipeline.run(Utc::now()).await.unwrap();

        assert!(outcome
            .snapshot
            .numeric_leaves()
            .iter()
            .all(|x| x.is_finite()));
        assert_eq!(outcome.snapshot.rates["USD/TWD"], 0.0);
        assert_eq!(outcome.snapshot.rate_changes["USD/TWD"], None);
        assert_eq!(outcome.snapshot.rate_changes["USD/JPY"], Some(0.0));
    }

    #[tokio::test]
    async fn slow_group_times_out_without_holding_up_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));

        let sources = Sources {
            rates: Box::new(
                Fixed::ok("fx", RateQuotes::from([("USD/TWD".to_string(), Some(31.5))]))
                    .stalled(Duration::from_secs(30)),
            ),
            indices: healthy_indices(),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone())
            .parallel(true)
            .group_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let outcome = pipeline.build(Utc::now()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.report.status_of("fx").unwrap().label(), "empty");
        assert_eq!(outcome.report.status_of("indices"), Some(&GroupStatus::Fresh));
        assert_eq!(outcome.snapshot.news[&Category::Markets][0].title, "Stocks rally");
        assert!(outcome.snapshot.forecasts[&Category::Markets].starts_with("偏強"));
    }

    #[tokio::test]
    async fn timestamps_carry_display_zone_and_utc() {
        use chrono::TimeZone;

        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        let sources = Sources {
            rates: Box::new(Fixed::ok(
                "fx",
                RateQuotes::from([("USD/TWD".to_string(), Some(31.5))]),
            )),
            indices: healthy_indices(),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let snapshot = pipeline.build(now).await.snapshot;

        assert_eq!(snapshot.generated_at_utc, now);
        assert_eq!(
            snapshot.generated_at_local.to_rfc3339(),
            "2026-10-16T08:00:00+08:00"
        );
    }

    #[tokio::test]
    async fn persistence_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = SnapshotStore::new(blocker.join("data.json"));

        let sources = Sources {
            rates: Box::new(Fixed::ok(
                "fx",
                RateQuotes::from([("USD/TWD".to_string(), Some(31.5))]),
            )),
            indices: healthy_indices(),
            news: healthy_news(),
        };
        let pipeline = Pipeline::new(sources, store, &config(), zone());
        assert!(pipeline.run(Utc::now()).await.is_err());
    }

    #[test]
    fn group_budget_covers_every_index_retry() {
        let cfg = SourceConfig::default();
        let budget = group_budget(&cfg);
        assert!(budget >= (cfg.timeout + Duration::from_secs(2)) * 3);
    }
}
