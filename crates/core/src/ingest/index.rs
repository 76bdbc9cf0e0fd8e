use crate::ingest::provider::{build_http, fetch_json, SourceAdapter};
use crate::ingest::sources::SourceConfig;
use crate::ingest::types::{CloseSeries, GroupResult, SourceError};
use serde_json::Value;

/// Daily closes from Yahoo Finance.
///
/// Several tickers go through one `spark` request; a single ticker uses the `chart` endpoint.
/// Both layouts (and the flat keyed layout some spark mirrors return) pass through
/// [`normalize_closes`].
#[derive(Debug, Clone)]
pub struct YahooIndexSource {
    http: reqwest::Client,
    base_url: String,
    range: String,
    tickers: Vec<String>,
}

impl YahooIndexSource {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http(config.timeout)?,
            base_url: config.index_base_url.clone(),
            range: config.index_range.clone(),
            tickers: config
                .index_tickers
                .iter()
                .map(|(t, _)| t.clone())
                .collect(),
        })
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[async_trait::async_trait]
impl SourceAdapter for YahooIndexSource {
    type Output = CloseSeries;

    fn source_name(&self) -> &str {
        "indices"
    }

    async fn fetch(&self) -> GroupResult<CloseSeries> {
        let body = match self.tickers.as_slice() {
            [] => return Ok(CloseSeries::new()),
            [only] => {
                let url = format!("{}/v8/finance/chart/{}", self.base(), only.replace('^', "%5E"));
                let query = [("range", self.range.clone()), ("interval", "1d".to_string())];
                fetch_json(&self.http, &url, &query).await?
            }
            many => {
                let url = format!("{}/v7/finance/spark", self.base());
                let query = [
                    ("symbols", many.join(",")),
                    ("range", self.range.clone()),
                    ("interval", "1d".to_string()),
                ];
                fetch_json(&self.http, &url, &query).await?
            }
        };
        normalize_closes(&body, &self.tickers)
    }
}

/// Normalizes any accepted payload layout into one close series per requested ticker.
///
/// Every requested ticker is present in the output; one the payload says nothing about maps to
/// an empty series. A payload that yields no closes at all is malformed.
pub fn normalize_closes(body: &Value, tickers: &[String]) -> GroupResult<CloseSeries> {
    let mut found = CloseSeries::new();

    if let Some(spark) = body.get("spark") {
        let results = spark.get("result").and_then(Value::as_array);
        let Some(results) = results else {
            return Err(provider_error(spark, "spark"));
        };
        for r in results {
            let Some(symbol) = r.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            let closes = r
                .get("response")
                .and_then(|resp| resp.get(0))
                .map(chart_result_closes)
                .unwrap_or_default();
            found.insert(symbol.to_string(), closes);
        }
    } else if let Some(chart) = body.get("chart") {
        let results = chart.get("result").and_then(Value::as_array);
        let Some(results) = results else {
            return Err(provider_error(chart, "chart"));
        };
        for r in results {
            let symbol = r
                .pointer("/meta/symbol")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| match tickers {
                    [only] => Some(only.clone()),
                    _ => None,
                });
            if let Some(symbol) = symbol {
                found.insert(symbol, chart_result_closes(r));
            }
        }
    } else if let Some(obj) = body.as_object() {
        for (symbol, entry) in obj {
            if let Some(closes) = entry.get("close").and_then(Value::as_array) {
                found.insert(symbol.clone(), finite_closes(closes));
            }
        }
    }

    if found.values().all(Vec::is_empty) {
        return Err(SourceError::malformed("index payload has no usable close series"));
    }

    Ok(tickers
        .iter()
        .map(|t| (t.clone(), found.remove(t).unwrap_or_default()))
        .collect())
}

fn chart_result_closes(r: &Value) -> Vec<f64> {
    let close = r
        .pointer("/indicators/quote/0/close")
        .and_then(Value::as_array)
        .or_else(|| {
            r.pointer("/indicators/adjclose/0/adjclose")
                .and_then(Value::as_array)
        });
    close.map(|c| finite_closes(c)).unwrap_or_default()
}

fn finite_closes(values: &[Value]) -> Vec<f64> {
    values
        .iter()
        .filter_map(Value::as_f64)
        .filter(|x| x.is_finite())
        .collect()
}

fn provider_error(envelope: &Value, endpoint: &str) -> SourceError {
    match envelope.get("error").filter(|e| !e.is_null()) {
        Some(err) => {
            let desc = err
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            SourceError::unavailable(format!("yahoo {endpoint} error: {desc}"))
        }
        None => SourceError::malformed(format!("yahoo {endpoint} payload has no result")),
    }
}
