use crate::briefing::sanitize::{numeric_value, round_to};
use crate::ingest::provider::{build_http, fetch_json, SourceAdapter};
use crate::ingest::sources::SourceConfig;
use crate::ingest::types::{GroupResult, RateQuotes, SourceError};
use serde_json::Value;

/// Latest rates from open.er-api.com (`/v6/latest/{base}`).
#[derive(Debug, Clone)]
pub struct ErApiFxSource {
    http: reqwest::Client,
    base_url: String,
    base_currency: String,
    wanted: Vec<String>,
}

impl ErApiFxSource {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http(config.timeout)?,
            base_url: config.fx_base_url.clone(),
            base_currency: config.fx_base_currency.clone(),
            wanted: config.fx_wanted.clone(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v6/latest/{}",
            self.base_url.trim_end_matches('/'),
            self.base_currency
        )
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ErApiFxSource {
    type Output = RateQuotes;

    fn source_name(&self) -> &str {
        "fx"
    }

    async fn fetch(&self) -> GroupResult<RateQuotes> {
        let body = fetch_json(&self.http, &self.url(), &[]).await?;
        normalize_rates(&body, &self.base_currency, &self.wanted)
    }
}

/// Picks the wanted codes out of a `{"rates": {code: number}}` payload.
///
/// Absent codes are omitted. A code present with a non-numeric or non-finite value maps to
/// `None`; the reconciler publishes the default for it and never derives a change from it.
pub fn normalize_rates(body: &Value, base: &str, wanted: &[String]) -> GroupResult<RateQuotes> {
    if body.get("result").and_then(Value::as_str) == Some("error") {
        let kind = body
            .get("error-type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(SourceError::unavailable(format!("fx provider error: {kind}")));
    }

    let rates = body
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::malformed("fx payload has no rates object"))?;

    let mut out = RateQuotes::new();
    for code in wanted {
        if let Some(v) = rates.get(code.as_str()) {
            out.insert(format!("{base}/{code}"), numeric_value(v).map(|x| round_to(x, 4)));
        }
    }
    Ok(out)
}
