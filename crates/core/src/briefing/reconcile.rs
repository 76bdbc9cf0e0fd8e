use crate::briefing::change::{carry_rate_changes, index_quote, rate_changes};
use crate::domain::snapshot::{IndexQuote, Indices, NewsItem, RateChanges, Rates};
use crate::ingest::types::{CloseSeries, GroupResult, RateQuotes};
use std::fmt;

/// How a group's final value came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    Fresh,
    /// Fresh group in which the listed entries were carried from the previous run.
    Partial { carried: Vec<String> },
    /// The previous run's group, unchanged.
    Stale { reason: String },
    /// Nothing fresh and nothing to fall back on.
    Empty { reason: String },
}

impl GroupStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GroupStatus::Fresh => "fresh",
            GroupStatus::Partial { .. } => "partial",
            GroupStatus::Stale { .. } => "stale",
            GroupStatus::Empty { .. } => "empty",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GroupStatus::Stale { .. } | GroupStatus::Empty { .. })
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupStatus::Fresh => f.write_str("fresh"),
            GroupStatus::Partial { carried } => write!(f, "partial (carried: {})", carried.join(", ")),
            GroupStatus::Stale { reason } => write!(f, "stale ({reason})"),
            GroupStatus::Empty { reason } => write!(f, "empty ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    pub value: T,
    pub status: GroupStatus,
}

impl<T> Reconciled<T> {
    fn fresh(value: T) -> Self {
        Self {
            value,
            status: GroupStatus::Fresh,
        }
    }
}

/// Whole-group fallback: the previous group when there is one, otherwise empty.
fn fall_back<T>(previous: &T, is_empty: bool, reason: String) -> Reconciled<T>
where
    T: Clone + Default,
{
    if is_empty {
        Reconciled {
            value: T::default(),
            status: GroupStatus::Empty { reason },
        }
    } else {
        Reconciled {
            value: previous.clone(),
            status: GroupStatus::Stale { reason },
        }
    }
}

/// Published rates together with the changes that belong to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatesGroup {
    pub rates: Rates,
    pub changes: RateChanges,
}

/// Group-level reconciliation for rates.
///
/// A fresh group whose every quote is unusable or zero counts as failed. When the group falls
/// back, the previous run's changes travel with the previous rates. Within a fresh group an
/// unusable quote is published as `0.0` with no change.
pub fn reconcile_rates(
    fresh: GroupResult<RateQuotes>,
    previous: &Rates,
    previous_changes: &RateChanges,
) -> Reconciled<RatesGroup> {
    let keep_previous = |reason: String| {
        if previous.is_empty() {
            Reconciled {
                value: RatesGroup::default(),
                status: GroupStatus::Empty { reason },
            }
        } else {
            Reconciled {
                value: RatesGroup {
                    rates: previous.clone(),
                    changes: carry_rate_changes(previous, previous_changes),
                },
                status: GroupStatus::Stale { reason },
            }
        }
    };

    let quotes = match fresh {
        Ok(quotes) => quotes,
        Err(err) => return keep_previous(err.to_string()),
    };
    if quotes.is_empty() {
        return keep_previous("no usable entries".to_string());
    }
    if quotes.values().all(|q| !q.is_some_and(is_live)) {
        return keep_previous("every rate is zero or unusable".to_string());
    }

    let rates = quotes
        .iter()
        .map(|(pair, quote)| {
            let value = match quote.filter(|v| v.is_finite()) {
                Some(v) => v,
                None => {
                    tracing::warn!(%pair, "unusable rate published as 0");
                    0.0
                }
            };
            (pair.clone(), value)
        })
        .collect();
    let changes = rate_changes(&quotes, previous);
    Reconciled::fresh(RatesGroup { rates, changes })
}

/// A number that can stand for live data: finite and not the zero default.
fn is_live(x: f64) -> bool {
    x.is_finite() && x != 0.0
}

/// Per-entry reconciliation for indices.
///
/// A ticker without a usable series takes its own previous quote (or the zero placeholder);
/// siblings keep their fresh quotes. If every price ends up zero the whole group is treated
/// as failed.
pub fn reconcile_indices(
    fresh: GroupResult<CloseSeries>,
    tickers: &[(String, String)],
    previous: &Indices,
) -> Reconciled<Indices> {
    let series = match fresh {
        Ok(series) => series,
        Err(err) => return fall_back(previous, previous.is_empty(), err.to_string()),
    };

    let mut out = Indices::new();
    let mut carried = Vec::new();
    for (ticker, name) in tickers {
        match series.get(ticker).and_then(|closes| index_quote(closes)) {
            Some(quote) => {
                out.insert(name.clone(), quote);
            }
            None => {
                tracing::warn!(%ticker, %name, "no usable closes; carrying previous quote");
                let quote = previous.get(name).copied().unwrap_or(IndexQuote::PLACEHOLDER);
                out.insert(name.clone(), quote);
                carried.push(name.clone());
            }
        }
    }

    if out.is_empty() {
        return fall_back(previous, previous.is_empty(), "no usable entries".to_string());
    }
    if out.values().all(|q| !is_live(q.price)) {
        return fall_back(previous, previous.is_empty(), "every price is zero or unusable".to_string());
    }

    let status = if carried.is_empty() {
        GroupStatus::Fresh
    } else {
        GroupStatus::Partial { carried }
    };
    Reconciled { value: out, status }
}

pub fn reconcile_news(
    fresh: GroupResult<Vec<NewsItem>>,
    previous: &[NewsItem],
) -> Reconciled<Vec<NewsItem>> {
    let previous = previous.to_vec();
    match fresh {
        Ok(items) if !items.is_empty() => Reconciled::fresh(items),
        Ok(_) => fall_back(&previous, previous.is_empty(), "no headlines".to_string()),
        Err(err) => fall_back(&previous, previous.is_empty(), err.to_string()),
    }
}
