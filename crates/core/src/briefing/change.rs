use crate::briefing::sanitize::{round_to, sanitize};
use crate::domain::snapshot::{IndexQuote, RateChanges, Rates};
use crate::ingest::types::RateQuotes;

/// Percent change from `previous` to `current`, rounded to 2 decimals.
///
/// `None` when there is no usable baseline: `previous` absent, non-finite, or exactly zero.
pub fn change_percent(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|p| p.is_finite() && *p != 0.0)?;
    if !current.is_finite() {
        return None;
    }
    let pct = (current - previous) / previous * 100.0;
    Some(round_to(sanitize(pct, 0.0), 2))
}

/// Per-pair changes for a freshly fetched rates group. An unusable quote has no change.
pub fn rate_changes(current: &RateQuotes, previous: &Rates) -> RateChanges {
    current
        .iter()
        .map(|(pair, quote)| {
            let change = quote.and_then(|v| change_percent(v, previous.get(pair).copied()));
            (pair.clone(), change)
        })
        .collect()
}

/// Changes carried over when the rates group itself fell back to the previous run.
pub fn carry_rate_changes(rates: &Rates, previous: &RateChanges) -> RateChanges {
    rates
        .keys()
        .map(|pair| (pair.clone(), previous.get(pair).copied().flatten()))
        .collect()
}

/// Latest close and day-over-day change from a close series (oldest first).
///
/// A single close yields `change = 0.0`; the document schema requires a number there.
pub fn index_quote(closes: &[f64]) -> Option<IndexQuote> {
    let (&last, rest) = closes.split_last()?;
    let change = rest
        .last()
        .and_then(|prev| change_percent(last, Some(*prev)))
        .unwrap_or(0.0);
    Some(IndexQuote {
        price: round_to(sanitize(last, 0.0), 2),
        change,
    })
}
