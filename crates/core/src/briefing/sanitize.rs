use crate::domain::snapshot::Snapshot;
use serde_json::Value;

/// Returns `x` when finite, otherwise `default` (logged as a numeric anomaly).
pub fn sanitize(x: f64, default: f64) -> f64 {
    if x.is_finite() {
        return x;
    }
    tracing::warn!(value = %x, default, "non-finite numeric replaced");
    finite_or_zero(default)
}

/// A finite number from a JSON number or numeric string. Anything else is a numeric anomaly
/// and yields `None`, so callers can tell a replaced value from an observed one.
pub fn numeric_value(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let finite = parsed.filter(|x| x.is_finite());
    if finite.is_none() {
        tracing::warn!(value = %v, "unusable numeric value");
    }
    finite
}

pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let rounded = (x * factor).round() / factor;
    // Rounding can overflow to infinity for huge inputs.
    if rounded.is_finite() {
        rounded
    } else {
        x
    }
}

/// Final pass over every numeric leaf; returns how many values were replaced.
pub fn sanitize_snapshot(snapshot: &mut Snapshot) -> usize {
    let mut replaced = 0;
    let mut fix = |x: &mut f64| {
        if !x.is_finite() {
            *x = sanitize(*x, 0.0);
            replaced += 1;
        }
    };

    for v in snapshot.rates.values_mut() {
        fix(v);
    }
    for v in snapshot.rate_changes.values_mut().flatten() {
        fix(v);
    }
    for quote in snapshot.indices.values_mut() {
        fix(&mut quote.price);
        fix(&mut quote.change);
    }
    replaced
}

// Callers may pass a non-finite default.
fn finite_or_zero(default: f64) -> f64 {
    if default.is_finite() {
        default
    } else {
        0.0
    }
}
