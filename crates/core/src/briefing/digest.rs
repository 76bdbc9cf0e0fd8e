use crate::domain::snapshot::{Category, Indices, News, RateChanges, Rates};

const HEADLINE_PAIRS: [&str; 3] = ["USD/TWD", "USD/JPY", "USD/EUR"];
const NOTHING_TO_REPORT: &str = "今日重點已更新，請查看板塊。";

/// One-paragraph digest: key rates, the biggest index mover, and the top headline.
pub fn compose_digest(
    rates: &Rates,
    rate_changes: &RateChanges,
    indices: &Indices,
    news: &News,
) -> String {
    let mut parts = Vec::new();

    let fx: Vec<String> = HEADLINE_PAIRS
        .iter()
        .filter_map(|pair| {
            let rate = rates.get(*pair)?;
            let code = pair.rsplit('/').next().unwrap_or(pair);
            Some(match rate_changes.get(*pair).copied().flatten() {
                Some(delta) => format!("{code} {rate}({}%)", signed(delta)),
                None => format!("{code} {rate}"),
            })
        })
        .collect();
    if !fx.is_empty() {
        parts.push(format!("匯率：{}", fx.join("，")));
    }

    let top_mover = indices
        .iter()
        .max_by(|a, b| a.1.change.total_cmp(&b.1.change));
    if let Some((name, quote)) = top_mover {
        parts.push(format!("股市：{name} 變動 {}%", quote.change));
    }

    let headline = Category::ALL
        .iter()
        .find_map(|c| news.get(c).and_then(|items| items.first()));
    if let Some(item) = headline {
        parts.push(format!("頭條：{}", item.title));
    }

    if parts.is_empty() {
        return NOTHING_TO_REPORT.to_string();
    }
    parts.join("。")
}

fn signed(x: f64) -> String {
    if x > 0.0 {
        format!("+{x}")
    } else {
        x.to_string()
    }
}
