use crate::domain::snapshot::{Category, Forecasts, News};

pub const MAX_FORECAST_CHARS: usize = 100;
const TRUNCATED_CHARS: usize = 95;
const ELLIPSIS: char = '…';

const HEADLINES_CONSIDERED: usize = 5;
const POSITIVE: [&str; 7] = ["growth", "rally", "recover", "optimism", "surge", "record", "boom"];
const NEGATIVE: [&str; 7] = ["risk", "fall", "slump", "recession", "crisis", "cut", "slow"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    fn lead(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "偏強",
            Sentiment::Bearish => "偏弱",
            Sentiment::Neutral => "偏穩",
        }
    }
}

/// Keyword tally over the first five headlines. Substring counts, so `"recovery"` counts as
/// `"recover"`; ties (including 0/0) are neutral.
pub fn classify<S: AsRef<str>>(titles: &[S]) -> Sentiment {
    let text = titles
        .iter()
        .take(HEADLINES_CONSIDERED)
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join("、")
        .to_lowercase();

    let pos: usize = POSITIVE.iter().map(|k| text.matches(k).count()).sum();
    let neg: usize = NEGATIVE.iter().map(|k| text.matches(k).count()).sum();

    match pos.cmp(&neg) {
        std::cmp::Ordering::Greater => Sentiment::Bullish,
        std::cmp::Ordering::Less => Sentiment::Bearish,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

fn tip(category: Category) -> &'static str {
    match category {
        Category::Economy => "留意通膨與政策路徑，控制部位，遇波動以分批為宜。",
        Category::Markets => "聚焦高流動性資產，嚴設停損與風險限額。",
        Category::Ai => "短期以大型雲/晶片為主軸，留意評價壓力。",
    }
}

/// Short advisory text for one category; empty when there are no headlines.
pub fn compose_forecast<S: AsRef<str>>(category: Category, titles: &[S]) -> String {
    if titles.is_empty() {
        return String::new();
    }
    let sentiment = classify(titles);
    bound_chars(&format!("{}。{}", sentiment.lead(), tip(category)))
}

pub fn compose_forecasts(news: &News) -> Forecasts {
    Category::ALL
        .into_iter()
        .map(|category| {
            let titles: Vec<&str> = news
                .get(&category)
                .map(|items| items.iter().map(|i| i.title.as_str()).collect())
                .unwrap_or_default();
            (category, compose_forecast(category, &titles))
        })
        .collect()
}

/// At most [`MAX_FORECAST_CHARS`] characters; longer text keeps 95 plus an ellipsis.
pub fn bound_chars(s: &str) -> String {
    if s.chars().count() <= MAX_FORECAST_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(TRUNCATED_CHARS).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::NewsItem;

    #[test]
    fn more_positive_hits_is_bullish() {
        let titles = [
            "Global growth picks up",
            "Stocks rally on earnings",
            "Chip shares surge",
            "Analysts flag risk",
        ];
        assert_eq!(classify(&titles), Sentiment::Bullish);
    }

    #[test]
    fn more_negative_hits_is_bearish() {
        let titles = ["Recession fears", "Banks cut jobs", "Output slump deepens"];
        assert_eq!(classify(&titles), Sentiment::Bearish);
    }

    #[test]
    fn ties_and_silence_are_neutral() {
        assert_eq!(classify(&["Growth slows"]), Sentiment::Neutral);
        assert_eq!(classify(&["Central bank meets"]), Sentiment::Neutral);
        assert_eq!(classify::<&str>(&[]), Sentiment::Neutral);
    }

    #[test]
    fn only_first_five_titles_count() {
        let titles = ["a", "b", "c", "d", "e", "surge surge surge"];
        assert_eq!(classify(&titles), Sentiment::Neutral);
    }

    #[test]
    fn counts_are_case_insensitive_substrings() {
        assert_eq!(classify(&["RECOVERY underway"]), Sentiment::Bullish);
    }

    #[test]
    fn forecast_has_lead_and_category_tip() {
        let s = compose_forecast(Category::Markets, &["Stocks rally"]);
        assert_eq!(s, "偏強。聚焦高流動性資產，嚴設停損與風險限額。");
        assert!(s.chars().count() <= MAX_FORECAST_CHARS);
        assert_eq!(compose_forecast::<&str>(Category::Ai, &[]), "");
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let long = "字".repeat(130);
        let out = bound_chars(&long);
        assert_eq!(out.chars().count(), 96);
        assert!(out.ends_with('…'));
        assert_eq!(out.chars().take(95).collect::<String>(), "字".repeat(95));

        let exact = "x".repeat(100);
        assert_eq!(bound_chars(&exact), exact);
    }

    #[test]
    fn every_category_gets_a_forecast_entry() {
        let news = News::from([(
            Category::Economy,
            vec![NewsItem::try_new("Crisis talks", "https://x").unwrap()],
        )]);
        let forecasts = compose_forecasts(&news);
        assert_eq!(forecasts.len(), 3);
        assert!(forecasts[&Category::Economy].starts_with("偏弱。"));
        assert_eq!(forecasts[&Category::Ai], "");
    }
}
