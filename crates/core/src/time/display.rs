use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The pair of timestamps every snapshot carries: one in the display zone, one in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAt {
    pub local: DateTime<FixedOffset>,
    pub utc: DateTime<Utc>,
}

pub fn parse_zone(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid time zone {name:?}"))
}

pub fn stamp(now_utc: DateTime<Utc>, zone: Tz) -> GeneratedAt {
    GeneratedAt {
        local: now_utc.with_timezone(&zone).fixed_offset(),
        utc: now_utc,
    }
}

/// Human-facing label, e.g. `2026-10-16 08:00:00 (Asia/Taipei)`.
pub fn local_label(at: &GeneratedAt, zone: Tz) -> String {
    format!("{} ({})", at.local.format("%Y-%m-%d %H:%M:%S"), zone.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn taipei_is_eight_hours_ahead_of_utc() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 30, 0).unwrap();
        let at = stamp(now, parse_zone("Asia/Taipei").unwrap());
        assert_eq!(at.local.to_rfc3339(), "2026-10-16T08:30:00+08:00");
        assert_eq!(at.utc, now);
        assert_eq!(at.local.with_timezone(&Utc), at.utc);
    }

    #[test]
    fn rejects_unknown_zone() {
        assert!(parse_zone("Mars/Olympus").is_err());
    }

    #[test]
    fn label_carries_zone_name() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 0, 0).unwrap();
        let zone = parse_zone("Asia/Taipei").unwrap();
        let at = stamp(now, zone);
        assert_eq!(local_label(&at, zone), "2026-01-06 07:00:00 (Asia/Taipei)");
    }
}
