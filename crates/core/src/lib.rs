pub mod briefing;
pub mod domain;
pub mod ingest;
pub mod narration;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_SNAPSHOT_PATH: &str = "data.json";
    const DEFAULT_NARRATION_PATH: &str = "morning.mp3";
    const DEFAULT_DISPLAY_TZ: &str = "Asia/Taipei";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub snapshot_path: PathBuf,
        pub narration_path: PathBuf,
        pub display_tz: chrono_tz::Tz,
        pub parallel: bool,
        pub openai_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let display_tz = std::env::var("DISPLAY_TZ")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_TZ.to_string());
            let display_tz = crate::time::display::parse_zone(&display_tz)
                .with_context(|| format!("DISPLAY_TZ is not a known IANA zone: {display_tz}"))?;

            Ok(Self {
                snapshot_path: env_path("SNAPSHOT_PATH", DEFAULT_SNAPSHOT_PATH),
                narration_path: env_path("NARRATION_PATH", DEFAULT_NARRATION_PATH),
                display_tz,
                parallel: std::env::var("PIPELINE_PARALLEL")
                    .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
                    .unwrap_or(false),
                openai_api_key: std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }
    }

    fn env_path(key: &str, default: &str) -> PathBuf {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default))
    }
}
