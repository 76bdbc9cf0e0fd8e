use anyhow::Context;
use clap::Parser;
use morningbrief_core::briefing::pipeline::{Pipeline, RunOutcome, Sources};
use morningbrief_core::ingest::sources::SourceConfig;
use morningbrief_core::narration::{narrate_best_effort, openai::OpenAiNarrator};
use morningbrief_core::storage::lock::RunLock;
use morningbrief_core::storage::SnapshotStore;
use morningbrief_core::time::display::{local_label, GeneratedAt};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "morningbrief_worker")]
struct Args {
    /// Where the snapshot document is written. Overrides SNAPSHOT_PATH.
    #[arg(long)]
    snapshot_path: Option<PathBuf>,

    /// Build the snapshot and print it without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Fetch source groups concurrently.
    #[arg(long)]
    parallel: bool,

    /// Skip audio narration even when OPENAI_API_KEY is set.
    #[arg(long)]
    no_narration: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = morningbrief_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(path) = args.snapshot_path {
        settings.snapshot_path = path;
    }
    settings.parallel |= args.parallel;

    let _lock = if args.dry_run {
        None
    } else {
        let lock_path = RunLock::path_for(&settings.snapshot_path);
        match RunLock::try_acquire(&lock_path)? {
            Some(lock) => Some(lock),
            None => {
                tracing::warn!(path = %lock_path.display(), "run lock held; another run in progress");
                return Ok(());
            }
        }
    };

    let config = SourceConfig::from_env();
    let sources = Sources::from_config(&config).context("failed to build source adapters")?;
    let store = SnapshotStore::new(settings.snapshot_path.clone());
    let pipeline =
        Pipeline::new(sources, store, &config, settings.display_tz).parallel(settings.parallel);

    let now = chrono::Utc::now();

    if args.dry_run {
        let outcome = pipeline.build(now).await;
        log_report(&outcome, settings.display_tz, true);
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
        return Ok(());
    }

    let outcome = match pipeline.run(now).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "briefing run failed");
            return Err(err);
        }
    };
    log_report(&outcome, settings.display_tz, false);

    if args.no_narration {
        tracing::info!("narration disabled by flag");
    } else if settings.openai_api_key.is_none() {
        tracing::info!("OPENAI_API_KEY not set; skipping narration");
    } else {
        match OpenAiNarrator::from_settings(&settings) {
            Ok(narrator) => {
                narrate_best_effort(
                    &narrator,
                    &outcome.snapshot.summary_text,
                    &settings.narration_path,
                )
                .await;
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "narrator unavailable; skipping narration")
            }
        }
    }

    Ok(())
}

fn log_report(outcome: &RunOutcome, zone: chrono_tz::Tz, dry_run: bool) {
    for group in &outcome.report.groups {
        tracing::info!(group = %group.group, status = %group.status, "group result");
    }
    let at = GeneratedAt {
        local: outcome.snapshot.generated_at_local,
        utc: outcome.snapshot.generated_at_utc,
    };
    tracing::info!(
        dry_run,
        degraded = outcome.report.degraded(),
        sanitized = outcome.report.sanitized,
        generated_at = %local_label(&at, zone),
        "briefing built"
    );
}

fn init_sentry(
    settings: &morningbrief_core::config::Settings,
) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
