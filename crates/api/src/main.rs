use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use morningbrief_core::domain::snapshot::{Category, NewsItem, Snapshot};
use morningbrief_core::storage::SnapshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = morningbrief_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let state = AppState {
        store: SnapshotStore::new(settings.snapshot_path.clone()),
    };
    tracing::info!(path = %settings.snapshot_path.display(), "serving snapshot");

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshot/latest", get(get_latest_snapshot))
        .route("/snapshot/news/:category", get(get_category))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    store: SnapshotStore,
}

#[derive(Debug, Serialize, PartialEq)]
struct CategoryView {
    category: Category,
    generated_at_local: String,
    items: Vec<NewsItem>,
    forecast: String,
}

impl CategoryView {
    fn from_snapshot(snapshot: &Snapshot, category: Category) -> Self {
        Self {
            category,
            generated_at_local: snapshot.generated_at_local.to_rfc3339(),
            items: snapshot.news_for(category).to_vec(),
            forecast: snapshot
                .forecasts
                .get(&category)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

async fn get_latest_snapshot(State(state): State<AppState>) -> Result<Json<Snapshot>, StatusCode> {
    let snapshot = load(&state).await?.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(snapshot))
}

async fn get_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<CategoryView>, StatusCode> {
    let category = Category::parse(&category).ok_or(StatusCode::BAD_REQUEST)?;
    let snapshot = load(&state).await?.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(CategoryView::from_snapshot(&snapshot, category)))
}

async fn load(state: &AppState) -> Result<Option<Snapshot>, StatusCode> {
    let store = state.store.clone();
    let res = tokio::task::spawn_blocking(move || store.load_snapshot())
        .await
        .map_err(|e| {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    res.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(error = %format!("{e:#}"), "snapshot unreadable");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &morningbrief_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn category_view_pairs_headlines_with_forecast() {
        let utc = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let snapshot = Snapshot {
            generated_at_local: utc.fixed_offset(),
            generated_at_utc: utc,
            rates: Default::default(),
            rate_changes: Default::default(),
            indices: Default::default(),
            news: [(
                Category::Ai,
                vec![NewsItem {
                    title: "Chip shares surge".to_string(),
                    url: "https://x/ai".to_string(),
                }],
            )]
            .into(),
            forecasts: [(Category::Ai, "偏強。".to_string())].into(),
            summary_text: String::new(),
        };

        let view = CategoryView::from_snapshot(&snapshot, Category::Ai);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.forecast, "偏強。");

        let empty = CategoryView::from_snapshot(&snapshot, Category::Markets);
        assert!(empty.items.is_empty());
        assert_eq!(empty.forecast, "");
    }
}
