//! Game-data catalog service.
//!
//! Serves a mostly-static catalog (items, sets, mounts, recipes, almanax)
//! over HTTP while a background updater periodically re-ingests it from
//! upstream. Two complete generations of data exist at all times: readers
//! serve one while the updater rebuilds the other, then a single atomic flip
//! cuts traffic over. A failed refresh is invisible to callers; the worst
//! case is slightly stale data until the next successful cycle.

use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;
pub mod update;

use config::Config;
use routes::{
    almanax_range, almanax_single, get_item, get_mount, get_recipe, get_set, health, list_bonuses,
    list_items, list_items_by_category, list_mounts, list_sets, search_bonuses, search_items,
    search_mounts, search_sets, trigger_update,
};
use state::AppState;
use update::spawn_periodic;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let (state, mut orchestrator) =
        AppState::new(Config::load()).context("search client setup failed")?;

    info!("Running initial catalog load...");
    orchestrator
        .bootstrap()
        .await
        .context("initial catalog load failed")?;

    let cancel = CancellationToken::new();
    let mut updater = tokio::spawn(orchestrator.run(cancel.clone()));
    let ticker = spawn_periodic(
        state.trigger.clone(),
        state.config.update_interval,
        cancel.clone(),
    );

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/health", get(health))
        .route("/update", post(trigger_update))
        .route("/{lang}/items", get(list_items))
        .route("/{lang}/items/search", get(search_items))
        .route("/{lang}/items/categories/{category}", get(list_items_by_category))
        .route("/{lang}/items/{id}", get(get_item))
        .route("/{lang}/sets", get(list_sets))
        .route("/{lang}/sets/search", get(search_sets))
        .route("/{lang}/sets/{id}", get(get_set))
        .route("/{lang}/mounts", get(list_mounts))
        .route("/{lang}/mounts/search", get(search_mounts))
        .route("/{lang}/mounts/{id}", get(get_mount))
        .route("/{lang}/recipes/{id}", get(get_recipe))
        .route("/{lang}/almanax/bonuses", get(list_bonuses))
        .route("/{lang}/almanax/bonuses/search", get(search_bonuses))
        .route("/{lang}/almanax/range", get(almanax_range))
        .route("/{lang}/almanax/{date}", get(almanax_single))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server => {
            // listener closed, in-flight requests drained
            result?;
            info!("Listener drained, stopping update loop");
            cancel.cancel();
            // an in-flight cycle finishes (including cleanup) before exit
            updater.await.context("update loop panicked")??;
        }
        result = &mut updater => {
            cancel.cancel();
            result.context("update loop panicked")??;
            anyhow::bail!("update loop exited unexpectedly");
        }
    }

    ticker.abort();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
