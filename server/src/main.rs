use axum::{
    middleware,
    response::Html,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use anyhow::Context;

mod archive;
mod auth;
mod cli;
mod config;
mod description;
mod error;
mod paths;
mod scripts;
mod store;

use config::Config;
use store::ScriptStore;

// -----------------------------------------------------------------------------
// Shared state
// -----------------------------------------------------------------------------

/// Immutable after startup; the filesystem is the only mutable shared state.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub store: ScriptStore,
}

pub type SharedState = Arc<AppState>;

// -----------------------------------------------------------------------------
// Main entry
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    if config.credentials.fallback {
        warn!(
            "ENV_USER/ENV_PASSWORD not fully set; falling back to the built-in default \
             credentials. Anyone who knows them can modify this repository. \
             Set both variables before exposing the server."
        );
    }

    let store = ScriptStore::open(&config.data_dir)
        .with_context(|| format!("cannot open script store at {}", config.data_dir.display()))?;
    info!("Serving scripts from {}", store.root().display());

    let bind = config.bind;
    let state: SharedState = Arc::new(AppState { config, store });
    let app = build_router(state);

    let listener = TcpListener::bind(bind).await?;
    info!("Script Hub listening on {}", bind);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Every route sits behind the access gate; the gate itself lets the public
/// ones through.
pub fn build_router(state: SharedState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(index_page))
        .route("/login", get(login_page))
        .route("/api/login", post(auth::login))
        .route(
            "/api/scripts",
            get(scripts::list)
                .post(scripts::create)
                .delete(scripts::delete),
        )
        .route("/api/raw/*path", get(scripts::raw))
        .route("/raw/*path", get(scripts::raw))
        .route("/api/download", get(scripts::download))
        .route("/api/cli", get(cli::index))
        .route("/api/cli/script", get(cli::script))
        .route("/script", get(cli::script))
        .nest_service("/static", static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), auth::gate)),
        )
        .with_state(state)
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn login_page() -> Html<&'static str> {
    Html(include_str!("../assets/login.html"))
}
