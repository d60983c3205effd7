//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FileTimerStorage, InMemoryDatabase, SystemClock},
    config::{Config, DatabaseBackend},
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        require_auth,
        rest::{
            active_session_handler, create_book_handler, delete_session_handler,
            get_book_handler, list_books_handler, list_sessions_handler, start_session_handler,
            update_session_handler,
        },
        stats::{heatmap_handler, stats_handler},
        timer::{
            abandon_session_handler, finish_session_handler, get_timer_handler,
            pause_timer_handler, reconcile_timer_handler, resume_timer_handler,
        },
        ApiDoc, AppState,
    },
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use bookflow_core::ports::DatabaseService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database {
        DatabaseBackend::Postgres(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        DatabaseBackend::InMemory => {
            warn!("Using the in-memory database; nothing survives a restart.");
            Arc::new(InMemoryDatabase::new())
        }
    };

    // --- 3. Timer Persistence & Shared AppState ---
    let timer_storage = FileTimerStorage::new(config.timer_state_dir.clone())?;
    info!("Timer state kept in {}", timer_storage.dir().display());
    let app_state = Arc::new(AppState::new(
        db,
        Arc::new(SystemClock),
        Arc::new(timer_storage),
        config.clone(),
    ));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/books", post(create_book_handler).get(list_books_handler))
        .route("/books/{book_id}", get(get_book_handler))
        .route(
            "/sessions",
            post(start_session_handler).get(list_sessions_handler),
        )
        .route("/sessions/active", get(active_session_handler))
        .route(
            "/sessions/{session_id}",
            patch(update_session_handler).delete(delete_session_handler),
        )
        .route("/timer", get(get_timer_handler))
        .route("/timer/pause", post(pause_timer_handler))
        .route("/timer/resume", post(resume_timer_handler))
        .route("/timer/finish", post(finish_session_handler))
        .route("/timer/abandon", post(abandon_session_handler))
        .route("/timer/reconcile", post(reconcile_timer_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/heatmap", get(heatmap_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
