//! reverie-api - HTTP API server for reverie

mod handlers;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use uuid::Uuid;

use reverie_ai::{OpenAIBackend, OpenAIConfig};
use reverie_core::{defaults, ChatDiagnostics};
use reverie_db::Database;
use reverie_jobs::AiProcessor;

use handlers::{ai, entries, insights};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE & ERRORS
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing for a
/// personal server).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub processor: AiProcessor,
    /// The entry backend, retained concretely for the diagnostics endpoint.
    pub diagnostics: Arc<OpenAIBackend>,
    /// Owner used when no `x-owner-id` header is present (single-user mode).
    pub default_owner: Uuid,
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

/// HTTP error envelope.
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<reverie_core::Error> for ApiError {
    fn from(err: reverie_core::Error) -> Self {
        use reverie_core::Error;
        match err {
            Error::EntryNotFound(id) => ApiError::NotFound(format!("Entry not found: {}", id)),
            Error::InsightNotFound(id) => {
                ApiError::NotFound(format!("Insight not found: {}", id))
            }
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Resolve the owner for a request: `x-owner-id` header, or the configured
/// single-user fallback. Auth proper is an external collaborator.
pub fn owner_from_headers(headers: &HeaderMap, state: &AppState) -> Result<Uuid, ApiError> {
    match headers.get("x-owner-id") {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| ApiError::BadRequest("Invalid x-owner-id header".to_string())),
        None => Ok(state.default_owner),
    }
}

// =============================================================================
// OPENAPI
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::entries::create_entry,
        handlers::entries::list_entries,
        handlers::entries::get_entry,
        handlers::entries::update_entry,
        handlers::entries::delete_entry,
        handlers::entries::process_entry,
        handlers::entries::retry_entry,
        handlers::entries::regenerate_entry,
        handlers::insights::generate_insight,
        handlers::insights::list_insights,
        handlers::insights::get_insight,
        handlers::insights::delete_insight,
        handlers::insights::retry_insight,
        handlers::ai::test_ai,
    ),
    components(schemas(
        reverie_core::Entry,
        reverie_core::Insight,
        reverie_core::AiStatus,
        reverie_core::Mood,
        reverie_core::Sentiment,
        reverie_core::SentimentLabel,
        reverie_core::SentimentTrend,
        reverie_core::Trajectory,
        reverie_core::InsightType,
        reverie_core::CreateEntryRequest,
        reverie_core::UpdateEntryRequest,
        handlers::AiActionResponse,
        handlers::insights::GenerateInsightRequest,
        handlers::ai::AiTestResponse,
    )),
    tags(
        (name = "Entries", description = "Journal entry CRUD"),
        (name = "Insights", description = "Batch reflections"),
        (name = "AI", description = "AI processing triggers and diagnostics")
    )
)]
struct ApiDoc;

async fn openapi_yaml() -> Result<impl IntoResponse, ApiError> {
    let yaml = ApiDoc::openapi()
        .to_yaml()
        .map_err(|e| ApiError::Internal(format!("Failed to render OpenAPI document: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml))
}

// =============================================================================
// MIDDLEWARE & BASIC HANDLERS
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ref limiter) = state.rate_limiter {
        if limiter.check().is_err() {
            let body = Json(serde_json::json!({
                "error": "Rate limit exceeded, slow down",
            }));
            return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        }
    }
    next.run(request).await
}

async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.db.ping().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

// =============================================================================
// STARTUP
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "reverie_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "reverie_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("reverie-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/reverie".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration (generous for a personal server)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Construct the AI backends once at startup and inject them everywhere
    // they are needed — no lazily-memoized globals.
    let entry_backend = Arc::new(OpenAIBackend::new(OpenAIConfig::entry_from_env())?);
    let insight_backend = Arc::new(OpenAIBackend::new(OpenAIConfig::insight_from_env())?);
    if !entry_backend.configured() {
        warn!("OPENAI_API_KEY is not set; AI analysis will fail until it is configured");
    }

    let processor = AiProcessor::new(
        Arc::new(db.entries.clone()),
        Arc::new(db.insights.clone()),
        entry_backend.clone(),
        insight_backend,
    );

    // Single-user owner fallback (auth is an external collaborator)
    let default_owner = std::env::var("REVERIE_OWNER_ID")
        .ok()
        .and_then(|v| Uuid::parse_str(&v).ok())
        .unwrap_or_else(|| {
            warn!("REVERIE_OWNER_ID not set; using the nil owner");
            Uuid::nil()
        });

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let state = AppState {
        db,
        processor,
        diagnostics: entry_backend,
        default_owner,
        rate_limiter,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(defaults::CORS_MAX_AGE_SECS));

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // OpenAPI document
        .route("/openapi.yaml", get(openapi_yaml))
        // Entries CRUD
        .route(
            "/api/v1/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route(
            "/api/v1/entries/:id",
            get(entries::get_entry)
                .patch(entries::update_entry)
                .delete(entries::delete_entry),
        )
        // AI job triggers
        .route("/api/v1/entries/:id/process", post(entries::process_entry))
        .route("/api/v1/entries/:id/retry", post(entries::retry_entry))
        .route(
            "/api/v1/entries/:id/regenerate",
            post(entries::regenerate_entry),
        )
        // Insights
        .route(
            "/api/v1/insights",
            get(insights::list_insights).post(insights::generate_insight),
        )
        .route(
            "/api/v1/insights/:id",
            get(insights::get_insight).delete(insights::delete_insight),
        )
        .route("/api/v1/insights/:id/retry", post(insights::retry_insight))
        // Diagnostics
        .route("/api/v1/ai/test", get(ai::test_ai))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
