mod agents;
mod config;
mod gateway;
mod http;
mod idempotency;
mod metrics;
mod models;
mod sessions;
mod supabase;
mod wizard;

use agents::{AgentDirectory, AgentVerification, OpenAgentDirectory, SupabaseAgentDirectory};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequestParts, Path, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use gateway::RestGateway;
use idempotency::{IdempotencyStore, StoredResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{
    ApiError, FacilityInput, MediaUpload, NextResponse, OpenWizardRequest, ReorderRequest,
    SelectCategoryRequest, SessionView, UpdateFieldRequest, VideoRequest,
};
use serde_json::json;
use sessions::{SessionError, SessionStore};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use supabase::SupabaseClient;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;
use wizard::{
    FacilitySelection, ListingCategory, PreviewRegistry, Progress, SubmissionResult,
    WizardError, draft::DraftError, schema::resolve_steps,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "listing.api", "server crashed: {err:?}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let gateway = RestGateway::from_env();
    if !gateway.is_configured() {
        warn!(
            target = "listing.api",
            "SUPABASE_URL or LISTINGS_API_URL missing; submissions will fail until configured"
        );
    }

    let agents: Arc<dyn AgentDirectory> = match SupabaseClient::from_env() {
        Some(client) => Arc::new(SupabaseAgentDirectory::new(client)),
        None => {
            warn!(target = "listing.api", "no agent profile store configured; all accounts treated as verified");
            Arc::new(OpenAgentDirectory)
        }
    };

    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());

    let sessions = SessionStore::new(Arc::new(gateway), PreviewRegistry::new());
    let _sweeper = sessions.spawn_sweeper(
        Duration::from_secs(config::session_sweep_secs()),
        Duration::from_secs(config::session_idle_secs()),
    );

    let state = AppState {
        sessions,
        agents,
        openapi: Arc::new(load_openapi()),
        idempotency: Arc::new(IdempotencyStore::new(redis, config::idempotency_ttl_secs())),
        prometheus_handle,
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config::port()).into();
    info!(target = "listing.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    sessions: SessionStore,
    agents: Arc<dyn AgentDirectory>,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<IdempotencyStore>,
    prometheus_handle: PrometheusHandle,
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .route("/categories", get(list_categories))
        .route("/categories/{category}", get(category_steps))
        .route("/wizards", post(open_wizard))
        .route("/wizards/{id}", get(get_wizard).delete(delete_wizard))
        .route("/wizards/{id}/category", post(select_category))
        .route("/wizards/{id}/fields", patch(update_field))
        .route("/wizards/{id}/facilities", put(set_facilities))
        .route("/wizards/{id}/amenities", put(set_amenities))
        .route("/wizards/{id}/documents", put(set_documents))
        .route("/wizards/{id}/photos", post(add_photos))
        .route("/wizards/{id}/photos/reorder", post(reorder_photos))
        .route("/wizards/{id}/photos/{media_id}", delete(remove_photo))
        .route("/wizards/{id}/video", put(set_video))
        .route("/wizards/{id}/media/{media_id}/preview", get(preview_media))
        .route("/wizards/{id}/next", post(next_step))
        .route("/wizards/{id}/prev", post(prev_step))
        .route("/wizards/{id}/close", post(close_wizard))
        .route("/wizards/{id}/reset", post(reset_wizard))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config::body_limit()))
}

fn load_openapi() -> serde_json::Value {
    serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi": "3.0.3"}))
}

/// The account the request acts for, from `X-Account-Id`.
struct AccountId(String);

impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("X-Account-Id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(AccountId)
            .ok_or(AppError::MissingAccount)
    }
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "listing-studio",
        "open_sessions": state.sessions.len().await,
        "previews": state.sessions.previews().stats(),
    }))
}

/// Every listing category with its ordered wizard steps.
async fn list_categories() -> Json<serde_json::Value> {
    let categories: Vec<_> = ListingCategory::ALL
        .into_iter()
        .map(|category| json!({"category": category, "steps": resolve_steps(category)}))
        .collect();
    Json(json!({ "categories": categories }))
}

async fn category_steps(Path(category): Path<String>) -> Result<Json<serde_json::Value>, AppError> {
    let category = category
        .parse::<ListingCategory>()
        .map_err(|_| AppError::NotFound("unknown_category"))?;
    Ok(Json(json!({"category": category, "steps": resolve_steps(category)})))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::Unauthorized);
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Listing Studio API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#,
    )
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Open a wizard session for a verified agent.
///
/// - Method: `POST`
/// - Path: `/wizards`
/// - Auth: `X-Account-Id: <account>`; the account must be a verified agent
/// - Body: `{ "category"?: "rent" | "lease" | "short_let" | "sell" }`
/// - Response: `201` with the session view
async fn open_wizard(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Json(payload): Json<OpenWizardRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    crate::metrics::inc_requests("/wizards");
    let verification = state.agents.verification(&account).await.map_err(|err| {
        warn!(target = "listing.api", account = %account, error = %err, "agent_lookup_failed");
        AppError::AgentLookup(err.to_string())
    })?;
    if verification != AgentVerification::Verified {
        info!(target = "listing.api", account = %account, ?verification, "wizard refused for unverified agent");
        return Err(AppError::NotVerified(verification));
    }

    let (id, mut wizard) = state.sessions.open(&account).await;
    if let Some(category) = payload.category {
        wizard.select_category(category)?;
    }
    Ok((StatusCode::CREATED, Json(SessionView::new(id, &wizard))))
}

async fn get_wizard(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let wizard = state.sessions.lock(id, &account).await?;
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn delete_wizard(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    crate::metrics::inc_requests("/wizards/{id}:delete");
    state.sessions.remove(id, &account).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Select or switch the listing category. Switching discards the draft.
async fn select_category(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectCategoryRequest>,
) -> Result<Json<SessionView>, AppError> {
    crate::metrics::inc_requests("/wizards/{id}/category");
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.select_category(payload.category)?;
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn update_field(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFieldRequest>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard
        .form_mut()?
        .update_field(payload.field, payload.value)?;
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn set_facilities(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<Vec<FacilityInput>>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    let facilities: Vec<FacilitySelection> = payload.into_iter().map(Into::into).collect();
    wizard.form_mut()?.set_facilities(facilities);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn set_amenities(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<Vec<String>>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.form_mut()?.set_amenities(payload);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn set_documents(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<Vec<String>>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.form_mut()?.set_available_documents(payload);
    Ok(Json(SessionView::new(id, &wizard)))
}

/// Stage photos. Files arrive inline as base64 and are kept in memory until
/// submission; nothing is uploaded here.
async fn add_photos(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<Vec<MediaUpload>>,
) -> Result<Json<SessionView>, AppError> {
    crate::metrics::inc_requests("/wizards/{id}/photos");
    let files = payload
        .into_iter()
        .map(|upload| upload.decode("image/jpeg"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|detail| AppError::BadRequest("invalid_media", detail))?;
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.form_mut()?.media_mut().add_photos(files);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn remove_photo(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path((id, media_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.form_mut()?.media_mut().remove_photo(media_id);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn reorder_photos(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard
        .form_mut()?
        .media_mut()
        .reorder_photos(payload.from, payload.to);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn set_video(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    Json(payload): Json<VideoRequest>,
) -> Result<Json<SessionView>, AppError> {
    let file = payload
        .video
        .map(|upload| upload.decode("video/mp4"))
        .transpose()
        .map_err(|detail| AppError::BadRequest("invalid_media", detail))?;
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.form_mut()?.media_mut().set_video(file);
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn preview_media(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path((id, media_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let wizard = state.sessions.lock(id, &account).await?;
    let media = wizard
        .form()
        .and_then(|form| form.media().get(media_id))
        .ok_or(AppError::NotFound("media_not_found"))?;
    Ok((
        [(header::CONTENT_TYPE, media.file().content_type.clone())],
        media.file().data.clone(),
    )
        .into_response())
}

/// Advance the wizard, or validate and submit from the last step.
///
/// - Method: `POST`
/// - Path: `/wizards/{id}/next`
/// - Headers: optional `Idempotency-Key`; a repeated key replays the stored response
/// - Response: `NextResponse`; `502` when the upload or create step failed
async fn next_step(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    crate::metrics::inc_requests("/wizards/{id}/next");
    let mut wizard = state.sessions.lock(id, &account).await?;

    let key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| format!("wizard:{id}:{k}"));
    if let Some(key) = &key
        && let Some(stored) = state.idempotency.get(key).await
    {
        let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
        return Ok((status, Json(stored.body)).into_response());
    }

    let progress = wizard.go_next().await?;
    info!(target = "listing.api", session = %id, state = wizard.state().name(), "wizard moved forward");
    let status = match &progress {
        Progress::Submitted(SubmissionResult::Failure { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    let response = NextResponse {
        progress,
        session: SessionView::new(id, &wizard),
    };
    if let Some(key) = key
        && let Ok(body) = serde_json::to_value(&response)
    {
        state
            .idempotency
            .put(
                key,
                StoredResponse {
                    status: status.as_u16(),
                    body,
                },
            )
            .await;
    }
    Ok((status, Json(response)).into_response())
}

async fn prev_step(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.go_prev();
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn close_wizard(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.close()?;
    Ok(Json(SessionView::new(id, &wizard)))
}

async fn reset_wizard(
    State(state): State<AppState>,
    AccountId(account): AccountId,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let mut wizard = state.sessions.lock(id, &account).await?;
    wizard.reset_form()?;
    Ok(Json(SessionView::new(id, &wizard)))
}

#[derive(Debug)]
enum AppError {
    Wizard(WizardError),
    Session(SessionError),
    MissingAccount,
    Unauthorized,
    NotVerified(AgentVerification),
    AgentLookup(String),
    BadRequest(&'static str, String),
    NotFound(&'static str),
}

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl From<DraftError> for AppError {
    fn from(value: DraftError) -> Self {
        Self::Wizard(WizardError::Draft(value))
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            AppError::Wizard(err) => {
                let (status, code) = match &err {
                    WizardError::Validation(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed")
                    }
                    WizardError::Busy => (StatusCode::CONFLICT, "submission_in_progress"),
                    WizardError::NoCategory => (StatusCode::BAD_REQUEST, "no_category"),
                    WizardError::InvalidTransition { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_transition")
                    }
                    WizardError::Draft(_) => (StatusCode::BAD_REQUEST, "invalid_field"),
                };
                (status, code, Some(err.to_string()))
            }
            AppError::Session(err) => {
                let (status, code) = match err {
                    SessionError::NotFound => (StatusCode::NOT_FOUND, "wizard_not_found"),
                    SessionError::Busy => (StatusCode::CONFLICT, "submission_in_progress"),
                };
                (status, code, Some(err.to_string()))
            }
            AppError::MissingAccount => (
                StatusCode::UNAUTHORIZED,
                "missing_account",
                Some("Provide X-Account-Id".to_string()),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotVerified(verification) => (
                StatusCode::FORBIDDEN,
                "agent_not_verified",
                Some(format!("agent verification is {verification:?}").to_lowercase()),
            ),
            AppError::AgentLookup(detail) => {
                (StatusCode::BAD_GATEWAY, "agent_lookup_failed", Some(detail))
            }
            AppError::BadRequest(code, detail) => (StatusCode::BAD_REQUEST, code, Some(detail)),
            AppError::NotFound(code) => (StatusCode::NOT_FOUND, code, None),
        };
        let payload = ApiError {
            error: code.to_string(),
            detail,
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
