use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use prospect_core::models::{Actor, RecordId, Role};
use prospect_core::protocol::{
    AuthResponse, LoginRequest, RegisterRequest, SyncRequest, SyncResponse, UserProfile,
};

use crate::auth::{extract_bearer_token, hash_password, verify_password, Claims, TokenSigner};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::store::{ServerStore, User};
use crate::sync;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<ServerStore>>,
    signer: Arc<TokenSigner>,
}

impl AppState {
    pub fn from_config(config: ServerConfig) -> Result<Self, AppError> {
        let store = ServerStore::open(&config.database_path)?;
        Ok(Self::new(store, &config))
    }

    pub fn new(store: ServerStore, config: &ServerConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            signer: Arc::new(TokenSigner::new(&config.jwt_secret, config.token_ttl)),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync", post(run_sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp_millis(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let claims = state.signer.verify(token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || request.password.is_empty() || request.name.trim().is_empty() {
        return Err(AppError::bad_request("Email, password and name are required"));
    }

    let store = state.store.lock().await;
    if store.user_by_email(&email)?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let now = Utc::now().timestamp_millis();
    let user = User {
        id: RecordId::new(),
        email,
        password_hash: hash_password(&request.password)?,
        name: request.name.trim().to_string(),
        role: request.role.unwrap_or(Role::Viewer),
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user)?;
    tracing::info!(user = %user.id, role = %user.role, "registered user");

    let token = state.signer.mint(&user)?;
    Ok(Json(AuthResponse {
        user: profile_of(&user),
        token,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = request.email.trim().to_lowercase();

    let store = state.store.lock().await;
    let Some(user) = store.user_by_email(&email)? else {
        return Err(AppError::unauthorized("Invalid credentials"));
    };
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = state.signer.mint(&user)?;
    Ok(Json(AuthResponse {
        user: profile_of(&user),
        token,
    }))
}

async fn run_sync(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let user_id: RecordId = claims
        .sub
        .parse()
        .map_err(|_| AppError::unauthorized("Malformed token subject"))?;

    let store = state.store.lock().await;
    // Role is re-read from the store, not trusted from week-old claims
    let Some(user) = store.user_by_id(user_id)? else {
        return Err(AppError::unauthorized("Unknown user"));
    };

    let actor = Actor {
        id: user.id,
        role: user.role,
    };
    let response = sync::process(&store, actor, &request)?;
    Ok(Json(response))
}

fn profile_of(user: &User) -> UserProfile {
    UserProfile {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
    }
}
