use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::AppendHeaders,
    routing::{get, post},
};

use crate::{
    dto::auth::{AuthResponse, LoginRequest, Profile, RegisterRequest},
    error::AppResult,
    middleware::auth::AuthSession,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session cookie set", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email is already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(
    StatusCode,
    AppendHeaders<[(axum::http::HeaderName, String); 1]>,
    Json<ApiResponse<AuthResponse>>,
)> {
    let (body, cookie) = auth_service::register(&state.orm, &state.sessions, payload).await?;
    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(body),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(
    AppendHeaders<[(axum::http::HeaderName, String); 1]>,
    Json<ApiResponse<AuthResponse>>,
)> {
    let (body, cookie) =
        auth_service::login(&state.accounts, &state.docs, &state.sessions, payload).await?;
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = ApiResponse<()>)
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
) -> AppResult<(
    AppendHeaders<[(axum::http::HeaderName, String); 1]>,
    Json<ApiResponse<()>>,
)> {
    let (body, cookie) = auth_service::logout(&state.sessions);
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = ApiResponse<Profile>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let resp = auth_service::profile(&state.orm, &state.docs, &session).await?;
    Ok(Json(resp))
}
