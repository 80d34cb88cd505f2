use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

use crate::{
    AppState,
    config::Environment,
    error::{AppError, Result},
    middleware::{SESSION_COOKIE, token_from_headers},
    models::{AuthResponse, LoginRequest},
    queries::user_queries,
    utils::jwt,
};

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let user = user_queries::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Incorrect email or password".to_string()))?;

    let is_valid = bcrypt::verify(&payload.password, &user.password)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {}", e)))?;

    if !is_valid {
        return Err(AppError::Unauthorized(
            "Incorrect email or password".to_string(),
        ));
    }

    let token = jwt::generate_token(&state.auth, &user.email)?;
    let jar = jar.add(session_cookie(&state, token.clone()));

    tracing::info!("User logged in: {}", user.id);

    Ok((
        jar,
        Json(AuthResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));

    (jar, Json(json!({ "message": "Logged out" })))
}

/// Re-issue a token from an expired-but-signature-valid one, within the
/// configured grace window. The account must still exist.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let token = token_from_headers(&headers)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let claims = jwt::decode_for_refresh(&state.auth, &token)?;

    let user = user_queries::find_by_email(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

    let token = jwt::generate_token(&state.auth, &user.email)?;
    let jar = jar.add(session_cookie(&state, token.clone()));

    Ok((
        jar,
        Json(AuthResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        }),
    ))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.environment == Environment::Production)
        .build()
}
