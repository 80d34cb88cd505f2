use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, error::AppError, queries::user_queries, utils::jwt};

/// Name of the httpOnly cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "access_token";

/// Resolve the caller: find a token (header first, cookie second), verify it,
/// and re-resolve the subject to a live account. The full user row is attached
/// to request extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let claims = jwt::verify_token(&state.auth, &token)?;

    let user = user_queries::find_by_email(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Token carrier precedence: `Authorization: Bearer` header wins over the
/// session cookie; the two are never merged.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer header-token".parse().unwrap());
        headers.insert(COOKIE, "access_token=cookie-token".parse().unwrap());

        assert_eq!(
            token_from_headers(&headers),
            Some("header-token".to_string())
        );
    }

    #[test]
    fn cookie_is_used_when_header_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "access_token=cookie-token; other=1".parse().unwrap());

        assert_eq!(
            token_from_headers(&headers),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn malformed_authorization_header_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic abc123".parse().unwrap());
        headers.insert(COOKIE, "access_token=cookie-token".parse().unwrap());

        assert_eq!(
            token_from_headers(&headers),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn missing_both_carriers_yields_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
