mod auth;
mod health;
mod products;
mod store;
mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use crate::{AppState, middleware::auth_middleware};

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh", post(auth::refresh))
        .route("/users/register", post(users::register))
        .route("/products/{id}/track-click", post(products::track_click))
        .route("/store/{identifier}", get(store::get_storefront));

    let protected = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/me/store", put(users::update_store))
        .route("/users/me/banner", post(users::upload_banner))
        .route("/products/", post(products::create).get(products::list_mine))
        .route(
            "/products/{id}",
            put(products::update).delete(products::remove),
        )
        .route("/products/{id}/images/upload", post(products::upload_image))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(public).merge(protected).with_state(state)
}
