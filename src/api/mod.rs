//! HTTP surface: the administrative CRUD endpoints plus the two-endpoint
//! 1C integration contract (`/card-status`, `/refuel`). Every response,
//! success or error, is JSON with permissive cross-origin headers.

mod admin;
mod error;
mod integration;

pub use error::ApiError;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::application::{AppError, AppService};

#[derive(Clone)]
pub struct AppState {
    service: Option<Arc<AppService>>,
}

impl AppState {
    /// `None` means the process runs without a configured database; every
    /// handler then answers with a configuration error, matching the
    /// original deployment's behavior.
    pub fn new(service: Option<Arc<AppService>>) -> Self {
        Self { service }
    }

    fn service(&self) -> Result<&AppService, AppError> {
        self.service.as_deref().ok_or(AppError::Configuration)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", post(admin::authenticate))
        .route(
            "/clients",
            get(admin::list_clients)
                .post(admin::create_client)
                .put(admin::update_client)
                .delete(admin::delete_client),
        )
        .route(
            "/fuel-types",
            get(admin::list_fuel_types)
                .post(admin::create_fuel_type)
                .put(admin::update_fuel_type)
                .delete(admin::delete_fuel_type),
        )
        .route(
            "/stations",
            get(admin::list_stations)
                .post(admin::create_station)
                .put(admin::update_station)
                .delete(admin::delete_station),
        )
        .route(
            "/fuel-cards",
            get(admin::list_cards)
                .post(admin::create_card)
                .put(admin::update_card)
                .delete(admin::delete_card),
        )
        .route(
            "/card-operations",
            get(admin::list_operations)
                .post(admin::create_operation)
                .put(admin::update_operation)
                .delete(admin::delete_operation),
        )
        .route("/card-status", get(integration::card_status))
        .route("/refuel", post(integration::refuel))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
