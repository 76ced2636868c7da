//! greenline-api — REST API for the promotion daemon.
//!
//! Provides axum route handlers over the state store and the
//! per-service promotion controllers.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness: fixed success, no side effects |
//! | POST | `/api/v1/images/notify` | Image-registry change notification |
//! | GET | `/api/v1/services` | List managed services |
//! | GET | `/api/v1/services/:id` | Service detail with promotion status |
//! | GET | `/api/v1/attempts` | List archived promotion attempts |
//! | GET | `/api/v1/attempts/:id` | Get one attempt (archived or in flight) |
//! | POST | `/api/v1/attempts/:id/cancel` | Cancel an in-flight attempt |

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use greenline_promote::ControllerApi;
use greenline_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    /// Promotion controller per managed service.
    pub controllers: Arc<HashMap<String, Arc<dyn ControllerApi>>>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/images/notify", post(handlers::notify_image))
        .route("/services", get(handlers::list_services))
        .route("/services/{id}", get(handlers::get_service))
        .route("/attempts", get(handlers::list_attempts))
        .route("/attempts/{id}", get(handlers::get_attempt))
        .route("/attempts/{id}/cancel", post(handlers::cancel_attempt))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
