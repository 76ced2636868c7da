//! REST API handlers.
//!
//! Each handler reads via `StateStore` or talks to a promotion
//! controller and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use greenline_promote::ImageChange;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Liveness ───────────────────────────────────────────────────

/// GET /healthz
///
/// Fixed success with no side effects; this is the path the daemon's
/// own load balancer health checks hit.
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Image notifications ────────────────────────────────────────

/// Image-registry push notification body.
#[derive(Debug, serde::Deserialize)]
pub struct NotifyRequest {
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

/// POST /api/v1/images/notify
///
/// Queues a promotion attempt on the controller of the service
/// watching the pushed repository.
pub async fn notify_image(
    State(state): State<ApiState>,
    Json(req): Json<NotifyRequest>,
) -> impl IntoResponse {
    let services = match state.store.list_services() {
        Ok(s) => s,
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };
    let Some(service) = services
        .iter()
        .find(|s| s.image_repository == req.repository)
    else {
        return error_response(
            &format!("no service watches repository {}", req.repository),
            StatusCode::NOT_FOUND,
        )
        .into_response();
    };
    let Some(controller) = state.controllers.get(&service.id) else {
        return error_response(
            &format!("service {} has no promotion controller", service.id),
            StatusCode::NOT_FOUND,
        )
        .into_response();
    };

    info!(service = %service.id, tag = %req.tag, "image notification received");
    controller.submit(ImageChange {
        repository: req.repository,
        tag: req.tag,
        digest: req.digest,
    });
    (
        StatusCode::ACCEPTED,
        ApiResponse::ok(serde_json::json!({
            "service": service.id,
            "queued": controller.queued_len(),
        })),
    )
        .into_response()
}

// ── Services ───────────────────────────────────────────────────

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_services() {
        Ok(services) => ApiResponse::ok(services).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/services/:id
pub async fn get_service(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_service(&id) {
        Ok(Some(record)) => {
            let controller = state.controllers.get(&id);
            ApiResponse::ok(serde_json::json!({
                "service": record,
                "attempt": controller.and_then(|c| c.current_attempt()),
                "queued": controller.map(|c| c.queued_len()).unwrap_or(0),
            }))
            .into_response()
        }
        Ok(None) => error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Attempts ───────────────────────────────────────────────────

/// GET /api/v1/attempts
pub async fn list_attempts(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_attempts() {
        Ok(attempts) => ApiResponse::ok(attempts).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/attempts/:id
///
/// Archived attempts are served from the store; an id matching the
/// in-flight attempt of some controller is served live.
pub async fn get_attempt(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_attempt(&id) {
        Ok(Some(record)) => return ApiResponse::ok(record).into_response(),
        Ok(None) => {}
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    }
    for controller in state.controllers.values() {
        if let Some(attempt) = controller.current_attempt() {
            if attempt.id == id {
                return ApiResponse::ok(attempt).into_response();
            }
        }
    }
    error_response("attempt not found", StatusCode::NOT_FOUND).into_response()
}

/// POST /api/v1/attempts/:id/cancel
pub async fn cancel_attempt(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    for controller in state.controllers.values() {
        let in_flight = controller
            .current_attempt()
            .is_some_and(|a| a.id == id && !a.phase.is_terminal());
        if in_flight && controller.cancel() {
            info!(attempt = %id, "cancellation requested");
            return ApiResponse::ok(serde_json::json!({
                "attempt": id,
                "status": "cancelling"
            }))
            .into_response();
        }
    }
    error_response("no in-flight attempt with that id", StatusCode::NOT_FOUND).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use greenline_core::ImageRef;
    use greenline_promote::{ControllerApi, PromotionAttempt, PromotionPhase};
    use greenline_state::{
        AttemptOutcome, AttemptRecord, ServiceRecord, ServiceStatus, StateStore,
    };

    /// Controller fake: records submissions, cancels on request.
    struct FakeController {
        service: String,
        submitted: Mutex<Vec<ImageChange>>,
        current: Mutex<Option<PromotionAttempt>>,
    }

    impl FakeController {
        fn new(service: &str) -> Self {
            Self {
                service: service.to_string(),
                submitted: Mutex::new(Vec::new()),
                current: Mutex::new(None),
            }
        }
    }

    impl ControllerApi for FakeController {
        fn service(&self) -> &str {
            &self.service
        }

        fn submit(&self, change: ImageChange) {
            self.submitted.lock().unwrap().push(change);
        }

        fn cancel(&self) -> bool {
            self.current
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|a| !a.phase.is_terminal())
        }

        fn current_attempt(&self) -> Option<PromotionAttempt> {
            self.current.lock().unwrap().clone()
        }

        fn queued_len(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    fn service_record(id: &str, repository: &str) -> ServiceRecord {
        ServiceRecord {
            id: id.to_string(),
            cluster: "portfolio".to_string(),
            image_repository: repository.to_string(),
            container_name: id.to_string(),
            container_port: 8000,
            desired_count: 1,
            discovery_name: None,
            task_spec_revision: 1,
            status: ServiceStatus::Stable,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    fn test_state() -> (ApiState, Arc<FakeController>) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_service(&service_record("app", "registry.example.com/portfolio/app"))
            .unwrap();
        let controller = Arc::new(FakeController::new("app"));
        let mut controllers: HashMap<String, Arc<dyn ControllerApi>> = HashMap::new();
        controllers.insert("app".to_string(), controller.clone());
        (
            ApiState {
                store,
                controllers: Arc::new(controllers),
            },
            controller,
        )
    }

    #[tokio::test]
    async fn healthz_is_fixed_success() {
        let resp = healthz().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn notify_routes_to_watching_service() {
        let (state, controller) = test_state();
        let req = NotifyRequest {
            repository: "registry.example.com/portfolio/app".to_string(),
            tag: "v2".to_string(),
            digest: None,
        };
        let resp = notify_image(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let submitted = controller.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].tag, "v2");
    }

    #[tokio::test]
    async fn notify_unknown_repository_is_not_found() {
        let (state, _) = test_state();
        let req = NotifyRequest {
            repository: "registry.example.com/elsewhere/thing".to_string(),
            tag: "v2".to_string(),
            digest: None,
        };
        let resp = notify_image(State(state), Json(req)).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_service_includes_promotion_status() {
        let (state, controller) = test_state();
        *controller.current.lock().unwrap() = Some(PromotionAttempt::new(
            "app-1",
            "app",
            ImageChange {
                repository: "registry.example.com/portfolio/app".to_string(),
                tag: "v2".to_string(),
                digest: None,
            },
            1000,
        ));

        let resp = get_service(State(state), Path("app".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_nonexistent_service() {
        let (state, _) = test_state();
        let resp = get_service(State(state), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_attempt_prefers_archive_then_live() {
        let (state, controller) = test_state();
        state
            .store
            .put_attempt(&AttemptRecord {
                id: "app-1".to_string(),
                service: "app".to_string(),
                old_image: Some(ImageRef::new("registry.example.com/portfolio/app", "v1")),
                new_image: ImageRef::new("registry.example.com/portfolio/app", "v2"),
                outcome: AttemptOutcome::Promoted,
                failure_reason: None,
                created_at: 1000,
                finished_at: 1100,
            })
            .unwrap();
        *controller.current.lock().unwrap() = Some(PromotionAttempt::new(
            "app-2",
            "app",
            ImageChange {
                repository: "registry.example.com/portfolio/app".to_string(),
                tag: "v3".to_string(),
                digest: None,
            },
            1200,
        ));

        let resp = get_attempt(State(state.clone()), Path("app-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_attempt(State(state.clone()), Path("app-2".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_attempt(State(state), Path("app-9".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_requires_in_flight_attempt() {
        let (state, controller) = test_state();

        let resp = cancel_attempt(State(state.clone()), Path("app-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let mut attempt = PromotionAttempt::new(
            "app-1",
            "app",
            ImageChange {
                repository: "registry.example.com/portfolio/app".to_string(),
                tag: "v2".to_string(),
                digest: None,
            },
            1000,
        );
        attempt.phase = PromotionPhase::Verifying;
        *controller.current.lock().unwrap() = Some(attempt);

        let resp = cancel_attempt(State(state), Path("app-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
