//! Webhook surface for order completed triggers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::domain::events::{EventSource, OrderCompleted, OrderCompletedMessage};
use crate::services::dispatcher::EventDispatcher;
use crate::ExportError;

pub const SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EventDispatcher>,
    pub webhook_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "order-export-webhook"})) }))
        .route("/api/v1/hooks/order-completed", post(order_completed))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

fn error_body(status: StatusCode, err: &ExportError) -> Response {
    (status, Json(serde_json::json!({ "error": err }))).into_response()
}

async fn order_completed(
    State(s): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<OrderCompletedMessage>, JsonRejection>,
) -> Response {
    if let Some(secret) = &s.webhook_secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("rejected webhook call with missing or wrong secret");
            return (StatusCode::UNAUTHORIZED, "invalid webhook secret").into_response();
        }
    }

    let Json(message) = match body {
        Ok(body) => body,
        Err(rejection) => return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response(),
    };

    let event = OrderCompleted::new(message.order_id, EventSource::Webhook);
    match s.dispatcher.dispatch(&event).await.into_iter().next() {
        Some(Ok(report)) => (StatusCode::ACCEPTED, Json(report)).into_response(),
        Some(Err(err @ ExportError::NotFound(_))) => error_body(StatusCode::NOT_FOUND, &err),
        Some(Err(err @ ExportError::UpstreamUnavailable(_))) => error_body(StatusCode::BAD_GATEWAY, &err),
        Some(Err(err)) => error_body(StatusCode::INTERNAL_SERVER_ERROR, &err),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no order handler registered").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderId;
    use crate::services::dispatcher::MockOrderEventHandler;
    use crate::services::pipeline::{ExportReport, LogOutcome, RelayOutcome};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn app(handler: Option<MockOrderEventHandler>, secret: Option<&str>) -> Router {
        let mut dispatcher = EventDispatcher::new();
        if let Some(handler) = handler { dispatcher.register(Arc::new(handler)); }
        router(AppState { dispatcher: Arc::new(dispatcher), webhook_secret: secret.map(String::from) })
    }

    fn sent(id: &OrderId) -> ExportReport {
        ExportReport {
            order_id: id.clone(),
            log: LogOutcome::Written { path: PathBuf::from("/logs/order_data_log_1001.txt") },
            relay: RelayOutcome::Sent { http_status: 200 },
        }
    }

    fn hook(body: &str) -> Request<Body> {
        Request::post("/api/v1/hooks/order-completed")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(None, None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_accepted_with_report() {
        let mut handler = MockOrderEventHandler::new();
        handler.expect_handle()
            .withf(|e: &OrderCompleted| e.order_id == OrderId::from(1001) && e.source == EventSource::Webhook)
            .times(1)
            .returning(|e| Ok(sent(&e.order_id)));

        let response = app(Some(handler), None).oneshot(hook(r#"{"order_id":1001}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json(response).await;
        assert_eq!(body["order_id"], 1001);
        assert_eq!(body["relay"]["status"], "sent");
    }

    #[tokio::test]
    async fn test_not_found_and_unavailable() {
        let mut handler = MockOrderEventHandler::new();
        handler.expect_handle().times(1).returning(|e| Err(ExportError::NotFound(e.order_id.clone())));
        let response = app(Some(handler), None).oneshot(hook(r#"{"id":5}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"]["kind"], "not_found");

        let mut handler = MockOrderEventHandler::new();
        handler.expect_handle().times(1).returning(|_| Err(ExportError::UpstreamUnavailable("down".into())));
        let response = app(Some(handler), None).oneshot(hook(r#"{"id":5}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_bad_body() {
        let mut handler = MockOrderEventHandler::new();
        handler.expect_handle().times(0);
        let response = app(Some(handler), None).oneshot(hook(r#"{"customer":"x"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_secret_required_when_configured() {
        let mut handler = MockOrderEventHandler::new();
        handler.expect_handle().times(1).returning(|e| Ok(sent(&e.order_id)));
        let app = app(Some(handler), Some("hunter2"));

        let response = app.clone().oneshot(hook(r#"{"order_id":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = hook(r#"{"order_id":1}"#);
        request.headers_mut().insert(SECRET_HEADER, "hunter2".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_no_handler_registered() {
        let response = app(None, None).oneshot(hook(r#"{"order_id":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
