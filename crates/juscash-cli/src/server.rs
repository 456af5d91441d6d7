//! HTTP service.
//!
//! One pipeline (and so one policy index, one generation queue and one
//! embedding cache) is shared by every request.
//!
//! Routes:
//! - `GET /health`: process liveness
//! - `GET /health/generator`: generation server liveness
//! - `POST /validate_process`: decide a case record

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use juscash_core::{CaseError, CaseRecord, DecisionResult};
use juscash_runtime::DecisionPipeline;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<DecisionPipeline>,
}

impl AppState {
    pub fn new(pipeline: DecisionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/health/generator", get(generator_health))
        .route("/validate_process", post(validate_process))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, pipeline: DecisionPipeline) -> anyhow::Result<()> {
    let router = create_router(AppState::new(pipeline));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(%addr, "Listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: run until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Request failures, rendered as `{"detail": ...}`.
#[derive(Debug)]
enum ApiError {
    /// The payload is not a valid case record
    InvalidCase(Vec<String>),
    /// Retrieval or generation failed
    Unavailable(String),
}

impl From<CaseError> for ApiError {
    fn from(err: CaseError) -> Self {
        match err {
            CaseError::SchemaError(violations) => ApiError::InvalidCase(violations),
            other => ApiError::InvalidCase(vec![other.to_string()]),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidCase(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": violations })),
            )
                .into_response(),
            ApiError::Unavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": message })),
            )
                .into_response(),
        }
    }
}

async fn validate_process(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<DecisionResult>, ApiError> {
    let case = CaseRecord::from_json(&body).map_err(|e| {
        warn!(error = %e, "Rejected case record");
        ApiError::from(e)
    })?;

    match state.pipeline.decide(&case).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            error!(case_number = %case.case_number, error = %e, "Decision failed");
            Err(ApiError::Unavailable(e.to_string()))
        }
    }
}

async fn generator_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    if state.pipeline.health_check().await {
        (StatusCode::OK, Json(json!({ "status": "up" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "down" })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{self, Body};
    use axum::http::Request;
    use juscash_core::{PolicyCorpus, RetrievedPassage};
    use juscash_runtime::{
        GenerationConfig, Generator, IndexError, NoopAuditSink, PolicyRetriever, ProviderError,
    };
    use serde_json::Value;
    use tower::ServiceExt as _;

    const BODY_LIMIT: usize = 1024 * 1024;

    const CASE: &str = r#"{
  "numeroProcesso": "0000001-00.2024.8.26.0001",
  "classe": "Cumprimento de Sentença",
  "orgaoJulgador": "3ª Vara Cível",
  "ultimaDistribuicao": "2024-05-01T08:00:00",
  "segredoJustica": false,
  "justicaGratuita": false,
  "siglaTribunal": "TJSP",
  "esfera": "Trabalhista",
  "valorCondenacao": 50000.0,
  "documentos": [],
  "movimentos": []
}"#;

    struct WholeCorpus;

    #[async_trait]
    impl PolicyRetriever for WholeCorpus {
        async fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedPassage>, IndexError> {
            Ok(PolicyCorpus::reference()
                .map(PolicyCorpus::passages)
                .unwrap_or_default())
        }
    }

    struct FixedGenerator {
        reply: Result<&'static str, ()>,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<String, ProviderError> {
            self.reply
                .map(str::to_string)
                .map_err(|_| ProviderError::Unavailable("connection refused".to_string()))
        }

        async fn health_check(&self) -> bool {
            self.reply.is_ok()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn router(reply: Result<&'static str, ()>) -> Router {
        let pipeline = DecisionPipeline::builder()
            .retriever(Arc::new(WholeCorpus))
            .generator(Arc::new(FixedGenerator { reply }))
            .audit(Arc::new(NoopAuditSink))
            .model_name("google/gemma-2b-it")
            .build()
            .unwrap();
        create_router(AppState::new(pipeline))
    }

    fn post_case(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/validate_process")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Ok("{}"));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_generator_health_reports_down() {
        let app = router(Err(()));
        let request = Request::builder()
            .uri("/health/generator")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "down");
    }

    #[tokio::test]
    async fn test_validate_process_returns_decision() {
        let app = router(Ok(
            r#"{"decision":"rejected","rationale":"Esfera trabalhista.","citacoes":["POL-4"]}"#,
        ));

        let response = app.oneshot(post_case(CASE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["decision"], "rejected");
        assert_eq!(body["citacoes"], json!(["POL-4"]));
        assert_eq!(body["model_name"], "google/gemma-2b-it");
        assert_eq!(body["prompt_version"], "v1.0.0");
    }

    #[tokio::test]
    async fn test_schema_violations_are_422() {
        let mut case: Value = serde_json::from_str(CASE).unwrap();
        case.as_object_mut().unwrap().remove("esfera");

        let response = router(Ok("{}"))
            .oneshot(post_case(&case.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        let detail = body["detail"].as_array().unwrap();
        assert!(detail.iter().any(|v| v.as_str().unwrap().contains("esfera")));
    }

    #[tokio::test]
    async fn test_malformed_json_is_422() {
        let response = router(Ok("{}")).oneshot(post_case("{ nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["detail"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_503() {
        let response = router(Err(())).oneshot(post_case(CASE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/validate_process")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = router(Ok("{}")).oneshot(request).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
