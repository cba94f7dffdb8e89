use std::time::{Duration, Instant};

use anyhow::Result;
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderValue, StatusCode, Uri,
};
use prometheus::{Encoder, TextEncoder};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer, ExposeHeaders},
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use utoipa::OpenApi;

use conn_slo::errors::{self, ErrorKind};

use crate::{
    config::ApiMode,
    controllers::{
        self, admin, connector_resources, definitions, health,
        ListResponse, OutputsResponse, ResourceResponse, StateResponse,
    },
    middlewares::{MakeSpanWithTrace, TRACE_ID},
    services::connector_resources::{
        ConnectorResourceView, CreateInput, RenameInput,
    },
    var::{HTTP_REQUESTS_DURATION_SECONDS, HTTP_REQUESTS_TOTAL},
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/", description = "Local server"),
    ),
    paths(
        controllers::connector_resources::create,
        controllers::connector_resources::list,
        controllers::connector_resources::get_one,
        controllers::connector_resources::update,
        controllers::connector_resources::delete,
    ),
    components(schemas(
        ConnectorResourceView,
        CreateInput,
        RenameInput,
        ResourceResponse,
        ListResponse,
        StateResponse,
        OutputsResponse,
    )),
    tags(
        (name = "connector-resources", description = "Connector resource lifecycle"),
    ),
)]
struct ApiDoc;

pub struct AppRouter;

impl AppRouter {
    /// Public REST listener.
    pub fn build(state: AppState) -> Result<Router> {
        let cors_origin = state.config.cors_origin.parse::<HeaderValue>()?;

        let router = Router::new().nest(
            "/v1alpha",
            Router::new()
                .route("/openapi.json", get(Self::openapi))
                .merge(health::new_router())
                .merge(definitions::new_router(state.clone()))
                .merge(connector_resources::new_router(state.clone())),
        );
        let router = Self::observe(router, &state)?
            .layer(
                CorsLayer::new()
                    .expose_headers(ExposeHeaders::list(vec![
                        HeaderName::from_static(TRACE_ID),
                    ]))
                    .allow_headers(AllowHeaders::mirror_request())
                    .allow_methods(AllowMethods::mirror_request())
                    .allow_origin(cors_origin)
                    .allow_credentials(true)
                    .max_age(Duration::from_secs(60) * 60 * 12),
            )
            .route_layer(middleware::from_fn(Self::track_metrics))
            .route("/metrics", get(Self::metrics));

        Ok(router)
    }

    /// Private REST listener, reachable from inside the cluster only.
    pub fn build_private(state: AppState) -> Result<Router> {
        let router = Router::new().nest(
            "/v1alpha",
            Router::new()
                .merge(health::new_router())
                .merge(admin::new_router(state.clone())),
        );
        Ok(Self::observe(router, &state)?
            .route_layer(middleware::from_fn(Self::track_metrics)))
    }

    fn observe(router: Router, state: &AppState) -> Result<Router> {
        let subject_header =
            HeaderName::from_bytes(state.config.subject_header.as_bytes())?;
        let mut router = router
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .make_span_with(
                            MakeSpanWithTrace::new()
                                .level(Level::INFO)
                                .subject_header(subject_header),
                        )
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                ),
            )
            .layer(middleware::from_fn(Self::trace))
            .fallback(Self::not_found);
        if state.config.api_mode == ApiMode::Gateway {
            router = router.layer(middleware::from_fn(Self::gateway_status));
        }
        Ok(router)
    }

    async fn trace(mut request: Request, next: Next) -> Response {
        let trace_id = match request.headers().get(TRACE_ID) {
            Some(v) => v.clone(),
            None => {
                let Ok(v) =
                    HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                else {
                    return next.run(request).await;
                };
                request.headers_mut().insert(TRACE_ID, v.clone());
                v
            }
        };
        let mut response = next.run(request).await;
        response.headers_mut().insert(TRACE_ID, trace_id);
        response
    }

    /// Behind the API gateway unauthenticated callers see 404 and failed
    /// preconditions 422.
    async fn gateway_status(request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        let status = match response.extensions().get::<ErrorKind>() {
            Some(ErrorKind::Unauthenticated) => StatusCode::NOT_FOUND,
            Some(ErrorKind::FailedPrecondition) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => return response,
        };
        *response.status_mut() = status;
        response
    }

    async fn track_metrics(request: Request, next: Next) -> impl IntoResponse {
        let path = if let Some(matched_path) =
            request.extensions().get::<MatchedPath>()
        {
            matched_path.as_str().to_owned()
        } else {
            request.uri().path().to_owned()
        };
        let start = Instant::now();
        let method = request.method().to_string();
        let response = next.run(request).await;
        let latency = start.elapsed();

        let labels = [method.as_str(), path.as_str()];
        HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();
        HTTP_REQUESTS_DURATION_SECONDS
            .with_label_values(&labels)
            .observe(latency.as_secs_f64());

        response
    }

    async fn metrics() -> conn_slo::Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = vec![];
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(errors::any)?;

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, encoder.format_type())
            .body(Body::from(buffer))
            .map_err(errors::any)
    }

    async fn openapi() -> impl IntoResponse {
        Json(ApiDoc::openapi())
    }

    async fn not_found(uri: Uri) -> impl IntoResponse {
        errors::not_found(&format!("no route for {}", uri))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::body::to_bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use conn_connect::{Connectors, Kind, MockConnector, StaticCatalog};
    use conn_storage::MemoryStore;

    use super::*;
    use crate::{services::occupancy::NoopOracle, App, AppConfig};

    fn state(api_mode: ApiMode) -> AppState {
        let mut connector = MockConnector::new();
        connector.expect_kind().return_const(Kind::Csv);
        connector.expect_probe().returning(|_| Ok(()));
        connector.expect_deliver().returning(|_, _| Ok(()));
        let config = AppConfig {
            api_mode,
            ..Default::default()
        };
        AppState(Arc::new(App::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticCatalog::default()),
            Connectors::default().with(Arc::new(connector)),
            Arc::new(NoopOracle),
        )))
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        subject: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(subject) = subject {
            builder = builder.header("jwt-sub", subject);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn csv_body(id: &str) -> Value {
        json!({
            "id": id,
            "connector_definition_name": "connector-definitions/destination-csv",
            "configuration": {"destination_path": "/local/test"},
        })
    }

    #[tokio::test]
    async fn lifecycle_scenario() {
        let router = AppRouter::build(state(ApiMode::Direct)).unwrap();
        let base = "/v1alpha/connector-resources";

        let (status, body) =
            call(&router, "POST", base, Some("a"), Some(csv_body("csv-1")))
                .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["connector_resource"]["name"],
            "users/a/connector-resources/csv-1"
        );
        assert_eq!(body["connector_resource"]["state"], "STATE_UNSPECIFIED");

        let (status, body) = call(
            &router,
            "POST",
            &format!("{}/csv-1/connect", base),
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let mut state = Value::Null;
        for _ in 0..100 {
            let (_, body) = call(
                &router,
                "GET",
                &format!("{}/csv-1/watch", base),
                Some("a"),
                None,
            )
            .await;
            state = body["state"].clone();
            if state == "STATE_CONNECTED" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state, "STATE_CONNECTED");

        let (status, body) = call(
            &router,
            "POST",
            &format!("{}/csv-1/execute", base),
            Some("a"),
            Some(json!({"inputs": [{"x": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"outputs": []}));

        let (status, _) = call(
            &router,
            "POST",
            &format!("{}/csv-1/disconnect", base),
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &router,
            "DELETE",
            &format!("{}/csv-1", base),
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(
            &router,
            "GET",
            &format!("{}/csv-1", base),
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "1010002");
    }

    #[tokio::test]
    async fn list_and_namespaced_routes() {
        let router = AppRouter::build(state(ApiMode::Direct)).unwrap();
        for id in ["c1", "c2"] {
            let (status, _) = call(
                &router,
                "POST",
                "/v1alpha/users/a/connector-resources",
                Some("a"),
                Some(csv_body(id)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = call(
            &router,
            "GET",
            "/v1alpha/connector-resources?page_size=1&view=VIEW_FULL",
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_size"], 2);
        assert_eq!(body["connector_resources"][0]["id"], "c1");
        assert!(body["connector_resources"][0]["configuration"].is_object());
        let token = body["next_page_token"]
            .as_str()
            .unwrap()
            .replace('+', "%2B")
            .replace('/', "%2F")
            .replace('=', "%3D");
        assert!(!token.is_empty());

        let (_, body) = call(
            &router,
            "GET",
            &format!("/v1alpha/connector-resources?page_size=1&page_token={}", token),
            Some("a"),
            None,
        )
        .await;
        assert_eq!(body["connector_resources"][0]["id"], "c2");
        assert!(body["connector_resources"][0]["configuration"].is_null());
        assert_eq!(body["next_page_token"], "");

        let (status, _) = call(
            &router,
            "GET",
            "/v1alpha/users/b/connector-resources/c1",
            Some("a"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_merges_configuration() {
        let router = AppRouter::build(state(ApiMode::Direct)).unwrap();
        call(
            &router,
            "POST",
            "/v1alpha/connector-resources",
            Some("a"),
            Some(csv_body("csv-1")),
        )
        .await;

        let (status, body) = call(
            &router,
            "PATCH",
            "/v1alpha/connector-resources/csv-1",
            Some("a"),
            Some(json!({
                "description": "nightly export",
                "configuration": {"destination_path": "/local/nightly"},
                "state": "STATE_CONNECTED",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let resource = &body["connector_resource"];
        assert_eq!(resource["description"], "nightly export");
        assert_eq!(
            resource["configuration"],
            json!({"destination_path": "/local/nightly"})
        );
        assert_eq!(resource["state"], "STATE_UNSPECIFIED");

        let (status, _) = call(
            &router,
            "PATCH",
            "/v1alpha/connector-resources/csv-1",
            Some("a"),
            Some(json!({"colour": "red"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_codes_follow_api_mode() {
        for (mode, unauthenticated, precondition) in [
            (
                ApiMode::Direct,
                StatusCode::UNAUTHORIZED,
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiMode::Gateway,
                StatusCode::NOT_FOUND,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ] {
            let router = AppRouter::build(state(mode)).unwrap();
            let (status, _) = call(
                &router,
                "GET",
                "/v1alpha/connector-resources",
                None,
                None,
            )
            .await;
            assert_eq!(status, unauthenticated);

            call(
                &router,
                "POST",
                "/v1alpha/connector-resources",
                Some("a"),
                Some(csv_body("csv-1")),
            )
            .await;
            let (status, _) = call(
                &router,
                "POST",
                "/v1alpha/connector-resources/csv-1/execute",
                Some("a"),
                Some(json!({"inputs": [{}]})),
            )
            .await;
            assert_eq!(status, precondition);
        }
    }

    #[tokio::test]
    async fn private_listener_sees_every_owner() {
        let state = state(ApiMode::Direct);
        let public = AppRouter::build(state.clone()).unwrap();
        let private = AppRouter::build_private(state).unwrap();
        let (_, body) = call(
            &public,
            "POST",
            "/v1alpha/connector-resources",
            Some("a"),
            Some(csv_body("csv-1")),
        )
        .await;
        let uid = body["connector_resource"]["uid"].as_str().unwrap().to_owned();

        let (status, body) = call(
            &private,
            "GET",
            "/v1alpha/admin/connector-resources",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_size"], 1);

        let (status, body) = call(
            &private,
            "GET",
            &format!("/v1alpha/admin/connector-resources/{}/lookUp", uid),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connector_resource"]["id"], "csv-1");

        let (_, body) = call(
            &private,
            "GET",
            &format!("/v1alpha/admin/connector-resources/{}/check", uid),
            None,
            None,
        )
        .await;
        assert_eq!(body["state"], "STATE_DISCONNECTED");

        let (status, _) = call(
            &public,
            "GET",
            &format!("/v1alpha/users/b/connector-resources/{}/lookUp", uid),
            Some("b"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_and_trace_id() {
        let router = AppRouter::build(state(ApiMode::Direct)).unwrap();
        let response = router
            .clone()
            .oneshot(
                http::Request::builder()
                    .uri("/v1alpha/__liveness")
                    .header(TRACE_ID, "t-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[TRACE_ID], "t-1");

        let (_, body) =
            call(&router, "GET", "/v1alpha/connector-definitions", None, None)
                .await;
        assert_eq!(body["total_size"], 6);
        let (_, body) = call(
            &router,
            "GET",
            "/v1alpha/connector-definitions/destination-csv",
            None,
            None,
        )
        .await;
        assert_eq!(
            body["connector_definition"]["name"],
            "connector-definitions/destination-csv"
        );
    }
}
