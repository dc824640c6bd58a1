use crate::common::access_log_layer::AccessLogOnResponse;
use crate::common::app_state::AppState;
use crate::common::make_span::RequestIdSpan;
use crate::service::datasource_service::{
    create_datasource, delete_datasource_by_id, get_datasource_by_id, get_datasource_list,
    test_datasource_connection, update_datasource,
};
use crate::service::health_service::health;
use crate::service::migration_task_service::{
    cancel_task, create_task, delete_task, get_task_by_id, get_task_list, get_task_progress,
    start_task, update_task,
};
use crate::service::table_service::{get_table_list, get_table_schema};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::MakeRequestUuid;
use tower_http::trace::TraceLayer;
use tower_http::ServiceBuilderExt;
use tracing::Span;

pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route(
            "/datasources",
            post(create_datasource).get(get_datasource_list),
        )
        .route(
            "/datasources/:id",
            get(get_datasource_by_id)
                .put(update_datasource)
                .delete(delete_datasource_by_id),
        )
        .route("/datasources/:id/test", post(test_datasource_connection))
        .route("/datasources/:id/tables", get(get_table_list))
        .route(
            "/datasources/:id/tables/:table_name/schema",
            get(get_table_schema),
        )
        .route("/migration-tasks", post(create_task).get(get_task_list))
        .route(
            "/migration-tasks/:id",
            get(get_task_by_id).put(update_task).delete(delete_task),
        )
        .route("/migration-tasks/:id/start", post(start_task))
        .route("/migration-tasks/:id/cancel", post(cancel_task))
        .route("/migration-tasks/:id/progress", get(get_task_progress));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestIdSpan)
                .on_response(AccessLogOnResponse)
                .on_failure(|_: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {}),
        )
        .propagate_x_request_id();

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(health))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(middleware)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::{memory_pool, sqlite_fixture};
    use crate::config::ferry_config::MigrationConfig;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        app_with_state().await.0
    }

    async fn app_with_state() -> (Router, AppState) {
        let pool = memory_pool().await;
        let config = MigrationConfig {
            connect_timeout_secs: 2,
            ..MigrationConfig::default()
        };
        let state = AppState::new(pool, &config);
        (create_router(state.clone(), &[]), state)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn create_sqlite_source(app: &Router, name: &str, path: &str) -> i64 {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/datasources",
            Some(json!({ "name": name, "kind": "sqlite", "database": path })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    async fn create_task(app: &Router, source_id: i64, target_id: i64) -> i64 {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/migration-tasks",
            Some(json!({
                "name": "copy adults",
                "source_id": source_id,
                "target_id": target_id,
                "source_table": "users",
                "target_table": "users",
                "filter_condition": "age >= 18",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "pending");
        body["data"]["id"].as_i64().unwrap()
    }

    async fn wait_for_status(app: &Router, task_id: i64, wanted: &str) -> Value {
        let uri = format!("/api/migration-tasks/{}/progress", task_id);
        for _ in 0..100 {
            let (_, body) = call(app, Method::GET, &uri, None).await;
            if body["data"]["status"] == wanted {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("task {} never reached {}", task_id, wanted);
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = app().await;
        let (status, body) = call(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["database"], "up");
    }

    #[tokio::test]
    async fn test_datasource_crud_hides_password() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let id = create_sqlite_source(&app, "local", &path).await;

        let (status, body) = call(&app, Method::GET, &format!("/api/datasources/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["kind"], "sqlite");
        assert!(body["data"].get("password").is_none());

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/datasources/{}", id),
            Some(json!({ "description": "fixture" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["description"], "fixture");
        assert!(body["data"]["updated_at"].is_string());

        let (_, body) = call(&app, Method::GET, "/api/datasources?skip=0&limit=10", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/datasources/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::GET, &format!("/api/datasources/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_duplicate_datasource_name_is_conflict() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        create_sqlite_source(&app, "dup", &path).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/datasources",
            Some(json!({ "name": "dup", "kind": "sqlite", "database": path })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_is_conflict() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        create_sqlite_source(&app, "first", &path).await;
        let second = create_sqlite_source(&app, "second", &path).await;

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/datasources/{}", second),
            Some(json!({ "name": "first" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unreachable_datasource_is_rejected() {
        let app = app().await;
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/datasources",
            Some(json!({ "name": "gone", "kind": "sqlite", "database": missing.to_string_lossy() })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "connection_failed");
        assert_eq!(body["message"], "could not connect to data source");
    }

    #[tokio::test]
    async fn test_invalid_payloads_are_validation_failures() {
        let app = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/datasources",
            Some(json!({ "name": "x", "kind": "oracle", "database": "db" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/datasources",
            Some(json!({ "name": "", "kind": "sqlite", "database": "db" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tables_and_schema() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let id = create_sqlite_source(&app, "local", &path).await;

        let (status, body) = call(&app, Method::POST, &format!("/api/datasources/{}/test", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connected"], true);

        let (_, body) = call(&app, Method::GET, &format!("/api/datasources/{}/tables", id), None).await;
        assert_eq!(body["data"], json!([{ "name": "users", "type": "table" }]));

        let (_, body) = call(
            &app,
            Method::GET,
            &format!("/api/datasources/{}/tables/users/schema", id),
            None,
        )
        .await;
        let columns = body["data"].as_array().unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0]["column_name"], "id");
        assert_eq!(columns[0]["is_primary_key"], true);

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/datasources/{}/tables/nope/schema", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_task_requires_existing_datasources() {
        let app = app().await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/migration-tasks",
            Some(json!({
                "name": "orphan",
                "source_id": 41,
                "target_id": 42,
                "source_table": "a",
                "target_table": "b",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "source data source 41 not found");
    }

    #[tokio::test]
    async fn test_started_task_completes_with_all_rows_processed() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let target = create_sqlite_source(&app, "dst", &path).await;
        let task_id = create_task(&app, source, target).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/migration-tasks/{}/start", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let progress = wait_for_status(&app, task_id, "completed").await;
        assert_eq!(progress["total_rows"], 2);
        assert_eq!(progress["processed_rows"], progress["total_rows"]);
        assert_eq!(progress["progress"], 100);
        assert!(progress["completed_at"].is_string());

        // Only pending tasks start.
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/migration-tasks/{}/start", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_cancel_of_non_running_task_is_rejected() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let task_id = create_task(&app, source, source).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/migration-tasks/{}/cancel", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["message"],
            format!("migration task {} is not running (status: pending)", task_id)
        );

        let (status, _) = call(&app, Method::POST, "/api/migration-tasks/999/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_referenced_datasource_cannot_be_deleted() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let task_id = create_task(&app, source, source).await;

        let (status, _) = call(&app, Method::DELETE, &format!("/api/datasources/{}", source), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/migration-tasks/{}", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::DELETE, &format!("/api/datasources/{}", source), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_task_definition() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let task_id = create_task(&app, source, source).await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/migration-tasks/{}", task_id),
            Some(json!({ "target_table": "users_archive", "filter_condition": "age < 18" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["target_table"], "users_archive");
        assert_eq!(body["data"]["filter_condition"], "age < 18");
        assert_eq!(body["data"]["status"], "pending");

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/migration-tasks/{}", task_id),
            Some(json!({ "target_id": 77 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_path_and_query_use_error_envelope() {
        let app = app().await;
        for (method, uri) in [
            (Method::GET, "/api/datasources/abc"),
            (Method::GET, "/api/datasources/abc/tables"),
            (Method::GET, "/api/datasources?limit=x"),
            (Method::GET, "/api/migration-tasks?limit=x"),
            (Method::POST, "/api/migration-tasks/abc/start"),
            (Method::POST, "/api/migration-tasks/abc/cancel"),
            (Method::GET, "/api/migration-tasks/abc/progress"),
        ] {
            let (status, body) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["success"], false, "{}", uri);
            assert_eq!(body["error"], "validation_failed", "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        let (app, state) = app_with_state().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let task_id = create_task(&app, source, source).await;

        // Keeps the job parked on its slot so the cancel lands mid-run.
        let busy = state.executor.occupy_slot().await;
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/migration-tasks/{}/start", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "running");
        assert_eq!(state.executor.running_count(), 1);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/migration-tasks/{}/cancel", task_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], "cancelled");

        let progress = wait_for_status(&app, task_id, "cancelled").await;
        assert_eq!(progress["total_rows"], 0);
        for _ in 0..100 {
            if state.executor.running_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state.executor.running_count(), 0);
        drop(busy);
    }

    #[tokio::test]
    async fn test_null_clears_optional_fields() {
        let app = app().await;
        let (_dir, path) = sqlite_fixture().await;
        let source = create_sqlite_source(&app, "src", &path).await;
        let task_id = create_task(&app, source, source).await;

        let uri = format!("/api/datasources/{}", source);
        let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "description": "fixture" }))).await;
        assert_eq!(body["data"]["description"], "fixture");
        let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "is_active": true }))).await;
        assert_eq!(body["data"]["description"], "fixture");
        let (status, body) = call(&app, Method::PUT, &uri, Some(json!({ "description": null }))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(body["data"]["description"].is_null());

        let uri = format!("/api/migration-tasks/{}", task_id);
        let (_, body) = call(&app, Method::PUT, &uri, Some(json!({ "name": "copy everyone" }))).await;
        assert_eq!(body["data"]["filter_condition"], "age >= 18");
        let (status, body) = call(&app, Method::PUT, &uri, Some(json!({ "filter_condition": null }))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(body["data"]["filter_condition"].is_null());
        assert_eq!(body["data"]["name"], "copy everyone");
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
