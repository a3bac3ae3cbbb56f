//! HTTP API integration tests
//!
//! Exercises the full router against a fake-backed manager, checking the
//! exact status codes and bodies the tsuru service API contract expects.

use axum::body::Body;
use axum::Router;
use http::header::CONTENT_TYPE;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use varnish_broker::backend::{FakeBackend, ProviderState};
use varnish_broker::store::MemoryStore;
use varnish_broker::{api, AnyManager, Instance, InstanceManager};

struct TestApi {
    router: Router,
    manager: AnyManager,
    backend: FakeBackend,
}

impl TestApi {
    fn new() -> Self {
        let backend = FakeBackend::new();
        let manager = AnyManager::Fake(InstanceManager::new(MemoryStore::new(), backend.clone()));
        Self {
            router: api::router(manager.clone()),
            manager,
            backend,
        }
    }

    /// Seed an instance without going through the HTTP layer
    async fn add_instance(&self, name: &str) -> Instance {
        self.manager.create(name).await.unwrap()
    }

    async fn request(&self, method: &str, uri: &str, form: Option<&str>) -> http::Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }
}

async fn body_string(response: http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn create_instance() {
    let api = TestApi::new();
    let resp = api.request("POST", "/resources", Some("name=someapp")).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let instance = api.manager.info("someapp").await.unwrap();
    assert_eq!(instance.name, "someapp");
}

#[tokio::test]
async fn create_instance_without_name() {
    let api = TestApi::new();
    let resp = api.request("POST", "/resources", Some("names=someapp")).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "name is required");
    // Nothing was launched or persisted
    assert_eq!(api.backend.launched(), 0);
    assert!(api.manager.info("someapp").await.is_err());
}

#[tokio::test]
async fn create_duplicate_instance() {
    let api = TestApi::new();
    api.add_instance("someapp").await;

    let resp = api.request("POST", "/resources", Some("name=someapp")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn remove_instance() {
    let api = TestApi::new();
    api.add_instance("someapp").await;

    let resp = api.request("DELETE", "/resources/someapp", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "");
    assert!(api.manager.info("someapp").await.is_err());
}

#[tokio::test]
async fn remove_instance_not_found() {
    let api = TestApi::new();
    let resp = api.request("DELETE", "/resources/someapp", None).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(resp).await, "Instance not found");
}

#[tokio::test]
async fn bind() {
    let api = TestApi::new();
    api.add_instance("someapp").await;

    let resp = api
        .request(
            "POST",
            "/resources/someapp",
            Some("app-host=someapp.cloud.tsuru.io"),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_string(resp).await, "null");

    let instance = api.manager.info("someapp").await.unwrap();
    assert_eq!(instance.bound, vec!["someapp.cloud.tsuru.io".to_string()]);
}

#[tokio::test]
async fn bind_without_app_host() {
    let api = TestApi::new();
    let resp = api
        .request(
            "POST",
            "/resources/someapp",
            Some("app_hooost=someapp.cloud.tsuru.io"),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "app-host is required");
}

#[tokio::test]
async fn bind_instance_not_found() {
    let api = TestApi::new();
    let resp = api
        .request(
            "POST",
            "/resources/someapp",
            Some("app-host=someapp.cloud.tsuru.io"),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(resp).await, "Instance not found");
}

#[tokio::test]
async fn unbind() {
    let api = TestApi::new();
    api.add_instance("someapp").await;
    api.manager
        .bind("someapp", "someapp.cloud.tsuru.io")
        .await
        .unwrap();

    let resp = api
        .request(
            "DELETE",
            "/resources/someapp/hostname/someapp.cloud.tsuru.io",
            None,
        )
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "");
    assert!(api.manager.info("someapp").await.unwrap().bound.is_empty());
}

#[tokio::test]
async fn unbind_instance_not_found() {
    let api = TestApi::new();
    let resp = api
        .request(
            "DELETE",
            "/resources/someapp/hostname/someapp.cloud.tsuru.io",
            None,
        )
        .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(resp).await, "Instance not found");
}

#[tokio::test]
async fn info() {
    let api = TestApi::new();
    api.add_instance("someapp").await;

    let resp = api.request("GET", "/resources/someapp", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body, serde_json::json!({"name": "someapp"}));
}

#[tokio::test]
async fn info_instance_not_found() {
    let api = TestApi::new();
    let resp = api.request("GET", "/resources/someapp", None).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(resp).await, "Instance not found");
}

#[tokio::test]
async fn status_pending() {
    let api = TestApi::new();
    api.add_instance("someapp").await;

    let resp = api.request("GET", "/resources/someapp/status", None).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn status_running() {
    let api = TestApi::new();
    let instance = api.add_instance("someapp").await;
    api.backend.set_state(&instance.handle, ProviderState::Ready);

    let resp = api.request("GET", "/resources/someapp/status", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn status_error() {
    let api = TestApi::new();
    let instance = api.add_instance("someapp").await;
    api.backend
        .set_state(&instance.handle, ProviderState::Failed);

    let resp = api.request("GET", "/resources/someapp/status", None).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn status_not_found() {
    let api = TestApi::new();
    let resp = api.request("GET", "/resources/someapp/status", None).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(resp).await, "Instance not found");
}

/// Full lifecycle: create, watch it come up, remove, gone
#[tokio::test]
async fn lifecycle_scenario() {
    let api = TestApi::new();

    let resp = api.request("POST", "/resources", Some("name=someapp")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = api.request("GET", "/resources/someapp/status", None).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let instance = api.manager.info("someapp").await.unwrap();
    api.backend.set_state(&instance.handle, ProviderState::Ready);

    let resp = api.request("GET", "/resources/someapp/status", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = api.request("DELETE", "/resources/someapp", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = api.request("GET", "/resources/someapp", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
