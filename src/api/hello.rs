#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, param::Path, payload::Json, Object };

use crate::service::GreetingService;
use crate::utils::hello_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
/** The greeting endpoint.  The service is injected at construction time in
 * main, so request handling reads no global state.
 */
pub struct HelloApi {
    service: GreetingService,
}

impl HelloApi {
    pub fn new(service: GreetingService) -> Self {
        Self { service }
    }
}

struct ReqGreeting
{
    name: String,
}

#[derive(Object, Debug)]
pub struct RespGreeting
{
    message: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGreeting {
    type Req = ReqGreeting;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request parameters:");
        s.push_str("\n    name: ");
        s.push_str(&self.name);
        s
    }
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl HelloApi {
    #[oai(path = "/hello/:name", method = "get")]
    async fn get_greeting(&self, http_req: &Request, name: Path<String>) -> Json<RespGreeting> {
        // Package the request parameters.
        let req = ReqGreeting { name: name.to_string() };

        // -------------------- Process Request ----------------------
        Json(RespGreeting::process(http_req, &self.service, &req))
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespGreeting {
    fn new(message: String) -> Self {
        Self { message }
    }

    /// Process the request.  Greeting construction cannot fail, so there is
    /// no error path here; malformed routes never reach this handler.
    fn process(http_req: &Request, service: &GreetingService, req: &ReqGreeting) -> RespGreeting {
        // Conditional logging depending on log level.
        hello_utils::debug_request(http_req, req);

        RespGreeting::new(service.polite_hello(&req.name).into_message())
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use poem::Route;
    use poem_openapi::OpenApiService;

    use crate::service::GreetingService;
    use super::HelloApi;

    /** Assemble an in-process app the same way main does, minus the
     * listener and the runtime context.
     */
    fn test_app(greeting: Option<&str>) -> Route {
        let svc = GreetingService::new(greeting.map(str::to_string));
        let api_service = OpenApiService::new(HelloApi::new(svc), "Hello Server", "0.1.0");
        Route::new().nest("/", api_service)
    }

    #[tokio::test]
    async fn greeting_with_configured_prefix() {
        let cli = TestClient::new(test_app(Some("Hello")));
        let resp = cli.get("/hello/World").send().await;
        resp.assert_status_is_ok();
        resp.assert_content_type("application/json; charset=utf-8");
        resp.assert_text(r#"{"message":"Hello, World"}"#).await;
    }

    #[tokio::test]
    async fn greeting_without_configured_prefix() {
        let cli = TestClient::new(test_app(None));
        let resp = cli.get("/hello/World").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        json.value().object().get("message").assert_string("helloWorld");
    }

    #[tokio::test]
    async fn empty_name_segment_is_not_found() {
        // The router rejects the empty segment before the handler runs.
        let cli = TestClient::new(test_app(Some("Hello")));
        let resp = cli.get("/hello/").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn name_passes_through_url_decoding() {
        let cli = TestClient::new(test_app(Some("Hello")));
        let resp = cli.get("/hello/Jane%20Doe").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(serde_json::json!({"message": "Hello, Jane Doe"})).await;
    }
}
