use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::{from_fn, Next},
    response::Response,
    routing::post,
    Router,
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

use api_contract::{validation_gate, FieldErrors, ModelState};

const HANDLER_BODY: &str = "handler ran";

// Stands in for the binding stage: reads the field errors it should report from a test-only header.
async fn inject_model_state(mut request: Request, next: Next) -> Response {
    let errors: FieldErrors = request
        .headers()
        .get("x-test-errors")
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(';')
                .filter_map(|pair| pair.split_once('='))
                .map(|(field, msg)| (field.to_string(), msg.to_string()))
                .collect()
        })
        .unwrap_or_default();
    request.extensions_mut().insert(ModelState(errors));
    next.run(request).await
}

fn test_app(calls: Arc<AtomicUsize>) -> Router {
    let handler = move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::ACCEPTED, HANDLER_BODY)
        }
    };

    Router::new()
        .route("/wallets", post(handler))
        .layer(from_fn(validation_gate))
        .layer(from_fn(inject_model_state))
}

fn request(errors: Option<&str>, accept: Option<&str>) -> axum::http::Request<Body> {
    let mut builder = axum::http::Request::builder()
        .method("POST")
        .uri("/wallets");
    if let Some(errors) = errors {
        builder = builder.header("x-test-errors", errors);
    }
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn invalid_request_short_circuits_with_first_messages() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = test_app(calls.clone());

    let response = app
        .oneshot(request(
            Some("Name=Required;Email=Invalid format;Email=Too long"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["ResultType"], 3);
    assert_eq!(json["Message"], "Response has validation errors");
    assert_eq!(
        json["ValidationMessages"],
        serde_json::json!(["Required", "Invalid format"])
    );
    assert!(json["ResponseData"].is_null());
    assert!(json.get("Successful").is_none());

    assert_eq!(calls.load(Ordering::SeqCst), 0, "handler must not run");
}

#[tokio::test]
async fn valid_request_reaches_handler_once_and_passes_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = test_app(calls.clone());

    let response = app.oneshot(request(None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_string(response).await, HANDLER_BODY);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejection_negotiates_xml() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = test_app(calls.clone());

    let response = app
        .oneshot(request(Some("Amount=Must be positive"), Some("application/xml")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/xml")
    );
    assert_eq!(
        response
            .headers()
            .get(header::VARY)
            .and_then(|v| v.to_str().ok()),
        Some("accept")
    );

    let xml = body_string(response).await;
    assert!(xml.contains("<ResultType>3</ResultType>"));
    assert!(xml.contains("<ValidationMessages><string>Must be positive</string></ValidationMessages>"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_model_state_is_treated_as_valid() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = calls.clone();
    let app = Router::new()
        .route(
            "/wallets",
            post(move || {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                }
            }),
        )
        .layer(from_fn(validation_gate));

    let response = app.oneshot(request(None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
