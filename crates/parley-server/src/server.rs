use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use parley_engine::CallController;
use parley_settings::ParleySettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::errors::{Result, ServerError};
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub reap_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            request_timeout: Duration::from_secs(60),
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &ParleySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            request_timeout: Duration::from_secs(settings.server.request_timeout_secs),
            reap_interval: Duration::from_secs(settings.call.reap_interval_secs.max(1)),
        }
    }
}

/// Shared state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CallController>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(controller: Arc<CallController>) -> Self {
        Self {
            controller,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "webhook",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %uuid::Uuid::now_v7(),
        )
    });

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/webhooks/answer",
            get(handlers::answer).post(handlers::answer),
        )
        .route("/webhooks/speech", post(handlers::input))
        .route("/webhooks/dtmf", post(handlers::input))
        .route("/webhooks/events", post(handlers::events))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(trace)
}

/// Periodically drop sessions whose call-end webhook never arrived.
pub fn start_reaper_task(
    controller: Arc<CallController>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = controller.evict_idle();
                    if removed > 0 {
                        tracing::info!(removed, "idle call sessions evicted");
                    }
                }
            }
        }
    })
}

/// Bind and serve. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    controller: Arc<CallController>,
) -> Result<ServerHandle> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    let shutdown = ShutdownCoordinator::new();
    let reaper = start_reaper_task(
        Arc::clone(&controller),
        config.reap_interval,
        shutdown.token(),
    );
    let router = build_router(AppState::new(controller), config.request_timeout);

    tracing::info!(host = %config.host, port = local_addr.port(), "parley server started");

    let token = shutdown.token();
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!(error = %err, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown,
        tasks: vec![server, reaper],
    })
}

/// Handle returned by `start()`; keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop accepting requests, let in-flight ones finish, stop the reaper.
    pub async fn shutdown(self) {
        self.shutdown.drain(self.tasks, None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode;
    use parley_core::{CallId, GatewayError};
    use parley_llm::{MockProvider, MockResponse};
    use tower::ServiceExt;

    fn controller(responses: Vec<MockResponse>) -> Arc<CallController> {
        Arc::new(CallController::new(
            &ParleySettings::default(),
            Arc::new(MockProvider::repeating(responses)),
        ))
    }

    fn app(controller: &Arc<CallController>) -> Router {
        build_router(AppState::new(Arc::clone(controller)), Duration::from_secs(5))
    }

    fn post_json(uri: &str, host: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("host", host)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn answer_greets_and_listens() {
        let ctl = controller(vec![]);
        let req = Request::builder()
            .uri("/webhooks/answer?uuid=call-1&from=447700900000")
            .header("host", "localhost:5000")
            .body(Body::empty())
            .unwrap();

        let resp = app(&ctl).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["action"], "talk");
        assert_eq!(ncco[0]["voiceName"], "Amy");
        assert_eq!(ncco[1]["action"], "input");
        assert_eq!(
            ncco[1]["eventUrl"],
            serde_json::json!(["http://localhost:5000/webhooks/speech"])
        );
        assert_eq!(ncco[1]["speech"]["uuid"], serde_json::json!(["call-1"]));
        assert!(ctl.store().contains(&CallId::from_raw("call-1")));
    }

    #[tokio::test]
    async fn answer_post_reads_uuid_from_body() {
        let ctl = controller(vec![]);
        let req = post_json("/webhooks/answer", "localhost", r#"{"uuid":"call-9"}"#);
        let resp = app(&ctl).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(ctl.store().contains(&CallId::from_raw("call-9")));
    }

    #[tokio::test]
    async fn answer_without_uuid_uses_unknown() {
        let ctl = controller(vec![]);
        let req = Request::builder()
            .uri("/webhooks/answer")
            .body(Body::empty())
            .unwrap();
        let resp = app(&ctl).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(ctl.store().contains(&CallId::unknown()));
    }

    #[tokio::test]
    async fn speech_webhook_replies_with_https_callback() {
        let ctl = controller(vec![MockResponse::text("I don't have weather access, sorry!")]);
        let body = r#"{"uuid":"A","speech":{"results":[{"text":"What's the weather?","confidence":"0.9"}]}}"#;
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/speech", "bot.example.com", body))
            .await
            .unwrap();

        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["text"], "I don't have weather access, sorry!");
        assert_eq!(ncco[0]["bargeIn"], true);
        assert_eq!(
            ncco[1]["eventUrl"],
            serde_json::json!(["https://bot.example.com/webhooks/speech"])
        );
    }

    #[tokio::test]
    async fn malformed_body_reprompts() {
        let ctl = controller(vec![]);
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/speech", "localhost", "{not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["text"], "I didn't catch that. Could you please repeat?");
        assert_eq!(ncco[1]["action"], "input");
    }

    #[tokio::test]
    async fn bad_sub_field_keeps_call_id() {
        let ctl = controller(vec![]);
        let body = r#"{"uuid":"call-1","speech":{"results":null}}"#;
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/speech", "localhost", body))
            .await
            .unwrap();
        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["text"], "I didn't catch that. Could you please repeat?");
        assert_eq!(ncco[1]["speech"]["uuid"], serde_json::json!(["call-1"]));
        assert!(ctl.store().contains(&CallId::from_raw("call-1")));
        assert!(!ctl.store().contains(&CallId::unknown()));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_deliveries_both_get_a_reply() {
        let settings = ParleySettings::default();
        let ctl = Arc::new(CallController::new(
            &settings,
            Arc::new(MockProvider::repeating(vec![MockResponse::delayed(
                Duration::from_secs(19),
                MockResponse::Echo,
            )])),
        ));
        let router = build_router(
            AppState::new(Arc::clone(&ctl)),
            ServerConfig::from_settings(&settings).request_timeout,
        );

        let first = r#"{"uuid":"S","speech":{"results":[{"text":"first"}]}}"#;
        let second = r#"{"uuid":"S","speech":{"results":[{"text":"second"}]}}"#;
        let (a, b) = tokio::join!(
            router
                .clone()
                .oneshot(post_json("/webhooks/speech", "localhost", first)),
            router
                .clone()
                .oneshot(post_json("/webhooks/speech", "localhost", second)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(body_json(a).await[1]["action"], "input");
        assert_eq!(body_json(b).await[1]["action"], "input");

        let history = ctl.store().snapshot_history(&CallId::from_raw("S")).await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content(), format!("echo: {}", history[0].content()));
        assert_eq!(history[3].content(), format!("echo: {}", history[2].content()));
    }

    #[tokio::test]
    async fn dtmf_webhook_listens_for_keypad() {
        let ctl = controller(vec![MockResponse::Echo]);
        let body = r#"{"uuid":"K","dtmf":{"digits":"1","timed_out":false}}"#;
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/dtmf", "localhost", body))
            .await
            .unwrap();
        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["text"], "echo: request capability demonstration");
        assert_eq!(ncco[1]["type"], serde_json::json!(["dtmf"]));
        assert_eq!(
            ncco[1]["eventUrl"],
            serde_json::json!(["http://localhost/webhooks/dtmf"])
        );
    }

    #[tokio::test]
    async fn events_with_keypad_input_return_ncco() {
        let ctl = controller(vec![MockResponse::Echo]);
        let body = r#"{"uuid":"E","dtmf":{"digits":"2"}}"#;
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/events", "localhost", body))
            .await
            .unwrap();
        let ncco = body_json(resp).await;
        assert_eq!(ncco[0]["text"], "echo: request help menu");
    }

    #[tokio::test]
    async fn completed_event_ends_call() {
        let ctl = controller(vec![]);
        let id = CallId::from_raw("done");
        ctl.start_call(&id, &parley_engine::CallbackBase::new("http://localhost"))
            .await;

        for _ in 0..2 {
            let resp = app(&ctl)
                .oneshot(post_json(
                    "/webhooks/events",
                    "localhost",
                    r#"{"uuid":"done","status":"completed"}"#,
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_text(resp).await, "OK");
        }
        assert!(!ctl.store().contains(&id));
    }

    #[tokio::test]
    async fn malformed_event_is_ignored() {
        let ctl = controller(vec![]);
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/events", "localhost", "garbage"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "OK");
        assert!(ctl.store().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_still_returns_ncco() {
        let ctl = controller(vec![MockResponse::Error(GatewayError::AuthenticationFailed(
            "invalid api key".into(),
        ))]);
        let body = r#"{"uuid":"F","speech":{"results":[{"text":"hi"}]}}"#;
        let resp = app(&ctl)
            .oneshot(post_json("/webhooks/speech", "localhost", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ncco = body_json(resp).await;
        assert!(ncco[0]["text"].as_str().unwrap().contains("configuration"));
        assert_eq!(ncco[1]["action"], "input");
    }

    #[tokio::test]
    async fn health_and_root() {
        let ctl = controller(vec![]);
        let resp = app(&ctl)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(resp).await, "Voice bot is running!");

        ctl.start_call(
            &CallId::from_raw("h"),
            &parley_engine::CallbackBase::new("http://localhost"),
        )
        .await;
        let resp = app(&ctl)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["active_calls"], 1);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let ctl = controller(vec![]);
        let resp = app(&ctl)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: taken.local_addr().unwrap().port(),
            ..Default::default()
        };
        let err = start(config, controller(vec![])).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[test]
    fn config_from_settings() {
        let mut settings = ParleySettings::default();
        settings.server.port = 8080;
        settings.call.reap_interval_secs = 0;
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.reap_interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        };
        let handle = start(config, controller(vec![])).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_stops_on_cancel() {
        let ctl = controller(vec![]);
        let token = CancellationToken::new();
        let task = start_reaper_task(ctl, Duration::from_secs(60), token.clone());
        tokio::time::advance(Duration::from_secs(120)).await;
        token.cancel();
        task.await.unwrap();
    }
}
