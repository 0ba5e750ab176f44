#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

use iris_service::iris;
use iris_service::random_forest::RandomForestBuilder;
use iris_service::{router, AppState, LogConfig, LogContext, LogFormat, PredictionService};

/// Forest fitted once on the full Iris data and shared by every test.
pub fn service() -> Arc<PredictionService> {
    static SERVICE: OnceLock<Arc<PredictionService>> = OnceLock::new();

    SERVICE
        .get_or_init(|| {
            let builder = iris::load_iris();
            let model = RandomForestBuilder {
                n_trees: 30,
                seed: Some(42),
                ..RandomForestBuilder::default()
            }
            .fit(builder.build());

            Arc::new(PredictionService::new(model, None).expect("iris forest has three classes"))
        })
        .clone()
}

#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn messages(&self, message: &str) -> Vec<Value> {
        self.lines().into_iter().filter(|l| l["message"] == message).collect()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(self.0.clone())
    }
}

pub fn logs() -> (LogContext, Captured) {
    let captured = Captured::default();
    let config = LogConfig {
        level: "info".to_string(),
        format: LogFormat::Json,
    };

    (LogContext::with_writer(&config, captured.clone()), captured)
}

pub fn app() -> (Router, Captured) {
    let (logs, captured) = logs();
    let app = router(AppState {
        service: service(),
        logs,
    });

    (app, captured)
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, body)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
