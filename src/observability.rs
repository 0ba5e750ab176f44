//! Structured request logging.
//!
//! [`LogContext`] owns the subscriber that every record of the service goes
//! to. It is built once at startup and handed to the router, nothing is
//! installed globally by this module. The [`observe`] middleware wraps every
//! route and emits exactly one `Request completed` record per request from
//! the `Drop` of its [`RequestScope`], whichever way the handler exits.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures::FutureExt;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Clone)]
pub struct LogContext {
    dispatch: Dispatch,
}

impl LogContext {
    /// Logs to stdout.
    pub fn new(config: &LogConfig) -> Self {
        Self::with_writer(config, std::io::stdout)
    }

    pub fn with_writer<W>(config: &LogConfig, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true);

        let dispatch = match config.format {
            LogFormat::Json => Dispatch::new(builder.json().flatten_event(true).finish()),
            LogFormat::Pretty => Dispatch::new(builder.pretty().finish()),
        };

        Self { dispatch }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runs `f` with this context as the current subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext").finish_non_exhaustive()
    }
}

/// What one request did, as written to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub latency_ms: f64,
    pub request_id: String,
    pub error: Option<String>,
}

/// Message of a handler failure that became a 500, attached to the response
/// so the middleware can log the cause instead of a generic status message.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub String);

/// Per-request guard. Dropping it emits the metrics record, so the record is
/// written on normal return, on panic and when the request future is dropped.
pub struct RequestScope<'a> {
    logs: &'a LogContext,
    endpoint: String,
    method: String,
    request_id: String,
    started: Instant,
    status_code: u16,
    error: Option<String>,
}

impl<'a> RequestScope<'a> {
    pub fn begin(logs: &'a LogContext, request: &Request) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(fallback_request_id);

        Self {
            logs,
            endpoint: request.uri().path().to_string(),
            method: request.method().to_string(),
            request_id,
            started: Instant::now(),
            // Overwritten once the handler finishes; stays if the future is dropped.
            status_code: 500,
            error: Some("request dropped before completion".to_string()),
        }
    }

    /// Records the handler's response.
    pub fn complete(&mut self, response: &Response) {
        self.status_code = response.status().as_u16();
        self.error = None;

        if let Some(HandlerFailure(message)) = response.extensions().get::<HandlerFailure>() {
            self.record_failure(message.clone());
        } else if self.status_code >= 400 {
            let message = format!("Request returned status code {}", self.status_code);
            self.logs.in_scope(|| {
                tracing::error!(
                    status_code = self.status_code,
                    request_id = %self.request_id,
                    "Non-success response"
                )
            });
            self.error = Some(message);
        }
    }

    /// Records a failure that did not produce a response of its own.
    pub fn fail(&mut self, message: String) {
        self.status_code = 500;
        self.record_failure(message);
    }

    fn record_failure(&mut self, message: String) {
        self.logs.in_scope(|| {
            tracing::error!(error = %message, request_id = %self.request_id, "Unhandled exception")
        });
        self.error = Some(message);
    }

    fn metrics(&self) -> RequestMetrics {
        RequestMetrics {
            endpoint: self.endpoint.clone(),
            method: self.method.clone(),
            status_code: self.status_code,
            latency_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            request_id: self.request_id.clone(),
            error: self.error.clone(),
        }
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        let metrics = self.metrics();

        self.logs.in_scope(|| {
            tracing::info!(
                endpoint = %metrics.endpoint,
                method = %metrics.method,
                status_code = metrics.status_code,
                latency_ms = metrics.latency_ms,
                request_id = %metrics.request_id,
                error = metrics.error.as_deref(),
                "Request completed"
            )
        });
    }
}

fn fallback_request_id() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Request logging middleware. Panics are logged and then resumed unchanged.
pub async fn observe(State(logs): State<LogContext>, request: Request, next: Next) -> Response {
    let mut scope = RequestScope::begin(&logs, &request);

    let outcome = AssertUnwindSafe(next.run(request))
        .catch_unwind()
        .with_subscriber(logs.dispatch().clone())
        .await;

    match outcome {
        Ok(response) => {
            scope.complete(&response);
            response
        }
        Err(payload) => {
            scope.fail(panic_message(payload.as_ref()));
            drop(scope);
            std::panic::resume_unwind(payload)
        }
    }
}
