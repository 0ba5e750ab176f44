//! Iris species prediction service: a random forest classifier, the tooling
//! that trains it and the HTTP API that serves it.

pub mod api;
pub mod classifier;
pub mod config;
pub mod csv_data;
pub mod dataset;
pub mod decision_tree;
pub mod error;
pub mod functions;
pub mod iris;
pub mod metadata;
pub mod metrics;
pub mod model_service;
pub mod node;
pub mod observability;
pub mod random_forest;
pub mod training;
pub mod validation;

pub use api::{router, AppState};
pub use config::ServerConfig;
pub use error::{InferenceError, ModelError};
pub use model_service::PredictionService;
pub use observability::{LogConfig, LogContext, LogFormat};
