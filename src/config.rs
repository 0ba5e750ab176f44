use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::observability::{LogConfig, LogFormat};

/// Server configuration, from flags or `IRIS_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "iris-service")]
#[command(about = "Iris species prediction API")]
pub struct ServerConfig {
    /// Server host address
    #[arg(long, env = "IRIS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(long, env = "IRIS_PORT", default_value = "8000")]
    pub port: u16,

    /// Directory holding the model artifacts
    #[arg(long, env = "IRIS_MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Artifact base name, without extension
    #[arg(long, env = "IRIS_MODEL_NAME", default_value = "iris_model")]
    pub model_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, env = "IRIS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "IRIS_LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn log(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {}: {}", addr, e))
    }
}
