//! Training metadata written next to the model artifact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::metrics::ClassificationReport;

/// File locations of one named model inside a model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(model_dir: P, model_name: &str) -> Self {
        let dir = model_dir.as_ref();

        Self {
            model: dir.join(format!("{}.forest", model_name)),
            metadata: dir.join(format!("{}_metadata.json", model_name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
    pub metrics: ClassificationReport,
    pub feature_importance: BTreeMap<String, f64>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub trained_at: String,
}

impl ModelMetadata {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ModelError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ModelError::Metadata {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`ModelMetadata::load`], but a missing file is `None`.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ModelError> {
        if !path.as_ref().exists() {
            return Ok(None);
        }

        Self::load(path).map(Some)
    }
}
