//! Loads a trained forest once and answers prediction calls against it.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use num_traits::FromPrimitive;
use serde::Serialize;
use tracing::info;

use crate::classifier::Classifier;
use crate::error::{InferenceError, ModelError};
use crate::iris::{Species, FEATURE_COUNT};
use crate::metadata::{ArtifactPaths, ModelMetadata};
use crate::random_forest::RandomForestClassifier;
use crate::validation::Batch;

/// Summary served by `GET /model-info`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub n_trees: usize,
    pub n_features: usize,
    pub labels: Vec<Species>,
    pub metadata: Option<ModelMetadata>,
}

/// Read-only after construction, so one instance is shared by all requests.
#[derive(Debug)]
pub struct PredictionService {
    model: RandomForestClassifier,
    metadata: Option<ModelMetadata>,
}

impl PredictionService {
    pub fn new(model: RandomForestClassifier, metadata: Option<ModelMetadata>) -> Result<Self, ModelError> {
        if model.n_classes() != Species::ALL.len() {
            return Err(ModelError::ClassCount {
                expected: Species::ALL.len(),
                found: model.n_classes(),
            });
        }

        Ok(Self { model, metadata })
    }

    /// Loads `{model_name}.forest` and, if present, `{model_name}_metadata.json`.
    pub fn load<P: AsRef<Path>>(model_dir: P, model_name: &str) -> Result<Self, ModelError> {
        let paths = ArtifactPaths::new(model_dir, model_name);

        let read_error = |source| ModelError::Read {
            path: paths.model.clone(),
            source,
        };
        let file = File::open(&paths.model).map_err(read_error)?;
        let model = RandomForestClassifier::deserialize(&mut BufReader::new(file)).map_err(read_error)?;
        let metadata = ModelMetadata::load_optional(&paths.metadata)?;

        info!(
            path = %paths.model.display(),
            n_trees = model.n_trees(),
            n_features = model.n_features(),
            metadata = metadata.is_some(),
            "Model loaded"
        );

        Self::new(model, metadata)
    }

    fn check_shape(&self) -> Result<(), InferenceError> {
        if self.model.n_features() != FEATURE_COUNT {
            return Err(InferenceError::Shape {
                expected: self.model.n_features(),
                found: FEATURE_COUNT,
            });
        }

        Ok(())
    }

    pub fn predict(&self, batch: &Batch) -> Result<Vec<Species>, InferenceError> {
        self.check_shape()?;

        batch
            .iter()
            .map(|x| {
                let class = self.model.predict(x);
                Species::from_usize(class).ok_or(InferenceError::UnknownClass(class))
            })
            .collect()
    }

    /// Class probabilities per sample, ordered setosa, versicolor, virginica.
    pub fn predict_proba(&self, batch: &Batch) -> Result<Vec<[f64; 3]>, InferenceError> {
        self.check_shape()?;

        batch
            .iter()
            .map(|x| {
                let proba = self.model.predict_proba(x);
                let mut out = [0.0; 3];
                if proba.len() != out.len() {
                    return Err(InferenceError::UnknownClass(proba.len().saturating_sub(1)));
                }
                out.copy_from_slice(&proba);
                Ok(out)
            })
            .collect()
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            n_trees: self.model.n_trees(),
            n_features: self.model.n_features(),
            labels: Species::ALL.to_vec(),
            metadata: self.metadata.clone(),
        }
    }
}
