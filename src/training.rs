//! Fits the forest on Iris (or a CSV dataset), evaluates it and writes the artifacts.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::classifier::Classifier;
use crate::csv_data;
use crate::iris::{self, FEATURE_NAMES, TARGET_NAMES};
use crate::metadata::{ArtifactPaths, ModelMetadata};
use crate::metrics::ClassificationReport;
use crate::random_forest::RandomForestBuilder;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub model_dir: PathBuf,
    pub model_name: String,
    pub test_size: f64,
    pub random_state: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    /// `f1,f2,f3,f4,class` rows to train on instead of the embedded Iris data.
    pub dataset: Option<PathBuf>,
    pub stratify: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_name: "iris_model".to_string(),
            test_size: 0.2,
            random_state: 42,
            n_estimators: 100,
            max_depth: 32,
            dataset: None,
            stratify: true,
        }
    }
}

#[derive(Debug)]
pub struct TrainSummary {
    pub paths: ArtifactPaths,
    pub metadata: ModelMetadata,
    pub train_accuracy: f64,
}

impl TrainSummary {
    /// Feature importances, largest first.
    pub fn ranked_importances(&self) -> Vec<(&str, f64)> {
        let mut ranked = self
            .metadata
            .feature_importance
            .iter()
            .map(|(name, &value)| (name.as_str(), value))
            .collect::<Vec<_>>();
        ranked.sort_by_key(|&(_, value)| -OrderedFloat(value));
        ranked
    }
}

pub fn train_and_save_model(config: &TrainConfig) -> Result<TrainSummary> {
    ensure!(
        config.test_size > 0.0 && config.test_size < 1.0,
        "test size must be between 0 and 1, got {}",
        config.test_size
    );
    ensure!(
        (1..=u16::MAX as usize).contains(&config.n_estimators),
        "n_estimators must be between 1 and {}, got {}",
        u16::MAX,
        config.n_estimators
    );

    let builder = match &config.dataset {
        Some(path) => csv_data::read(path).with_context(|| format!("reading dataset {}", path.display()))?,
        None => iris::load_iris(),
    };
    ensure!(
        builder.features_len() == FEATURE_NAMES.len(),
        "dataset has {} features, expected {}",
        builder.features_len(),
        FEATURE_NAMES.len()
    );

    let mut rng = StdRng::seed_from_u64(config.random_state);
    let dataset = builder.build();
    ensure!(
        dataset.n_classes() == TARGET_NAMES.len(),
        "dataset has {} classes, expected {}",
        dataset.n_classes(),
        TARGET_NAMES.len()
    );

    let (train, test) = if config.stratify {
        dataset.stratified_split(&mut rng, config.test_size)
    } else {
        dataset.train_test_split(&mut rng, config.test_size)
    };
    ensure!(train.rows_len() > 0 && test.rows_len() > 0, "train/test split left an empty side");

    info!(
        train_samples = train.rows_len(),
        test_samples = test.rows_len(),
        n_estimators = config.n_estimators,
        "Training random forest classifier"
    );
    let classifier = RandomForestBuilder {
        n_trees: config.n_estimators,
        max_depth: config.max_depth,
        bag_amount: 1.0,
        seed: Some(config.random_state),
    }
    .fit(train.clone());

    let y_true = test.targets().collect::<Vec<_>>();
    let y_pred = test.classify(&classifier);
    let report = ClassificationReport::new(&y_true, &y_pred, &TARGET_NAMES);
    let train_accuracy = train.evaluate(&classifier);

    let feature_importance = FEATURE_NAMES
        .iter()
        .map(|name| name.to_string())
        .zip(classifier.feature_importances())
        .collect::<BTreeMap<_, _>>();

    let metadata = ModelMetadata {
        model_type: "RandomForestClassifier".to_string(),
        n_estimators: config.n_estimators,
        max_depth: config.max_depth,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        target_names: TARGET_NAMES.iter().map(|s| s.to_string()).collect(),
        metrics: report,
        feature_importance,
        train_samples: train.rows_len(),
        test_samples: test.rows_len(),
        trained_at: chrono::Utc::now().to_rfc3339(),
    };

    fs::create_dir_all(&config.model_dir)
        .with_context(|| format!("creating model directory {}", config.model_dir.display()))?;
    let paths = ArtifactPaths::new(&config.model_dir, &config.model_name);

    let mut writer = BufWriter::new(
        File::create(&paths.model).with_context(|| format!("creating {}", paths.model.display()))?,
    );
    classifier
        .serialize(&mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("writing {}", paths.model.display()))?;
    metadata.save(&paths.metadata)?;

    info!(
        model = %paths.model.display(),
        metadata = %paths.metadata.display(),
        accuracy = metadata.metrics.accuracy,
        "Model saved"
    );

    Ok(TrainSummary {
        paths,
        metadata,
        train_accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iris::Species;
    use crate::model_service::PredictionService;
    use crate::validation::Batch;

    fn config(dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            model_dir: dir.join("test_models"),
            model_name: "test_iris_model".to_string(),
            n_estimators: 20,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn trained_model_is_served() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config(dir.path());
        let summary = train_and_save_model(&config)?;

        assert!(summary.paths.model.exists());
        assert!(summary.paths.metadata.exists());
        assert_eq!(summary.metadata.train_samples, 120);
        assert_eq!(summary.metadata.test_samples, 30);
        assert!(summary.metadata.metrics.accuracy > 0.85);
        assert!(summary.train_accuracy > 0.95);

        let ranked = summary.ranked_importances();
        assert_eq!(ranked.len(), 4);
        assert!(ranked[0].1 >= ranked[3].1);

        let service = PredictionService::load(&config.model_dir, &config.model_name)?;
        let labels = service.predict(&Batch::new(vec![[5.1, 3.5, 1.4, 0.2]]))?;
        assert_eq!(labels, vec![Species::Setosa]);
        let info = service.model_info();
        assert_eq!(info.n_trees, 20);
        assert_eq!(info.metadata.map(|m| m.feature_names), Some(summary.metadata.feature_names));

        Ok(())
    }

    #[test]
    fn same_seed_same_artifact() -> Result<()> {
        let a = tempfile::tempdir()?;
        let b = tempfile::tempdir()?;
        let first = train_and_save_model(&config(a.path()))?;
        let second = train_and_save_model(&config(b.path()))?;

        assert_eq!(fs::read(&first.paths.model)?, fs::read(&second.paths.model)?);
        Ok(())
    }

    #[test]
    fn rejects_degenerate_test_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            test_size: 1.0,
            ..config(dir.path())
        };

        assert!(train_and_save_model(&config).is_err());
    }

    #[test]
    fn tree_count_must_fit_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        for n_estimators in [0, u16::MAX as usize + 1] {
            let config = TrainConfig {
                n_estimators,
                ..config(dir.path())
            };

            let err = train_and_save_model(&config).unwrap_err();
            assert!(err.to_string().contains("n_estimators"));
        }
        assert!(!dir.path().join("test_models").exists());
    }

    #[test]
    fn dataset_needs_every_species() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let csv = dir.path().join("two_classes.csv");
        let rows = (0..20)
            .map(|i| format!("{}.0,3.0,1.4,0.2,{}\n", i, i % 2))
            .collect::<String>();
        fs::write(&csv, rows)?;

        let config = TrainConfig {
            dataset: Some(csv),
            ..config(dir.path())
        };

        let err = train_and_save_model(&config).unwrap_err();
        assert!(err.to_string().contains("2 classes"));
        Ok(())
    }
}
