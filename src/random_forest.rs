use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::classifier::Classifier;
use crate::decision_tree::{DecisionTreeBuilder, DecisionTree};

const MAGIC: &[u8; 4] = b"IRF1";

#[derive(Debug, Clone)]
pub struct RandomForestBuilder {
    pub n_trees: usize,
    pub max_depth: usize,
    pub bag_amount: f64,
    /// Fixed seed for a reproducible forest; `None` draws one from the thread rng.
    pub seed: Option<u64>,
}

impl Default for RandomForestBuilder {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 32,
            bag_amount: 1.0,
            seed: None,
        }
    }
}

impl RandomForestBuilder {
    pub fn fit(&self, dataset: Dataset) -> RandomForestClassifier {
        let feature_len = (dataset.features_len() as f64).sqrt().ceil() as usize;
        let done = AtomicUsize::new(0);
        let whole = Instant::now();

        let forest = self.get_rngs()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|mut rng| {
                let now = Instant::now();
                let tree = self.fit_tree(&mut rng, &dataset, feature_len);

                let fitted = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    fitted,
                    n_trees = self.n_trees,
                    elapsed_ms = now.elapsed().as_secs_f64() * 1000.0,
                    "Fitted tree"
                );

                tree
            })
            .collect::<Vec<_>>();

        info!(
            n_trees = self.n_trees,
            max_depth = self.max_depth,
            rows = dataset.rows_len(),
            elapsed_ms = whole.elapsed().as_secs_f64() * 1000.0,
            "Random forest fitted"
        );

        RandomForestClassifier {
            n_classes: dataset.n_classes(),
            n_features: dataset.features_len(),
            forest,
        }
    }

    fn fit_tree<R: Rng + ?Sized>(&self, rng: &mut R, dataset: &Dataset, feature_len: usize) -> DecisionTree {
        let builder = DecisionTreeBuilder {
            max_features: Some(feature_len),
            max_depth: self.max_depth,
        };

        let max_samples = (dataset.rows_len() as f64 * self.bag_amount) as usize;
        let bootstrapped = dataset.bootstrap(rng, max_samples);

        builder.fit(rng, bootstrapped)
    }

    // Seeds are drawn up front so the forest does not depend on rayon's scheduling.
    fn get_rngs(&self) -> impl Iterator<Item = StdRng> {
        let seed_u64: u64 = self.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed_u64);
        (0..self.n_trees).map(move |_| {
            let mut seed = [0u8; 32];
            rng.fill(&mut seed);
            StdRng::from_seed(seed)
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    n_classes: usize,
    n_features: usize,
    forest: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn n_trees(&self) -> usize {
        self.forest.len()
    }

    /// Mean of the per-tree normalised importances, normalised again to sum 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.forest {
            for (sum, value) in total.iter_mut().zip(tree.feature_importances()) {
                *sum += value;
            }
        }

        let norm = total.iter().sum::<f64>();
        if norm > 0.0 {
            total.iter_mut().for_each(|v| *v /= norm);
        }

        total
    }
}

impl Classifier for RandomForestClassifier {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        if self.forest.is_empty() {
            return proba;
        }

        for tree in &self.forest {
            for (sum, p) in proba.iter_mut().zip(tree.leaf_distribution(x)) {
                *sum += p;
            }
        }

        let n = self.forest.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);

        proba
    }

    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<BigEndian>(header_field(self.n_classes, "classes")?)?;
        writer.write_u16::<BigEndian>(header_field(self.n_features, "features")?)?;
        writer.write_u16::<BigEndian>(header_field(self.forest.len(), "trees")?)?;

        for tree in &self.forest {
            tree.serialize(writer)?;
        }

        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a random forest artifact",
            ));
        }

        let n_classes = reader.read_u16::<BigEndian>()? as usize;
        let n_features = reader.read_u16::<BigEndian>()? as usize;
        let len = reader.read_u16::<BigEndian>()?;
        if len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "random forest artifact holds no trees",
            ));
        }

        let forest = (0..len)
            .map(|_| DecisionTree::deserialize(reader).and_then(|tree| tree.with_shape(n_classes, n_features)))
            .collect::<std::io::Result<Vec<DecisionTree>>>()?;

        Ok(Self {
            n_classes,
            n_features,
            forest,
        })
    }
}

fn header_field(value: usize, what: &str) -> std::io::Result<u16> {
    u16::try_from(value).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} {} do not fit the artifact header", value, what),
        )
    })
}
