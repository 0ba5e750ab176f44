use std::io::{Read, Write};
use rand::Rng;
use rand::seq::SliceRandom as _;

use crate::dataset::Dataset;
use crate::node::{Node, Split};
use crate::classifier::Classifier;
use crate::functions::{self, distribution, gini_val};

// Sliding window of gini
// https://arxiv.org/pdf/1403.6348.pdf
//
// Keeps the sum of squared class counts so moving one row across the
// threshold is O(1) and exact.
struct SlidingGini {
	n: usize,
	ni: Vec<usize>,
	sum_sq: usize,
}

impl SlidingGini {
	pub fn new(targets: impl Iterator<Item = usize>, n_classes: usize) -> Self {
		let (histogram, len) = functions::histogram(targets, n_classes);

		Self {
			n: len,
			sum_sq: histogram.iter().map(|&c| c * c).sum(),
			ni: histogram,
		}
	}

	pub fn inc(&mut self, class: usize) {
		self.sum_sq += 2 * self.ni[class] + 1;
		self.ni[class] += 1;
		self.n += 1;
	}

	pub fn dec(&mut self, class: usize) {
		self.ni[class] -= 1;
		self.sum_sq -= 2 * self.ni[class] + 1;
		self.n -= 1;
	}

	pub fn gini(&self) -> f64 {
		if self.n == 0 {
			return 0.0;
		}

		1.0 - self.sum_sq as f64 / (self.n as f64).powi(2)
	}
}

struct NodeBuilder<'r, R: ?Sized> {
	max_features: usize,
	max_depth: usize,
	n_classes: usize,
	importances: Vec<f64>,
	rng: &'r mut R,
}

impl<'r, R: Rng + ?Sized> NodeBuilder<'r, R> {
	fn leaf(&self, dataset: &Dataset) -> Node {
		Node::Leaf(distribution(dataset.targets(), self.n_classes))
	}

	fn build(&mut self, dataset: &mut Dataset, depth: usize) -> Node {
		if depth > self.max_depth || dataset.rows_len() < 2 {
			return self.leaf(dataset);
		}

		let (histogram, len) = functions::histogram(dataset.targets(), self.n_classes);
		let impurity = gini_val(&histogram, len);
		if impurity <= 0.0 {
			return self.leaf(dataset);
		}

		let mut best_split: Option<Split> = None;
		let mut best_gain = std::f64::EPSILON;
		let columns = (0..dataset.features_len()).collect::<Vec<usize>>();
		let max_features = std::cmp::min(columns.len(), self.max_features);

		for &column in columns.choose_multiple(&mut *self.rng, max_features) {
			dataset.sort(column);

			let targets = dataset.targets().collect::<Vec<_>>();
			let mut left_window = SlidingGini::new(std::iter::empty(), self.n_classes);
			let mut right_window = SlidingGini::new(targets.iter().copied(), self.n_classes);
			let mut moved = 0;

			for (left_len, value) in dataset.get_splits(column) {
				for &class in &targets[moved..left_len] {
					left_window.inc(class);
					right_window.dec(class);
				}
				moved = left_len;

				let ratio_l = left_len as f64 / dataset.rows_len() as f64;
				let ratio_r = 1.0 - ratio_l;

				let gain = impurity - (ratio_l * left_window.gini() + ratio_r * right_window.gini());

				if best_gain < gain {
					best_split = Some(Split { column, value });
					best_gain = gain;
				}
			}
		}

		if let Some(split) = best_split {
			self.importances[split.column] += dataset.rows_len() as f64 * best_gain;
			self.build_children(dataset, split, depth)
		} else {
			self.leaf(dataset)
		}
	}

	pub fn build_children(&mut self, dataset: &mut Dataset, split: Split, depth: usize) -> Node {
		dataset.sort(split.column);

		let split_row = dataset
			.column(split.column)
			.take_while(|&f| f <= split.value)
			.count();

		let (left, right) = dataset.split(split_row, |x| Box::new(self.build(x, depth + 1)));

		Node::Children {
			left, right, split
		}
	}
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
	root: Node,
	n_classes: usize,
	n_features: usize,
	// Only known right after fitting, not persisted.
	importances: Vec<f64>,
}

impl DecisionTree {
	/// Impurity-decrease importances normalised to sum 1, or all zero for a single leaf.
	pub fn feature_importances(&self) -> Vec<f64> {
		let total = self.importances.iter().sum::<f64>();
		if total <= 0.0 {
			return vec![0.0; self.importances.len()];
		}

		self.importances.iter().map(|v| v / total).collect()
	}

	pub fn leaf_distribution(&self, x: &[f64]) -> &[f64] {
		self.root.predict(x)
	}

	/// Fixes the class and feature counts of a decoded tree, failing if the
	/// tree reads a column or produces a distribution outside of that shape.
	pub(crate) fn with_shape(mut self, n_classes: usize, n_features: usize) -> std::io::Result<Self> {
		if let Some(column) = self.root.max_column().filter(|&c| c >= n_features) {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("tree splits on column {} of {} features", column, n_features),
			));
		}
		if !self.root.leaves_have_width(n_classes) {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("tree leaf is not a distribution over {} classes", n_classes),
			));
		}

		self.n_classes = n_classes;
		self.n_features = n_features;
		Ok(self)
	}
}

impl Classifier for DecisionTree {
	fn n_classes(&self) -> usize {
		self.n_classes
	}

	fn n_features(&self) -> usize {
		self.n_features
	}

	fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
		self.root.predict(x).to_vec()
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		self.root.serialize(writer)
	}

	/// The class and feature counts are not part of the tree encoding; they are
	/// restored from the leaf width and the deepest referenced column, and the
	/// forest header overrides them.
	fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let root = Node::deserialize(reader)?;
		let n_classes = first_leaf_len(&root);
		let n_features = root.max_column().map_or(0, |c| c + 1);

		Ok(Self {
			root,
			n_classes,
			n_features,
			importances: Vec::new(),
		})
	}
}

fn first_leaf_len(node: &Node) -> usize {
	match node {
		Node::Leaf(distribution) => distribution.len(),
		Node::Children { left, .. } => first_leaf_len(left),
	}
}

pub struct DecisionTreeBuilder {
	pub max_features: Option<usize>,
	pub max_depth: usize,
}

impl Default for DecisionTreeBuilder {
	fn default() -> Self {
		Self {
			max_features: None,
			max_depth: 32,
		}
	}
}

impl DecisionTreeBuilder {
	pub fn fit<R: Rng + ?Sized>(&self, rng: &mut R, mut dataset: Dataset) -> DecisionTree {
		let n_features = dataset.features_len();
		let n_classes = dataset.n_classes();
		let max_features = self.max_features.unwrap_or(n_features);

		let mut builder = NodeBuilder {
			max_features,
			max_depth: self.max_depth,
			n_classes,
			importances: vec![0.0; n_features],
			rng,
		};
		let root = builder.build(&mut dataset, 1);

		DecisionTree {
			root,
			n_classes,
			n_features,
			importances: builder.importances,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dataset::Builder;
	use rand::{rngs::StdRng, SeedableRng};

	#[test]
	fn sliding_gini_matches_direct_gini() {
		let targets = vec![0, 1, 1, 2, 0, 2, 2];
		let mut left = SlidingGini::new(std::iter::empty(), 3);
		let mut right = SlidingGini::new(targets.iter().copied(), 3);

		for (i, &class) in targets.iter().enumerate().take(targets.len() - 1) {
			left.inc(class);
			right.dec(class);

			let expected_l = functions::gini(targets[..=i].iter().copied(), 3);
			let expected_r = functions::gini(targets[i + 1..].iter().copied(), 3);
			assert!((left.gini() - expected_l).abs() < 1e-12);
			assert!((right.gini() - expected_r).abs() < 1e-12);
		}
	}

	#[test]
	fn separable_data_is_learned_exactly() {
		let mut builder = Builder::new();
		for i in 0..20 {
			let x = i as f64;
			builder.add(&[x, 1.0], if x < 10.0 { 0 } else { 1 });
		}

		let mut rng = StdRng::seed_from_u64(7);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		assert_eq!(tree.predict(&[3.0, 1.0]), 0);
		assert_eq!(tree.predict(&[15.0, 1.0]), 1);
		assert_eq!(tree.predict_proba(&[15.0, 1.0]), vec![0.0, 1.0]);
		// The constant column never splits.
		assert_eq!(tree.feature_importances(), vec![1.0, 0.0]);
	}

	#[test]
	fn pure_node_is_a_leaf() {
		let mut builder = Builder::new();
		for i in 0..5 {
			builder.add(&[i as f64], 0);
		}

		let mut rng = StdRng::seed_from_u64(7);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		assert_eq!(tree.root, Node::Leaf(vec![1.0]));
		assert_eq!(tree.feature_importances(), vec![0.0]);
	}
}
