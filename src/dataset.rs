use crate::classifier::Classifier;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::ops::Range;
use rand::seq::SliceRandom;
use rand::Rng;
use ordered_float::OrderedFloat;

#[derive(Clone, Debug)]
pub struct Dataset<'a> {
	columns: &'a [Vec<f64>],
	targets: &'a [usize],
	n_classes: usize,

	index: Vec<usize>,
	range: Range<usize>,
}

impl<'a, 'b> Dataset<'a> {
	/// Fraction of rows the classifier labels correctly.
	pub fn evaluate<C: Classifier + Sync>(&self, classifier: &C) -> f64 {
		if self.rows_len() == 0 {
			return 0.0;
		}

		self.rows()
			.zip(self.targets())
			.collect::<Vec<_>>()
			.into_par_iter()
			.filter(|(x, y)| classifier.predict(x) == *y)
			.count() as f64 / self.rows_len() as f64
	}

	pub fn sort(&mut self, column: usize) {
		let columns = self.columns;
		self.index[self.range.start..self.range.end]
			.sort_by_key(|&x| OrderedFloat(columns[column][x]));
	}

	/// Candidate thresholds of a column sorted with [`Dataset::sort`]: the number
	/// of rows left of the threshold and the midpoint between the neighbouring values.
	pub fn get_splits(&'b self, column: usize) -> impl 'b + Iterator<Item = (usize, f64)> {
		let column = &self.columns[column];

		self.indices()
			.map(move |x| column[x])
			.enumerate()
			.scan(None, |prev: &mut Option<f64>, (i, x)| {
				let split = match *prev {
					Some(y) if (y - x).abs() > std::f64::EPSILON => Some((i, (x + y) / 2.0)),
					_ => None,
				};
				*prev = Some(x);

				Some(split)
			})
			.filter_map(|t| t)
	}

	pub fn split<F, T>(&mut self, row: usize, mut f: F) -> (T, T)
	where
		F: FnMut(&mut Self) -> T,
	{
		let row = row + self.range.start;
		let original = self.range.clone();

		self.range.end = row;
		let left = f(self);
		self.range.end = original.end;

		self.range.start = row;
		let right = f(self);
		self.range.start = original.start;

		(left, right)
	}

	pub fn train_test_split<R: Rng + ?Sized>(mut self, rng: &mut R, test_rate: f64) -> (Self, Self) {
		self.index[self.range.start..self.range.end].shuffle(rng);
		let test_num = (self.rows_len() as f64 * test_rate).round() as usize;

		let mut train = self.clone();
		let mut test = self;
		test.range.end = test.range.start + test_num;
		train.range.start = test.range.end;

		(train, test)
	}

	/// Like [`Dataset::train_test_split`], but every class keeps its share of rows in both halves.
	pub fn stratified_split<R: Rng + ?Sized>(mut self, rng: &mut R, test_rate: f64) -> (Self, Self) {
		let mut test_index = Vec::with_capacity(self.rows_len());
		let mut train_index = Vec::with_capacity(self.rows_len());

		for class in 0..self.n_classes {
			let mut members = self.indices()
				.filter(|&i| self.targets[i] == class)
				.collect::<Vec<_>>();
			members.shuffle(rng);

			let test_num = (members.len() as f64 * test_rate).round() as usize;
			test_index.extend_from_slice(&members[..test_num]);
			train_index.extend_from_slice(&members[test_num..]);
		}

		let test_num = test_index.len();
		test_index.append(&mut train_index);
		self.range = 0..test_index.len();
		self.index = test_index;

		let mut train = self.clone();
		let mut test = self;
		test.range.end = test_num;
		train.range.start = test_num;

		(train, test)
	}

	pub fn bootstrap<R: Rng + ?Sized>(&self, rng: &mut R, max_samples: usize) -> Self {
		let samples = std::cmp::min(max_samples, self.rows_len());

		let range = 0..samples;
		let index = range
			.clone()
			.map(|_| self.index[rng.gen_range(self.range.start, self.range.end)])
			.collect::<Vec<_>>();

		Self {
			index,
			range,
			columns: self.columns,
			targets: self.targets,
			n_classes: self.n_classes,
		}
	}

	fn indices(&'b self) -> impl 'b + Iterator<Item = usize> + Clone {
		self.index[self.range.start..self.range.end]
			.iter()
			.copied()
	}

	pub fn targets(&'b self) -> impl 'b + Iterator<Item = usize> {
		self.indices()
			.map(move |i| self.targets[i])
	}

	pub fn column(&'b self, column: usize) -> impl 'b + Iterator<Item = f64> {
		let column = &self.columns[column];

		self.indices()
			.map(move |i| column[i])
	}

	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	pub fn n_classes(&self) -> usize {
		self.n_classes
	}

	pub fn rows_len(&self) -> usize {
		self.range.end - self.range.start
	}

	pub fn rows(&'b self) -> impl 'b + Iterator<Item = Vec<f64>> {
		self.indices().map(move |i| {
			(0..self.columns.len())
				.map(|j| self.columns[j][i])
				.collect()
		})
	}

	pub fn classify<C: Classifier>(&self, classifier: &C) -> Vec<usize> {
		self.rows()
			.map(|x| classifier.predict(&x))
			.collect()
	}
}

#[derive(Debug, Default)]
pub struct Builder {
	columns: Vec<Vec<f64>>,
	targets: Vec<usize>,
	n_classes: usize,
}

impl Builder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn build(&self) -> Dataset {
		let range = 0..self.targets.len();

		Dataset {
			columns: &self.columns,
			targets: &self.targets,
			n_classes: self.n_classes,

			range: range.clone(),
			index: range.collect(),
		}
	}

	pub fn add(&mut self, x: &[f64], y: usize) {
		if self.columns.is_empty() {
			self.columns = vec![Vec::new(); x.len()];
		}

		for (column, value) in self.columns.iter_mut().zip(x) {
			column.push(*value);
		}

		self.targets.push(y);
		self.n_classes = std::cmp::max(self.n_classes, y + 1);
	}

	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	pub fn rows_len(&self) -> usize {
		self.targets.len()
	}
}
