use std::io::{Read, Write};

use crate::functions::argmax;

pub trait Classifier: Sized {
	fn n_classes(&self) -> usize;
	fn n_features(&self) -> usize;

	/// Per-class probabilities for one sample, in class index order.
	fn predict_proba(&self, x: &[f64]) -> Vec<f64>;

	fn predict(&self, x: &[f64]) -> usize {
		argmax(&self.predict_proba(x))
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
	fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}
