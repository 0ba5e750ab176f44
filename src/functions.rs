pub fn histogram(values: impl Iterator<Item = usize>, n_classes: usize) -> (Vec<usize>, usize) {
	let mut histogram = vec![0; n_classes];
	let mut len = 0;

	for value in values {
		if value >= histogram.len() {
			histogram.resize(value + 1, 0);
		}
		histogram[value] += 1;
		len += 1;
	}

	(histogram, len)
}

pub fn gini_val(histogram: &[usize], len: usize) -> f64 {
	if len == 0 {
		return 0.0;
	}

	1.0 - histogram
		.iter()
		.map(|&n| (n as f64 / len as f64).powi(2))
		.sum::<f64>()
}

pub fn gini(values: impl Iterator<Item = usize>, n_classes: usize) -> f64 {
	let (histogram, len) = histogram(values, n_classes);
	gini_val(&histogram, len)
}

/// Class fractions of `values`, one entry per class.
pub fn distribution(values: impl Iterator<Item = usize>, n_classes: usize) -> Vec<f64> {
	let (histogram, len) = histogram(values, n_classes);

	histogram
		.into_iter()
		.take(n_classes)
		.map(|n| if len == 0 { 0.0 } else { n as f64 / len as f64 })
		.collect()
}

/// Index of the largest value. Ties go to the lowest index.
pub fn argmax(values: &[f64]) -> usize {
	values
		.iter()
		.enumerate()
		.fold((0, std::f64::MIN), |(best, best_value), (i, &value)| {
			if value > best_value {
				(i, value)
			} else {
				(best, best_value)
			}
		})
		.0
}
