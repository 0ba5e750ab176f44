use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use crate::dataset;

/// Reads `f1,...,fn,class` rows. Blank lines are skipped.
pub fn read<P: AsRef<Path>>(dataset_location: P) -> io::Result<dataset::Builder> {
	let file = fs::File::open(dataset_location)?;
	parse(io::BufReader::new(file))
}

pub fn parse<B: BufRead>(reader: B) -> io::Result<dataset::Builder> {
	let mut builder = dataset::Builder::new();

	for (i, line) in reader.lines().enumerate() {
		let line = line?;
		if line.trim().is_empty() {
			continue;
		}

		let row = line
			.split(',')
			.map(|x| x.trim().parse::<f64>())
			.collect::<Result<Vec<f64>, _>>()
			.map_err(|e| invalid(i, &e.to_string()))?;

		let (y, x) = row.split_last().ok_or_else(|| invalid(i, "empty row"))?;
		if x.is_empty() {
			return Err(invalid(i, "row has no features"));
		}
		if builder.rows_len() > 0 && x.len() != builder.features_len() {
			return Err(invalid(i, "row width differs from the first row"));
		}
		if *y < 0.0 || y.fract() != 0.0 {
			return Err(invalid(i, "class must be a non-negative integer"));
		}

		builder.add(x, *y as usize);
	}

	Ok(builder)
}

fn invalid(line: usize, reason: &str) -> io::Error {
	io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {}", line + 1, reason))
}
