use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const LEAF: u16 = 0;
const CHILDREN: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
	pub value: f64,
	pub column: usize,
}

impl Split {
	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		writer.write_f64::<BigEndian>(self.value)?;
		writer.write_u16::<BigEndian>(self.column as u16)?;

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let value = reader.read_f64::<BigEndian>()?;
		let column = reader.read_u16::<BigEndian>()? as usize;

		Ok(Self { value, column })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	/// Class fractions of the training rows that reached this leaf.
	Leaf(Vec<f64>),
	Children {
		left: Box<Node>,
		right: Box<Node>,
		split: Split,
	},
}

impl Node {
	pub fn predict(&self, x: &[f64]) -> &[f64] {
		match &self {
			Node::Leaf(distribution) => distribution,
			Node::Children { left, right, split } => {
				if x[split.column] <= split.value {
					left.predict(x)
				} else {
					right.predict(x)
				}
			},
		}
	}

	/// Largest column index referenced by any split, if there is one.
	pub fn max_column(&self) -> Option<usize> {
		match &self {
			Node::Leaf(_) => None,
			Node::Children { left, right, split } => [Some(split.column), left.max_column(), right.max_column()]
				.iter()
				.filter_map(|&c| c)
				.max(),
		}
	}

	/// Whether every leaf below this node holds exactly `width` class fractions.
	pub fn leaves_have_width(&self, width: usize) -> bool {
		match &self {
			Node::Leaf(distribution) => distribution.len() == width,
			Node::Children { left, right, .. } => left.leaves_have_width(width) && right.leaves_have_width(width),
		}
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		match &self {
			Node::Leaf(distribution) => {
				writer.write_u16::<BigEndian>(LEAF)?;
				writer.write_u16::<BigEndian>(distribution.len() as u16)?;
				for &p in distribution {
					writer.write_f64::<BigEndian>(p)?;
				}
			},
			Node::Children { left, right, split } => {
				writer.write_u16::<BigEndian>(CHILDREN)?;
				split.serialize(writer)?;
				left.serialize(writer)?;
				right.serialize(writer)?;
			}
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		match reader.read_u16::<BigEndian>()? {
			LEAF => {
				let len = reader.read_u16::<BigEndian>()?;
				let distribution = (0..len)
					.map(|_| reader.read_f64::<BigEndian>())
					.collect::<std::io::Result<Vec<f64>>>()?;

				Ok(Node::Leaf(distribution))
			},
			CHILDREN => {
				let split = Split::deserialize(reader)?;
				let left = Box::new(Node::deserialize(reader)?);
				let right = Box::new(Node::deserialize(reader)?);

				Ok(Node::Children { split, left, right })
			},
			i => Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("unknown tree node type {:?}", i),
			)),
		}
	}
}
