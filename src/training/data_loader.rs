use ndarray::{s, Array4, ArrayView4, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DenoiserError, Result};

/// Splits paired tensors into mini-batches along the sample axis.
///
/// Without shuffling batches are contiguous slices in dataset order and the last one may
/// be short. With shuffling every epoch draws a fresh permutation from the caller's rng.
pub struct DataLoader<'a> {
	noisy: ArrayView4<'a, f32>,
	reference: ArrayView4<'a, f32>,
	batch_size: usize,
	order: Vec<usize>,
	shuffled: bool,
	cursor: usize,
}

impl<'a> DataLoader<'a> {
	pub fn new(noisy: ArrayView4<'a, f32>, reference: ArrayView4<'a, f32>, batch_size: usize) -> Result<Self> {
		if batch_size == 0 {
			return Err(DenoiserError::InvalidParameter("Batch size must be greater than 0".into()));
		}
		let samples = noisy.len_of(Axis(0));
		if reference.len_of(Axis(0)) != samples {
			return Err(DenoiserError::ShapeMismatch(format!(
				"{} noisy samples but {} reference samples",
				samples,
				reference.len_of(Axis(0))
			)));
		}
		Ok(DataLoader {
			noisy,
			reference,
			batch_size,
			order: (0..samples).collect(),
			shuffled: false,
			cursor: 0,
		})
	}

	pub fn shuffle<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
		self.order.shuffle(rng);
		self.shuffled = true;
		self
	}

	pub fn num_samples(&self) -> usize {
		self.order.len()
	}

	pub fn num_batches(&self) -> usize {
		(self.order.len() + self.batch_size - 1) / self.batch_size
	}
}

/// One mini-batch; owned because a shuffled batch gathers non-contiguous samples.
#[derive(Debug, Clone)]
pub struct Batch {
	pub noisy: Array4<f32>,
	pub reference: Array4<f32>,
}

impl Batch {
	pub fn len(&self) -> usize {
		self.noisy.len_of(Axis(0))
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<'a> Iterator for DataLoader<'a> {
	type Item = Batch;

	fn next(&mut self) -> Option<Batch> {
		if self.cursor >= self.order.len() {
			return None;
		}
		let end = (self.cursor + self.batch_size).min(self.order.len());
		let batch = if self.shuffled {
			let indices = &self.order[self.cursor..end];
			Batch {
				noisy: self.noisy.select(Axis(0), indices),
				reference: self.reference.select(Axis(0), indices),
			}
		} else {
			Batch {
				noisy: self.noisy.slice(s![self.cursor..end, .., .., ..]).to_owned(),
				reference: self.reference.slice(s![self.cursor..end, .., .., ..]).to_owned(),
			}
		};
		self.cursor = end;
		Some(batch)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = self.order.len().saturating_sub(self.cursor);
		let batches = (remaining + self.batch_size - 1) / self.batch_size;
		(batches, Some(batches))
	}
}

impl<'a> ExactSizeIterator for DataLoader<'a> {}

/// Crops the centre `height x width` window out of every sample.
pub fn center_crop(patches: ArrayView4<f32>, height: usize, width: usize) -> Result<ArrayView4<f32>> {
	let (_, h, w, _) = patches.dim();
	if height > h || width > w {
		return Err(DenoiserError::ShapeMismatch(format!(
			"cannot crop {}x{} patches to {}x{}",
			h, w, height, width
		)));
	}
	let top = (h - height) / 2;
	let left = (w - width) / 2;
	Ok(patches.slice_move(s![.., top..top + height, left..left + width, ..]))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::network::seeded_rng;

	fn numbered(samples: usize) -> Array4<f32> {
		Array4::from_shape_fn((samples, 2, 2, 1), |(n, _, _, _)| n as f32)
	}

	#[test]
	fn test_batches_keep_order_with_partial_tail() {
		let noisy = numbered(5);
		let reference = numbered(5);
		let loader = DataLoader::new(noisy.view(), reference.view(), 2).unwrap();
		assert_eq!(loader.num_batches(), 3);
		assert_eq!(loader.len(), 3);

		let firsts: Vec<(usize, f32)> = loader.map(|b| (b.len(), b.noisy[[0, 0, 0, 0]])).collect();
		assert_eq!(firsts, vec![(2, 0.0), (2, 2.0), (1, 4.0)]);
	}

	#[test]
	fn test_shuffle_keeps_pairs_together() {
		let noisy = numbered(8);
		let reference = numbered(8);
		let mut rng = seeded_rng(Some(11));
		let loader = DataLoader::new(noisy.view(), reference.view(), 3).unwrap().shuffle(&mut rng);

		let mut seen = Vec::new();
		for batch in loader {
			assert_eq!(batch.noisy, batch.reference);
			seen.extend(batch.noisy.outer_iter().map(|sample| sample[[0, 0, 0]] as usize));
		}
		seen.sort_unstable();
		assert_eq!(seen, (0..8).collect::<Vec<_>>());
	}

	#[test]
	fn test_rejects_bad_input() {
		let noisy = numbered(3);
		let reference = numbered(4);
		assert!(DataLoader::new(noisy.view(), reference.view(), 1).is_err());
		assert!(DataLoader::new(noisy.view(), noisy.view(), 0).is_err());
	}

	#[test]
	fn test_center_crop() {
		let patches = Array4::from_shape_fn((1, 6, 6, 1), |(_, y, x, _)| (y * 10 + x) as f32);
		let cropped = center_crop(patches.view(), 2, 2).unwrap();
		assert_eq!(cropped.dim(), (1, 2, 2, 1));
		assert_eq!(cropped[[0, 0, 0, 0]], 22.0);
		assert_eq!(cropped[[0, 1, 1, 0]], 33.0);
		assert!(center_crop(patches.view(), 7, 2).is_err());
	}
}
