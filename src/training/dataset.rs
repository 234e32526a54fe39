use std::collections::BTreeMap;
use std::f32::consts::PI;

use ndarray::{s, Array4, ArrayView4, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::constants::data::{
	COLOUR_BUFFER, DEFAULT_NOISE_LEVEL, DEFAULT_SYNTHETIC_SAMPLES, TEST_SPLIT, TRAIN_SPLIT,
};
use crate::constants::network::{DEFAULT_INPUT_CHANNELS, DEFAULT_OUTPUT_CHANNELS, DEFAULT_PATCH_SIZE};
use crate::error::{DenoiserError, Result};
use crate::network::seeded_rng;

/// Noisy input patches and the reference patches they should be mapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPair {
	pub noisy: Array4<f32>,
	pub reference: Array4<f32>,
}

impl PatchPair {
	pub fn new(noisy: Array4<f32>, reference: Array4<f32>) -> Result<Self> {
		if noisy.len_of(Axis(0)) != reference.len_of(Axis(0)) {
			return Err(DenoiserError::Dataset(format!(
				"{} noisy patches paired with {} reference patches",
				noisy.len_of(Axis(0)),
				reference.len_of(Axis(0))
			)));
		}
		Ok(PatchPair { noisy, reference })
	}

	pub fn len(&self) -> usize {
		self.noisy.len_of(Axis(0))
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn noisy(&self) -> ArrayView4<f32> {
		self.noisy.view()
	}

	pub fn reference(&self) -> ArrayView4<f32> {
		self.reference.view()
	}
}

/// Patch pairs keyed by split (`train`, `test`) and then by buffer (`colour`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
	splits: BTreeMap<String, BTreeMap<String, PatchPair>>,
}

impl Dataset {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, split: impl Into<String>, buffer: impl Into<String>, pair: PatchPair) {
		self.splits.entry(split.into()).or_default().insert(buffer.into(), pair);
	}

	pub fn pair(&self, split: &str, buffer: &str) -> Result<&PatchPair> {
		let buffers = self
			.splits
			.get(split)
			.ok_or_else(|| DenoiserError::Dataset(format!("Split '{}' not found", split)))?;
		buffers
			.get(buffer)
			.ok_or_else(|| DenoiserError::Dataset(format!("Buffer '{}' not found in split '{}'", buffer, split)))
	}

	pub fn has_split(&self, split: &str) -> bool {
		self.splits.contains_key(split)
	}

	pub fn splits(&self) -> impl Iterator<Item = &str> {
		self.splits.keys().map(String::as_str)
	}

	pub fn buffers(&self, split: &str) -> impl Iterator<Item = &str> {
		self.splits
			.get(split)
			.into_iter()
			.flat_map(|buffers| buffers.keys().map(String::as_str))
	}
}

/// Source of a [`Dataset`].
pub trait DatasetProvider {
	fn load(&self) -> Result<Dataset>;
}

/// Generates smooth reference fields in [0, 1] and adds uniform noise to form the
/// noisy inputs. Both buffers share the input patch extent; the trainer crops the
/// reference to the network's output.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticProvider {
	pub train_samples: usize,
	pub test_samples: usize,
	pub patch_size: usize,
	pub input_channels: usize,
	pub output_channels: usize,
	pub noise_level: f32,
	pub seed: Option<u64>,
}

impl Default for SyntheticProvider {
	fn default() -> Self {
		SyntheticProvider {
			train_samples: DEFAULT_SYNTHETIC_SAMPLES,
			test_samples: DEFAULT_SYNTHETIC_SAMPLES / 4,
			patch_size: DEFAULT_PATCH_SIZE,
			input_channels: DEFAULT_INPUT_CHANNELS,
			output_channels: DEFAULT_OUTPUT_CHANNELS,
			noise_level: DEFAULT_NOISE_LEVEL,
			seed: None,
		}
	}
}

impl SyntheticProvider {
	pub fn validate(&self) -> Result<()> {
		if self.train_samples == 0 {
			return Err(DenoiserError::Dataset("At least one training sample is required".into()));
		}
		if self.patch_size == 0 || self.input_channels == 0 || self.output_channels == 0 {
			return Err(DenoiserError::Dataset(
				"Patch size and channel counts must be greater than 0".into(),
			));
		}
		if !self.noise_level.is_finite() || self.noise_level < 0.0 {
			return Err(DenoiserError::Dataset(format!(
				"Noise level must be a non-negative number, got {}",
				self.noise_level
			)));
		}
		Ok(())
	}

	fn generate<R: Rng + ?Sized>(&self, samples: usize, rng: &mut R) -> Result<PatchPair> {
		let size = self.patch_size;
		let mut reference = Array4::<f32>::zeros((samples, size, size, self.output_channels));
		for mut sample in reference.outer_iter_mut() {
			for c in 0..self.output_channels {
				let field = smooth_field(size, rng);
				sample.slice_mut(s![.., .., c]).assign(&field);
			}
		}

		let noise = Uniform::new_inclusive(-self.noise_level, self.noise_level);
		let mut noisy = Array4::<f32>::zeros((samples, size, size, self.input_channels));
		for ((n, y, x, c), value) in noisy.indexed_iter_mut() {
			let clean = reference[[n, y, x, c % self.output_channels]];
			*value = (clean + noise.sample(rng)).max(0.0);
		}

		PatchPair::new(noisy, reference)
	}
}

impl DatasetProvider for SyntheticProvider {
	fn load(&self) -> Result<Dataset> {
		self.validate()?;
		let mut rng = seeded_rng(self.seed);
		let mut dataset = Dataset::new();
		dataset.insert(TRAIN_SPLIT, COLOUR_BUFFER, self.generate(self.train_samples, &mut rng)?);
		if self.test_samples > 0 {
			dataset.insert(TEST_SPLIT, COLOUR_BUFFER, self.generate(self.test_samples, &mut rng)?);
		}
		log::debug!(
			"generated synthetic dataset: {} train / {} test patches of {}x{}",
			self.train_samples,
			self.test_samples,
			self.patch_size,
			self.patch_size
		);
		Ok(dataset)
	}
}

/// Sum of two low frequency waves and an offset, rescaled into [0, 1].
fn smooth_field<R: Rng + ?Sized>(size: usize, rng: &mut R) -> ndarray::Array2<f32> {
	let waves: Vec<(f32, f32, f32, f32)> = (0..2)
		.map(|_| {
			(
				rng.gen_range(0.5..2.0),
				rng.gen_range(0.5..2.0),
				rng.gen_range(0.0..2.0 * PI),
				rng.gen_range(0.2..1.0),
			)
		})
		.collect();
	let base = rng.gen_range(0.0..1.0f32);
	let extent = size.max(1) as f32;

	let raw = ndarray::Array2::from_shape_fn((size, size), |(y, x)| {
		let (u, v) = (x as f32 / extent, y as f32 / extent);
		waves
			.iter()
			.map(|&(fx, fy, phase, amp)| amp * (2.0 * PI * (fx * u + fy * v) + phase).sin())
			.sum::<f32>()
			+ base
	});

	let min = raw.iter().cloned().fold(f32::INFINITY, f32::min);
	let max = raw.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
	let range = max - min;
	if range <= f32::EPSILON {
		return raw.mapv(|_| base.clamp(0.0, 1.0));
	}
	raw.mapv(|v| (v - min) / range)
}
