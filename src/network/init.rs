use ndarray::{ArrayD, IxDyn};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;

/// Weight initialisation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
	/// Uniform on (-l, l) with l = sqrt(6 / (fan_in + fan_out)).
	GlorotUniform,
	Zeros,
}

pub fn glorot_uniform_limit(fan_in: usize, fan_out: usize) -> f32 {
	(6.0 / (fan_in + fan_out).max(1) as f32).sqrt()
}

impl Initializer {
	pub fn initialize<R: Rng + ?Sized>(self, shape: &[usize], fan_in: usize, fan_out: usize, rng: &mut R) -> Result<ArrayD<f32>> {
		match self {
			Initializer::Zeros => Ok(ArrayD::zeros(IxDyn(shape))),
			Initializer::GlorotUniform => {
				let limit = glorot_uniform_limit(fan_in, fan_out);
				let size: usize = shape.iter().product();
				let dist = Uniform::new(-limit, limit);
				let data = (0..size).map(|_| dist.sample(rng)).collect::<Vec<_>>();
				Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
			},
		}
	}
}

/// A reproducible generator when `seed` is given, otherwise one seeded from the OS.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
	match seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_entropy(),
	}
}
