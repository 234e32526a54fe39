use std::fmt;
use std::str::FromStr;

use ndarray::{Array4, ArrayView4, Axis, Zip};

use crate::constants::training::BINARY_ACCURACY_THRESHOLD;
use crate::error::{DenoiserError, Result};

/// Reconstruction loss, averaged over every element of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
	/// L1
	MeanAbsoluteError,
	/// L2
	MeanSquaredError,
}

impl Loss {
	/// Returns the scalar loss and its gradient with respect to `prediction`.
	pub fn evaluate(&self, prediction: ArrayView4<f32>, target: ArrayView4<f32>) -> Result<(f32, Array4<f32>)> {
		check_same_shape(&prediction, &target)?;
		let count = prediction.len().max(1) as f32;
		let mut grad = Array4::<f32>::zeros(prediction.raw_dim());
		let mut total = 0.0f64;

		match self {
			Loss::MeanAbsoluteError => {
				Zip::from(&mut grad).and(&prediction).and(&target).for_each(|g, &p, &t| {
					let diff = p - t;
					total += diff.abs() as f64;
					*g = sign(diff) / count;
				});
			},
			Loss::MeanSquaredError => {
				Zip::from(&mut grad).and(&prediction).and(&target).for_each(|g, &p, &t| {
					let diff = p - t;
					total += (diff * diff) as f64;
					*g = 2.0 * diff / count;
				});
			},
		}

		Ok(((total / count as f64) as f32, grad))
	}

	pub fn value(&self, prediction: ArrayView4<f32>, target: ArrayView4<f32>) -> Result<f32> {
		self.evaluate(prediction, target).map(|(loss, _)| loss)
	}
}

/// `f32::signum` maps zero to one; a zero residual must not push the weights.
fn sign(value: f32) -> f32 {
	if value > 0.0 {
		1.0
	} else if value < 0.0 {
		-1.0
	} else {
		0.0
	}
}

impl FromStr for Loss {
	type Err = DenoiserError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"l1" | "mae" | "mean_absolute_error" => Ok(Loss::MeanAbsoluteError),
			"l2" | "mse" | "mean_squared_error" => Ok(Loss::MeanSquaredError),
			_ => Err(DenoiserError::InvalidParameter(format!("Unknown loss type: {}", s))),
		}
	}
}

impl fmt::Display for Loss {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Loss::MeanAbsoluteError => write!(f, "L1"),
			Loss::MeanSquaredError => write!(f, "L2"),
		}
	}
}

/// Metrics reported alongside the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
	/// The framework's generic "accuracy": categorical (argmax over channels) for
	/// multi-channel outputs, thresholded binary accuracy for a single channel. It says
	/// little about a regression head and is only reported when asked for.
	Accuracy,
}

impl Metric {
	pub fn name(&self) -> &'static str {
		match self {
			Metric::Accuracy => "accuracy",
		}
	}

	pub fn compute(&self, prediction: ArrayView4<f32>, target: ArrayView4<f32>) -> Result<f32> {
		check_same_shape(&prediction, &target)?;
		match self {
			Metric::Accuracy if prediction.len_of(Axis(3)) == 1 => Ok(binary_accuracy(prediction, target)),
			Metric::Accuracy => Ok(categorical_accuracy(prediction, target)),
		}
	}
}

fn categorical_accuracy(prediction: ArrayView4<f32>, target: ArrayView4<f32>) -> f32 {
	let prediction = prediction.as_standard_layout();
	let target = target.as_standard_layout();
	let mut hits = 0usize;
	let mut pixels = 0usize;
	for (p, t) in prediction.lanes(Axis(3)).into_iter().zip(target.lanes(Axis(3))) {
		if argmax(p.iter()) == argmax(t.iter()) {
			hits += 1;
		}
		pixels += 1;
	}
	hits as f32 / pixels.max(1) as f32
}

fn binary_accuracy(prediction: ArrayView4<f32>, target: ArrayView4<f32>) -> f32 {
	let mut hits = 0usize;
	Zip::from(&prediction).and(&target).for_each(|&p, &t| {
		let predicted = if p > BINARY_ACCURACY_THRESHOLD { 1.0 } else { 0.0 };
		if predicted == t {
			hits += 1;
		}
	});
	hits as f32 / prediction.len().max(1) as f32
}

/// First index of the largest value.
fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
	let mut best = (0, f32::NEG_INFINITY);
	for (index, &value) in values.enumerate() {
		if value > best.1 {
			best = (index, value);
		}
	}
	best.0
}

fn check_same_shape(prediction: &ArrayView4<f32>, target: &ArrayView4<f32>) -> Result<()> {
	if prediction.shape() != target.shape() {
		return Err(DenoiserError::ShapeMismatch(format!(
			"prediction has shape {:?} but target has shape {:?}",
			prediction.shape(),
			target.shape()
		)));
	}
	Ok(())
}
