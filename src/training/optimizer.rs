use ndarray::{ArrayD, Zip};

use crate::constants::training::{ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON, DEFAULT_LEARNING_RATE};
use crate::error::{DenoiserError, Result};
use crate::network::Parameter;

/// Applies one update to a fixed, ordered list of parameters.
pub trait Optimizer {
	fn step(&mut self, parameters: &mut [&mut Parameter]) -> Result<()>;

	fn learning_rate(&self) -> f32;
}

/// First moment, second moment.
#[derive(Debug, Clone)]
struct Moments {
	m: ArrayD<f32>,
	v: ArrayD<f32>,
}

/// Adam with bias correction folded into the step size:
/// `lr_t = lr * sqrt(1 - b2^t) / (1 - b1^t)` and `w -= lr_t * m / (sqrt(v) + eps)`.
#[derive(Debug, Clone)]
pub struct Adam {
	learning_rate: f32,
	beta1: f32,
	beta2: f32,
	epsilon: f32,
	iterations: u64,
	state: Vec<Moments>,
}

impl Default for Adam {
	fn default() -> Self {
		Adam::new(DEFAULT_LEARNING_RATE)
	}
}

impl Adam {
	pub fn new(learning_rate: f32) -> Self {
		Adam {
			learning_rate,
			beta1: ADAM_BETA1,
			beta2: ADAM_BETA2,
			epsilon: ADAM_EPSILON,
			iterations: 0,
			state: Vec::new(),
		}
	}

	pub fn iterations(&self) -> u64 {
		self.iterations
	}

	fn init_state(&mut self, parameters: &[&mut Parameter]) {
		self.state = parameters
			.iter()
			.map(|p| Moments {
				m: ArrayD::zeros(p.value().raw_dim()),
				v: ArrayD::zeros(p.value().raw_dim()),
			})
			.collect();
	}

	fn check_state(&self, parameters: &[&mut Parameter]) -> Result<()> {
		if self.state.len() != parameters.len() {
			return Err(DenoiserError::Training(format!(
				"optimizer tracks {} parameters but was given {}",
				self.state.len(),
				parameters.len()
			)));
		}
		for (moments, parameter) in self.state.iter().zip(parameters.iter()) {
			if moments.m.shape() != parameter.value().shape() {
				return Err(DenoiserError::Training(format!(
					"parameter {} changed shape from {:?} to {:?}",
					parameter.name(),
					moments.m.shape(),
					parameter.value().shape()
				)));
			}
		}
		Ok(())
	}
}

impl Optimizer for Adam {
	fn step(&mut self, parameters: &mut [&mut Parameter]) -> Result<()> {
		if self.iterations == 0 && self.state.is_empty() {
			self.init_state(parameters);
		}
		self.check_state(parameters)?;

		self.iterations += 1;
		let t = self.iterations as i32;
		let lr_t = self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));
		let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);

		for (moments, parameter) in self.state.iter_mut().zip(parameters.iter_mut()) {
			let (value, grad) = parameter.value_grad_mut();
			let grad = match grad {
				Some(grad) => grad,
				None => continue,
			};
			Zip::from(value)
				.and(&mut moments.m)
				.and(&mut moments.v)
				.and(grad)
				.for_each(|w, m, v, &g| {
					*m = beta1 * *m + (1.0 - beta1) * g;
					*v = beta2 * *v + (1.0 - beta2) * g * g;
					*w -= lr_t * *m / (v.sqrt() + epsilon);
				});
		}
		Ok(())
	}

	fn learning_rate(&self) -> f32 {
		self.learning_rate
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ndarray::{arr1, ArrayD, IxDyn};

	fn parameter(values: &[f32], grad: Option<&[f32]>) -> Parameter {
		let mut p = Parameter::new("p", arr1(values).into_dyn());
		if let Some(grad) = grad {
			p.set_grad(arr1(grad).into_dyn()).unwrap();
		}
		p
	}

	#[test]
	fn test_first_step_moves_by_learning_rate() {
		let mut p = parameter(&[1.0, 1.0, 1.0], Some(&[0.5, -2.0, 0.0]));
		let mut adam = Adam::new(0.1);
		adam.step(&mut [&mut p]).unwrap();

		let value = p.value();
		assert!((value[[0]] - 0.9).abs() < 1e-4);
		assert!((value[[1]] - 1.1).abs() < 1e-4);
		assert_eq!(value[[2]], 1.0);
		assert_eq!(adam.iterations(), 1);
	}

	#[test]
	fn test_parameters_without_gradient_are_skipped() {
		let mut a = parameter(&[1.0], None);
		let mut b = parameter(&[1.0], Some(&[1.0]));
		let mut adam = Adam::new(0.01);
		adam.step(&mut [&mut a, &mut b]).unwrap();
		assert_eq!(a.value()[[0]], 1.0);
		assert!(b.value()[[0]] < 1.0);
	}

	#[test]
	fn test_parameter_list_must_stay_fixed() {
		let mut a = parameter(&[1.0], Some(&[1.0]));
		let mut b = parameter(&[1.0], Some(&[1.0]));
		let mut adam = Adam::default();
		adam.step(&mut [&mut a]).unwrap();
		let err = adam.step(&mut [&mut a, &mut b]).unwrap_err();
		assert!(matches!(err, DenoiserError::Training(_)));

		let mut reshaped = Parameter::new("p", ArrayD::zeros(IxDyn(&[2])));
		let err = adam.step(&mut [&mut reshaped]).unwrap_err();
		assert!(matches!(err, DenoiserError::Training(_)));
	}

	#[test]
	fn test_defaults() {
		let adam = Adam::default();
		assert_eq!(adam.learning_rate(), DEFAULT_LEARNING_RATE);
		assert_eq!((adam.beta1, adam.beta2, adam.epsilon), (ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON));
		assert_eq!(adam.iterations(), 0);
	}
}
