use ndarray::ArrayD;

use crate::error::{DenoiserError, Result};

/// A learnable tensor and the gradient from the most recent backward pass.
#[derive(Debug, Clone)]
pub struct Parameter {
	name: String,
	value: ArrayD<f32>,
	grad: Option<ArrayD<f32>>,
}

impl Parameter {
	pub fn new(name: impl Into<String>, value: ArrayD<f32>) -> Self {
		Self {
			name: name.into(),
			value,
			grad: None,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn value(&self) -> &ArrayD<f32> {
		&self.value
	}

	pub fn value_mut(&mut self) -> &mut ArrayD<f32> {
		&mut self.value
	}

	pub fn grad(&self) -> Option<&ArrayD<f32>> {
		self.grad.as_ref()
	}

	pub fn set_grad(&mut self, grad: ArrayD<f32>) -> Result<()> {
		if grad.shape() != self.value.shape() {
			return Err(DenoiserError::ShapeMismatch(format!(
				"gradient for {} has shape {:?}, parameter has {:?}",
				self.name,
				grad.shape(),
				self.value.shape()
			)));
		}
		self.grad = Some(grad);
		Ok(())
	}

	pub fn zero_grad(&mut self) {
		self.grad = None;
	}

	/// Splits the borrow so an optimiser can read the gradient while updating the value.
	pub fn value_grad_mut(&mut self) -> (&mut ArrayD<f32>, Option<&ArrayD<f32>>) {
		(&mut self.value, self.grad.as_ref())
	}

	pub fn len(&self) -> usize {
		self.value.len()
	}

	pub fn is_empty(&self) -> bool {
		self.value.is_empty()
	}
}
