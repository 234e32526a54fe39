use std::fmt;

use ndarray::{Array, ArrayView, Dimension, Zip};

use super::init::Initializer;

/// (height, width, channels) of a single sample.
pub type Shape3 = (usize, usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
	Relu,
	/// Identity, used by the prediction layer so pixel values stay unbounded.
	Linear,
}

impl Activation {
	pub fn apply<D: Dimension>(self, values: &mut Array<f32, D>) {
		if let Activation::Relu = self {
			values.mapv_inplace(|v| v.max(0.0));
		}
	}

	/// Turns the gradient w.r.t. the activated output into the gradient w.r.t. the
	/// pre-activation, given the activated output.
	pub fn backprop<D: Dimension>(self, output: ArrayView<f32, D>, grad: &mut Array<f32, D>) {
		if let Activation::Relu = self {
			Zip::from(grad).and(&output).for_each(|g, &y| {
				if y <= 0.0 {
					*g = 0.0;
				}
			});
		}
	}
}

impl fmt::Display for Activation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Activation::Relu => write!(f, "relu"),
			Activation::Linear => write!(f, "linear"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
	/// Kernel applied only where it fully overlaps the input.
	Valid,
}

impl Padding {
	/// Output extent along one axis, or `None` if the kernel does not fit.
	pub fn output_extent(self, input: usize, kernel: usize, stride: usize) -> Option<usize> {
		if input == 0 || kernel == 0 || stride == 0 {
			return None;
		}
		match self {
			Padding::Valid => input.checked_sub(kernel).map(|rest| rest / stride + 1),
		}
	}
}

impl fmt::Display for Padding {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Padding::Valid => write!(f, "valid"),
		}
	}
}

/// Declarative description of one 2-D convolution stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
	pub filters: usize,
	pub kernel: (usize, usize),
	pub stride: (usize, usize),
	pub padding: Padding,
	pub use_bias: bool,
	pub activation: Activation,
	pub kernel_initializer: Initializer,
	pub bias_initializer: Initializer,
	/// Only the first stage of a model declares this; later stages infer it.
	pub input_shape: Option<Shape3>,
}

impl LayerSpec {
	/// A stride 1, valid padding, biased, linear convolution with Glorot uniform kernels.
	pub fn conv2d(filters: usize, kernel: (usize, usize)) -> Self {
		Self {
			filters,
			kernel,
			stride: (1, 1),
			padding: Padding::Valid,
			use_bias: true,
			activation: Activation::Linear,
			kernel_initializer: Initializer::GlorotUniform,
			bias_initializer: Initializer::Zeros,
			input_shape: None,
		}
	}

	pub fn with_activation(mut self, activation: Activation) -> Self {
		self.activation = activation;
		self
	}

	pub fn with_input_shape(mut self, shape: Shape3) -> Self {
		self.input_shape = Some(shape);
		self
	}

	pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
		self.stride = stride;
		self
	}

	pub fn with_bias(mut self, use_bias: bool) -> Self {
		self.use_bias = use_bias;
		self
	}

	pub fn with_kernel_initializer(mut self, initializer: Initializer) -> Self {
		self.kernel_initializer = initializer;
		self
	}

	/// Shape produced from an input of shape `input`, or `None` if it would be empty.
	pub fn output_shape(&self, input: Shape3) -> Option<Shape3> {
		if self.filters == 0 {
			return None;
		}
		let height = self.padding.output_extent(input.0, self.kernel.0, self.stride.0)?;
		let width = self.padding.output_extent(input.1, self.kernel.1, self.stride.1)?;
		Some((height, width, self.filters))
	}

	/// Learnable values held by a stage with `input_channels` inputs.
	pub fn parameter_count(&self, input_channels: usize) -> usize {
		let kernel = self.kernel.0 * self.kernel.1 * input_channels * self.filters;
		if self.use_bias {
			kernel + self.filters
		} else {
			kernel
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ndarray::arr1;

	#[test]
	fn test_valid_extent_shrinks_by_kernel_minus_one() {
		assert_eq!(Padding::Valid.output_extent(64, 5, 1), Some(60));
		assert_eq!(Padding::Valid.output_extent(5, 5, 1), Some(1));
		assert_eq!(Padding::Valid.output_extent(4, 5, 1), None);
		assert_eq!(Padding::Valid.output_extent(9, 3, 2), Some(4));
	}

	#[test]
	fn test_relu_backprop_masks_inactive_outputs() {
		let mut values = arr1(&[-1.0f32, 0.0, 2.0]);
		Activation::Relu.apply(&mut values);
		assert_eq!(values, arr1(&[0.0, 0.0, 2.0]));

		let mut grad = arr1(&[1.0f32, 1.0, 1.0]);
		Activation::Relu.backprop(values.view(), &mut grad);
		assert_eq!(grad, arr1(&[0.0, 0.0, 1.0]));

		let mut grad = arr1(&[1.0f32, 1.0, 1.0]);
		Activation::Linear.backprop(values.view(), &mut grad);
		assert_eq!(grad, arr1(&[1.0, 1.0, 1.0]));
	}

	#[test]
	fn test_spec_output_shape_and_params() {
		let spec = LayerSpec::conv2d(100, (5, 5)).with_activation(Activation::Relu);
		assert_eq!(spec.output_shape((64, 64, 3)), Some((60, 60, 100)));
		assert_eq!(spec.parameter_count(3), 7600);
		assert_eq!(spec.clone().with_bias(false).parameter_count(3), 7500);
		assert_eq!(LayerSpec::conv2d(0, (5, 5)).output_shape((64, 64, 3)), None);
	}
}
